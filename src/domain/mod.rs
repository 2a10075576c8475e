// Domain layer: core models and ports (interfaces). No dependencies on adapters or app.

pub mod model;
pub mod ports;
pub mod service_io;
pub mod service_name;
pub mod validation;
