pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{InMemoryRecordStore, JsonFileRecordStore};
pub use app::services::standard_registry;
pub use config::EngineConfig;
pub use core::cascade::{CascadeReport, CascadeStatus, CascadingExecutor, ExecutorOptions};
pub use core::engine::{CalculationStatus, CascadeEngine};
pub use core::graph::DependencyGraph;
pub use core::planner::{ExecutionPlan, ExecutionPlanner};
pub use core::registry::ServiceRegistry;
pub use domain::model::{BuildingProfile, CalculationRecord, OverrideSet};
pub use domain::ports::{CalculationService, RecordStore};
pub use domain::service_name::ServiceName;
pub use utils::error::{EngineError, Result};
