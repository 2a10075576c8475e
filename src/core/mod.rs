pub mod cascade;
pub mod engine;
pub mod graph;
pub mod overrides;
pub mod planner;
pub mod registry;
pub mod state;

pub use crate::domain::model::{CalculationRecord, OverrideSet};
pub use crate::domain::ports::{CalculationService, RecordStore};
pub use crate::utils::error::Result;
