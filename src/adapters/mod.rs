// Adapters layer: concrete RecordStore implementations.

pub mod file_store;
pub mod memory_store;

pub use file_store::JsonFileRecordStore;
pub use memory_store::InMemoryRecordStore;
