pub mod accounts;
pub mod analytics;
pub mod flush;
pub mod ingest;
pub mod maintenance;
pub mod queue;

// Re-export the storage layer at the crate root for convenience
pub use vigil_storage as storage;
