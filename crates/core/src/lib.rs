pub mod categorize;
pub mod integrity;
pub mod raw;
pub mod records;
