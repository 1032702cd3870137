//! Data models: configuration, invoice schema and recovered records.

pub mod config;
pub mod invoice;
pub mod lenient;
pub mod record;
