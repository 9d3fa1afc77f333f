pub mod ckan;
pub mod defaults;
pub mod error;
pub mod finalizer;
pub mod platform;
pub mod receiver;
pub mod schema_registry;
pub mod staging;
