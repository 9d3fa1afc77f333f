pub mod auth;
pub mod content_range;
pub mod keyed_mutex;
pub mod validation;
