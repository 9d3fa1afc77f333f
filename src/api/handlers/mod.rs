pub mod finalize;
pub mod health;
pub mod upload;
