pub mod platform;
pub mod storage;
