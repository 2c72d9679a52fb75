// Re-export models
pub use crate::models::*;

pub mod models;
pub mod utils;
