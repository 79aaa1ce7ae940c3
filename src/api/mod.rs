pub mod client;
pub mod models;

pub use client::{ApiClient, ApiError, Result, Session};
pub use models::{ApiConfig, DEFAULT_ENDPOINT};
