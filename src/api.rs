//! An HTTP client for the price-prediction server.

mod client;
mod client_builder;
mod error;
mod models;
mod result;

pub use client::Client;
pub use client_builder::ClientBuilder;
pub use error::Error;
pub use models::{AccessStatus, HealthStatus};
pub use result::Result;
