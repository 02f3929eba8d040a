//! Linear GraphQL backend for the tool catalog.

pub mod client;
pub mod config;

pub use client::LinearClient;
pub use config::{LinearConfig, DEFAULT_API_URL};
