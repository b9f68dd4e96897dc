//! Binding to the soil-moisture backend REST API.

pub mod client;
pub mod models;
pub mod store;

pub use client::BackendClient;
pub use store::{DeviceDirectory, ReadingQuery, ReadingStore};
