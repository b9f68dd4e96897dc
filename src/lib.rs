//! Moisture Dash - dashboard data service for a soil-moisture sensor network
//!
//! This library exposes the core modules for testing and reuse.

pub mod backend;
pub mod common;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod routes;
