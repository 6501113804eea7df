//! deployd HTTP API models

pub mod models;
