//! deployd Library
//!
//! Core modules of the deployment orchestration service.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod provider;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
