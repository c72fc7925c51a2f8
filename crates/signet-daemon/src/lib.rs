//! Signet Daemon - Signature device service
//!
//! This crate provides:
//! - A device store abstraction with an in-memory implementation
//! - The device service that creates devices and chains their signatures
//! - Daemon configuration
//! - The HTTP API exposing the service

pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod store;

pub use config::DaemonConfig;
pub use error::{DaemonError, Result, StoreError};
pub use service::DeviceService;
pub use store::{DeviceStore, InMemoryDeviceStore};
