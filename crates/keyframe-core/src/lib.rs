//! Keyframe Core Library
//!
//! Shared functionality for the Keyframe stream tooling:
//! - Site configuration and the derivation key source
//! - Stream manifest loading and validation
//! - `SQLite` pool helpers shared by both stream stores
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod manifest;
pub mod tracing_init;

pub use config::{DerivationKey, IngestdConfig, SiteConfig};
pub use error::{Error, Result};
pub use manifest::{DesiredStream, Manifest};
