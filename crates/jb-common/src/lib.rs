//! # jb-common
//!
//! Shared configuration and error types for JarBundle.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
