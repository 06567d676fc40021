//! # Mawrid Support
//!
//! Shared utilities for the Mawrid DI container:
//! - Text rendering for error messages and registry diagnostics

pub mod rendering;
