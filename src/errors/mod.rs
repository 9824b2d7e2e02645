//! Centralized error handling for the video broker core
//!
//! This module unifies the taxonomy classification used by the Resilience
//! Kernel (§7) with the five surface error kinds seen by the Registry and
//! everything above it.

pub mod types;

pub use types::*;
