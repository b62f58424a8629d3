//! Core types for Hydrant
//!
//! This module holds the error system shared by every layer of the engine:
//! - [`HydrantError`] - Enumerated error types covering fetch, ordering and
//!   configuration failures
//! - [`ErrorContext`] - User-friendly error wrapper with suggestions
//! - [`user_friendly_error`] - Convert any error to user-friendly format

pub mod error;

pub use error::{ErrorContext, HydrantError, user_friendly_error};
