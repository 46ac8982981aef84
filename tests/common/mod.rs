//! Common test utilities and helpers.
//!
//! This module provides shared functionality for all tests, including:
//! - Synthetic PDF builders
//! - Output inspection helpers
//! - Custom assertions

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod pdf_helpers;

pub use assertions::*;
pub use fixtures::*;
pub use pdf_helpers::*;
