//! # lmkv Testkit
//!
//! Test utilities for lmkv.
//!
//! This crate provides:
//! - Temporary environment fixtures and dataset helpers
//! - Property-based test generators using proptest
//! - A model-checking harness that mirrors a table in a `BTreeMap`
//! - Concurrent reader stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lmkv_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_environment() {
//!     with_temp_env(|env| {
//!         let txn = env.begin_ro_txn().unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
