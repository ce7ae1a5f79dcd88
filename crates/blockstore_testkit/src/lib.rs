//! # Blockstore Testkit
//!
//! Test utilities for blockstore backends.
//!
//! This crate provides:
//! - A behavioral contract suite every [`BlockBackend`] must pass
//! - Fixtures building each backend variant on disposable media
//! - Property-based test generators using proptest
//! - A model-checking harness for operation sequences
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use blockstore_testkit::prelude::*;
//!
//! for fixture in TestBackend::all() {
//!     run_contract_suite(&*fixture);
//! }
//! ```
//!
//! [`BlockBackend`]: blockstore_backend::BlockBackend

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod contract;
pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::contract::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::stress::*;
}

pub use contract::*;
pub use fixtures::*;
pub use generators::*;
pub use harness::*;
pub use stress::*;
