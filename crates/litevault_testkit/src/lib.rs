//! # LiteVault Testkit
//!
//! Test utilities for LiteVault.
//!
//! This crate provides:
//! - Temporary vault fixtures backed by an in-memory remote
//! - A fault-injecting object store for degraded-remote scenarios
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use litevault_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_vault() {
//!     with_test_vault(|fixture| {
//!         fixture.vault.execute_write("CREATE TABLE t(x)").unwrap();
//!         assert_eq!(fixture.remote.len(), 1);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
