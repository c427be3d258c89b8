//! Shared test utilities for the converge workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`executor`]: executors that fail on demand
//! - [`trees`]: the sample schema and trees used across test suites
//! - [`workspace`]: [`TestWorkspace`] builder for on-disk CLI scenarios

pub mod executor;
pub mod trees;
pub mod workspace;

pub use executor::FailingExecutor;
pub use workspace::TestWorkspace;
