//! Craftbook Engine - developer tooling for recipe catalogs.
//!
//! This crate provides the pieces behind the `craftbook` binary: tool
//! configuration, catalog file loading and linting, and session fixtures.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod recipe_loader;
pub mod session;
