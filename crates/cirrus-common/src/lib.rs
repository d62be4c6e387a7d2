//! # cirrus-common
//!
//! Shared types, error definitions, the stack configuration store, and
//! constants used across the entire Cirrus workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives that every other crate
//! builds upon.

pub mod config;
pub mod constants;
pub mod error;
pub mod secret;
pub mod types;
pub mod value;
