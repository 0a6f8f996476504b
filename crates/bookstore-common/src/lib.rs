//! Common utilities for the bookstore workspace
//!
//! This crate provides the error type shared by the store and the CLI.

pub mod error;

pub use error::{BookstoreError, Result};
