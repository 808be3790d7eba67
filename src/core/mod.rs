//! Core module - shared types and utilities used by all three binaries.

pub mod archive;
pub mod disk;
pub mod error;
pub mod inode;
pub mod maidenhead;
pub mod panic;
pub mod validate;

pub use error::{InsertOutcome, RelayError, Result, ValidationOutcome};
