//! # Strata Core
//!
//! Core types shared by the Strata segment storage crates: the error type
//! and the [`Cursor`] trait that every segment kind implements.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Strata.**
//!
//! Users should depend on the main `strata` crate instead, which re-exports
//! everything here. This crate's API may change without notice between
//! minor versions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cursor;
pub mod error;

pub use cursor::{
    count_backward, count_forward, keys_backward, keys_forward, Cursor, Entries, SeekOp, Value,
    TOMBSTONE_LENGTH,
};
pub use error::{Error, Result};
