//! Core types and traits for the snaplink URL shortener.
//!
//! This crate provides the types shared by the identifier generator, the
//! persistence backends and the store that orchestrates them.

pub mod backend;
pub mod error;
pub mod shortcode;

pub use backend::{Backend, InsertOutcome, ShortLink};
pub use error::{CoreError, StorageError};
pub use shortcode::ShortCode;
