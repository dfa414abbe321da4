//! Error handling for archive and codec operations
//!
//! This module re-exports the error type used throughout the crate. It is
//! built with thiserror and carries one variant per failure class: header
//! and table problems, lookup misses, key failures, unsupported codecs and
//! corrupt bitstreams.

pub use crate::common::MpqError;
pub use crate::common::Result;
