//! Data models for rentwatch.

mod ad;

pub use ad::{AdRecord, NOT_AVAILABLE};
