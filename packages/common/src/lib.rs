//! # Redline Common
//!
//! Report document model shared by the diff, editor and CLI crates.

pub mod error;
pub mod markdown;
pub mod report;
pub mod result;

pub use error::*;
pub use report::*;
pub use result::*;
