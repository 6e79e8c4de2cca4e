//! # Redline Diff
//!
//! Reviewable differences between an original text and a suggested rewrite.
//!
//! ```text
//!   original ─┐
//!             ├─► line LCS ─► runs ─► modify pairs ─► DiffResult
//!  suggested ─┘                         │
//!                                       └─► word LCS (DELETE + INSERT)
//! ```
//!
//! The diff is pure and derived: nothing here is persisted, and the same
//! inputs always produce the same operations.
//!
//! ## Usage
//!
//! ```rust
//! use redline_diff::diff;
//!
//! let result = diff(
//!     "25 cubic yards of concrete was poured",
//!     "25 cubic yards of concrete were poured",
//! );
//!
//! assert_eq!(result.modify_pairs(), 1);
//! assert_eq!(result.stats().change_summary(), "+1 words, -1 words");
//! ```

pub mod engine;
pub mod lcs;
pub mod ops;

pub use engine::{diff, diff_words, tokenize};
pub use ops::{DiffKind, DiffOp, DiffResult, DiffStats};
