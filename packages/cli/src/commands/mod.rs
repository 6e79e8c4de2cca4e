pub mod diff;
pub mod review;

pub use diff::{diff, DiffArgs};
pub use review::{review, ReviewArgs};
