//! Range math over stored segments.
//!
//! Decides whether a segment relates to a half-open byte range, whether the
//! stored segments of a resource cover its whole declared length, and which
//! cached pieces can serve the front of a requested range.

mod prefix;
mod range;

pub use prefix::{covered_prefix, CachedPiece};
pub use range::{is_fully_covered, is_out_of_range};
