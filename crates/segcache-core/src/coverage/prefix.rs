//! Cached pieces that serve the front of a requested range.

use std::ops::Range;

use crate::segment_db::Segment;

use super::range::is_out_of_range;

/// Part of a stored segment that serves a request: `len` bytes starting
/// `local_offset` bytes into the segment's file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPiece {
    pub segment: Segment,
    pub local_offset: u64,
    pub len: u64,
}

impl CachedPiece {
    /// Absolute resource offset of the first byte of this piece.
    pub fn start(&self) -> u64 {
        self.segment.start_offset + self.local_offset
    }
}

/// Pieces of `segments` (ordered by start offset) covering `range` from its
/// start without a gap, in order.
///
/// Segments ending before the cursor are skipped; the scan stops at the first
/// gap. The total length of the pieces is the cached prefix of the range.
pub fn covered_prefix(segments: &[Segment], range: Range<u64>) -> Vec<CachedPiece> {
    let mut pieces = Vec::new();
    let mut cursor = range.start;
    if range.is_empty() {
        return pieces;
    }

    for segment in segments {
        if cursor >= range.end {
            break;
        }
        if segment.end_offset() <= cursor {
            continue;
        }
        if segment.start_offset > cursor || is_out_of_range(cursor, range.end, segment) {
            break;
        }
        let local_offset = cursor - segment.start_offset;
        let len = (segment.length - local_offset).min(range.end - cursor);
        pieces.push(CachedPiece {
            segment: segment.clone(),
            local_offset,
            len,
        });
        cursor += len;
    }

    pieces
}
