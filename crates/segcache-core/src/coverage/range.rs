//! Out-of-range predicate and the forward coverage scan.

use crate::segment_db::Segment;

/// True if `segment` has no relation to the half-open range `[start, end)`.
///
/// A segment occupying `[s, s + len)` is related when its first or last byte
/// falls inside the range, or when it contains the whole range. Scans stop at
/// the first unrelated segment.
pub fn is_out_of_range(start: u64, end: u64, segment: &Segment) -> bool {
    let seg_start = segment.start_offset;
    let seg_end = segment.end_offset();
    let query = start..end;

    let intersects = query.contains(&seg_start)
        || seg_end.checked_sub(1).is_some_and(|last| query.contains(&last));
    let contains = seg_start <= start && seg_end >= end;

    !(intersects || contains)
}

/// Forward scan over `segments` (ordered by start offset) checking that
/// `[0, declared_length)` is covered without a gap.
///
/// Touching segments count as gap-free. Overlapping segments never move the
/// cursor past `declared_length`. Zero segments or a zero length is never
/// covered.
pub fn is_fully_covered(segments: &[Segment], declared_length: u64) -> bool {
    if declared_length == 0 || segments.is_empty() {
        return false;
    }

    let mut cursor = 0u64;
    for segment in segments {
        if is_out_of_range(cursor, declared_length, segment) {
            break;
        }
        if cursor >= segment.start_offset {
            let local_start = cursor - segment.start_offset;
            let useful = segment
                .length
                .saturating_sub(local_start)
                .min(declared_length - cursor);
            cursor += useful;
        } else {
            break;
        }
    }

    cursor >= declared_length
}
