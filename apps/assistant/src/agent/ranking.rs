//! Deterministic result ordering.
//!
//! Order: promoted (verified/featured) first, then completeness, then newest.
//! The sort is stable, so records equal on all three keep their fetch order.

use std::cmp::Ordering;

use crate::models::record::SearchRecord;

pub fn compare<R: SearchRecord>(a: &R, b: &R) -> Ordering {
    b.is_promoted()
        .cmp(&a.is_promoted())
        .then_with(|| b.completeness().cmp(&a.completeness()))
        // None sorts before Some, so undated records land last.
        .then_with(|| b.recency().cmp(&a.recency()))
}

pub fn rank<R: SearchRecord>(records: &mut [R]) {
    records.sort_by(compare);
}
