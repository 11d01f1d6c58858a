//! Timezone reconciliation of MyEnergi hourly totals.
//!
//! The device reports hourly buckets for a calendar day in UTC. When the local
//! offset is non-zero, the local day spills into the neighbouring UTC day: the
//! buckets from that day are stitched onto the anchor day's sequence.
//!
//! Offsets are truncated to whole hours, so half-hour zones are only
//! approximated. Entries are concatenated, never re-sorted by their corrected
//! hour; see [`display_hour`] for the label shown next to each bucket.

use crate::model::HourlyTotal;

/// Whole hours of `offset_minutes`, truncated towards zero.
pub fn offset_hours(offset_minutes: i32) -> i64 {
    i64::from(offset_minutes / 60)
}

/// Combine the anchor day's totals with the adjacent day's.
///
/// With a positive offset, the adjacent (previous) day's entries whose hour is
/// at least `24 - offset_hours` are prepended, in their original order. With a
/// negative offset, the adjacent (next) day's entries whose hour is below
/// `24 - offset_hours` are appended. A zero offset, or no adjacent day, returns
/// `local` unchanged.
pub fn reconcile(
    local: Vec<HourlyTotal>,
    offset_minutes: i32,
    adjacent: Option<Vec<HourlyTotal>>,
) -> Vec<HourlyTotal> {
    let adjacent = match adjacent {
        Some(adjacent) if offset_minutes != 0 => adjacent,
        _ => return local,
    };

    let threshold = 24 - offset_hours(offset_minutes);

    if offset_minutes > 0 {
        let mut totals: Vec<HourlyTotal> = adjacent
            .into_iter()
            .filter(|t| i64::from(t.hour) >= threshold)
            .collect();
        totals.extend(local);
        totals
    } else {
        let mut totals = local;
        totals.extend(
            adjacent
                .into_iter()
                .filter(|t| i64::from(t.hour) < threshold),
        );
        totals
    }
}

/// Hour label shown for `total`: the reported hour shifted by the offset.
pub fn display_hour(total: &HourlyTotal, offset_minutes: i32) -> i64 {
    i64::from(total.hour) + offset_hours(offset_minutes)
}
