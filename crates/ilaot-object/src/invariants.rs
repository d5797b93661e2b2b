//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

#[inline]
pub(crate) fn assert_alignment(align: u32) {
    assert!(
        align.is_power_of_two(),
        "ObjectDataBuilder: alignment {align} is not a power of two"
    );
}

#[inline]
pub(crate) fn assert_fits(fits: bool, value: i64, width: u8) {
    debug_assert!(
        fits,
        "ObjectDataBuilder: {value} does not fit in {width} bytes"
    );
}

#[cfg(debug_assertions)]
#[inline]
pub(crate) fn ensure_pending_reservation(found: Option<usize>, offset: u32) -> usize {
    found.unwrap_or_else(|| {
        panic!(
            "ObjectDataBuilder: reservation at {offset} is not outstanding \
             (redeemed already or issued by another builder)"
        )
    })
}

#[cfg(debug_assertions)]
pub(crate) fn assert_no_pending_reservations(pending: &[(u32, u8)]) {
    assert!(
        pending.is_empty(),
        "ObjectDataBuilder: finalized with {} unredeemed reservations at {:?}",
        pending.len(),
        pending.iter().map(|&(offset, _)| offset).collect::<Vec<_>>()
    );
}
