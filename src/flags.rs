//! Bit flags carried on order-book records, packed into a single `u8` column.

/// This delta is the last in the venue-emitted event (a multi-level update arrived
/// as several deltas sharing one `sequence`).
pub const LAST: u8 = 1 << 0;
/// This delta is a top-of-book-only update.
pub const TOB: u8 = 1 << 1;
/// This delta is part of a full-book snapshot rather than an incremental update.
pub const SNAPSHOT: u8 = 1 << 2;
/// The producing venue marked this record as a replay of previously-sent data.
pub const REPLAY: u8 = 1 << 3;
/// The record's `ts_recv` could not be trusted and was reconstructed from `ts_event`.
pub const BAD_TS_RECV: u8 = 1 << 4;

/// Returns `true` if every bit set in `mask` is also set in `flags`.
pub fn is_set(flags: u8, mask: u8) -> bool {
    flags & mask == mask
}

/// Sets every bit in `mask` on `flags`, returning the result.
pub fn set(flags: u8, mask: u8) -> u8 {
    flags | mask
}

/// Clears every bit in `mask` on `flags`, returning the result.
pub fn clear(flags: u8, mask: u8) -> u8 {
    flags & !mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_check_round_trip() {
        let flags = set(0, SNAPSHOT | LAST);
        assert!(is_set(flags, SNAPSHOT));
        assert!(is_set(flags, LAST));
        assert!(!is_set(flags, TOB));
    }

    #[test]
    fn clear_removes_only_targeted_bits() {
        let flags = set(0, SNAPSHOT | LAST);
        let cleared = clear(flags, SNAPSHOT);
        assert!(!is_set(cleared, SNAPSHOT));
        assert!(is_set(cleared, LAST));
    }
}
