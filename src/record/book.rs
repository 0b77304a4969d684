use crate::enums::{BookAction, Side};
use crate::fixed_point::{Price, Quantity};
use crate::identifiers::InstrumentId;

use super::Record;

/// A single change to an order book: add/update/delete an order, or clear the book.
///
/// Unlike the other tick records, [`OrderBookDelta`] prices and sizes are packed
/// big-endian on the wire (see [`crate::fixed_point::endian`]) — an inherited
/// inconsistency this crate preserves rather than silently normalizes.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookDelta {
    /// The book's instrument.
    pub instrument_id: InstrumentId,
    /// What kind of change this delta represents.
    pub action: BookAction,
    /// Which side of the book the change applies to.
    pub side: Side,
    /// The affected price level; meaningless for [`BookAction::Clear`].
    pub price: Price,
    /// The size at the affected level after the change.
    pub size: Quantity,
    /// The venue's order identifier, where the venue exposes order-level detail.
    pub order_id: u64,
    /// Bit flags, see [`crate::flags`].
    pub flags: u8,
    /// A venue-assigned monotonic sequence number, for detecting dropped updates.
    pub sequence: u64,
    /// When the change occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the change, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for OrderBookDelta {
    const TYPE_NAME: &'static str = "order_book_delta";

    fn ts_event(&self) -> u64 {
        self.ts_event
    }

    fn ts_init(&self) -> u64 {
        self.ts_init
    }

    fn instrument_id(&self) -> Option<&InstrumentId> {
        Some(&self.instrument_id)
    }
}

/// The fixed depth a [`OrderBookDepth10`] snapshot carries per side.
pub const BOOK_DEPTH: usize = 10;

/// A full 10-level order book snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookDepth10 {
    /// The book's instrument.
    pub instrument_id: InstrumentId,
    /// Bid prices, best-first.
    pub bid_price: [Price; BOOK_DEPTH],
    /// Ask prices, best-first.
    pub ask_price: [Price; BOOK_DEPTH],
    /// Sizes at each bid level.
    pub bid_size: [Quantity; BOOK_DEPTH],
    /// Sizes at each ask level.
    pub ask_size: [Quantity; BOOK_DEPTH],
    /// Number of distinct orders resting at each bid level, where known.
    pub bid_count: [u32; BOOK_DEPTH],
    /// Number of distinct orders resting at each ask level, where known.
    pub ask_count: [u32; BOOK_DEPTH],
    /// Bit flags, see [`crate::flags`].
    pub flags: u8,
    /// A venue-assigned monotonic sequence number.
    pub sequence: u64,
    /// When the snapshot was taken at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the snapshot, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for OrderBookDepth10 {
    const TYPE_NAME: &'static str = "order_book_depth10";

    fn ts_event(&self) -> u64 {
        self.ts_event
    }

    fn ts_init(&self) -> u64 {
        self.ts_init
    }

    fn instrument_id(&self) -> Option<&InstrumentId> {
        Some(&self.instrument_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags;

    #[test]
    fn clear_action_carries_no_meaningful_price() {
        let delta = OrderBookDelta {
            instrument_id: InstrumentId::new("ES.XCME").unwrap(),
            action: BookAction::Clear,
            side: Side::NoSide,
            price: Price::zero(2),
            size: Quantity::zero(0),
            order_id: 0,
            flags: flags::set(0, flags::SNAPSHOT),
            sequence: 1,
            ts_event: 1,
            ts_init: 1,
        };
        assert!(flags::is_set(delta.flags, flags::SNAPSHOT));
        assert_eq!(delta.action, BookAction::Clear);
    }
}
