use crate::fixed_point::{Price, Quantity};
use crate::identifiers::InstrumentId;

use super::Record;

/// A top-of-book two-sided quote.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteTick {
    /// The quoted instrument.
    pub instrument_id: InstrumentId,
    /// The best bid price.
    pub bid_price: Price,
    /// The best ask price.
    pub ask_price: Price,
    /// The size available at `bid_price`.
    pub bid_size: Quantity,
    /// The size available at `ask_price`.
    pub ask_size: Quantity,
    /// When the quote occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the quote, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for QuoteTick {
    const TYPE_NAME: &'static str = "quote_tick";

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

    fn sample() -> QuoteTick {
        QuoteTick {
            instrument_id: InstrumentId::new("ES.XCME").unwrap(),
            bid_price: Price::from_str_precise("4500.25", 2).unwrap(),
            ask_price: Price::from_str_precise("4500.50", 2).unwrap(),
            bid_size: Quantity::from_str_precise("10", 0).unwrap(),
            ask_size: Quantity::from_str_precise("5", 0).unwrap(),
            ts_event: 1,
            ts_init: 2,
        }
    }

    #[test]
    fn accessors_expose_timestamps_and_instrument() {
        let quote = sample();
        assert_eq!(quote.ts_event(), 1);
        assert_eq!(quote.ts_init(), 2);
        assert_eq!(quote.instrument_id().unwrap().as_str(), "ES.XCME");
    }

    #[test]
    fn bid_is_below_ask_for_a_well_formed_quote() {
        let quote = sample();
        assert!(quote.bid_price < quote.ask_price);
    }
}
