use crate::enums::AggressorSide;
use crate::fixed_point::{Price, Quantity};
use crate::identifiers::InstrumentId;

use super::Record;

/// A single executed trade print.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTick {
    /// The traded instrument.
    pub instrument_id: InstrumentId,
    /// The execution price.
    pub price: Price,
    /// The executed size.
    pub size: Quantity,
    /// Which side, if any, crossed the spread to take liquidity.
    pub aggressor_side: AggressorSide,
    /// The venue's trade identifier, for dedup against re-sent prints.
    pub trade_id: String,
    /// When the trade occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the trade, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for TradeTick {
    const TYPE_NAME: &'static str = "trade_tick";

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

    #[test]
    fn no_aggressor_is_representable() {
        let trade = TradeTick {
            instrument_id: InstrumentId::new("ES.XCME").unwrap(),
            price: Price::from_str_precise("4500.25", 2).unwrap(),
            size: Quantity::from_str_precise("1", 0).unwrap(),
            aggressor_side: AggressorSide::NoAggressor,
            trade_id: "auction-1".into(),
            ts_event: 1,
            ts_init: 1,
        };
        assert_eq!(trade.aggressor_side, AggressorSide::NoAggressor);
    }
}
