use crate::fixed_point::{Price, Quantity};
use crate::identifiers::{BarType, InstrumentId};

use super::Record;

/// An OHLCV bar for a given [`BarType`].
///
/// `bar_type` is stored in table metadata rather than repeated per row (§4.3); the
/// in-memory struct still carries it so a `Vec<Bar>` is self-describing.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// The bar's instrument, step, aggregation, price basis, and source.
    pub bar_type: BarType,
    /// The opening price of the interval.
    pub open: Price,
    /// The highest price reached during the interval.
    pub high: Price,
    /// The lowest price reached during the interval.
    pub low: Price,
    /// The closing price of the interval.
    pub close: Price,
    /// The total traded volume during the interval.
    pub volume: Quantity,
    /// When the interval closed, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process constructed the bar, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for Bar {
    const TYPE_NAME: &'static str = "bar";

    fn ts_event(&self) -> u64 {
        self.ts_event
    }

    fn ts_init(&self) -> u64 {
        self.ts_init
    }

    fn instrument_id(&self) -> Option<&InstrumentId> {
        Some(self.bar_type.instrument_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Aggregation, PriceType, Source};

    #[test]
    fn high_is_at_least_open_and_close() {
        let bar_type = BarType::new(
            InstrumentId::new("ES.XCME").unwrap(),
            1,
            Aggregation::Minute,
            PriceType::Last,
            Source::External,
        );
        let bar = Bar {
            bar_type,
            open: Price::from_str_precise("100", 0).unwrap(),
            high: Price::from_str_precise("110", 0).unwrap(),
            low: Price::from_str_precise("95", 0).unwrap(),
            close: Price::from_str_precise("105", 0).unwrap(),
            volume: Quantity::from_str_precise("42", 0).unwrap(),
            ts_event: 60_000_000_000,
            ts_init: 60_000_000_500,
        };
        assert!(bar.high >= bar.open);
        assert!(bar.high >= bar.close);
        assert!(bar.low <= bar.open);
        assert!(bar.low <= bar.close);
    }
}
