//! A closed tagged union over every record type, used wherever a parser or merge
//! stream must hand back heterogeneous records without dynamic dispatch.

use crate::identifiers::InstrumentId;
use crate::record::{
    Bar, FundingRateUpdate, IndexPriceUpdate, Instrument, InstrumentClose, InstrumentStatus,
    MarkPriceUpdate, OrderBookDelta, OrderBookDepth10, QuoteTick, Record, TradeTick,
};

/// One record of any known type, tagged by variant.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEnum {
    /// See [`QuoteTick`].
    Quote(QuoteTick),
    /// See [`TradeTick`].
    Trade(TradeTick),
    /// See [`Bar`].
    Bar(Bar),
    /// See [`OrderBookDelta`].
    BookDelta(OrderBookDelta),
    /// See [`OrderBookDepth10`].
    BookDepth10(OrderBookDepth10),
    /// See [`InstrumentStatus`].
    Status(InstrumentStatus),
    /// See [`InstrumentClose`].
    Close(InstrumentClose),
    /// See [`FundingRateUpdate`].
    FundingRate(FundingRateUpdate),
    /// See [`MarkPriceUpdate`].
    MarkPrice(MarkPriceUpdate),
    /// See [`IndexPriceUpdate`].
    IndexPrice(IndexPriceUpdate),
    /// See [`Instrument`].
    Instrument(Instrument),
}

impl RecordEnum {
    /// The snake_case table name this record belongs to.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Quote(_) => QuoteTick::TYPE_NAME,
            Self::Trade(_) => TradeTick::TYPE_NAME,
            Self::Bar(_) => Bar::TYPE_NAME,
            Self::BookDelta(_) => OrderBookDelta::TYPE_NAME,
            Self::BookDepth10(_) => OrderBookDepth10::TYPE_NAME,
            Self::Status(_) => InstrumentStatus::TYPE_NAME,
            Self::Close(_) => InstrumentClose::TYPE_NAME,
            Self::FundingRate(_) => FundingRateUpdate::TYPE_NAME,
            Self::MarkPrice(_) => MarkPriceUpdate::TYPE_NAME,
            Self::IndexPrice(_) => IndexPriceUpdate::TYPE_NAME,
            Self::Instrument(_) => Instrument::TYPE_NAME,
        }
    }

    /// The monotonic ordering key used for sort/merge (`ts_init`).
    pub fn ts_init(&self) -> u64 {
        match self {
            Self::Quote(r) => r.ts_init(),
            Self::Trade(r) => r.ts_init(),
            Self::Bar(r) => r.ts_init(),
            Self::BookDelta(r) => r.ts_init(),
            Self::BookDepth10(r) => r.ts_init(),
            Self::Status(r) => r.ts_init(),
            Self::Close(r) => r.ts_init(),
            Self::FundingRate(r) => r.ts_init(),
            Self::MarkPrice(r) => r.ts_init(),
            Self::IndexPrice(r) => r.ts_init(),
            Self::Instrument(r) => r.ts_init(),
        }
    }

    /// The instrument this record is about, if any. Used by the ingestion
    /// pipeline to route a record into its per-instrument partition.
    pub fn instrument_id(&self) -> Option<&InstrumentId> {
        match self {
            Self::Quote(r) => r.instrument_id(),
            Self::Trade(r) => r.instrument_id(),
            Self::Bar(r) => r.instrument_id(),
            Self::BookDelta(r) => r.instrument_id(),
            Self::BookDepth10(r) => r.instrument_id(),
            Self::Status(r) => r.instrument_id(),
            Self::Close(r) => r.instrument_id(),
            Self::FundingRate(r) => r.instrument_id(),
            Self::MarkPrice(r) => r.instrument_id(),
            Self::IndexPrice(r) => r.instrument_id(),
            Self::Instrument(r) => r.instrument_id(),
        }
    }
}

macro_rules! from_record {
    ($record:ty, $variant:ident) => {
        impl From<$record> for RecordEnum {
            fn from(value: $record) -> Self {
                Self::$variant(value)
            }
        }
    };
}

from_record!(QuoteTick, Quote);
from_record!(TradeTick, Trade);
from_record!(Bar, Bar);
from_record!(OrderBookDelta, BookDelta);
from_record!(OrderBookDepth10, BookDepth10);
from_record!(InstrumentStatus, Status);
from_record!(InstrumentClose, Close);
from_record!(FundingRateUpdate, FundingRate);
from_record!(MarkPriceUpdate, MarkPrice);
from_record!(IndexPriceUpdate, IndexPrice);
from_record!(Instrument, Instrument);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::InstrumentId;

    #[test]
    fn type_name_matches_the_wrapped_record() {
        let trade = TradeTick {
            instrument_id: InstrumentId::new("ES.XCME").unwrap(),
            price: crate::fixed_point::Price::from_str_precise("1", 0).unwrap(),
            size: crate::fixed_point::Quantity::from_str_precise("1", 0).unwrap(),
            aggressor_side: crate::enums::AggressorSide::Buyer,
            trade_id: "1".into(),
            ts_event: 1,
            ts_init: 1,
        };
        let record = RecordEnum::from(trade);
        assert_eq!(record.type_name(), "trade_tick");
        assert_eq!(record.ts_init(), 1);
    }
}
