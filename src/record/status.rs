use crate::enums::{InstrumentCloseType, StatusAction, StatusReason, TradingEvent};
use crate::fixed_point::{Fixed, Price};
use crate::identifiers::InstrumentId;

use super::Record;

/// A venue-level trading-status transition for an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentStatus {
    /// The affected instrument.
    pub instrument_id: InstrumentId,
    /// The transition being reported.
    pub action: StatusAction,
    /// Why the transition occurred, where known.
    pub reason: StatusReason,
    /// The trading phase the instrument is now in.
    pub trading_event: TradingEvent,
    /// When the transition occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the transition, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for InstrumentStatus {
    const TYPE_NAME: &'static str = "instrument_status";

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

/// A final settlement price for an instrument on a given session or at expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentClose {
    /// The affected instrument.
    pub instrument_id: InstrumentId,
    /// The settlement price.
    pub close_price: Price,
    /// Whether this is an end-of-session settlement or an expiry settlement.
    pub close_type: InstrumentCloseType,
    /// When the close occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the close, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for InstrumentClose {
    const TYPE_NAME: &'static str = "instrument_close";

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

/// A periodic funding-rate update for a perpetual futures instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRateUpdate {
    /// The affected instrument.
    pub instrument_id: InstrumentId,
    /// The funding rate, as a signed fraction (e.g. `0.0001` = 1 bp).
    pub rate: Fixed,
    /// When the next funding settlement occurs, UTC nanoseconds.
    pub next_funding_ns: u64,
    /// When the update occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the update, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for FundingRateUpdate {
    const TYPE_NAME: &'static str = "funding_rate_update";

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

/// A venue-published mark price, used for margining and liquidation.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkPriceUpdate {
    /// The affected instrument.
    pub instrument_id: InstrumentId,
    /// The mark price.
    pub price: Price,
    /// When the mark price occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the update, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for MarkPriceUpdate {
    const TYPE_NAME: &'static str = "mark_price_update";

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

/// A venue- or vendor-published index price.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPriceUpdate {
    /// The affected instrument.
    pub instrument_id: InstrumentId,
    /// The index price.
    pub price: Price,
    /// When the index price occurred at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the update, UTC nanoseconds.
    pub ts_init: u64,
}

impl Record for IndexPriceUpdate {
    const TYPE_NAME: &'static str = "index_price_update";

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
