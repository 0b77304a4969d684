use crate::enums::InstrumentClass;
use crate::error::Result;
use crate::fixed_point::{Price, Quantity};
use crate::identifiers::InstrumentId;

use super::Record;

/// The definition of a tradeable instrument, carrying the precision and increment
/// metadata every other record referencing it is constructed against.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    /// The instrument's canonical identifier.
    pub instrument_id: InstrumentId,
    /// What contractual shape this instrument has.
    pub class: InstrumentClass,
    /// Decimal places for this instrument's price fields.
    pub price_precision: u8,
    /// Decimal places for this instrument's size fields.
    pub size_precision: u8,
    /// The minimum price movement.
    pub price_increment: Price,
    /// The minimum order size movement.
    pub size_increment: Quantity,
    /// The smallest order size the venue will accept, where known.
    pub min_size: Option<Quantity>,
    /// The largest order size the venue will accept, where known.
    pub max_size: Option<Quantity>,
    /// Class-specific fields not shared by every instrument kind.
    pub kind: InstrumentKind,
    /// When the definition was published at the venue, UTC nanoseconds.
    pub ts_event: u64,
    /// When this process observed the definition, UTC nanoseconds.
    pub ts_init: u64,
}

/// Fields specific to one [`InstrumentClass`].
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentKind {
    /// A spot currency pair or crypto asset; no additional fields.
    CurrencySpot,
    /// A perpetual or dated crypto futures contract.
    CryptoFuture {
        /// The contract's notional multiplier.
        multiplier: Quantity,
        /// The underlying asset's identifier.
        underlying: String,
        /// The contract's expiry, UTC nanoseconds, or `None` for a perpetual.
        expiry_ns: Option<u64>,
    },
    /// An options contract.
    OptionContract {
        /// The strike price.
        strike_price: Price,
        /// `true` for a call, `false` for a put.
        is_call: bool,
        /// The underlying instrument's identifier.
        underlying: InstrumentId,
        /// The contract's expiry, UTC nanoseconds.
        expiry_ns: u64,
    },
    /// A binary/parimutuel betting instrument.
    BettingInstrument {
        /// The market this selection belongs to.
        market_id: String,
        /// The specific selection within the market.
        selection_id: String,
    },
    /// A listed equity; no additional fields.
    Equity,
    /// A traditional futures contract.
    Future {
        /// The contract's notional multiplier.
        multiplier: Quantity,
        /// The underlying asset's identifier.
        underlying: String,
        /// The contract's expiry, UTC nanoseconds.
        expiry_ns: u64,
    },
}

/// The on-disk shape of [`InstrumentKind`], serialized into the `kind_json` column
/// since each class uses a disjoint field set. Conversions are lossless in both
/// directions across every variant.
#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) enum InstrumentKindJson {
    CurrencySpot,
    CryptoFuture {
        multiplier_raw: i64,
        multiplier_precision: u8,
        underlying: String,
        expiry_ns: Option<u64>,
    },
    OptionContract {
        strike_price_raw: i64,
        strike_price_precision: u8,
        is_call: bool,
        underlying: String,
        expiry_ns: u64,
    },
    BettingInstrument {
        market_id: String,
        selection_id: String,
    },
    Equity,
    Future {
        multiplier_raw: i64,
        multiplier_precision: u8,
        underlying: String,
        expiry_ns: u64,
    },
}

impl From<&InstrumentKind> for InstrumentKindJson {
    fn from(kind: &InstrumentKind) -> Self {
        match kind {
            InstrumentKind::CurrencySpot => Self::CurrencySpot,
            InstrumentKind::Equity => Self::Equity,
            InstrumentKind::CryptoFuture {
                multiplier,
                underlying,
                expiry_ns,
            } => Self::CryptoFuture {
                multiplier_raw: multiplier.raw() as i64,
                multiplier_precision: multiplier.precision(),
                underlying: underlying.clone(),
                expiry_ns: *expiry_ns,
            },
            InstrumentKind::OptionContract {
                strike_price,
                is_call,
                underlying,
                expiry_ns,
            } => Self::OptionContract {
                strike_price_raw: strike_price.raw() as i64,
                strike_price_precision: strike_price.precision(),
                is_call: *is_call,
                underlying: underlying.as_str().to_string(),
                expiry_ns: *expiry_ns,
            },
            InstrumentKind::BettingInstrument { market_id, selection_id } => Self::BettingInstrument {
                market_id: market_id.clone(),
                selection_id: selection_id.clone(),
            },
            InstrumentKind::Future {
                multiplier,
                underlying,
                expiry_ns,
            } => Self::Future {
                multiplier_raw: multiplier.raw() as i64,
                multiplier_precision: multiplier.precision(),
                underlying: underlying.clone(),
                expiry_ns: *expiry_ns,
            },
        }
    }
}

impl TryFrom<InstrumentKindJson> for InstrumentKind {
    type Error = crate::error::Error;

    fn try_from(value: InstrumentKindJson) -> Result<Self> {
        Ok(match value {
            InstrumentKindJson::CurrencySpot => Self::CurrencySpot,
            InstrumentKindJson::Equity => Self::Equity,
            InstrumentKindJson::CryptoFuture {
                multiplier_raw,
                multiplier_precision,
                underlying,
                expiry_ns,
            } => Self::CryptoFuture {
                multiplier: Quantity::from_raw(multiplier_raw as crate::fixed_point::Raw, multiplier_precision)?,
                underlying,
                expiry_ns,
            },
            InstrumentKindJson::OptionContract {
                strike_price_raw,
                strike_price_precision,
                is_call,
                underlying,
                expiry_ns,
            } => Self::OptionContract {
                strike_price: Price::from_raw(strike_price_raw as crate::fixed_point::Raw, strike_price_precision)?,
                is_call,
                underlying: InstrumentId::new(&underlying)?,
                expiry_ns,
            },
            InstrumentKindJson::BettingInstrument { market_id, selection_id } => {
                Self::BettingInstrument { market_id, selection_id }
            }
            InstrumentKindJson::Future {
                multiplier_raw,
                multiplier_precision,
                underlying,
                expiry_ns,
            } => Self::Future {
                multiplier: Quantity::from_raw(multiplier_raw as crate::fixed_point::Raw, multiplier_precision)?,
                underlying,
                expiry_ns,
            },
        })
    }
}

impl Record for Instrument {
    const TYPE_NAME: &'static str = "instrument";

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
    fn option_contract_carries_strike_and_underlying() {
        let instrument = Instrument {
            instrument_id: InstrumentId::new("ESU4C4500.XCME").unwrap(),
            class: InstrumentClass::OptionContract,
            price_precision: 2,
            size_precision: 0,
            price_increment: Price::from_str_precise("0.25", 2).unwrap(),
            size_increment: Quantity::from_str_precise("1", 0).unwrap(),
            min_size: None,
            max_size: None,
            kind: InstrumentKind::OptionContract {
                strike_price: Price::from_str_precise("4500", 2).unwrap(),
                is_call: true,
                underlying: InstrumentId::new("ES.XCME").unwrap(),
                expiry_ns: 1_700_000_000_000_000_000,
            },
            ts_event: 1,
            ts_init: 1,
        };
        match instrument.kind {
            InstrumentKind::OptionContract { is_call, .. } => assert!(is_call),
            _ => panic!("expected OptionContract kind"),
        }
    }

    #[test]
    fn instrument_kind_json_round_trips_every_variant() {
        let kinds = vec![
            InstrumentKind::CurrencySpot,
            InstrumentKind::Equity,
            InstrumentKind::CryptoFuture {
                multiplier: Quantity::from_str_precise("1", 0).unwrap(),
                underlying: "BTC".to_string(),
                expiry_ns: None,
            },
            InstrumentKind::OptionContract {
                strike_price: Price::from_str_precise("4500", 2).unwrap(),
                is_call: false,
                underlying: InstrumentId::new("ES.XCME").unwrap(),
                expiry_ns: 1,
            },
            InstrumentKind::BettingInstrument {
                market_id: "1.23456".to_string(),
                selection_id: "7890".to_string(),
            },
            InstrumentKind::Future {
                multiplier: Quantity::from_str_precise("50", 0).unwrap(),
                underlying: "ES".to_string(),
                expiry_ns: 1_700_000_000_000_000_000,
            },
        ];
        for kind in kinds {
            let json = InstrumentKindJson::from(&kind);
            let round_tripped = InstrumentKind::try_from(json).unwrap();
            assert_eq!(round_tripped, kind);
        }
    }
}
