//! Domain enumerations shared by the record model, each following the same
//! `#[repr(u8)]` + `TryFromPrimitive`/`IntoPrimitive` + `as_str`/`FromStr`/`Display`
//! shape so that every enum can be packed as a single byte in a columnar table and
//! round-tripped from its canonical uppercase name in human-readable contexts.

use std::fmt;
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::Error;

macro_rules! str_enum {
    ($name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $name {
            /// The canonical uppercase string form of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($str => Ok(Self::$variant),)+
                    other => Err(Error::parse(
                        "<enum literal>",
                        format!(concat!("unknown ", stringify!($name), " `{}`"), other),
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// The side of a two-sided market a quote, order, or book level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Side {
    /// The buy side of the book.
    Buy = 1,
    /// The sell side of the book.
    Sell = 2,
    /// No side applies.
    NoSide = 0,
}

str_enum!(Side {
    Buy => "BUY",
    Sell => "SELL",
    NoSide => "NO_SIDE",
});

/// The liquidity-taking side of a trade print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum AggressorSide {
    /// The buyer crossed the spread to take liquidity.
    Buyer = 1,
    /// The seller crossed the spread to take liquidity.
    Seller = 2,
    /// No aggressor can be determined, e.g. an auction print.
    NoAggressor = 0,
}

str_enum!(AggressorSide {
    Buyer => "BUYER",
    Seller => "SELLER",
    NoAggressor => "NO_AGGRESSOR",
});

/// The kind of change an order-book delta applies to the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum BookAction {
    /// A new order was added to the book.
    Add = 1,
    /// An existing order's price or size changed.
    Update = 2,
    /// An order was removed from the book.
    Delete = 3,
    /// The entire book was cleared, e.g. on a venue snapshot reset.
    Clear = 4,
}

str_enum!(BookAction {
    Add => "ADD",
    Update => "UPDATE",
    Delete => "DELETE",
    Clear => "CLEAR",
});

/// The contractual shape of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum InstrumentClass {
    /// A spot-settled currency pair or crypto asset.
    CurrencySpot = 1,
    /// A perpetual or dated crypto futures contract.
    CryptoFuture = 2,
    /// An options contract on an underlying instrument.
    OptionContract = 3,
    /// A binary/parimutuel betting instrument.
    BettingInstrument = 4,
    /// A listed equity.
    Equity = 5,
    /// A traditional futures contract.
    Future = 6,
}

str_enum!(InstrumentClass {
    CurrencySpot => "CURRENCY_SPOT",
    CryptoFuture => "CRYPTO_FUTURE",
    OptionContract => "OPTION_CONTRACT",
    BettingInstrument => "BETTING_INSTRUMENT",
    Equity => "EQUITY",
    Future => "FUTURE",
});

/// The unit a bar's `step` is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Aggregation {
    /// Fixed wall-clock seconds.
    Second = 1,
    /// Fixed wall-clock minutes.
    Minute = 2,
    /// Fixed wall-clock hours.
    Hour = 3,
    /// Fixed wall-clock days.
    Day = 4,
    /// A fixed count of trades.
    Tick = 5,
    /// A fixed traded volume.
    Volume = 6,
}

str_enum!(Aggregation {
    Second => "SECOND",
    Minute => "MINUTE",
    Hour => "HOUR",
    Day => "DAY",
    Tick => "TICK",
    Volume => "VOLUME",
});

/// The price basis a bar's OHLC values are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PriceType {
    /// Built from trade prices.
    Last = 1,
    /// Built from best bid prices.
    Bid = 2,
    /// Built from best ask prices.
    Ask = 3,
    /// Built from the bid/ask midpoint.
    Mid = 4,
}

str_enum!(PriceType {
    Last => "LAST",
    Bid => "BID",
    Ask => "ASK",
    Mid => "MID",
});

/// Where a bar was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Source {
    /// Built internally by an aggregator from finer-grained data.
    Internal = 1,
    /// Sourced directly from the venue or data vendor.
    External = 2,
}

str_enum!(Source {
    Internal => "INTERNAL",
    External => "EXTERNAL",
});

/// A venue-level trading status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum StatusAction {
    /// Trading halted.
    Halt = 1,
    /// Trading resumed.
    Resume = 2,
    /// A pre-open auction phase.
    PreOpen = 3,
    /// A pre-close auction phase.
    PreClose = 4,
}

str_enum!(StatusAction {
    Halt => "HALT",
    Resume => "RESUME",
    PreOpen => "PRE_OPEN",
    PreClose => "PRE_CLOSE",
});

/// Why a [`StatusAction`] transition occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum StatusReason {
    /// No reason was given by the venue.
    None = 0,
    /// A scheduled session boundary.
    Scheduled = 1,
    /// A regulatory or venue-initiated circuit breaker.
    CircuitBreaker = 2,
    /// A news pending/news released halt.
    News = 3,
    /// A technical issue at the venue.
    Technical = 4,
}

str_enum!(StatusReason {
    None => "NONE",
    Scheduled => "SCHEDULED",
    CircuitBreaker => "CIRCUIT_BREAKER",
    News => "NEWS",
    Technical => "TECHNICAL",
});

/// The venue-level trading phase a [`StatusAction`] transitions into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TradingEvent {
    /// The instrument is open for continuous trading.
    Trading = 1,
    /// The instrument is not tradeable.
    Halted = 2,
    /// The instrument is in a pre-open auction.
    PreOpenAuction = 3,
    /// The instrument is in a pre-close auction.
    PreCloseAuction = 4,
    /// Trading in the instrument has permanently ended.
    NoMoreTrading = 5,
}

str_enum!(TradingEvent {
    Trading => "TRADING",
    Halted => "HALTED",
    PreOpenAuction => "PRE_OPEN_AUCTION",
    PreCloseAuction => "PRE_CLOSE_AUCTION",
    NoMoreTrading => "NO_MORE_TRADING",
});

/// The settlement classification of an [`InstrumentClose`](crate::record::InstrumentClose).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum InstrumentCloseType {
    /// The final regular-session settlement price.
    EndOfSession = 1,
    /// A contract expiring at this close.
    Expiry = 2,
}

str_enum!(InstrumentCloseType {
    EndOfSession => "END_OF_SESSION",
    Expiry => "EXPIRY",
});

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Side::Buy, "BUY")]
    #[case(Side::Sell, "SELL")]
    #[case(Side::NoSide, "NO_SIDE")]
    fn side_round_trips_through_str(#[case] side: Side, #[case] expected: &str) {
        assert_eq!(side.as_str(), expected);
        assert_eq!(Side::from_str(expected).unwrap(), side);
    }

    #[test]
    fn try_from_primitive_round_trips() {
        let side = Side::try_from(1u8).unwrap();
        assert_eq!(side, Side::Buy);
        let raw: u8 = side.into();
        assert_eq!(raw, 1);
    }

    #[test]
    fn unknown_literal_is_rejected() {
        assert!(Side::from_str("SIDEWAYS").is_err());
    }
}
