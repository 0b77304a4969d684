//! Validated, cheaply-cloneable identifiers for instruments and bar series.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::enums::{Aggregation, PriceType, Source};
use crate::error::{Error, Result};

/// `<symbol>.<venue>`, e.g. `ES.XCME` or `BTCUSDT-PERP.BINANCE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(Arc<str>);

impl InstrumentId {
    /// Validates and constructs an [`InstrumentId`] from its canonical string form.
    pub fn new(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref();
        let (symbol, venue) = value
            .split_once('.')
            .ok_or_else(|| Error::parse("<instrument id>", format!("missing venue in `{value}`")))?;
        if symbol.is_empty() || venue.is_empty() {
            return Err(Error::parse(
                "<instrument id>",
                format!("empty symbol or venue in `{value}`"),
            ));
        }
        Ok(Self(Arc::from(value)))
    }

    /// The symbol portion, before the venue separator.
    pub fn symbol(&self) -> &str {
        self.0.split_once('.').map(|(s, _)| s).unwrap_or(&self.0)
    }

    /// The venue portion, after the venue separator.
    pub fn venue(&self) -> &str {
        self.0.split_once('.').map(|(_, v)| v).unwrap_or("")
    }

    /// The canonical string form, as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InstrumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for InstrumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `<instrument_id>-<step>-<aggregation>-<price_type>-<source>`,
/// e.g. `ES.XCME-1-MINUTE-LAST-EXTERNAL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BarType {
    instrument_id: InstrumentId,
    step: u64,
    aggregation: Aggregation,
    price_type: PriceType,
    source: Source,
}

impl BarType {
    /// Constructs a [`BarType`] from its component parts.
    pub fn new(
        instrument_id: InstrumentId,
        step: u64,
        aggregation: Aggregation,
        price_type: PriceType,
        source: Source,
    ) -> Self {
        Self {
            instrument_id,
            step,
            aggregation,
            price_type,
            source,
        }
    }

    /// Parses the canonical hyphen-delimited string form.
    pub fn from_canonical(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.rsplitn(5, '-').collect();
        if parts.len() != 5 {
            return Err(Error::parse("<bar type>", format!("malformed bar type `{value}`")));
        }
        // rsplitn yields parts in reverse order.
        let source = parts[0];
        let price_type = parts[1];
        let aggregation = parts[2];
        let step = parts[3];
        let instrument_id = parts[4];
        Ok(Self {
            instrument_id: InstrumentId::new(instrument_id)?,
            step: step
                .parse()
                .map_err(|_| Error::parse("<bar type>", format!("invalid step `{step}`")))?,
            aggregation: aggregation
                .parse()
                .map_err(|_| Error::parse("<bar type>", format!("invalid aggregation `{aggregation}`")))?,
            price_type: price_type
                .parse()
                .map_err(|_| Error::parse("<bar type>", format!("invalid price type `{price_type}`")))?,
            source: source
                .parse()
                .map_err(|_| Error::parse("<bar type>", format!("invalid source `{source}`")))?,
        })
    }

    /// The underlying instrument identifier.
    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    /// The aggregation step count, e.g. `1` in "1-MINUTE".
    pub fn step(&self) -> u64 {
        self.step
    }

    /// The aggregation unit.
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// The price basis the bar is built from.
    pub fn price_type(&self) -> PriceType {
        self.price_type
    }

    /// Where the bar was built (internally, or sourced externally).
    pub fn source(&self) -> Source {
        self.source
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.instrument_id, self.step, self.aggregation, self.price_type, self.source
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_id_round_trips() {
        let id = InstrumentId::new("ES.XCME").unwrap();
        assert_eq!(id.symbol(), "ES");
        assert_eq!(id.venue(), "XCME");
        assert_eq!(id.as_str(), "ES.XCME");
    }

    #[test]
    fn instrument_id_rejects_missing_venue() {
        assert!(InstrumentId::new("ES").is_err());
    }

    #[test]
    fn bar_type_round_trips_through_canonical_string() {
        let bar_type = BarType::new(
            InstrumentId::new("ES.XCME").unwrap(),
            1,
            Aggregation::Minute,
            PriceType::Last,
            Source::External,
        );
        let canonical = bar_type.to_string();
        assert_eq!(canonical, "ES.XCME-1-MINUTE-LAST-EXTERNAL");
        let parsed = BarType::from_canonical(&canonical).unwrap();
        assert_eq!(parsed, bar_type);
    }
}
