//! Fixed-point decimal numerics used by every price- and size-bearing field in the
//! record model.
//!
//! The raw integer backing is selected at compile time via the mutually exclusive
//! `precision-64` (default) and `precision-128` Cargo features, matching how the
//! rest of this crate treats wire width as a build-time rather than a runtime
//! concern.

#[cfg(all(feature = "precision-64", feature = "precision-128"))]
compile_error!("features `precision-64` and `precision-128` are mutually exclusive");
#[cfg(not(any(feature = "precision-64", feature = "precision-128")))]
compile_error!("one of features `precision-64` or `precision-128` must be enabled");

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// The signed integer type backing a fixed-point value in this build.
#[cfg(feature = "precision-64")]
pub type Raw = i64;
/// The signed integer type backing a fixed-point value in this build.
#[cfg(feature = "precision-128")]
pub type Raw = i128;

/// The maximum number of decimal places representable in this build.
#[cfg(feature = "precision-64")]
pub const MAX_PRECISION: u8 = 9;
/// The maximum number of decimal places representable in this build.
#[cfg(feature = "precision-128")]
pub const MAX_PRECISION: u8 = 16;

/// Sentinel raw value used to mark an undefined/unset fixed-point field on the wire,
/// mirroring the convention of reserving the raw-type maximum as "not present".
pub const UNDEF_RAW: Raw = Raw::MAX;

/// A fixed-point decimal with a runtime-known precision, exact for arithmetic against
/// the same type or [`Decimal`], and lossy (like any float) when mixed with `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fixed {
    raw: Raw,
    precision: u8,
}

impl Fixed {
    /// Constructs a value directly from its raw integer representation.
    pub fn from_raw(raw: Raw, precision: u8) -> Result<Self> {
        if precision > MAX_PRECISION {
            return Err(Error::precision_overflow(format!(
                "precision {precision} exceeds max {MAX_PRECISION}"
            )));
        }
        Ok(Self { raw, precision })
    }

    /// Constructs the zero value at `precision`.
    pub fn zero(precision: u8) -> Self {
        Self { raw: 0, precision }
    }

    /// Constructs a value from an exact [`Decimal`], rounding half-up to `precision`.
    pub fn from_decimal(value: Decimal, precision: u8) -> Result<Self> {
        if precision > MAX_PRECISION {
            return Err(Error::precision_overflow(format!(
                "precision {precision} exceeds max {MAX_PRECISION}"
            )));
        }
        let scaled = value.round_dp_with_strategy(
            precision as u32,
            rust_decimal::RoundingStrategy::MidpointAwayFromZero,
        );
        let shifted = scaled * Decimal::from(10i64.pow(precision as u32));
        let raw: Raw = shifted
            .trunc()
            .try_into()
            .map_err(|_| Error::precision_overflow(format!("{value} does not fit in {precision} dp")))?;
        Ok(Self { raw, precision })
    }

    /// Parses a decimal string exactly, preserving the string's own scale behavior
    /// before rounding to `precision`. Two equal decimal strings always produce the
    /// same raw value.
    pub fn from_str_precise(value: &str, precision: u8) -> Result<Self> {
        let decimal = Decimal::from_str(value)
            .map_err(|e| Error::parse("<fixed-point literal>", e.to_string()))?;
        Self::from_decimal(decimal, precision)
    }

    /// Parses a decimal string at its own scale, inferring `precision` from the
    /// number of digits written after the decimal point rather than taking it as
    /// a parameter.
    pub fn from_str(value: &str) -> Result<Self> {
        let decimal =
            Decimal::from_str(value).map_err(|e| Error::parse("<fixed-point literal>", e.to_string()))?;
        let precision = decimal.scale() as u8;
        Self::from_decimal(decimal, precision)
    }

    /// Constructs a value from an `f64`, going through its canonical decimal string
    /// representation so that the same float always yields the same raw value.
    pub fn from_float(value: f64, precision: u8) -> Result<Self> {
        Self::from_str_precise(&value.to_string(), precision)
    }

    /// Constructs a value from an integer, scaled to `precision` (i.e. `raw = value
    /// * 10^precision`).
    pub fn from_int(value: i64, precision: u8) -> Result<Self> {
        Self::from_decimal(Decimal::from(value), precision)
    }

    /// The raw backing integer.
    pub fn raw(&self) -> Raw {
        self.raw
    }

    /// The number of decimal places this value is scaled to.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Returns `true` if this value equals the undefined sentinel.
    pub fn is_undefined(&self) -> bool {
        self.raw == UNDEF_RAW
    }

    /// Converts to an exact [`Decimal`].
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.raw as i128, self.precision as u32)
    }

    /// Converts to `f64`, potentially lossy for values near the precision ceiling.
    pub fn as_f64(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.precision as i32)
    }

    /// Returns the absolute value.
    pub fn abs(&self) -> Self {
        Self {
            raw: self.raw.abs(),
            precision: self.precision,
        }
    }

    fn rescaled_raw(&self, precision: u8) -> Raw {
        match self.precision.cmp(&precision) {
            Ordering::Equal => self.raw,
            Ordering::Less => self.raw * 10i64.pow((precision - self.precision) as u32) as Raw,
            Ordering::Greater => self.raw / 10i64.pow((self.precision - precision) as u32) as Raw,
        }
    }

    /// Adds two fixed-point values exactly, rescaling to the larger of the two
    /// precisions.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        let precision = self.precision.max(other.precision);
        let raw = self
            .rescaled_raw(precision)
            .checked_add(other.rescaled_raw(precision))
            .ok_or_else(|| Error::precision_overflow("addition overflowed raw integer"))?;
        Ok(Self { raw, precision })
    }

    /// Subtracts `other` from `self` exactly.
    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        let precision = self.precision.max(other.precision);
        let raw = self
            .rescaled_raw(precision)
            .checked_sub(other.rescaled_raw(precision))
            .ok_or_else(|| Error::precision_overflow("subtraction overflowed raw integer"))?;
        Ok(Self { raw, precision })
    }

    /// Negates the value, rejecting the one raw magnitude (`Raw::MIN`) that has no
    /// positive counterpart.
    pub fn checked_neg(&self) -> Result<Self> {
        let raw = self
            .raw
            .checked_neg()
            .ok_or_else(|| Error::precision_overflow("negation overflowed raw integer"))?;
        Ok(Self { raw, ..*self })
    }
}

impl PartialOrd for Fixed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fixed {
    fn cmp(&self, other: &Self) -> Ordering {
        let precision = self.precision.max(other.precision);
        self.rescaled_raw(precision).cmp(&other.rescaled_raw(precision))
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

/// Byte-layout conventions for fixed-point wire fields.
///
/// Quote, trade, and bar prices are packed little-endian; order-book delta prices
/// are packed big-endian. This inconsistency is inherited rather than normalized,
/// since silently flipping it would change the byte layout of already-ingested
/// partitions.
pub mod endian {
    use super::Raw;

    /// Packs `raw` little-endian, the convention used by quote/trade/bar records.
    pub fn to_le_bytes(raw: Raw) -> [u8; std::mem::size_of::<Raw>()] {
        raw.to_le_bytes()
    }

    /// Unpacks a little-endian raw value.
    pub fn from_le_bytes(bytes: &[u8]) -> Raw {
        let mut buf = [0u8; std::mem::size_of::<Raw>()];
        buf.copy_from_slice(&bytes[..std::mem::size_of::<Raw>()]);
        Raw::from_le_bytes(buf)
    }

    /// Packs `raw` big-endian, the convention used by order-book delta records.
    pub fn to_be_bytes(raw: Raw) -> [u8; std::mem::size_of::<Raw>()] {
        raw.to_be_bytes()
    }

    /// Unpacks a big-endian raw value.
    pub fn from_be_bytes(bytes: &[u8]) -> Raw {
        let mut buf = [0u8; std::mem::size_of::<Raw>()];
        buf.copy_from_slice(&bytes[..std::mem::size_of::<Raw>()]);
        Raw::from_be_bytes(buf)
    }
}

type Validator = fn(Fixed) -> Result<()>;

fn require_non_negative(value: Fixed) -> Result<()> {
    if value.raw() >= 0 {
        Ok(())
    } else {
        Err(Error::out_of_range(format!("{value} is negative")))
    }
}

fn allow_any_sign(_value: Fixed) -> Result<()> {
    Ok(())
}

macro_rules! fixed_point_newtype {
    ($name:ident, $validator:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Fixed);

        impl $name {
            fn wrap(inner: Fixed) -> Result<Self> {
                let validate: Validator = $validator;
                validate(inner)?;
                Ok(Self(inner))
            }

            /// Constructs a value directly from its raw integer representation.
            pub fn from_raw(raw: Raw, precision: u8) -> Result<Self> {
                Self::wrap(Fixed::from_raw(raw, precision)?)
            }

            /// Constructs the zero value at `precision`.
            pub fn zero(precision: u8) -> Self {
                Self(Fixed::zero(precision))
            }

            /// Parses a decimal string, inferring precision from its own scale.
            pub fn from_str(value: &str) -> Result<Self> {
                Self::wrap(Fixed::from_str(value)?)
            }

            /// Parses a decimal string, rounding to an explicit `precision`.
            pub fn from_str_precise(value: &str, precision: u8) -> Result<Self> {
                Self::wrap(Fixed::from_str_precise(value, precision)?)
            }

            /// Constructs a value from an integer, scaled to `precision`.
            pub fn from_int(value: i64, precision: u8) -> Result<Self> {
                Self::wrap(Fixed::from_int(value, precision)?)
            }

            /// Constructs a value from an `f64` at `precision`.
            pub fn from_float(value: f64, precision: u8) -> Result<Self> {
                Self::wrap(Fixed::from_float(value, precision)?)
            }

            /// The raw backing integer.
            pub fn raw(&self) -> Raw {
                self.0.raw()
            }

            /// The number of decimal places this value is scaled to.
            pub fn precision(&self) -> u8 {
                self.0.precision()
            }

            /// Returns `true` if this value equals the undefined sentinel.
            pub fn is_undefined(&self) -> bool {
                self.0.is_undefined()
            }

            /// Converts to an exact [`Decimal`].
            pub fn as_decimal(&self) -> Decimal {
                self.0.as_decimal()
            }

            /// Converts to `f64`, potentially lossy for values near the precision ceiling.
            pub fn as_f64(&self) -> f64 {
                self.0.as_f64()
            }

            /// The underlying untyped fixed-point value, for callers that need to
            /// cross between typed newtypes and raw wire encoding.
            pub fn fixed(&self) -> Fixed {
                self.0
            }

            /// Returns the absolute value.
            pub fn abs(&self) -> Self {
                Self(self.0.abs())
            }

            /// Adds two values exactly, rescaling to the larger of the two precisions.
            pub fn checked_add(&self, other: &Self) -> Result<Self> {
                Self::wrap(self.0.checked_add(&other.0)?)
            }

            /// Subtracts `other` from `self` exactly.
            pub fn checked_sub(&self, other: &Self) -> Result<Self> {
                Self::wrap(self.0.checked_sub(&other.0)?)
            }

            /// Negates the value.
            pub fn checked_neg(&self) -> Result<Self> {
                Self::wrap(self.0.checked_neg()?)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

fixed_point_newtype!(
    Price,
    require_non_negative,
    "A non-negative traded or quoted price, exact at a fixed number of decimal places."
);
fixed_point_newtype!(
    Quantity,
    require_non_negative,
    "A non-negative order or trade size, exact at a fixed number of decimal places."
);
fixed_point_newtype!(
    Money,
    allow_any_sign,
    "A signed currency-denominated amount (a debit or a credit), exact at a fixed number of decimal places."
);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.5", 2, 150)]
    #[case("1.005", 2, 101)] // round-half-up away from zero
    #[case("-1.005", 2, -101)]
    #[case("0", 0, 0)]
    fn from_str_precise_rounds_half_up(#[case] input: &str, #[case] precision: u8, #[case] expected: Raw) {
        let value = Fixed::from_str_precise(input, precision).unwrap();
        assert_eq!(value.raw(), expected);
    }

    #[test]
    fn checked_add_rescales_to_larger_precision() {
        let a = Fixed::from_str_precise("1.5", 1).unwrap();
        let b = Fixed::from_str_precise("0.25", 2).unwrap();
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.precision(), 2);
        assert_eq!(sum.raw(), 175);
    }

    #[test]
    fn le_be_round_trip() {
        let raw: Raw = 123_456_789;
        assert_eq!(endian::from_le_bytes(&endian::to_le_bytes(raw)), raw);
        assert_eq!(endian::from_be_bytes(&endian::to_be_bytes(raw)), raw);
    }

    #[test]
    fn precision_overflow_is_rejected() {
        assert!(Fixed::from_raw(0, MAX_PRECISION + 1).is_err());
    }

    #[test]
    fn undefined_sentinel_round_trips() {
        let value = Fixed::from_raw(UNDEF_RAW, 0).unwrap();
        assert!(value.is_undefined());
    }

    #[rstest]
    #[case("1.23", 2)]
    #[case("7", 0)]
    #[case("0.00100", 5)]
    fn from_str_infers_precision_from_the_literal(#[case] input: &str, #[case] expected_precision: u8) {
        let value = Fixed::from_str(input).unwrap();
        assert_eq!(value.precision(), expected_precision);
    }

    #[test]
    fn from_int_scales_by_precision() {
        let value = Fixed::from_int(7, 3).unwrap();
        assert_eq!(value.raw(), 7000);
    }

    #[test]
    fn checked_neg_flips_sign() {
        let value = Fixed::from_str_precise("1.5", 1).unwrap();
        let negated = value.checked_neg().unwrap();
        assert_eq!(negated.raw(), -15);
    }

    #[test]
    fn quantity_rejects_negative_raw_values() {
        assert!(Quantity::from_raw(-1, 0).is_err());
        assert!(Quantity::from_str("-1").is_err());
        assert!(Quantity::from_int(-1, 0).is_err());
    }

    #[test]
    fn price_rejects_negative_raw_values() {
        assert!(Price::from_raw(-1, 2).is_err());
    }

    #[test]
    fn money_allows_either_sign() {
        assert!(Money::from_str("-5.00").is_ok());
        assert!(Money::from_str("5.00").is_ok());
    }

    #[test]
    fn quantity_from_str_infers_precision_like_the_underlying_fixed_point() {
        let qty = Quantity::from_str("1.230").unwrap();
        assert_eq!(qty.precision(), 3);
        assert_eq!(qty.raw(), 1230);
    }

    #[test]
    fn price_checked_neg_rejects_staying_non_negative() {
        let price = Price::from_str_precise("1.50", 2).unwrap();
        assert!(price.checked_neg().is_err());
    }
}
