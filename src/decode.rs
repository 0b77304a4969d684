//! `decode_batch`: the inverse of [`encode`](crate::encode), projecting a columnar
//! [`DataFrame`] and its schema metadata back into typed records.

use polars::prelude::*;

use crate::enums::{
    AggressorSide, BookAction, InstrumentClass, InstrumentCloseType, Side, StatusAction, StatusReason, TradingEvent,
};
use crate::error::{Error, Result};
use crate::fixed_point::{Fixed, Price, Quantity, Raw};
use crate::identifiers::{BarType, InstrumentId};
use crate::record::{
    Bar, FundingRateUpdate, IndexPriceUpdate, Instrument, InstrumentClose, InstrumentKind, InstrumentKindJson,
    InstrumentStatus, MarkPriceUpdate, OrderBookDelta, OrderBookDepth10, QuoteTick, TradeTick, BOOK_DEPTH,
};

fn missing(column: &'static str, row: usize) -> Error {
    Error::schema_mismatch("record", format!("null value in column `{column}` at row {row}"))
}

/// Decodes a columnar table into [`QuoteTick`] records, the exact inverse of
/// [`crate::encode::encode_quotes`] given `price_precision`/`size_precision`.
pub fn decode_quotes(df: &DataFrame, price_precision: u8, size_precision: u8) -> Result<Vec<QuoteTick>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let bid_price = df.column("bid_price")?.i64()?;
    let ask_price = df.column("ask_price")?.i64()?;
    let bid_size = df.column("bid_size")?.i64()?;
    let ask_size = df.column("ask_size")?.i64()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(QuoteTick {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                bid_price: Price::from_raw(
                    bid_price.get(i).ok_or_else(|| missing("bid_price", i))? as Raw,
                    price_precision,
                )?,
                ask_price: Price::from_raw(
                    ask_price.get(i).ok_or_else(|| missing("ask_price", i))? as Raw,
                    price_precision,
                )?,
                bid_size: Quantity::from_raw(
                    bid_size.get(i).ok_or_else(|| missing("bid_size", i))? as Raw,
                    size_precision,
                )?,
                ask_size: Quantity::from_raw(
                    ask_size.get(i).ok_or_else(|| missing("ask_size", i))? as Raw,
                    size_precision,
                )?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`TradeTick`] records.
pub fn decode_trades(df: &DataFrame, price_precision: u8, size_precision: u8) -> Result<Vec<TradeTick>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let price = df.column("price")?.i64()?;
    let size = df.column("size")?.i64()?;
    let aggressor_side = df.column("aggressor_side")?.u8()?;
    let trade_id = df.column("trade_id")?.utf8()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(TradeTick {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                price: Price::from_raw(price.get(i).ok_or_else(|| missing("price", i))? as Raw, price_precision)?,
                size: Quantity::from_raw(size.get(i).ok_or_else(|| missing("size", i))? as Raw, size_precision)?,
                aggressor_side: AggressorSide::try_from(
                    aggressor_side.get(i).ok_or_else(|| missing("aggressor_side", i))?,
                )
                .map_err(|_| missing("aggressor_side", i))?,
                trade_id: trade_id.get(i).ok_or_else(|| missing("trade_id", i))?.to_string(),
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`Bar`] records. `bar_type` is supplied by the
/// caller since it lives outside the table's columns (catalog partition metadata).
pub fn decode_bars(df: &DataFrame, bar_type: BarType, price_precision: u8, size_precision: u8) -> Result<Vec<Bar>> {
    let open = df.column("open")?.i64()?;
    let high = df.column("high")?.i64()?;
    let low = df.column("low")?.i64()?;
    let close = df.column("close")?.i64()?;
    let volume = df.column("volume")?.i64()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(Bar {
                bar_type: bar_type.clone(),
                open: Price::from_raw(open.get(i).ok_or_else(|| missing("open", i))? as Raw, price_precision)?,
                high: Price::from_raw(high.get(i).ok_or_else(|| missing("high", i))? as Raw, price_precision)?,
                low: Price::from_raw(low.get(i).ok_or_else(|| missing("low", i))? as Raw, price_precision)?,
                close: Price::from_raw(close.get(i).ok_or_else(|| missing("close", i))? as Raw, price_precision)?,
                volume: Quantity::from_raw(volume.get(i).ok_or_else(|| missing("volume", i))? as Raw, size_precision)?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`OrderBookDelta`] records.
pub fn decode_book_deltas(df: &DataFrame, price_precision: u8, size_precision: u8) -> Result<Vec<OrderBookDelta>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let action = df.column("action")?.u8()?;
    let side = df.column("side")?.u8()?;
    let price = df.column("price")?.i64()?;
    let size = df.column("size")?.i64()?;
    let order_id = df.column("order_id")?.u64()?;
    let flags = df.column("flags")?.u8()?;
    let sequence = df.column("sequence")?.u64()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(OrderBookDelta {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                action: BookAction::try_from(action.get(i).ok_or_else(|| missing("action", i))?)
                    .map_err(|_| missing("action", i))?,
                side: Side::try_from(side.get(i).ok_or_else(|| missing("side", i))?)
                    .map_err(|_| missing("side", i))?,
                price: Price::from_raw(price.get(i).ok_or_else(|| missing("price", i))? as Raw, price_precision)?,
                size: Quantity::from_raw(size.get(i).ok_or_else(|| missing("size", i))? as Raw, size_precision)?,
                order_id: order_id.get(i).ok_or_else(|| missing("order_id", i))?,
                flags: flags.get(i).ok_or_else(|| missing("flags", i))?,
                sequence: sequence.get(i).ok_or_else(|| missing("sequence", i))?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`InstrumentStatus`] records.
pub fn decode_status(df: &DataFrame) -> Result<Vec<InstrumentStatus>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let action = df.column("action")?.u8()?;
    let reason = df.column("reason")?.u8()?;
    let trading_event = df.column("trading_event")?.u8()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(InstrumentStatus {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                action: StatusAction::try_from(action.get(i).ok_or_else(|| missing("action", i))?)
                    .map_err(|_| missing("action", i))?,
                reason: StatusReason::try_from(reason.get(i).ok_or_else(|| missing("reason", i))?)
                    .map_err(|_| missing("reason", i))?,
                trading_event: TradingEvent::try_from(
                    trading_event.get(i).ok_or_else(|| missing("trading_event", i))?,
                )
                .map_err(|_| missing("trading_event", i))?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`InstrumentClose`] records.
pub fn decode_close(df: &DataFrame, price_precision: u8) -> Result<Vec<InstrumentClose>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let close_price = df.column("close_price")?.i64()?;
    let close_type = df.column("close_type")?.u8()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(InstrumentClose {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                close_price: Price::from_raw(
                    close_price.get(i).ok_or_else(|| missing("close_price", i))? as Raw,
                    price_precision,
                )?,
                close_type: InstrumentCloseType::try_from(
                    close_type.get(i).ok_or_else(|| missing("close_type", i))?,
                )
                .map_err(|_| missing("close_type", i))?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`OrderBookDepth10`] records, the exact inverse
/// of [`crate::encode::encode_book_depth10`].
pub fn decode_book_depth10(df: &DataFrame, price_precision: u8, size_precision: u8) -> Result<Vec<OrderBookDepth10>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let flags = df.column("flags")?.u8()?;
    let sequence = df.column("sequence")?.u64()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    let mut bid_price_cols = Vec::with_capacity(BOOK_DEPTH);
    let mut ask_price_cols = Vec::with_capacity(BOOK_DEPTH);
    let mut bid_size_cols = Vec::with_capacity(BOOK_DEPTH);
    let mut ask_size_cols = Vec::with_capacity(BOOK_DEPTH);
    let mut bid_count_cols = Vec::with_capacity(BOOK_DEPTH);
    let mut ask_count_cols = Vec::with_capacity(BOOK_DEPTH);
    for level in 0..BOOK_DEPTH {
        bid_price_cols.push(df.column(&format!("bid_price_{level}"))?.i64()?);
        ask_price_cols.push(df.column(&format!("ask_price_{level}"))?.i64()?);
        bid_size_cols.push(df.column(&format!("bid_size_{level}"))?.i64()?);
        ask_size_cols.push(df.column(&format!("ask_size_{level}"))?.i64()?);
        bid_count_cols.push(df.column(&format!("bid_count_{level}"))?.u32()?);
        ask_count_cols.push(df.column(&format!("ask_count_{level}"))?.u32()?);
    }

    (0..df.height())
        .map(|i| {
            let mut bid_price = [Price::zero(price_precision); BOOK_DEPTH];
            let mut ask_price = [Price::zero(price_precision); BOOK_DEPTH];
            let mut bid_size = [Quantity::zero(size_precision); BOOK_DEPTH];
            let mut ask_size = [Quantity::zero(size_precision); BOOK_DEPTH];
            let mut bid_count = [0u32; BOOK_DEPTH];
            let mut ask_count = [0u32; BOOK_DEPTH];
            for level in 0..BOOK_DEPTH {
                bid_price[level] = Price::from_raw(
                    bid_price_cols[level].get(i).ok_or_else(|| missing("bid_price", i))? as Raw,
                    price_precision,
                )?;
                ask_price[level] = Price::from_raw(
                    ask_price_cols[level].get(i).ok_or_else(|| missing("ask_price", i))? as Raw,
                    price_precision,
                )?;
                bid_size[level] = Quantity::from_raw(
                    bid_size_cols[level].get(i).ok_or_else(|| missing("bid_size", i))? as Raw,
                    size_precision,
                )?;
                ask_size[level] = Quantity::from_raw(
                    ask_size_cols[level].get(i).ok_or_else(|| missing("ask_size", i))? as Raw,
                    size_precision,
                )?;
                bid_count[level] = bid_count_cols[level].get(i).ok_or_else(|| missing("bid_count", i))?;
                ask_count[level] = ask_count_cols[level].get(i).ok_or_else(|| missing("ask_count", i))?;
            }
            Ok(OrderBookDepth10 {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                bid_price,
                ask_price,
                bid_size,
                ask_size,
                bid_count,
                ask_count,
                flags: flags.get(i).ok_or_else(|| missing("flags", i))?,
                sequence: sequence.get(i).ok_or_else(|| missing("sequence", i))?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`FundingRateUpdate`] records. `rate_precision`
/// is the decimal scale of the signed funding-rate fraction, not a price or size.
pub fn decode_funding_rates(df: &DataFrame, rate_precision: u8) -> Result<Vec<FundingRateUpdate>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let rate = df.column("rate")?.i64()?;
    let next_funding_ns = df.column("next_funding_ns")?.u64()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(FundingRateUpdate {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                rate: Fixed::from_raw(rate.get(i).ok_or_else(|| missing("rate", i))? as Raw, rate_precision)?,
                next_funding_ns: next_funding_ns.get(i).ok_or_else(|| missing("next_funding_ns", i))?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`MarkPriceUpdate`] records.
pub fn decode_mark_prices(df: &DataFrame, price_precision: u8) -> Result<Vec<MarkPriceUpdate>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let price = df.column("price")?.i64()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(MarkPriceUpdate {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                price: Price::from_raw(price.get(i).ok_or_else(|| missing("price", i))? as Raw, price_precision)?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`IndexPriceUpdate`] records.
pub fn decode_index_prices(df: &DataFrame, price_precision: u8) -> Result<Vec<IndexPriceUpdate>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let price = df.column("price")?.i64()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            Ok(IndexPriceUpdate {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                price: Price::from_raw(price.get(i).ok_or_else(|| missing("price", i))? as Raw, price_precision)?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}

/// Decodes a columnar table into [`Instrument`] records. Unlike the tick tables,
/// price/size precision is read per row from the `price_precision`/`size_precision`
/// columns rather than supplied by the caller, since instruments are the source of
/// that precision for every other table.
pub fn decode_instruments(df: &DataFrame) -> Result<Vec<Instrument>> {
    let instrument_id = df.column("instrument_id")?.utf8()?;
    let class = df.column("class")?.u8()?;
    let price_precision = df.column("price_precision")?.u8()?;
    let size_precision = df.column("size_precision")?.u8()?;
    let price_increment = df.column("price_increment")?.i64()?;
    let size_increment = df.column("size_increment")?.i64()?;
    let min_size = df.column("min_size")?.i64()?;
    let max_size = df.column("max_size")?.i64()?;
    let kind_json = df.column("kind_json")?.utf8()?;
    let ts_event = df.column("ts_event")?.u64()?;
    let ts_init = df.column("ts_init")?.u64()?;

    (0..df.height())
        .map(|i| {
            let price_prec = price_precision.get(i).ok_or_else(|| missing("price_precision", i))?;
            let size_prec = size_precision.get(i).ok_or_else(|| missing("size_precision", i))?;
            let kind: InstrumentKindJson =
                serde_json::from_str(kind_json.get(i).ok_or_else(|| missing("kind_json", i))?)
                    .map_err(|e| Error::schema_mismatch("instrument", format!("invalid kind_json: {e}")))?;
            Ok(Instrument {
                instrument_id: InstrumentId::new(
                    instrument_id.get(i).ok_or_else(|| missing("instrument_id", i))?,
                )?,
                class: InstrumentClass::try_from(class.get(i).ok_or_else(|| missing("class", i))?)
                    .map_err(|_| missing("class", i))?,
                price_precision: price_prec,
                size_precision: size_prec,
                price_increment: Price::from_raw(
                    price_increment.get(i).ok_or_else(|| missing("price_increment", i))? as Raw,
                    price_prec,
                )?,
                size_increment: Quantity::from_raw(
                    size_increment.get(i).ok_or_else(|| missing("size_increment", i))? as Raw,
                    size_prec,
                )?,
                min_size: min_size
                    .get(i)
                    .map(|raw| Quantity::from_raw(raw as Raw, size_prec))
                    .transpose()?,
                max_size: max_size
                    .get(i)
                    .map(|raw| Quantity::from_raw(raw as Raw, size_prec))
                    .transpose()?,
                kind: InstrumentKind::try_from(kind)?,
                ts_event: ts_event.get(i).ok_or_else(|| missing("ts_event", i))?,
                ts_init: ts_init.get(i).ok_or_else(|| missing("ts_init", i))?,
            })
        })
        .collect()
}
