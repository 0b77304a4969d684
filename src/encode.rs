//! `encode_batch`: the single inverse of [`decode::decode_batch`](crate::decode::decode_batch),
//! turning a homogeneous slice of records into the columnar [`DataFrame`] the catalog
//! persists to Parquet.

use polars::prelude::*;

use crate::error::Result;
use crate::fixed_point::Fixed;
use crate::record::{
    Bar, FundingRateUpdate, IndexPriceUpdate, Instrument, InstrumentClose, InstrumentKindJson,
    InstrumentStatus, MarkPriceUpdate, OrderBookDelta, OrderBookDepth10, QuoteTick, TradeTick,
};

fn raw_column(name: &str, values: impl IntoIterator<Item = Fixed>) -> Series {
    let raw: Vec<i64> = values.into_iter().map(|f| f.raw() as i64).collect();
    Series::new(name, raw)
}

fn nullable_raw_column(name: &str, values: impl IntoIterator<Item = Option<Fixed>>) -> Series {
    let raw: Vec<Option<i64>> = values.into_iter().map(|v| v.map(|f| f.raw() as i64)).collect();
    Series::new(name, raw)
}

/// Encodes a slice of [`QuoteTick`] into a columnar table, preserving input order.
///
/// All rows must share an instrument and price/size precision; this is asserted by
/// the ingestion pipeline before writing, not re-derived here.
pub fn encode_quotes(records: &[QuoteTick]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        raw_column("bid_price", records.iter().map(|r| r.bid_price.fixed())),
        raw_column("ask_price", records.iter().map(|r| r.ask_price.fixed())),
        raw_column("bid_size", records.iter().map(|r| r.bid_size.fixed())),
        raw_column("ask_size", records.iter().map(|r| r.ask_size.fixed())),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?;
    Ok(df)
}

/// Encodes a slice of [`TradeTick`] into a columnar table.
pub fn encode_trades(records: &[TradeTick]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        raw_column("price", records.iter().map(|r| r.price.fixed())),
        raw_column("size", records.iter().map(|r| r.size.fixed())),
        Series::new(
            "aggressor_side",
            records
                .iter()
                .map(|r| u8::from(r.aggressor_side))
                .collect::<Vec<_>>(),
        ),
        Series::new(
            "trade_id",
            records.iter().map(|r| r.trade_id.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?;
    Ok(df)
}

/// Encodes a slice of [`Bar`] into a columnar table. `bar_type` is not a column; the
/// caller stores it in table/partition metadata (see [`crate::schema::metadata_keys::BAR_TYPE`]).
pub fn encode_bars(records: &[Bar]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        raw_column("open", records.iter().map(|r| r.open.fixed())),
        raw_column("high", records.iter().map(|r| r.high.fixed())),
        raw_column("low", records.iter().map(|r| r.low.fixed())),
        raw_column("close", records.iter().map(|r| r.close.fixed())),
        raw_column("volume", records.iter().map(|r| r.volume.fixed())),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?;
    Ok(df)
}

/// Encodes a slice of [`OrderBookDelta`] into a columnar table.
pub fn encode_book_deltas(records: &[OrderBookDelta]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("action", records.iter().map(|r| u8::from(r.action)).collect::<Vec<_>>()),
        Series::new("side", records.iter().map(|r| u8::from(r.side)).collect::<Vec<_>>()),
        raw_column("price", records.iter().map(|r| r.price.fixed())),
        raw_column("size", records.iter().map(|r| r.size.fixed())),
        Series::new("order_id", records.iter().map(|r| r.order_id).collect::<Vec<_>>()),
        Series::new("flags", records.iter().map(|r| r.flags).collect::<Vec<_>>()),
        Series::new("sequence", records.iter().map(|r| r.sequence).collect::<Vec<_>>()),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?;
    Ok(df)
}

/// Encodes a slice of [`OrderBookDepth10`] into a columnar table, flattening each
/// 10-level array into ten `_0`..`_9`-suffixed columns per side.
pub fn encode_book_depth10(records: &[OrderBookDepth10]) -> Result<DataFrame> {
    let mut columns = vec![Series::new(
        "instrument_id",
        records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
    )];
    for level in 0..crate::record::BOOK_DEPTH {
        columns.push(raw_column(
            &format!("bid_price_{level}"),
            records.iter().map(|r| r.bid_price[level].fixed()),
        ));
        columns.push(raw_column(
            &format!("ask_price_{level}"),
            records.iter().map(|r| r.ask_price[level].fixed()),
        ));
        columns.push(raw_column(
            &format!("bid_size_{level}"),
            records.iter().map(|r| r.bid_size[level].fixed()),
        ));
        columns.push(raw_column(
            &format!("ask_size_{level}"),
            records.iter().map(|r| r.ask_size[level].fixed()),
        ));
        columns.push(Series::new(
            &format!("bid_count_{level}"),
            records.iter().map(|r| r.bid_count[level]).collect::<Vec<_>>(),
        ));
        columns.push(Series::new(
            &format!("ask_count_{level}"),
            records.iter().map(|r| r.ask_count[level]).collect::<Vec<_>>(),
        ));
    }
    columns.push(Series::new("flags", records.iter().map(|r| r.flags).collect::<Vec<_>>()));
    columns.push(Series::new("sequence", records.iter().map(|r| r.sequence).collect::<Vec<_>>()));
    columns.push(Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()));
    columns.push(Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()));
    Ok(DataFrame::new(columns)?)
}

/// Encodes a slice of [`InstrumentStatus`] into a columnar table.
pub fn encode_status(records: &[InstrumentStatus]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("action", records.iter().map(|r| u8::from(r.action)).collect::<Vec<_>>()),
        Series::new("reason", records.iter().map(|r| u8::from(r.reason)).collect::<Vec<_>>()),
        Series::new(
            "trading_event",
            records.iter().map(|r| u8::from(r.trading_event)).collect::<Vec<_>>(),
        ),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?)
}

/// Encodes a slice of [`InstrumentClose`] into a columnar table.
pub fn encode_close(records: &[InstrumentClose]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        raw_column("close_price", records.iter().map(|r| r.close_price.fixed())),
        Series::new(
            "close_type",
            records.iter().map(|r| u8::from(r.close_type)).collect::<Vec<_>>(),
        ),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?)
}

/// Encodes a slice of [`FundingRateUpdate`] into a columnar table.
pub fn encode_funding_rates(records: &[FundingRateUpdate]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        raw_column("rate", records.iter().map(|r| r.rate)),
        Series::new(
            "next_funding_ns",
            records.iter().map(|r| r.next_funding_ns).collect::<Vec<_>>(),
        ),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?)
}

/// Encodes a slice of [`MarkPriceUpdate`] into a columnar table.
pub fn encode_mark_prices(records: &[MarkPriceUpdate]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        raw_column("price", records.iter().map(|r| r.price.fixed())),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?)
}

/// Encodes a slice of [`IndexPriceUpdate`] into a columnar table.
pub fn encode_index_prices(records: &[IndexPriceUpdate]) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        raw_column("price", records.iter().map(|r| r.price.fixed())),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?)
}

/// Encodes a slice of [`Instrument`] into a columnar table. Class-specific fields
/// are serialized into a single `kind_json` column rather than a sparse per-class
/// column set, since each instrument class uses a disjoint field set.
pub fn encode_instruments(records: &[Instrument]) -> Result<DataFrame> {
    let kind_json: Vec<String> = records
        .iter()
        .map(|r| serde_json::to_string(&InstrumentKindJson::from(&r.kind)).unwrap_or_default())
        .collect();
    Ok(DataFrame::new(vec![
        Series::new(
            "instrument_id",
            records.iter().map(|r| r.instrument_id.as_str()).collect::<Vec<_>>(),
        ),
        Series::new("class", records.iter().map(|r| u8::from(r.class)).collect::<Vec<_>>()),
        Series::new(
            "price_precision",
            records.iter().map(|r| r.price_precision).collect::<Vec<_>>(),
        ),
        Series::new(
            "size_precision",
            records.iter().map(|r| r.size_precision).collect::<Vec<_>>(),
        ),
        raw_column("price_increment", records.iter().map(|r| r.price_increment.fixed())),
        raw_column("size_increment", records.iter().map(|r| r.size_increment.fixed())),
        nullable_raw_column("min_size", records.iter().map(|r| r.min_size.map(|q| q.fixed()))),
        nullable_raw_column("max_size", records.iter().map(|r| r.max_size.map(|q| q.fixed()))),
        Series::new("kind_json", kind_json),
        Series::new("ts_event", records.iter().map(|r| r.ts_event).collect::<Vec<_>>()),
        Series::new("ts_init", records.iter().map(|r| r.ts_init).collect::<Vec<_>>()),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_bars, decode_book_deltas, decode_quotes, decode_trades};
    use crate::enums::{AggressorSide, BookAction, Side};
    use crate::fixed_point::{Price, Quantity};
    use crate::identifiers::InstrumentId;

    fn sample_quote() -> QuoteTick {
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
    fn quote_round_trips_through_encode_decode() {
        let records = vec![sample_quote(), sample_quote()];
        let df = encode_quotes(&records).unwrap();
        assert_eq!(df.height(), 2);
        let decoded = decode_quotes(&df, 2, 0).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn trade_round_trips_with_no_aggressor() {
        let trade = TradeTick {
            instrument_id: InstrumentId::new("ES.XCME").unwrap(),
            price: Price::from_str_precise("4500.25", 2).unwrap(),
            size: Quantity::from_str_precise("1", 0).unwrap(),
            aggressor_side: AggressorSide::NoAggressor,
            trade_id: "auction-1".into(),
            ts_event: 1,
            ts_init: 1,
        };
        let df = encode_trades(&[trade.clone()]).unwrap();
        let decoded = decode_trades(&df, 2, 0).unwrap();
        assert_eq!(decoded, vec![trade]);
    }

    #[test]
    fn book_delta_round_trips_big_endian_precision() {
        let delta = OrderBookDelta {
            instrument_id: InstrumentId::new("ES.XCME").unwrap(),
            action: BookAction::Add,
            side: Side::Buy,
            price: Price::from_str_precise("4500.25", 2).unwrap(),
            size: Quantity::from_str_precise("3", 0).unwrap(),
            order_id: 42,
            flags: 0,
            sequence: 7,
            ts_event: 1,
            ts_init: 1,
        };
        let df = encode_book_deltas(&[delta.clone()]).unwrap();
        let decoded = decode_book_deltas(&df, 2, 0).unwrap();
        assert_eq!(decoded, vec![delta]);
    }

    #[test]
    fn bar_round_trip_needs_external_bar_type() {
        let bar_type = crate::identifiers::BarType::new(
            InstrumentId::new("ES.XCME").unwrap(),
            1,
            crate::enums::Aggregation::Minute,
            crate::enums::PriceType::Last,
            crate::enums::Source::External,
        );
        let bar = Bar {
            bar_type: bar_type.clone(),
            open: Price::from_str_precise("100", 0).unwrap(),
            high: Price::from_str_precise("110", 0).unwrap(),
            low: Price::from_str_precise("95", 0).unwrap(),
            close: Price::from_str_precise("105", 0).unwrap(),
            volume: Quantity::from_str_precise("42", 0).unwrap(),
            ts_event: 60_000_000_000,
            ts_init: 60_000_000_500,
        };
        let df = encode_bars(&[bar.clone()]).unwrap();
        let decoded = decode_bars(&df, bar_type, 0, 0).unwrap();
        assert_eq!(decoded, vec![bar]);
    }
}
