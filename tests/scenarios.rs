//! End-to-end scenarios exercising ingestion, query, and merge together
//! against a real (tempdir-backed) catalog.

use std::path::Path;
use std::sync::Mutex;

use nautilus_catalog::catalog::Catalog;
use nautilus_catalog::fixed_point::{Price, Quantity};
use nautilus_catalog::identifiers::InstrumentId;
use nautilus_catalog::ingest::{process_files, IngestOptions, ParserFactory};
use nautilus_catalog::merge::{batch_files, MergeConfig};
use nautilus_catalog::query::{query, QueryOptions, QueryResult};
use nautilus_catalog::raw::Parser;
use nautilus_catalog::record::{Instrument, InstrumentKind, QuoteTick, TradeTick};
use nautilus_catalog::record_ref::RecordEnum;
use nautilus_catalog::{Error, Result};

struct FixedParser {
    records: Mutex<Vec<RecordEnum>>,
}

impl Parser for FixedParser {
    type Record = RecordEnum;

    fn feed(&mut self, _path: &Path, _bytes: &[u8], is_final: bool) -> Result<Vec<RecordEnum>> {
        if is_final {
            Ok(std::mem::take(&mut *self.records.lock().unwrap()))
        } else {
            Ok(Vec::new())
        }
    }
}

struct FixedFactory(Vec<RecordEnum>);

impl ParserFactory for FixedFactory {
    fn new_parser(&self) -> Box<dyn Parser<Record = RecordEnum>> {
        Box::new(FixedParser { records: Mutex::new(self.0.clone()) })
    }
}

fn quote(instrument: &str, ts: u64) -> QuoteTick {
    QuoteTick {
        instrument_id: InstrumentId::new(instrument).unwrap(),
        bid_price: Price::from_str_precise("100.00", 2).unwrap(),
        ask_price: Price::from_str_precise("100.25", 2).unwrap(),
        bid_size: Quantity::from_str_precise("10", 0).unwrap(),
        ask_size: Quantity::from_str_precise("10", 0).unwrap(),
        ts_event: ts,
        ts_init: ts,
    }
}

fn ingest_records(catalog: &Catalog, records: Vec<RecordEnum>) {
    let source_dir = tempfile::tempdir().unwrap();
    let raw_path = source_dir.path().join("source.raw");
    std::fs::write(&raw_path, b"irrelevant to this parser").unwrap();
    let factory = FixedFactory(records);
    let pattern = source_dir.path().join("*.raw");
    let written = process_files(pattern.to_str().unwrap(), &factory, catalog, IngestOptions::default()).unwrap();
    assert_eq!(written.len(), 1);
}

#[test]
fn quote_ingestion_round_trips_through_the_catalog() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());
    ingest_records(&catalog, vec![RecordEnum::from(quote("ES.XCME", 1)), RecordEnum::from(quote("ES.XCME", 2))]);

    let QueryResult::Table(df) = query(&catalog, "quote_tick", QueryOptions::default()).unwrap() else {
        panic!("expected a table");
    };
    assert_eq!(df.height(), 2);
}

#[test]
fn range_query_applies_inclusive_ts_init_bounds() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());
    ingest_records(
        &catalog,
        (1..=10).map(|ts| RecordEnum::from(quote("ES.XCME", ts))).collect(),
    );

    let options = QueryOptions {
        start: Some(3),
        end: Some(7),
        ..Default::default()
    };
    let QueryResult::Table(df) = query(&catalog, "quote_tick", options).unwrap() else {
        panic!("expected a table");
    };
    assert_eq!(df.height(), 5);
}

#[test]
fn merged_replay_across_two_instruments_is_monotonic() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());
    ingest_records(&catalog, vec![RecordEnum::from(quote("ES.XCME", 1)), RecordEnum::from(quote("ES.XCME", 4))]);
    ingest_records(&catalog, vec![RecordEnum::from(quote("CL.XNYM", 2)), RecordEnum::from(quote("CL.XNYM", 3))]);

    let configs = vec![
        MergeConfig {
            type_name: "quote_tick".into(),
            partition: "instrument_id=ES.XCME".into(),
        },
        MergeConfig {
            type_name: "quote_tick".into(),
            partition: "instrument_id=CL.XNYM".into(),
        },
    ];
    let batches: Vec<_> = batch_files(&catalog, &configs, Some(1), None)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();
    let mut all_ts = Vec::new();
    for batch in &batches {
        let ts = batch.column("ts_init").unwrap().u64().unwrap();
        all_ts.extend(ts.into_no_null_iter());
    }
    let mut sorted = all_ts.clone();
    sorted.sort_unstable();
    assert_eq!(all_ts, sorted);
    assert_eq!(all_ts, vec![1, 2, 3, 4]);
}

#[test]
fn partition_key_sanitization_round_trips_through_the_mapping_sidecar() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());
    let trade = TradeTick {
        instrument_id: InstrumentId::new("BTC/USDT.BINANCE").unwrap(),
        price: Price::from_str_precise("50000", 0).unwrap(),
        size: Quantity::from_str_precise("2", 0).unwrap(),
        aggressor_side: nautilus_catalog::enums::AggressorSide::Buyer,
        trade_id: "t-1".into(),
        ts_event: 1,
        ts_init: 1,
    };
    ingest_records(&catalog, vec![RecordEnum::from(trade)]);

    let partitions = catalog.list_partitions("trade_tick").unwrap();
    assert_eq!(partitions, vec!["instrument_id=BTC_USDT.BINANCE".to_string()]);

    let options = QueryOptions {
        instrument_ids: vec![InstrumentId::new("BTC/USDT.BINANCE").unwrap()],
        as_records: true,
        ..Default::default()
    };
    let QueryResult::Records(records) = query(&catalog, "trade_tick", options).unwrap() else {
        panic!("expected decoded records");
    };
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].instrument_id().unwrap().as_str(), "BTC/USDT.BINANCE");
}

#[test]
fn fixed_point_values_are_exact_across_ingest_and_query() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());
    ingest_records(&catalog, vec![RecordEnum::from(quote("ES.XCME", 1))]);

    let options = QueryOptions {
        as_records: true,
        ..Default::default()
    };
    let QueryResult::Records(records) = query(&catalog, "quote_tick", options).unwrap() else {
        panic!("expected decoded records");
    };
    let RecordEnum::Quote(decoded) = &records[0] else {
        panic!("expected a quote");
    };
    assert_eq!(decoded.bid_price, Price::from_str_precise("100.00", 2).unwrap());
    assert_eq!(decoded.ask_price, Price::from_str_precise("100.25", 2).unwrap());
}

#[test]
fn merge_skips_a_corrupt_file_without_aborting_the_stream() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());
    ingest_records(&catalog, vec![RecordEnum::from(quote("ES.XCME", 1)), RecordEnum::from(quote("ES.XCME", 3))]);

    let partition_dir = catalog.make_path("quote_tick").join("instrument_id=ES.XCME");
    std::fs::write(partition_dir.join("9000-9001-99.parquet"), b"not a parquet file").unwrap();

    let configs = vec![MergeConfig {
        type_name: "quote_tick".into(),
        partition: "instrument_id=ES.XCME".into(),
    }];
    let batches: Result<Vec<_>> = batch_files(&catalog, &configs, Some(1), None).unwrap().collect();
    let batches = batches.unwrap();
    let total_rows: usize = batches.iter().map(|b| b.height()).sum();
    assert_eq!(total_rows, 2);
}

fn spot_instrument(id: &str, ts: u64) -> Instrument {
    Instrument {
        instrument_id: InstrumentId::new(id).unwrap(),
        class: nautilus_catalog::enums::InstrumentClass::CurrencySpot,
        price_precision: 2,
        size_precision: 0,
        price_increment: Price::from_str_precise("0.01", 2).unwrap(),
        size_increment: Quantity::from_str_precise("1", 0).unwrap(),
        min_size: None,
        max_size: None,
        kind: InstrumentKind::CurrencySpot,
        ts_event: ts,
        ts_init: ts,
    }
}

#[test]
fn instrument_ingestion_merges_into_a_single_unpartitioned_file_and_dedupes() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());

    ingest_records(&catalog, vec![RecordEnum::from(spot_instrument("ES.XCME", 1))]);
    // Re-publishing the same definition (same key columns, later ts_init) must
    // replace rather than duplicate the row.
    ingest_records(
        &catalog,
        vec![
            RecordEnum::from(spot_instrument("ES.XCME", 2)),
            RecordEnum::from(spot_instrument("CL.XNYM", 3)),
        ],
    );

    let partitions = catalog.list_partitions("instrument").unwrap();
    assert!(partitions.is_empty(), "instruments must not be partitioned by instrument_id");

    let options = QueryOptions {
        as_records: true,
        ..Default::default()
    };
    let QueryResult::Records(records) = query(&catalog, "instrument", options).unwrap() else {
        panic!("expected decoded records");
    };
    assert_eq!(records.len(), 2);
}

#[test]
fn each_partitions_records_decode_against_their_own_recorded_precision() {
    let catalog_dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::local(catalog_dir.path());

    let coarse = QuoteTick {
        instrument_id: InstrumentId::new("BTC.BINANCE").unwrap(),
        bid_price: Price::from_str_precise("50000", 0).unwrap(),
        ask_price: Price::from_str_precise("50001", 0).unwrap(),
        bid_size: Quantity::from_str_precise("1", 0).unwrap(),
        ask_size: Quantity::from_str_precise("1", 0).unwrap(),
        ts_event: 1,
        ts_init: 1,
    };
    let fine = QuoteTick {
        instrument_id: InstrumentId::new("ES.XCME").unwrap(),
        bid_price: Price::from_str_precise("4500.2500", 4).unwrap(),
        ask_price: Price::from_str_precise("4500.5000", 4).unwrap(),
        bid_size: Quantity::from_str_precise("10", 0).unwrap(),
        ask_size: Quantity::from_str_precise("5", 0).unwrap(),
        ts_event: 2,
        ts_init: 2,
    };
    ingest_records(&catalog, vec![RecordEnum::from(coarse.clone()), RecordEnum::from(fine.clone())]);

    let options = QueryOptions {
        as_records: true,
        ..Default::default()
    };
    let QueryResult::Records(records) = query(&catalog, "quote_tick", options).unwrap() else {
        panic!("expected decoded records");
    };
    for record in &records {
        let RecordEnum::Quote(decoded) = record else {
            panic!("expected a quote");
        };
        if decoded.instrument_id.as_str() == "BTC.BINANCE" {
            assert_eq!(decoded.bid_price, coarse.bid_price);
        } else {
            assert_eq!(decoded.bid_price, fine.bid_price);
        }
    }
}

#[test]
fn catalog_from_env_reads_the_nautilus_catalog_variable() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("NAUTILUS_CATALOG", dir.path());
    let catalog = Catalog::from_env().unwrap();
    assert_eq!(catalog.root(), dir.path());
    std::env::remove_var("NAUTILUS_CATALOG");
}

#[test]
fn catalog_from_env_without_the_variable_set_is_an_error() {
    std::env::remove_var("NAUTILUS_CATALOG");
    assert!(matches!(Catalog::from_env(), Err(Error::NotFound(_))));
}
