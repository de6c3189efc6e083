//! Flat sheet import/export integration tests.

mod common;

use common::{acme_invoice, write_file, TestHarness};
use weighbill_core::BillInput;
use weighbill_store::legacy::FLAT_COLUMNS;
use weighbill_store::{read_flat, StoreError};

fn sheet(rows: &[&str]) -> String {
    let mut text = FLAT_COLUMNS.join(",");
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    text
}

const ROW_OLD_SIGN: &str =
    "1,INV7,70,70,7,Shree Traders,Market Yard,05-Mar-24,wheat,1001,7,10,qtl,70,Ramesh,MH12AB1234,A,1500,1000,500";
const ROW_NEW_SIGN: &str =
    "2,INV8,30,30,3,Shree Traders,,2024-03-06T08:30:00Z,rice,1006,3,10,qtl,30,Suresh,MH12CD5678,B,1000,1400,400";

#[test]
fn read_flat_splits_rows_into_bills() {
    let harness = TestHarness::new();
    let path = harness.scratch("old.csv");
    write_file(&path, &sheet(&[ROW_OLD_SIGN, ROW_NEW_SIGN]));

    let bills = read_flat(&path).unwrap();
    assert_eq!(bills.len(), 2);
    assert_eq!(bills[0].bill.id.get(), 1);
    assert_eq!(bills[0].items[0].farmer_name, "Ramesh");
    // Net weight is recomputed as after minus before.
    assert_eq!(bills[0].items[0].net_weight, -500.0);
    assert_eq!(bills[1].items[0].net_weight, 400.0);
    assert_eq!(bills[1].bill.total, 30.0);
}

#[test]
fn stray_sequence_file_next_to_sheet_is_ignored() {
    let harness = TestHarness::new();
    let path = harness.scratch("old.csv");
    write_file(&path, &sheet(&[ROW_OLD_SIGN]));
    write_file(&harness.scratch("old.seq"), "not a number\n");

    let bills = read_flat(&path).unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(harness.ledger.import_flat(&path).unwrap().imported, 1);
}

#[test]
fn import_appends_with_fresh_keys_and_flags_sign() {
    let harness = TestHarness::new();
    harness.ledger.create_bill(acme_invoice()).unwrap();
    let path = harness.scratch("old.csv");
    write_file(&path, &sheet(&[ROW_OLD_SIGN, ROW_NEW_SIGN]));

    let report = harness.ledger.import_flat(&path).unwrap();

    assert_eq!(report.imported, 2);
    assert_eq!(report.sign_flipped, 1);
    let ids: Vec<u64> = report.bill_ids.iter().map(|id| id.get()).collect();
    assert_eq!(ids, vec![2, 3]);

    let imported = harness.ledger.get_bill(report.bill_ids[0]).unwrap();
    assert_eq!(imported.invoice_no, "INV7");
    assert_eq!(imported.created_at.to_rfc3339(), "2024-03-05T00:00:00+00:00");
    let items = harness.ledger.list_items_by_bill(report.bill_ids[0]).unwrap();
    assert_eq!(items[0].id.get(), 3);
}

#[test]
fn import_with_invalid_rows_writes_nothing() {
    let harness = TestHarness::new();
    let path = harness.scratch("old.csv");
    let blank_goods =
        "3,INV9,0,0,0,Shree Traders,,05-Mar-24,,1001,1,1,qtl,1,Ramesh,MH12,A,0,0,0";
    write_file(&path, &sheet(&[ROW_NEW_SIGN, blank_goods]));
    let bills_before = harness.read("Bill.csv");

    let err = harness.ledger.import_flat(&path).unwrap_err();
    let StoreError::InvalidInput(v) = err else {
        panic!("expected InvalidInput");
    };
    assert_eq!(v.field_names(), vec!["row 3.items[0].goods"]);
    assert_eq!(harness.read("Bill.csv"), bills_before);
}

#[test]
fn sheet_with_wrong_columns_is_corrupt() {
    let harness = TestHarness::new();
    let path = harness.scratch("old.csv");
    write_file(&path, "id,invoiceNo\n1,INV1\n");
    assert!(matches!(
        harness.ledger.import_flat(&path),
        Err(StoreError::CorruptStore { .. })
    ));
}

#[test]
fn unknown_date_is_corrupt() {
    let harness = TestHarness::new();
    let path = harness.scratch("old.csv");
    let row = ROW_NEW_SIGN.replace("2024-03-06T08:30:00Z", "sometime");
    write_file(&path, &sheet(&[row.as_str()]));
    assert!(matches!(read_flat(&path), Err(StoreError::CorruptStore { .. })));
}

#[test]
fn missing_sheet_is_not_found() {
    let harness = TestHarness::new();
    assert!(matches!(
        read_flat(&harness.scratch("absent.csv")),
        Err(StoreError::NotFound { .. })
    ));
}

#[test]
fn export_then_read_back() {
    let harness = TestHarness::new();
    harness.ledger.create_bill(acme_invoice()).unwrap();
    harness.ledger.create_bill(BillInput::new("INV2", "Acme")).unwrap();
    let path = harness.scratch("export.csv");

    let written = harness.ledger.export_flat(&path).unwrap();
    assert_eq!(written, 3);

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next().unwrap(), FLAT_COLUMNS.join(","));
    assert!(text.lines().nth(3).unwrap().starts_with("3,INV2,"));

    let rows = read_flat(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].bill.invoice_no, "INV1");
    assert_eq!(rows[0].items[0].amount, 50.0);
    assert_eq!(rows[1].items[0].net_weight, 150.0);
}
