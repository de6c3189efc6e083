//! Ledger integration tests against a CSV directory.

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use common::{acme_invoice, single_item_bill, TestHarness};
use serde_json::json;
use weighbill_core::{BillId, BillInput, ItemId, ItemInput};
use weighbill_store::schema::table;
use weighbill_store::{CsvStore, Ledger, Record, RecordStore, StoreError, Table, WriteLock};

// ============================================================================
// Bills
// ============================================================================

#[test]
fn create_bill_with_items_computes_totals() {
    let harness = TestHarness::new();

    let created = harness.ledger.create_bill(acme_invoice()).unwrap();

    assert_eq!(created.bill.total_quantity, 13.0);
    assert_eq!(created.bill.total, 56.0);
    assert_eq!(created.bill.taxable_value, 56.0);
    let amounts: Vec<f64> = created.items.iter().map(|i| i.amount).collect();
    assert_eq!(amounts, vec![50.0, 6.0]);
    let net: Vec<f64> = created.items.iter().map(|i| i.net_weight).collect();
    assert_eq!(net, vec![500.0, 150.0]);

    let stored = harness.ledger.get_bill(created.bill.id).unwrap();
    assert_eq!(stored, created.bill);
}

#[test]
fn tables_survive_reopening() {
    let harness = TestHarness::new();
    let created = harness.ledger.create_bill(acme_invoice()).unwrap();

    let reopened = Ledger::open(&harness.dir).unwrap();
    let joined = reopened.list_bills_with_items().unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0], created);
}

#[test]
fn files_are_plain_csv_with_headers() {
    let harness = TestHarness::new();
    harness.ledger.create_bill(acme_invoice()).unwrap();

    let bills = String::from_utf8(harness.read("Bill.csv")).unwrap();
    assert!(bills.starts_with(
        "id,invoiceNo,supplierName,supplierOtherInfo,taxableValue,total,total_quantity,createdAt"
    ));
    let items = String::from_utf8(harness.read("Item.csv")).unwrap();
    assert_eq!(items.lines().count(), 3);
}

#[test]
fn list_bills_is_in_storage_order() {
    let harness = TestHarness::new();
    for invoice in ["A", "B", "C"] {
        harness.ledger.create_bill(single_item_bill(invoice, 1.0)).unwrap();
    }
    let invoices: Vec<String> = harness
        .ledger
        .list_bills()
        .unwrap()
        .into_iter()
        .map(|b| b.invoice_no)
        .collect();
    assert_eq!(invoices, vec!["A", "B", "C"]);
}

#[test]
fn delete_bill_cascades_to_items() {
    let harness = TestHarness::new();
    let first = harness
        .ledger
        .create_bill(
            BillInput::new("INV1", "Acme")
                .with_item(ItemInput::new("wheat", 1.0, 1.0))
                .with_item(ItemInput::new("rice", 1.0, 1.0)),
        )
        .unwrap();
    let second = harness.ledger.create_bill(single_item_bill("INV2", 4.0)).unwrap();

    assert!(harness.ledger.delete_bill(first.bill.id).unwrap());

    let bills = harness.ledger.list_bills().unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].id, second.bill.id);
    for item in &first.items {
        assert!(matches!(
            harness.ledger.get_item(item.id),
            Err(StoreError::NotFound { .. })
        ));
    }
    let remaining = harness.ledger.list_items_by_bill(second.bill.id).unwrap();
    assert_eq!(remaining.len(), 1);
}

// ============================================================================
// Key allocation
// ============================================================================

#[test]
fn keys_are_never_reused() {
    let harness = TestHarness::new();
    for invoice in ["A", "B", "C"] {
        harness.ledger.create_bill(BillInput::new(invoice, "Acme")).unwrap();
    }

    harness.ledger.delete_bill(BillId::new(2).unwrap()).unwrap();
    let next = harness.ledger.create_bill(BillInput::new("D", "Acme")).unwrap();
    assert_eq!(next.bill.id.get(), 4);

    harness.ledger.delete_bill(next.bill.id).unwrap();
    let after = harness.ledger.create_bill(BillInput::new("E", "Acme")).unwrap();
    assert_eq!(after.bill.id.get(), 5);
}

#[test]
fn deleting_the_top_key_does_not_rewind() {
    let harness = TestHarness::new();
    for invoice in ["A", "B", "C"] {
        harness.ledger.create_bill(BillInput::new(invoice, "Acme")).unwrap();
    }
    harness.ledger.delete_bill(BillId::new(3).unwrap()).unwrap();

    let reopened = Ledger::open(&harness.dir).unwrap();
    let next = reopened.create_bill(BillInput::new("D", "Acme")).unwrap();
    assert_eq!(next.bill.id.get(), 4);
}

// ============================================================================
// Items
// ============================================================================

#[test]
fn parent_not_found_leaves_tables_unchanged() {
    let harness = TestHarness::new();
    harness.ledger.create_bill(acme_invoice()).unwrap();
    let bills_before = harness.read("Bill.csv");
    let items_before = harness.read("Item.csv");

    let err = harness
        .ledger
        .create_item(ItemInput::new("oats", 1.0, 1.0), BillId::new(42).unwrap())
        .unwrap_err();

    assert!(matches!(err, StoreError::ParentNotFound { .. }));
    assert_eq!(harness.read("Bill.csv"), bills_before);
    assert_eq!(harness.read("Item.csv"), items_before);
}

#[test]
fn stored_bill_totals_follow_item_changes() {
    let harness = TestHarness::new();
    let created = harness.ledger.create_bill(acme_invoice()).unwrap();
    let bill_id = created.bill.id;

    harness
        .ledger
        .create_item(ItemInput::new("oats", 2.0, 10.0), bill_id)
        .unwrap();
    let fields = json!({"quantity": 1});
    harness
        .ledger
        .update_item_fields(created.items[0].id, fields.as_object().unwrap())
        .unwrap();
    harness.ledger.delete_item(created.items[1].id).unwrap();

    // Reading the file directly must agree with the recomputed view.
    let reopened = Ledger::open(&harness.dir).unwrap();
    let bill = reopened.list_bills().unwrap().remove(0);
    assert_eq!(bill.total, 5.0 + 20.0);
    assert_eq!(bill.total_quantity, 3.0);
    let raw = String::from_utf8(harness.read("Bill.csv")).unwrap();
    assert!(raw.lines().nth(1).unwrap().contains(",25.0,3.0,"));
}

#[test]
fn update_reports_every_bad_field() {
    let harness = TestHarness::new();
    let created = harness.ledger.create_bill(acme_invoice()).unwrap();
    let items_before = harness.read("Item.csv");

    let fields = json!({"quantity": -1, "rate": "abc", "amount": 3, "colour": "red"});
    let err = harness
        .ledger
        .update_item_fields(created.items[0].id, fields.as_object().unwrap())
        .unwrap_err();

    let StoreError::InvalidInput(v) = err else {
        panic!("expected InvalidInput");
    };
    for field in ["quantity", "rate", "amount", "colour"] {
        assert!(v.has_field(field), "{field} not reported");
    }
    assert_eq!(harness.read("Item.csv"), items_before);
}

#[test]
fn nullable_columns_can_be_cleared() {
    let harness = TestHarness::new();
    let created = harness.ledger.create_bill(acme_invoice()).unwrap();
    let id = created.items[0].id;

    let set = json!({"in_time": "09:15", "farmerCode": "F-7"});
    let item = harness
        .ledger
        .update_item_fields(id, set.as_object().unwrap())
        .unwrap();
    assert_eq!(item.in_time.as_deref(), Some("09:15"));

    let clear = json!({"in_time": null});
    let item = harness
        .ledger
        .update_item_fields(id, clear.as_object().unwrap())
        .unwrap();
    assert!(item.in_time.is_none());
    assert_eq!(harness.ledger.get_item(id).unwrap().farmer_code.as_deref(), Some("F-7"));
}

#[test]
fn missing_item_update_is_not_found() {
    let harness = TestHarness::new();
    let fields = json!({"goods": "oats"});
    assert!(matches!(
        harness
            .ledger
            .update_item_fields(ItemId::new(3).unwrap(), fields.as_object().unwrap()),
        Err(StoreError::NotFound { entity: "item", .. })
    ));
}

// ============================================================================
// Corruption and concurrency
// ============================================================================

#[test]
fn wrong_header_is_corrupt_and_not_rewritten() {
    let harness = TestHarness::new();
    let bad = "id,invoice,supplier\n1,INV1,Acme\n";
    common::write_file(&harness.path("Bill.csv"), bad);

    let err = harness.ledger.list_bills().unwrap_err();
    assert!(matches!(err, StoreError::CorruptStore { .. }));
    assert_eq!(harness.read("Bill.csv"), bad.as_bytes());
}

#[test]
fn dangling_item_reference_is_not_listed() {
    let harness = TestHarness::new();
    harness.ledger.create_bill(single_item_bill("A", 1.0)).unwrap();
    let items = String::from_utf8(harness.read("Item.csv")).unwrap();
    let edited = items.replacen("\n1,1,", "\n1,9,", 1);
    common::write_file(&harness.path("Item.csv"), &edited);

    let joined = harness.ledger.list_bills_with_items().unwrap();
    assert_eq!(joined.len(), 1);
    assert!(joined[0].items.is_empty());
}

#[test]
fn held_lock_makes_writes_unavailable() {
    let harness = TestHarness::new();
    let held = WriteLock::acquire(&harness.path(".weighbill.lock")).unwrap();

    let err = harness.ledger.create_bill(acme_invoice()).unwrap_err();
    assert!(matches!(err, StoreError::StoreUnavailable { .. }));
    assert!(err.is_retryable());

    // Reads do not take the lock.
    assert!(harness.ledger.list_bills().unwrap().is_empty());

    drop(held);
    assert!(harness.ledger.create_bill(acme_invoice()).is_ok());
}

#[test]
fn lock_file_left_by_a_dead_writer_does_not_block() {
    let harness = TestHarness::new();
    common::write_file(&harness.path(".weighbill.lock"), "4194303\n");

    let created = harness.ledger.create_bill(acme_invoice()).unwrap();
    assert_eq!(created.bill.id, BillId::first());
    assert!(harness.path(".weighbill.lock").exists());
}

/// A `CsvStore` that lets another writer append to `Item.csv` right after
/// the item table is loaded, once.
struct InterleavedStore {
    inner: CsvStore,
    armed: AtomicBool,
}

impl RecordStore for InterleavedStore {
    fn location(&self) -> &Path {
        self.inner.location()
    }

    fn load<R: Record>(&self) -> weighbill_store::Result<Table<R>> {
        let loaded = self.inner.load::<R>()?;
        if R::TABLE == table::ITEM && self.armed.swap(false, Ordering::SeqCst) {
            let path = self.inner.location().join("Item.csv");
            let text = std::fs::read_to_string(&path).unwrap();
            let last = text.lines().last().unwrap();
            let extra = format!("3{}", &last[last.find(',').unwrap()..]);
            common::write_file(&path, &format!("{text}{extra}\n"));
        }
        Ok(loaded)
    }

    fn check<R: Record>(&self, table: &Table<R>) -> weighbill_store::Result<()> {
        self.inner.check(table)
    }

    fn save<R: Record>(&self, table: &mut Table<R>) -> weighbill_store::Result<()> {
        self.inner.save(table)
    }

    fn lock(&self) -> weighbill_store::Result<WriteLock> {
        self.inner.lock()
    }
}

#[test]
fn item_conflict_leaves_bill_table_untouched() {
    let harness = TestHarness::new();
    let created = harness.ledger.create_bill(acme_invoice()).unwrap();
    let bills_before = harness.read("Bill.csv");

    let ledger = Ledger::new(InterleavedStore {
        inner: CsvStore::open(&harness.dir).unwrap(),
        armed: AtomicBool::new(true),
    });
    let err = ledger.delete_bill(created.bill.id).unwrap_err();
    assert!(matches!(err, StoreError::ConcurrentWriteConflict { .. }));

    assert_eq!(harness.read("Bill.csv"), bills_before);
    assert!(harness.ledger.get_bill(created.bill.id).is_ok());
    let items = harness.ledger.list_items_by_bill(created.bill.id).unwrap();
    let ids: Vec<u64> = items.iter().map(|i| i.id.get()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn exhausted_bill_keys_fail_without_poisoning() {
    let harness = TestHarness::new();
    harness.ledger.create_bill(BillInput::new("INV2", "Acme")).unwrap();
    let bills = String::from_utf8(harness.read("Bill.csv")).unwrap();
    let edited = bills.replacen("\n1,", &format!("\n{},", u64::MAX), 1);
    common::write_file(&harness.path("Bill.csv"), &edited);

    let err = harness.ledger.create_bill(acme_invoice()).unwrap_err();
    assert!(matches!(err, StoreError::CorruptStore { .. }));

    let bills = harness.ledger.list_bills().unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0].id.get(), u64::MAX);
    assert!(harness.ledger.list_items_by_bill(bills[0].id).unwrap().is_empty());
}

#[test]
fn concurrent_writers_in_one_process_do_not_lose_rows() {
    let harness = TestHarness::new();
    let ledger = Arc::new(Ledger::open(&harness.dir).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for i in 0..5 {
                    ledger
                        .create_bill(single_item_bill(&format!("T{n}-{i}"), 1.0))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let bills = ledger.list_bills().unwrap();
    assert_eq!(bills.len(), 20);
    let mut ids: Vec<u64> = bills.iter().map(|b| b.id.get()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}
