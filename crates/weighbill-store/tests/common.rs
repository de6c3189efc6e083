//! Common test utilities for weighbill-store integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::path::{Path, PathBuf};
use std::sync::Once;

use tempfile::TempDir;

use weighbill_core::{BillInput, ItemInput};
use weighbill_store::Ledger;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn,weighbill_store=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Test harness holding a ledger in a fresh temporary directory.
pub struct TestHarness {
    /// The ledger under test.
    pub ledger: Ledger,
    /// Ledger directory.
    pub dir: PathBuf,
    /// Temporary directory (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a harness with an empty ledger.
    pub fn new() -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("ledger");
        let ledger = Ledger::open(&dir).expect("Failed to open ledger");
        Self {
            ledger,
            dir,
            _temp_dir: temp_dir,
        }
    }

    /// Path of a file inside the ledger directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Raw bytes of a ledger file.
    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.path(name)).expect("Failed to read ledger file")
    }

    /// Scratch path outside the ledger directory.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// The two-item invoice used across tests: (10 × 5) and (3 × 2).
pub fn acme_invoice() -> BillInput {
    BillInput::new("INV1", "Acme")
        .with_item(ItemInput::new("wheat", 10.0, 5.0).with_weights(1000.0, 1500.0))
        .with_item(ItemInput::new("rice", 3.0, 2.0).with_weights(800.0, 950.0))
}

/// A bill with one item of quantity `qty` at rate 1.
pub fn single_item_bill(invoice: &str, qty: f64) -> BillInput {
    BillInput::new(invoice, "Acme").with_item(ItemInput::new("wheat", qty, 1.0))
}

/// Write `text` to `path`.
pub fn write_file(path: &Path, text: &str) {
    std::fs::write(path, text).expect("Failed to write file");
}
