mod ledger;

pub use ledger::{BulkReport, ConnectionLedger};
