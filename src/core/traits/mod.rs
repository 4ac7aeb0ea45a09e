pub mod ledger;
pub mod runner;
