/// Native module contains implementations of core traits
/// on top of the host OS: processes are spawned directly and
/// the ledger lives in a plain file.
pub mod ledger;
pub mod runner;
