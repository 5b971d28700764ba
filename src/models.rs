pub mod catalog;
pub mod dashboard;
pub mod ledger;
