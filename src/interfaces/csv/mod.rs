pub mod ledger_writer;
pub mod offer_reader;
