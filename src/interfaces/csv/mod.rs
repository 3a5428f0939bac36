pub mod decision_reader;
pub mod payment_writer;
