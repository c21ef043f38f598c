pub mod report_writer;
pub mod statement_reader;
