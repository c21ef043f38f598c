use crate::domain::money::parse_reported_amount;
use crate::error::{Result, StorefrontError};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One credit line of a bank statement export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementEntry {
    pub content: String,
    pub transfer_amount: String,
    #[serde(default)]
    pub transaction_date: Option<String>,
}

impl StatementEntry {
    /// The credited amount, parsed the same way as webhook amounts.
    pub fn amount(&self) -> Result<Decimal> {
        parse_reported_amount(&self.transfer_amount).ok_or_else(|| {
            StorefrontError::ValidationError(format!(
                "Invalid transfer amount '{}'",
                self.transfer_amount
            ))
        })
    }
}

/// Reads `content,transferAmount[,transactionDate]` rows from a CSV source.
///
/// Whitespace is trimmed and the date column may be omitted.
pub struct StatementReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> StatementReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes entries, one `Result` per row.
    pub fn entries(self) -> impl Iterator<Item = Result<StatementEntry>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(StorefrontError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "content, transferAmount, transactionDate\n\
                    CK DH123456789, 45.00, 2024-05-01\n\
                    \"hello, DH42\", 10";
        let entries: Vec<Result<StatementEntry>> =
            StatementReader::new(data.as_bytes()).entries().collect();

        assert_eq!(entries.len(), 2);
        let first = entries[0].as_ref().unwrap();
        assert_eq!(first.content, "CK DH123456789");
        assert_eq!(first.amount().unwrap(), dec!(45.00));
        assert_eq!(first.transaction_date.as_deref(), Some("2024-05-01"));

        let second = entries[1].as_ref().unwrap();
        assert_eq!(second.content, "hello, DH42");
        assert_eq!(second.transaction_date, None);
    }

    #[test]
    fn test_invalid_amount() {
        let data = "content,transferAmount\nDH1,abc\nDH2,-5";
        for entry in StatementReader::new(data.as_bytes()).entries() {
            assert!(entry.unwrap().amount().is_err());
        }
    }

    #[test]
    fn test_scientific_amount() {
        let data = "content,transferAmount\nDH1,4.5e1\nDH2,79000000000000000000000000000";
        let amounts: Vec<Decimal> = StatementReader::new(data.as_bytes())
            .entries()
            .map(|entry| entry.unwrap().amount().unwrap())
            .collect();

        assert_eq!(amounts[0], dec!(45));
        assert_eq!(amounts[1].to_string(), "79000000000000000000000000000");
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "content,transferAmount\nonly-one-column";
        let entries: Vec<Result<StatementEntry>> =
            StatementReader::new(data.as_bytes()).entries().collect();

        assert!(entries[0].is_err());
    }
}
