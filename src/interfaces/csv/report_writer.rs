use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// One line of a reconciliation report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationRow {
    pub content: String,
    pub amount: String,
    pub reference: Option<String>,
    pub outcome: String,
}

#[derive(Debug, Serialize)]
struct OrderRow {
    order_id: String,
    owner_id: String,
    payment_code: String,
    subtotal: String,
    total: String,
    status: &'static str,
    created_at: String,
    settled_at: Option<String>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.to_string(),
            owner_id: order.owner_id.to_string(),
            payment_code: order.payment_code.to_string(),
            subtotal: order.subtotal.to_string(),
            total: order.total_amount.to_string(),
            status: order.status.as_str(),
            created_at: order.created_at.to_rfc3339(),
            settled_at: order.settled_at().map(|at| at.to_rfc3339()),
        }
    }
}

/// Writes reconciliation results as CSV with a header row.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_row(&mut self, row: &ReconciliationRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes every given order as one CSV line.
pub fn write_orders<'a, W: Write>(sink: W, orders: impl IntoIterator<Item = &'a Order>) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    let mut written = 0;
    for order in orders {
        writer.serialize(OrderRow::from(order))?;
        written += 1;
    }
    if written == 0 {
        writer.write_record([
            "order_id",
            "owner_id",
            "payment_code",
            "subtotal",
            "total",
            "status",
            "created_at",
            "settled_at",
        ])?;
    }
    writer.flush()?;
    Ok(())
}
