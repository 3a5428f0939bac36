use crate::domain::payment::{Payment, PaymentId, PaymentStatus, ProjectId};
use crate::error::{ApprovalError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct PaymentRow<'a> {
    payment: PaymentId,
    project: ProjectId,
    period: &'a str,
    total_amount: Decimal,
    status: PaymentStatus,
    approval_progress: u32,
    total_approvals_required: u32,
    notes: &'a str,
}

/// Writes the final payment table as CSV.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    /// Writes one row per payment, ordered by payment id.
    pub fn write_payments(&mut self, mut payments: Vec<Payment>) -> Result<()> {
        payments.sort_by_key(|p| p.id);
        for payment in &payments {
            self.writer.serialize(PaymentRow {
                payment: payment.id,
                project: payment.project,
                period: &payment.period,
                total_amount: payment.total_amount.normalize(),
                status: payment.status,
                approval_progress: payment.approval_progress,
                total_approvals_required: payment.total_approvals_required,
                notes: &payment.notes,
            })?;
        }
        self.writer.flush().map_err(ApprovalError::from)
    }
}
