use crate::domain::approval::{ApprovalRecord, Decision};
use crate::domain::identity::Approver;
use crate::domain::payment::PaymentId;
use crate::domain::ports::ApprovalStoreRef;
use crate::error::Result;
use chrono::Utc;

/// Durable record of each approver's decision on a payment.
#[derive(Clone)]
pub struct ApprovalLedger {
    store: ApprovalStoreRef,
}

impl ApprovalLedger {
    pub fn new(store: ApprovalStoreRef) -> Self {
        Self { store }
    }

    /// Records `approver`'s latest decision and returns how many approvers
    /// currently have an approval on file for the payment.
    ///
    /// The count is read after the write completes, so it always includes
    /// the decision just recorded.
    pub async fn record_decision(
        &self,
        payment_id: PaymentId,
        approver: &Approver,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<u32> {
        let record = ApprovalRecord {
            payment_id,
            approver_email: approver.email.clone(),
            approver_name: approver.name.clone(),
            decision,
            notes: notes.filter(|n| !n.trim().is_empty()),
            approved_at: (decision == Decision::Approved).then(Utc::now),
        };
        self.store.upsert(record).await?;

        tracing::debug!(payment_id, approver = %approver.email, ?decision, "decision recorded");
        self.approved_count(payment_id).await
    }

    pub async fn approved_count(&self, payment_id: PaymentId) -> Result<u32> {
        let records = self.store.list(payment_id).await?;
        Ok(records.iter().filter(|r| r.is_approved()).count() as u32)
    }

    pub async fn records(&self, payment_id: PaymentId) -> Result<Vec<ApprovalRecord>> {
        self.store.list(payment_id).await
    }

    /// Drops every decision for the payment, starting a fresh round.
    pub async fn reset(&self, payment_id: PaymentId) -> Result<()> {
        self.store.clear(payment_id).await
    }
}
