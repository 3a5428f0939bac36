use crate::domain::approval::{ApprovalRecord, ApproverEmail};
use crate::domain::config::ProjectApprovalConfig;
use crate::domain::notification::Notification;
use crate::domain::payment::{Payment, PaymentId, ProjectId};
use crate::domain::ports::{
    ApprovalConfigStore, ApprovalStore, Notifier, PaymentStore, PaymentStoreRef,
    PrivilegedChannel, PrivilegedStatusRequest, StatusUpdate,
};
use crate::error::{ApprovalError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};

/// A thread-safe in-memory store for payments.
///
/// The compare-and-set runs under the write lock, so two approvers racing on
/// the same payment are serialized and the loser sees a version mismatch.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&payment_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut all: Vec<Payment> = payments.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }

    async fn compare_and_set_status(
        &self,
        update: StatusUpdate,
        expected_version: u64,
    ) -> Result<u64> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(&update.payment_id)
            .ok_or_else(|| ApprovalError::NotFound(format!("payment {}", update.payment_id)))?;

        if payment.version != expected_version {
            return Err(ApprovalError::Conflict(update.payment_id));
        }

        apply_update(payment, update);
        Ok(payment.version)
    }
}

pub(crate) fn apply_update(payment: &mut Payment, update: StatusUpdate) {
    payment.status = update.status;
    payment.notes = update.notes;
    payment.approval_progress = update.approval_progress;
    payment.total_approvals_required = update.total_required;
    payment.version += 1;
    debug_assert!(
        payment.status.is_terminal()
            || payment.approval_progress <= payment.total_approvals_required,
        "payment {} in {} with progress {}/{}",
        payment.id,
        payment.status,
        payment.approval_progress,
        payment.total_approvals_required
    );
}

/// In-memory approval ledger keyed by `(payment, approver email)`.
#[derive(Default, Clone)]
pub struct InMemoryApprovalStore {
    records: Arc<RwLock<BTreeMap<(PaymentId, ApproverEmail), ApprovalRecord>>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn upsert(&self, record: ApprovalRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert((record.payment_id, record.approver_email.clone()), record);
        Ok(())
    }

    async fn list(&self, payment_id: PaymentId) -> Result<Vec<ApprovalRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|((id, _), _)| *id == payment_id)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn clear(&self, payment_id: PaymentId) -> Result<()> {
        let mut records = self.records.write().await;
        records.retain(|(id, _), _| *id != payment_id);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryApprovalConfigStore {
    configs: Arc<RwLock<HashMap<ProjectId, ProjectApprovalConfig>>>,
}

impl InMemoryApprovalConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalConfigStore for InMemoryApprovalConfigStore {
    async fn get(&self, project: ProjectId) -> Result<Option<ProjectApprovalConfig>> {
        let configs = self.configs.read().await;
        Ok(configs.get(&project).cloned())
    }

    async fn put(&self, config: ProjectApprovalConfig) -> Result<()> {
        let mut configs = self.configs.write().await;
        configs.insert(config.project, config);
        Ok(())
    }
}

/// Stand-in for the service-role endpoint that scoped reviewers go through.
///
/// It holds its own handle on the payment store and refuses requests
/// without a grant. Accepted requests are only kept when built with
/// `recording`.
#[derive(Clone)]
pub struct InProcessPrivilegedService {
    payments: PaymentStoreRef,
    calls: Option<Arc<RwLock<Vec<PrivilegedStatusRequest>>>>,
}

impl InProcessPrivilegedService {
    pub fn new(payments: PaymentStoreRef) -> Self {
        Self {
            payments,
            calls: None,
        }
    }

    /// Like `new`, but keeps every accepted request for inspection.
    pub fn recording(payments: PaymentStoreRef) -> Self {
        Self {
            payments,
            calls: Some(Arc::new(RwLock::new(Vec::new()))),
        }
    }

    /// Requests accepted so far, oldest first. Always empty unless the
    /// service was built with `recording`.
    pub async fn calls(&self) -> Vec<PrivilegedStatusRequest> {
        match &self.calls {
            Some(calls) => calls.read().await.clone(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl PrivilegedChannel for InProcessPrivilegedService {
    async fn update_status(&self, request: PrivilegedStatusRequest) -> Result<u64> {
        if request.grant.trim().is_empty() {
            return Err(ApprovalError::AccessDenied(format!(
                "{} has no grant for payment {}",
                request.approver, request.update.payment_id
            )));
        }

        let version = self
            .payments
            .compare_and_set_status(request.update.clone(), request.expected_version)
            .await?;
        if let Some(calls) = &self.calls {
            calls.write().await.push(request);
        }
        Ok(version)
    }
}

/// Notifier that hands every notification to a channel receiver.
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        self.sender.send(notification).map_err(|e| {
            ApprovalError::InternalError(Box::new(std::io::Error::other(format!(
                "Notification channel closed: {}",
                e
            ))))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::approval::Decision;
    use crate::domain::payment::PaymentStatus;
    use rust_decimal_macros::dec;

    fn record(payment_id: PaymentId, email: &str, decision: Decision) -> ApprovalRecord {
        ApprovalRecord {
            payment_id,
            approver_email: ApproverEmail::new(email).unwrap(),
            approver_name: None,
            decision,
            notes: None,
            approved_at: None,
        }
    }

    fn update(payment_id: PaymentId, progress: u32) -> StatusUpdate {
        StatusUpdate {
            payment_id,
            status: PaymentStatus::EnRevision,
            notes: String::new(),
            approval_progress: progress,
            total_required: 3,
        }
    }

    #[tokio::test]
    async fn test_in_memory_payment_store() {
        let store = InMemoryPaymentStore::new();
        let payment = Payment::new(1, 7, "2024-05", dec!(100.0)).unwrap();

        store.insert(payment.clone()).await.unwrap();
        let retrieved = store.get(1).await.unwrap().unwrap();
        assert_eq!(retrieved, payment);

        assert!(store.get(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compare_and_set_rejects_stale_version() {
        let store = InMemoryPaymentStore::new();
        store
            .insert(Payment::new(1, 7, "2024-05", dec!(100.0)).unwrap())
            .await
            .unwrap();

        let version = store.compare_and_set_status(update(1, 1), 0).await.unwrap();
        assert_eq!(version, 1);

        let stale = store.compare_and_set_status(update(1, 2), 0).await;
        assert!(matches!(stale, Err(ApprovalError::Conflict(1))));

        let stored = store.get(1).await.unwrap().unwrap();
        assert_eq!(stored.approval_progress, 1);
        assert_eq!(stored.status, PaymentStatus::EnRevision);
    }

    #[tokio::test]
    async fn test_compare_and_set_missing_payment() {
        let store = InMemoryPaymentStore::new();
        let result = store.compare_and_set_status(update(9, 1), 0).await;
        assert!(matches!(result, Err(ApprovalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_approval_store_keeps_one_record_per_approver() {
        let store = InMemoryApprovalStore::new();
        store
            .upsert(record(1, "alice@x.com", Decision::Rejected))
            .await
            .unwrap();
        store
            .upsert(record(1, "ALICE@x.com ", Decision::Approved))
            .await
            .unwrap();
        store
            .upsert(record(2, "alice@x.com", Decision::Approved))
            .await
            .unwrap();

        let records = store.list(1).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Approved);

        store.clear(1).await.unwrap();
        assert!(store.list(1).await.unwrap().is_empty());
        assert_eq!(store.list(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_privileged_service_requires_grant() {
        let payments = InMemoryPaymentStore::new();
        payments
            .insert(Payment::new(1, 7, "2024-05", dec!(100.0)).unwrap())
            .await
            .unwrap();
        let service = InProcessPrivilegedService::recording(Arc::new(payments.clone()));

        let request = PrivilegedStatusRequest {
            update: update(1, 1),
            approver: ApproverEmail::new("ext@x.com").unwrap(),
            grant: "  ".to_string(),
            expected_version: 0,
        };
        let denied = service.update_status(request.clone()).await;
        assert!(matches!(denied, Err(ApprovalError::AccessDenied(_))));
        assert!(service.calls().await.is_empty());

        let granted = PrivilegedStatusRequest {
            grant: "token-123".to_string(),
            ..request
        };
        assert_eq!(service.update_status(granted).await.unwrap(), 1);
        assert_eq!(service.calls().await.len(), 1);
        assert_eq!(payments.get(1).await.unwrap().unwrap().approval_progress, 1);
    }

    #[tokio::test]
    async fn test_privileged_service_does_not_record_by_default() {
        let payments = InMemoryPaymentStore::new();
        payments
            .insert(Payment::new(1, 7, "2024-05", dec!(100.0)).unwrap())
            .await
            .unwrap();
        let service = InProcessPrivilegedService::new(Arc::new(payments.clone()));

        let request = PrivilegedStatusRequest {
            update: update(1, 1),
            approver: ApproverEmail::new("ext@x.com").unwrap(),
            grant: "token-123".to_string(),
            expected_version: 0,
        };
        assert_eq!(service.update_status(request).await.unwrap(), 1);
        assert!(service.calls().await.is_empty());
        assert_eq!(payments.get(1).await.unwrap().unwrap().version, 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "with progress 4/3")]
    fn test_apply_update_catches_overshooting_review() {
        let mut payment = Payment::new(1, 7, "2024-05", dec!(100.0)).unwrap();
        apply_update(&mut payment, update(1, 4));
    }
}
