use super::approval::{ApprovalRecord, ApproverEmail};
use super::config::ProjectApprovalConfig;
use super::notification::Notification;
use super::payment::{Payment, PaymentId, PaymentStatus, ProjectId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The four aggregate fields written on every approval action.
#[derive(Debug, PartialEq, Clone)]
pub struct StatusUpdate {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub notes: String,
    pub approval_progress: u32,
    pub total_required: u32,
}

/// Request sent through the privileged service boundary on behalf of a
/// caller that cannot write payments directly.
#[derive(Debug, PartialEq, Clone)]
pub struct PrivilegedStatusRequest {
    pub update: StatusUpdate,
    pub approver: ApproverEmail,
    pub grant: String,
    pub expected_version: u64,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>>;
    async fn get_all(&self) -> Result<Vec<Payment>>;
    /// Applies `update` only if the stored version equals `expected_version`.
    ///
    /// Returns the new version, or `ApprovalError::Conflict` when another
    /// writer got there first.
    async fn compare_and_set_status(&self, update: StatusUpdate, expected_version: u64)
    -> Result<u64>;
}

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Inserts or replaces the record keyed by `(payment_id, approver_email)`.
    async fn upsert(&self, record: ApprovalRecord) -> Result<()>;
    async fn list(&self, payment_id: PaymentId) -> Result<Vec<ApprovalRecord>>;
    async fn clear(&self, payment_id: PaymentId) -> Result<()>;
}

#[async_trait]
pub trait ApprovalConfigStore: Send + Sync {
    async fn get(&self, project: ProjectId) -> Result<Option<ProjectApprovalConfig>>;
    async fn put(&self, config: ProjectApprovalConfig) -> Result<()>;
}

#[async_trait]
pub trait PrivilegedChannel: Send + Sync {
    /// Returns the new payment version on success.
    async fn update_status(&self, request: PrivilegedStatusRequest) -> Result<u64>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}

pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type ApprovalStoreRef = Arc<dyn ApprovalStore>;
pub type ApprovalConfigStoreRef = Arc<dyn ApprovalConfigStore>;
pub type PrivilegedChannelRef = Arc<dyn PrivilegedChannel>;
pub type NotifierRef = Arc<dyn Notifier>;
