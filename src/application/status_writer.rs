use crate::domain::identity::{AccessLevel, Approver};
use crate::domain::ports::{
    PaymentStoreRef, PrivilegedChannelRef, PrivilegedStatusRequest, StatusUpdate,
};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Applies the aggregate status to a payment record.
///
/// Implementations write with compare-and-set semantics against
/// `expected_version` and return the payment's new version.
#[async_trait]
pub trait StatusWriter: Send + Sync {
    async fn apply_status(
        &self,
        update: StatusUpdate,
        approver: &Approver,
        expected_version: u64,
    ) -> Result<u64>;
}

/// Writes straight to the payment table.
pub struct DirectStatusWriter {
    payments: PaymentStoreRef,
}

impl DirectStatusWriter {
    pub fn new(payments: PaymentStoreRef) -> Self {
        Self { payments }
    }
}

#[async_trait]
impl StatusWriter for DirectStatusWriter {
    async fn apply_status(
        &self,
        update: StatusUpdate,
        _approver: &Approver,
        expected_version: u64,
    ) -> Result<u64> {
        self.payments
            .compare_and_set_status(update, expected_version)
            .await
    }
}

/// Routes the write through the privileged service boundary, forwarding
/// the approver identity and grant so the service can authorize it.
pub struct PrivilegedStatusWriter {
    channel: PrivilegedChannelRef,
}

impl PrivilegedStatusWriter {
    pub fn new(channel: PrivilegedChannelRef) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl StatusWriter for PrivilegedStatusWriter {
    async fn apply_status(
        &self,
        update: StatusUpdate,
        approver: &Approver,
        expected_version: u64,
    ) -> Result<u64> {
        let grant = match &approver.access {
            AccessLevel::Scoped { grant } => grant.clone(),
            AccessLevel::Direct => String::new(),
        };
        self.channel
            .update_status(PrivilegedStatusRequest {
                update,
                approver: approver.email.clone(),
                grant,
                expected_version,
            })
            .await
    }
}

/// Both write paths, selected per call by the approver's access level.
#[derive(Clone)]
pub struct StatusWriters {
    direct: Arc<dyn StatusWriter>,
    privileged: Arc<dyn StatusWriter>,
}

impl StatusWriters {
    pub fn new(direct: Arc<dyn StatusWriter>, privileged: Arc<dyn StatusWriter>) -> Self {
        Self { direct, privileged }
    }

    pub fn from_ports(payments: PaymentStoreRef, channel: PrivilegedChannelRef) -> Self {
        Self::new(
            Arc::new(DirectStatusWriter::new(payments)),
            Arc::new(PrivilegedStatusWriter::new(channel)),
        )
    }

    pub fn for_access(&self, access: &AccessLevel) -> &dyn StatusWriter {
        match access {
            AccessLevel::Direct => self.direct.as_ref(),
            AccessLevel::Scoped { .. } => self.privileged.as_ref(),
        }
    }
}
