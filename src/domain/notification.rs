use super::approval::ApproverEmail;
use super::payment::{PaymentId, PaymentStatus};

#[derive(Debug, PartialEq, Clone)]
pub enum Recipients {
    /// The contractor that submitted the payment.
    Contractor,
    Approvers(Vec<ApproverEmail>),
}

/// A status-change message for the external mail service.
#[derive(Debug, PartialEq, Clone)]
pub struct Notification {
    pub payment_id: PaymentId,
    pub recipients: Recipients,
    pub status: PaymentStatus,
    pub rejection_reason: Option<String>,
}
