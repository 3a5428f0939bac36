use super::payment::PaymentId;
use crate::error::{ApprovalError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum Decision {
    #[serde(rename = "Aprobado")]
    Approved,
    #[serde(rename = "Rechazado")]
    Rejected,
}

/// An approver e-mail normalized to its identity form (trimmed, lower-case).
///
/// Two spellings of the same address always compare equal, which is what
/// keeps the ledger at one record per approver.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ApproverEmail(String);

impl ApproverEmail {
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() || !normalized.contains('@') {
            return Err(ApprovalError::ValidationError(format!(
                "Invalid approver email: {:?}",
                raw
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApproverEmail {
    type Error = ApprovalError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<ApproverEmail> for String {
    fn from(email: ApproverEmail) -> Self {
        email.0
    }
}

impl fmt::Display for ApproverEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One approver's decision on one payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ApprovalRecord {
    pub payment_id: PaymentId,
    pub approver_email: ApproverEmail,
    pub approver_name: Option<String>,
    pub decision: Decision,
    pub notes: Option<String>,
    /// Only set for approvals.
    pub approved_at: Option<DateTime<Utc>>,
}

impl ApprovalRecord {
    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        let a = ApproverEmail::new("  Alice@X.com ").unwrap();
        let b = ApproverEmail::new("alice@x.com").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "alice@x.com");
    }

    #[test]
    fn test_email_validation() {
        assert!(matches!(
            ApproverEmail::new("   "),
            Err(ApprovalError::ValidationError(_))
        ));
        assert!(matches!(
            ApproverEmail::new("not-an-email"),
            Err(ApprovalError::ValidationError(_))
        ));
    }

    #[test]
    fn test_email_deserialization_normalizes() {
        let email: ApproverEmail = serde_json::from_str("\" BOB@x.com\"").unwrap();
        assert_eq!(email.as_str(), "bob@x.com");
    }

    #[test]
    fn test_decision_labels() {
        let json = serde_json::to_string(&Decision::Approved).unwrap();
        assert_eq!(json, "\"Aprobado\"");
    }
}
