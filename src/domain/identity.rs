use super::approval::ApproverEmail;
use crate::error::Result;

/// How the acting approver is allowed to write the payment record.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AccessLevel {
    /// Authenticated user with write access to payments.
    Direct,
    /// External reviewer acting through a temporary grant from an e-mailed link.
    Scoped { grant: String },
}

/// The caller of an approval operation.
#[derive(Debug, PartialEq, Clone)]
pub struct Approver {
    pub email: ApproverEmail,
    pub name: Option<String>,
    pub access: AccessLevel,
}

impl Approver {
    pub fn new(email: &str, name: Option<&str>, access: AccessLevel) -> Result<Self> {
        Ok(Self {
            email: ApproverEmail::new(email)?,
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            access,
        })
    }

    pub fn direct(email: &str, name: Option<&str>) -> Result<Self> {
        Self::new(email, name, AccessLevel::Direct)
    }

    pub fn scoped(email: &str, name: Option<&str>, grant: impl Into<String>) -> Result<Self> {
        Self::new(
            email,
            name,
            AccessLevel::Scoped {
                grant: grant.into(),
            },
        )
    }
}
