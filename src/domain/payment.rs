use crate::error::{ApprovalError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type PaymentId = u32;
pub type ProjectId = u32;

/// Lifecycle status of a payment state ("estado de pago").
///
/// Serialized with the labels stored in the payment table.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum PaymentStatus {
    #[default]
    Pendiente,
    Enviado,
    #[serde(rename = "En Revisión")]
    EnRevision,
    Aprobado,
    Rechazado,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Aprobado | PaymentStatus::Rechazado)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pendiente => "Pendiente",
            PaymentStatus::Enviado => "Enviado",
            PaymentStatus::EnRevision => "En Revisión",
            PaymentStatus::Aprobado => "Aprobado",
            PaymentStatus::Rechazado => "Rechazado",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One billing-period submission by a contractor for a project.
///
/// `version` is bumped on every status write and is what concurrent
/// approvers compare against before overwriting the aggregate fields.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub project: ProjectId,
    /// Month/year label of the billed period.
    pub period: String,
    pub total_amount: Decimal,
    pub status: PaymentStatus,
    pub notes: String,
    pub approval_progress: u32,
    pub total_approvals_required: u32,
    #[serde(default)]
    pub version: u64,
}

impl Payment {
    pub fn new(
        id: PaymentId,
        project: ProjectId,
        period: impl Into<String>,
        total_amount: Decimal,
    ) -> Result<Self> {
        if total_amount < Decimal::ZERO {
            return Err(ApprovalError::ValidationError(format!(
                "Payment {} has a negative amount",
                id
            )));
        }
        Ok(Self {
            id,
            project,
            period: period.into(),
            total_amount,
            status: PaymentStatus::Pendiente,
            notes: String::new(),
            approval_progress: 0,
            total_approvals_required: 1,
            version: 0,
        })
    }
}
