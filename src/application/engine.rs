use crate::application::config_resolver::ConfigResolver;
use crate::application::ledger::ApprovalLedger;
use crate::application::notify::Dispatcher;
use crate::application::status_writer::{StatusWriter, StatusWriters};
use crate::domain::approval::{ApprovalRecord, ApproverEmail, Decision};
use crate::domain::identity::Approver;
use crate::domain::notification::{Notification, Recipients};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{
    ApprovalConfigStoreRef, ApprovalStoreRef, NotifierRef, PaymentStoreRef, PrivilegedChannelRef,
    StatusUpdate,
};
use crate::error::{ApprovalError, Result};
use chrono::{DateTime, Utc};

/// How many times a status write is recomputed after losing a race.
pub const MAX_STATUS_RETRIES: usize = 5;

/// An approver's decision as submitted by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub decision: Decision,
    pub notes: Option<String>,
}

impl DecisionRequest {
    pub fn approve(notes: Option<&str>) -> Self {
        Self {
            decision: Decision::Approved,
            notes: notes.map(str::to_string),
        }
    }

    pub fn reject(reason: &str) -> Self {
        Self {
            decision: Decision::Rejected,
            notes: Some(reason.to_string()),
        }
    }
}

/// Result of one approval action, including the text shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalOutcome {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub approval_progress: u32,
    pub required_approvals: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub email: ApproverEmail,
    pub name: Option<String>,
    /// Position in the configured approver list; `None` for approvers that
    /// decided without being configured.
    pub order: Option<u32>,
    pub decision: Option<Decision>,
    pub notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalSummary {
    pub payment: Payment,
    pub entries: Vec<SummaryEntry>,
}

pub fn progress_message(current: u32, required: u32) -> String {
    format!("{}/{} aprobaciones completadas", current, required)
}

/// Orchestrates the multi-approver workflow of a payment.
///
/// Every decision is a threshold recomputed from the whole ledger: a
/// rejection by anyone rejects the payment, and approvals promote it once
/// the number of approvers on file reaches the project's requirement.
/// Replaying a decision recomputes the same result.
///
/// The status write is a compare-and-set on the payment version observed
/// before the approval count was read, so concurrent approvers cannot
/// overwrite each other with a stale count.
pub struct ApprovalEngine {
    payments: PaymentStoreRef,
    ledger: ApprovalLedger,
    resolver: ConfigResolver,
    writers: StatusWriters,
    dispatcher: Dispatcher,
}

impl ApprovalEngine {
    pub fn new(
        payments: PaymentStoreRef,
        ledger: ApprovalLedger,
        resolver: ConfigResolver,
        writers: StatusWriters,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            payments,
            ledger,
            resolver,
            writers,
            dispatcher,
        }
    }

    /// Wires an engine from the raw ports.
    pub fn from_ports(
        payments: PaymentStoreRef,
        approvals: ApprovalStoreRef,
        configs: ApprovalConfigStoreRef,
        privileged: PrivilegedChannelRef,
        notifier: NotifierRef,
    ) -> Self {
        Self::new(
            payments.clone(),
            ApprovalLedger::new(approvals),
            ConfigResolver::new(configs),
            StatusWriters::from_ports(payments, privileged),
            Dispatcher::new(notifier),
        )
    }

    /// Stores a new payment unless one with the same id exists.
    ///
    /// Returns whether the payment was inserted.
    pub async fn register_payment(&self, payment: Payment) -> Result<bool> {
        if self.payments.get(payment.id).await?.is_some() {
            return Ok(false);
        }
        self.payments.insert(payment).await?;
        Ok(true)
    }

    /// Starts a new approval round: prior decisions are discarded, the
    /// payment moves to `Enviado` and the configured approvers are notified.
    pub async fn submit_for_approval(&self, payment_id: PaymentId) -> Result<Payment> {
        let payment = self.load(payment_id).await?;
        if payment.status == PaymentStatus::Aprobado {
            return Err(ApprovalError::ValidationError(format!(
                "Payment {} is already approved",
                payment_id
            )));
        }

        let policy = self.resolver.resolve(payment.project).await?;
        self.ledger.reset(payment_id).await?;

        let update = StatusUpdate {
            payment_id,
            status: PaymentStatus::Enviado,
            notes: String::new(),
            approval_progress: 0,
            total_required: policy.required_approvals,
        };
        let mut version = payment.version;
        let mut attempt = 1;
        loop {
            match self
                .payments
                .compare_and_set_status(update.clone(), version)
                .await
            {
                Ok(_) => break,
                Err(ApprovalError::Conflict(_)) if attempt < MAX_STATUS_RETRIES => {
                    attempt += 1;
                    version = self.load(payment_id).await?.version;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            payment_id,
            required = policy.required_approvals,
            "payment submitted for approval"
        );

        let approvers: Vec<ApproverEmail> = self
            .resolver
            .approvers(payment.project)
            .await?
            .into_iter()
            .map(|a| a.email)
            .collect();
        if approvers.is_empty() {
            tracing::debug!(payment_id, "no approvers configured, nobody to notify");
        } else {
            self.dispatcher.dispatch(Notification {
                payment_id,
                recipients: Recipients::Approvers(approvers),
                status: PaymentStatus::Enviado,
                rejection_reason: None,
            });
        }

        self.load(payment_id).await
    }

    /// Records `approver`'s decision and recomputes the payment status.
    pub async fn decide(
        &self,
        payment_id: PaymentId,
        approver: &Approver,
        request: DecisionRequest,
    ) -> Result<ApprovalOutcome> {
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if request.decision == Decision::Rejected && notes.is_none() {
            return Err(ApprovalError::ValidationError(
                "A rejection requires a reason".to_string(),
            ));
        }

        let payment = self.load(payment_id).await?;
        let policy = self.resolver.resolve(payment.project).await?;
        if policy.order_matters {
            tracing::debug!(payment_id, "approval order configured but not enforced");
        }

        let mut observed_version = payment.version;
        let mut approved = self
            .ledger
            .record_decision(payment_id, approver, request.decision, notes.clone())
            .await?;

        let writer: &dyn StatusWriter = self.writers.for_access(&approver.access);
        let mut attempt = 1;
        let update = loop {
            let update = aggregate(
                payment_id,
                request.decision,
                approved,
                policy.required_approvals,
                notes.clone(),
            );
            match writer
                .apply_status(update.clone(), approver, observed_version)
                .await
            {
                Ok(_) => break update,
                Err(ApprovalError::Conflict(_)) if attempt < MAX_STATUS_RETRIES => {
                    attempt += 1;
                    tracing::debug!(payment_id, attempt, "status write lost a race, recomputing");
                    observed_version = self.load(payment_id).await?.version;
                    approved = self.ledger.approved_count(payment_id).await?;
                }
                Err(e) => return Err(e),
            }
        };

        tracing::info!(
            payment_id,
            approver = %approver.email,
            status = %update.status,
            progress = update.approval_progress,
            required = policy.required_approvals,
            "payment status updated"
        );

        let message = match update.status {
            PaymentStatus::Aprobado => {
                self.dispatcher.dispatch(Notification {
                    payment_id,
                    recipients: Recipients::Contractor,
                    status: PaymentStatus::Aprobado,
                    rejection_reason: None,
                });
                "Estado de pago aprobado".to_string()
            }
            PaymentStatus::Rechazado => {
                self.dispatcher.dispatch(Notification {
                    payment_id,
                    recipients: Recipients::Contractor,
                    status: PaymentStatus::Rechazado,
                    rejection_reason: notes,
                });
                "Estado de pago rechazado".to_string()
            }
            _ => update.notes.clone(),
        };

        Ok(ApprovalOutcome {
            payment_id,
            status: update.status,
            approval_progress: update.approval_progress,
            required_approvals: policy.required_approvals,
            message,
        })
    }

    /// Current status plus each approver's standing, configured approvers
    /// first in approval order.
    pub async fn summary(&self, payment_id: PaymentId) -> Result<ApprovalSummary> {
        let payment = self.load(payment_id).await?;
        let configured = self.resolver.approvers(payment.project).await?;
        let mut records: Vec<ApprovalRecord> = self.ledger.records(payment_id).await?;

        let mut entries = Vec::with_capacity(configured.len() + records.len());
        for approver in configured {
            let record = records
                .iter()
                .position(|r| r.approver_email == approver.email)
                .map(|i| records.remove(i));
            entries.push(SummaryEntry {
                name: record
                    .as_ref()
                    .and_then(|r| r.approver_name.clone())
                    .or(approver.name),
                email: approver.email,
                order: Some(approver.order),
                decision: record.as_ref().map(|r| r.decision),
                notes: record.as_ref().and_then(|r| r.notes.clone()),
                approved_at: record.and_then(|r| r.approved_at),
            });
        }
        entries.extend(records.into_iter().map(|r| SummaryEntry {
            email: r.approver_email,
            name: r.approver_name,
            order: None,
            decision: Some(r.decision),
            notes: r.notes,
            approved_at: r.approved_at,
        }));

        Ok(ApprovalSummary { payment, entries })
    }

    pub async fn payment(&self, payment_id: PaymentId) -> Result<Payment> {
        self.load(payment_id).await
    }

    /// Returns every payment, ordered by id.
    pub async fn payments(&self) -> Result<Vec<Payment>> {
        let mut payments = self.payments.get_all().await?;
        payments.sort_by_key(|p| p.id);
        Ok(payments)
    }

    /// Waits for every notification dispatched so far to finish.
    ///
    /// Decisions never wait on delivery; call this before shutting the
    /// runtime down so pending notifications are not dropped.
    pub async fn drain_notifications(&self) {
        self.dispatcher.drain().await;
    }

    async fn load(&self, payment_id: PaymentId) -> Result<Payment> {
        self.payments
            .get(payment_id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(format!("payment {}", payment_id)))
    }
}

/// Maps the latest decision and the approval count onto the payment's
/// aggregate fields.
fn aggregate(
    payment_id: PaymentId,
    decision: Decision,
    approved: u32,
    required: u32,
    notes: Option<String>,
) -> StatusUpdate {
    match decision {
        Decision::Rejected => StatusUpdate {
            payment_id,
            status: PaymentStatus::Rechazado,
            notes: notes.unwrap_or_default(),
            approval_progress: 0,
            total_required: required,
        },
        Decision::Approved if approved >= required => StatusUpdate {
            payment_id,
            status: PaymentStatus::Aprobado,
            notes: notes.unwrap_or_default(),
            approval_progress: approved,
            total_required: required,
        },
        Decision::Approved => StatusUpdate {
            payment_id,
            status: PaymentStatus::EnRevision,
            notes: progress_message(approved, required),
            approval_progress: approved,
            total_required: required,
        },
    }
}
