#![allow(dead_code)]

use payment_approvals::application::engine::ApprovalEngine;
use payment_approvals::domain::config::{ApprovalPolicy, ProjectApprovalConfig};
use payment_approvals::domain::notification::{Notification, Recipients};
use payment_approvals::domain::payment::{Payment, PaymentId, ProjectId};
use payment_approvals::domain::ports::{
    ApprovalConfigStore, NotifierRef, PrivilegedChannelRef,
};
use payment_approvals::infrastructure::in_memory::{
    ChannelNotifier, InMemoryApprovalConfigStore, InMemoryApprovalStore, InMemoryPaymentStore,
    InProcessPrivilegedService,
};
use rust_decimal_macros::dec;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Harness {
    pub engine: Arc<ApprovalEngine>,
    pub payments: InMemoryPaymentStore,
    pub approvals: InMemoryApprovalStore,
    pub configs: InMemoryApprovalConfigStore,
    pub privileged: InProcessPrivilegedService,
    pub notifications: UnboundedReceiver<Notification>,
}

/// Engine over in-memory stores with a channel notifier.
pub fn harness() -> Harness {
    let (notifier, notifications) = ChannelNotifier::new();
    let mut h = harness_with(InMemoryPaymentStore::new(), Arc::new(notifier), None);
    h.notifications = notifications;
    h
}

/// Like `harness`, but over the given payment store and notifier and,
/// optionally, a replacement for the in-process privileged channel.
pub fn harness_with(
    payments: InMemoryPaymentStore,
    notifier: NotifierRef,
    privileged: Option<PrivilegedChannelRef>,
) -> Harness {
    let approvals = InMemoryApprovalStore::new();
    let configs = InMemoryApprovalConfigStore::new();
    let service = InProcessPrivilegedService::recording(Arc::new(payments.clone()));
    let channel: PrivilegedChannelRef = match privileged {
        Some(channel) => channel,
        None => Arc::new(service.clone()),
    };
    let engine = ApprovalEngine::from_ports(
        Arc::new(payments.clone()),
        Arc::new(approvals.clone()),
        Arc::new(configs.clone()),
        channel,
        notifier,
    );
    let (_, notifications) = ChannelNotifier::new();
    Harness {
        engine: Arc::new(engine),
        payments,
        approvals,
        configs,
        privileged: service,
        notifications,
    }
}

/// Next notification addressed to the contractor, skipping approval requests.
pub async fn next_contractor_notification(h: &mut Harness) -> Notification {
    loop {
        let notification = tokio::time::timeout(Duration::from_secs(1), h.notifications.recv())
            .await
            .expect("no notification delivered")
            .expect("notification channel closed");
        if notification.recipients == Recipients::Contractor {
            return notification;
        }
    }
}

pub async fn require_approvals(h: &Harness, project: ProjectId, required: u32) {
    h.configs
        .put(ProjectApprovalConfig {
            project,
            policy: ApprovalPolicy {
                required_approvals: required,
                order_matters: false,
            },
            approvers: Vec::new(),
        })
        .await
        .unwrap();
}

/// Registers a payment and submits it for approval.
pub async fn submitted_payment(h: &Harness, id: PaymentId, project: ProjectId) {
    h.engine
        .register_payment(Payment::new(id, project, "2024-05", dec!(1500000)).unwrap())
        .await
        .unwrap();
    h.engine.submit_for_approval(id).await.unwrap();
}

pub fn write_file(path: &Path, content: &str) -> Result<(), Error> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()
}

pub const PROJECTS_TOML: &str = r#"
[[projects]]
id = 1
required_approvals = 2
approvers = [
    { email = "alice@x.com", name = "Alice", order = 1 },
    { email = "bob@x.com", name = "Bob", order = 2 },
]

[[payments]]
id = 123
project = 1
period = "2024-05"
total_amount = "1500000"

[[payments]]
id = 124
project = 2
period = "2024-05"
total_amount = "20000"
"#;

pub const DECISIONS_HEADER: &str = "payment,approver_email,approver_name,decision,notes,grant";
