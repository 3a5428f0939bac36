use async_trait::async_trait;
use payment_approvals::application::engine::{ApprovalEngine, DecisionRequest};
use payment_approvals::domain::approval::ApprovalRecord;
use payment_approvals::domain::identity::Approver;
use payment_approvals::domain::notification::Notification;
use payment_approvals::domain::payment::{Payment, PaymentId, PaymentStatus};
use payment_approvals::domain::ports::{ApprovalStore, PaymentStore};
use payment_approvals::error::{ApprovalError, Result};
use payment_approvals::infrastructure::in_memory::{
    ChannelNotifier, InMemoryApprovalConfigStore, InMemoryApprovalStore, InMemoryPaymentStore,
    InProcessPrivilegedService,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedReceiver;

fn ledger_down() -> ApprovalError {
    ApprovalError::InternalError(Box::new(std::io::Error::other("ledger unavailable")))
}

/// Approval store whose writes or reads can be switched off.
#[derive(Default)]
struct FlakyLedger {
    inner: InMemoryApprovalStore,
    fail_upsert: AtomicBool,
    fail_list: AtomicBool,
}

#[async_trait]
impl ApprovalStore for FlakyLedger {
    async fn upsert(&self, record: ApprovalRecord) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(ledger_down());
        }
        self.inner.upsert(record).await
    }

    async fn list(&self, payment_id: PaymentId) -> Result<Vec<ApprovalRecord>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ledger_down());
        }
        self.inner.list(payment_id).await
    }

    async fn clear(&self, payment_id: PaymentId) -> Result<()> {
        self.inner.clear(payment_id).await
    }
}

struct Setup {
    engine: ApprovalEngine,
    payments: InMemoryPaymentStore,
    ledger: Arc<FlakyLedger>,
    notifications: UnboundedReceiver<Notification>,
}

/// Engine with a submitted payment 1 on a project without configured
/// approvers, so submission itself sends nothing.
async fn submitted() -> Setup {
    let payments = InMemoryPaymentStore::new();
    let ledger = Arc::new(FlakyLedger::default());
    let (notifier, notifications) = ChannelNotifier::new();
    let engine = ApprovalEngine::from_ports(
        Arc::new(payments.clone()),
        ledger.clone(),
        Arc::new(InMemoryApprovalConfigStore::new()),
        Arc::new(InProcessPrivilegedService::new(Arc::new(payments.clone()))),
        Arc::new(notifier),
    );
    engine
        .register_payment(Payment::new(1, 1, "2024-05", dec!(1500000)).unwrap())
        .await
        .unwrap();
    engine.submit_for_approval(1).await.unwrap();
    Setup {
        engine,
        payments,
        ledger,
        notifications,
    }
}

async fn assert_untouched(mut setup: Setup, before: Payment) {
    let after = setup.payments.get(1).await.unwrap().unwrap();
    assert_eq!(after.version, before.version);
    assert_eq!(after.status, PaymentStatus::Enviado);
    assert_eq!(after, before);

    setup.engine.drain_notifications().await;
    assert!(setup.notifications.try_recv().is_err());
}

#[tokio::test]
async fn test_ledger_write_failure_aborts_decision() {
    let setup = submitted().await;
    let before = setup.payments.get(1).await.unwrap().unwrap();
    setup.ledger.fail_upsert.store(true, Ordering::SeqCst);

    let result = setup
        .engine
        .decide(
            1,
            &Approver::direct("alice@x.com", None).unwrap(),
            DecisionRequest::approve(None),
        )
        .await;

    assert!(matches!(result, Err(ApprovalError::InternalError(_))));
    assert!(setup.ledger.inner.list(1).await.unwrap().is_empty());
    assert_untouched(setup, before).await;
}

#[tokio::test]
async fn test_ledger_read_failure_aborts_decision() {
    let setup = submitted().await;
    let before = setup.payments.get(1).await.unwrap().unwrap();
    setup.ledger.fail_list.store(true, Ordering::SeqCst);

    let result = setup
        .engine
        .decide(
            1,
            &Approver::direct("alice@x.com", None).unwrap(),
            DecisionRequest::reject("Falta respaldo"),
        )
        .await;

    assert!(matches!(result, Err(ApprovalError::InternalError(_))));
    assert_untouched(setup, before).await;
}
