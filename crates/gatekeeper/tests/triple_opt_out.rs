//! End-to-end admission scenarios against a file-backed SQLite ledger.

use optgate_core::{
    ComplianceLedger, Destination, MessageId, OutcomeKind, ReasonCode, Sender, SenderId,
};
use optgate_gatekeeper::{
    ComplianceAggregator, Gatekeeper, GatekeeperConfig, GatekeeperError, GatekeeperResult,
    ReportIngest, ServiceContext,
};
use optgate_persistence::GuardRepo;
use tempfile::{tempdir, TempDir};

const DENIAL_MESSAGE: &str = "Cannot send message - frequently unsubscribed recipient";
const NUMBER: &str = "+15550001111";

struct Harness {
    dir: TempDir,
    ctx: ServiceContext,
}

fn config_for(dir: &TempDir) -> GatekeeperConfig {
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("optgate.db").display());
    GatekeeperConfig {
        retry_backoff_ms: 1,
        ..GatekeeperConfig::with_database_url(url)
    }
}

async fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let ctx = ServiceContext::open(config_for(&dir)).await.unwrap();
    Harness { dir, ctx }
}

async fn sender(ctx: &ServiceContext, name: &str) -> SenderId {
    let sender = Sender::new(name);
    ctx.store().insert_sender(&sender).await.unwrap();
    sender.id
}

async fn send(ctx: &ServiceContext, from: SenderId, to: &str) -> GatekeeperResult<MessageId> {
    Gatekeeper::new(ctx).admit_and_send(from, to, "Limited offer").await
}

async fn report(ctx: &ServiceContext, message_id: MessageId, reason: ReasonCode) -> usize {
    ReportIngest::new(ctx)
        .ingest(message_id, OutcomeKind::Failed, Some(reason))
        .await
        .unwrap()
        .unsubscribed_count
}

async fn count(ctx: &ServiceContext, to: &str) -> usize {
    let destination = Destination::parse(to).unwrap();
    ComplianceAggregator::new(ctx).count(&destination).await.unwrap()
}

fn assert_denied(result: GatekeeperResult<MessageId>) {
    match result {
        Err(err @ GatekeeperError::AdmissionDenied { .. }) => {
            assert_eq!(err.to_string(), DENIAL_MESSAGE);
            assert_eq!(err.code(), "FREQUENTLY_UNSUBSCRIBED_RECIPIENT");
        }
        other => panic!("expected denial, got {:?}", other),
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn first_unsubscribe_still_admits() {
    let h = harness().await;
    let a = sender(&h.ctx, "A").await;
    let b = sender(&h.ctx, "B").await;

    let from_a = send(&h.ctx, a, NUMBER).await.unwrap();
    assert_eq!(report(&h.ctx, from_a, ReasonCode::Unsubscribed).await, 1);

    send(&h.ctx, b, NUMBER).await.unwrap();
    assert_eq!(count(&h.ctx, NUMBER).await, 1);
}

#[tokio::test]
async fn second_unsubscribe_still_admits() {
    let h = harness().await;
    let a = sender(&h.ctx, "A").await;
    let b = sender(&h.ctx, "B").await;
    let c = sender(&h.ctx, "C").await;

    let from_a = send(&h.ctx, a, NUMBER).await.unwrap();
    report(&h.ctx, from_a, ReasonCode::Unsubscribed).await;
    let from_b = send(&h.ctx, b, NUMBER).await.unwrap();
    assert_eq!(report(&h.ctx, from_b, ReasonCode::Unsubscribed).await, 2);

    send(&h.ctx, c, NUMBER).await.unwrap();
    assert_eq!(count(&h.ctx, NUMBER).await, 2);
}

#[tokio::test]
async fn third_distinct_unsubscribe_blocks_destination() {
    let h = harness().await;
    let d = sender(&h.ctx, "D").await;

    for name in ["A", "B", "C"] {
        let id = sender(&h.ctx, name).await;
        let message_id = send(&h.ctx, id, NUMBER).await.unwrap();
        report(&h.ctx, message_id, ReasonCode::Unsubscribed).await;
    }
    assert_eq!(count(&h.ctx, NUMBER).await, 3);

    assert_denied(send(&h.ctx, d, NUMBER).await);

    // No message row for the denied attempt
    let destination = Destination::parse(NUMBER).unwrap();
    let messages = h.ctx.store().list_messages_to(&destination).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.sender_id != d));

    // Previously unsubscribed senders are refused too
    let a_again = messages[0].sender_id;
    assert_denied(send(&h.ctx, a_again, NUMBER).await);
}

#[tokio::test]
async fn spam_reports_never_count() {
    let h = harness().await;
    let d = sender(&h.ctx, "D").await;

    for (name, reason) in [
        ("A", ReasonCode::Unsubscribed),
        ("B", ReasonCode::Unsubscribed),
        ("C", ReasonCode::Spam),
    ] {
        let id = sender(&h.ctx, name).await;
        let message_id = send(&h.ctx, id, NUMBER).await.unwrap();
        report(&h.ctx, message_id, reason).await;
    }

    send(&h.ctx, d, NUMBER).await.unwrap();
    assert_eq!(count(&h.ctx, NUMBER).await, 2);
}

#[tokio::test]
async fn repeat_unsubscribes_from_one_sender_count_once() {
    let h = harness().await;
    let a = sender(&h.ctx, "A").await;
    let b = sender(&h.ctx, "B").await;
    let d = sender(&h.ctx, "D").await;

    let from_a = send(&h.ctx, a, NUMBER).await.unwrap();
    report(&h.ctx, from_a, ReasonCode::Unsubscribed).await;

    let first_b = send(&h.ctx, b, NUMBER).await.unwrap();
    report(&h.ctx, first_b, ReasonCode::Unsubscribed).await;
    let second_b = send(&h.ctx, b, NUMBER).await.unwrap();
    assert_eq!(report(&h.ctx, second_b, ReasonCode::Unsubscribed).await, 2);

    send(&h.ctx, d, NUMBER).await.unwrap();
    assert_eq!(count(&h.ctx, NUMBER).await, 2);
}

// ============================================================================
// Idempotence and isolation
// ============================================================================

#[tokio::test]
async fn redelivered_report_is_stored_but_harmless() {
    let h = harness().await;
    let a = sender(&h.ctx, "A").await;
    let message_id = send(&h.ctx, a, NUMBER).await.unwrap();

    assert_eq!(report(&h.ctx, message_id, ReasonCode::Unsubscribed).await, 1);
    assert_eq!(report(&h.ctx, message_id, ReasonCode::Unsubscribed).await, 1);

    let reports = h.ctx.store().list_reports_for(&message_id).await.unwrap();
    assert_eq!(reports.len(), 2);
}

#[tokio::test]
async fn destinations_are_independent() {
    let h = harness().await;
    let other = "+15559998888";

    for name in ["A", "B", "C"] {
        let id = sender(&h.ctx, name).await;
        let message_id = send(&h.ctx, id, NUMBER).await.unwrap();
        report(&h.ctx, message_id, ReasonCode::Unsubscribed).await;
    }

    let d = sender(&h.ctx, "D").await;
    assert_denied(send(&h.ctx, d, NUMBER).await);
    send(&h.ctx, d, other).await.unwrap();
    assert_eq!(count(&h.ctx, other).await, 0);
}

#[tokio::test]
async fn formatting_variants_share_a_ledger() {
    let h = harness().await;

    for (name, to) in [
        ("A", "+1 555 000 1111"),
        ("B", "+1 (555) 000-1111"),
        ("C", "+1.555.000.1111"),
    ] {
        let id = sender(&h.ctx, name).await;
        let message_id = send(&h.ctx, id, to).await.unwrap();
        report(&h.ctx, message_id, ReasonCode::Unsubscribed).await;
    }

    let d = sender(&h.ctx, "D").await;
    assert_denied(send(&h.ctx, d, NUMBER).await);
}

#[tokio::test]
async fn unknown_message_report_is_not_found() {
    let h = harness().await;

    let err = ReportIngest::new(&h.ctx)
        .ingest(MessageId::new(), OutcomeKind::Failed, Some(ReasonCode::Unsubscribed))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(h.ctx.store().stats().await.unwrap().reports, 0);
}

#[tokio::test]
async fn invalid_input_leaves_state_unchanged() {
    let h = harness().await;
    let a = sender(&h.ctx, "A").await;

    let err = send(&h.ctx, a, "12").await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let err = Gatekeeper::new(&h.ctx)
        .admit_and_send(a, NUMBER, "")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    assert_eq!(h.ctx.store().stats().await.unwrap().messages, 0);
}

#[tokio::test]
async fn sql_ledger_matches_replayed_ledger() {
    let h = harness().await;
    let aggregator = ComplianceAggregator::new(&h.ctx);
    let destination = Destination::parse(NUMBER).unwrap();

    for (name, reason) in [
        ("A", Some(ReasonCode::Unsubscribed)),
        ("B", Some(ReasonCode::Spam)),
        ("C", None),
        ("D", Some(ReasonCode::Unsubscribed)),
    ] {
        let id = sender(&h.ctx, name).await;
        let message_id = send(&h.ctx, id, NUMBER).await.unwrap();
        match reason {
            Some(reason) => {
                report(&h.ctx, message_id, reason).await;
            }
            None => {
                ReportIngest::new(&h.ctx)
                    .ingest(message_id, OutcomeKind::Delivered, None)
                    .await
                    .unwrap();
            }
        }
    }

    let ledger: ComplianceLedger = aggregator.ledger(&destination).await.unwrap();
    let replayed = aggregator.replay(&destination).await.unwrap();

    assert_eq!(ledger, replayed);
    assert_eq!(ledger.count(), 2);
    assert!(!ledger.is_blocked());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_after_block_are_all_denied() {
    let h = harness().await;

    for name in ["A", "B", "C"] {
        let id = sender(&h.ctx, name).await;
        let message_id = send(&h.ctx, id, NUMBER).await.unwrap();
        report(&h.ctx, message_id, ReasonCode::Unsubscribed).await;
    }

    let mut handles = Vec::new();
    for i in 0..16 {
        let ctx = h.ctx.clone();
        let id = sender(&ctx, &format!("late-{}", i)).await;
        handles.push(tokio::spawn(async move { send(&ctx, id, NUMBER).await }));
    }

    for handle in handles {
        assert_denied(handle.await.unwrap());
    }
    assert_eq!(h.ctx.store().stats().await.unwrap().messages, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_report_never_lets_later_admission_through() {
    let h = harness().await;

    let mut pending = Vec::new();
    for name in ["A", "B", "C"] {
        let id = sender(&h.ctx, name).await;
        pending.push(send(&h.ctx, id, NUMBER).await.unwrap());
    }
    report(&h.ctx, pending[0], ReasonCode::Unsubscribed).await;
    report(&h.ctx, pending[1], ReasonCode::Unsubscribed).await;

    let mut senders = Vec::new();
    for i in 0..8 {
        senders.push(sender(&h.ctx, &format!("racer-{}", i)).await);
    }

    let third = pending[2];
    let ingest_ctx = h.ctx.clone();
    let ingest = tokio::spawn(async move { report(&ingest_ctx, third, ReasonCode::Unsubscribed).await });

    let mut handles = Vec::new();
    for id in senders {
        let ctx = h.ctx.clone();
        handles.push(tokio::spawn(async move { send(&ctx, id, NUMBER).await }));
    }

    assert_eq!(ingest.await.unwrap(), 3);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(GatekeeperError::AdmissionDenied { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    // Once the third report is committed nobody gets through
    let late = sender(&h.ctx, "late").await;
    assert_denied(send(&h.ctx, late, NUMBER).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_below_threshold_all_succeed() {
    let h = harness().await;

    let mut handles = Vec::new();
    for i in 0..12 {
        let ctx = h.ctx.clone();
        let id = sender(&ctx, &format!("sender-{}", i)).await;
        let to = if i % 2 == 0 { NUMBER } else { "+15559998888" };
        handles.push(tokio::spawn(async move { send(&ctx, id, to).await }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(h.ctx.store().stats().await.unwrap().messages, 12);
    assert!(h.ctx.locks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_contexts_share_the_block() {
    let h = harness().await;
    // A second context stands in for another process: own pool, own locks
    let other = ServiceContext::open(config_for(&h.dir)).await.unwrap();

    for name in ["A", "B", "C"] {
        let id = sender(&h.ctx, name).await;
        let message_id = send(&h.ctx, id, NUMBER).await.unwrap();
        report(&other, message_id, ReasonCode::Unsubscribed).await;
    }

    let d = sender(&other, "D").await;
    assert_denied(send(&h.ctx, d, NUMBER).await);
    assert_denied(send(&other, d, NUMBER).await);
}

#[tokio::test]
async fn held_write_lock_surfaces_transient_conflict() {
    let dir = tempdir().unwrap();
    let config = GatekeeperConfig {
        busy_timeout_ms: 0,
        max_conflict_attempts: 3,
        ..config_for(&dir)
    };
    let ctx = ServiceContext::open(config.clone()).await.unwrap();
    let other = ServiceContext::open(config).await.unwrap();
    let a = sender(&ctx, "A").await;

    // Another writer holds the database write lock through the guard row
    let destination = Destination::parse(NUMBER).unwrap();
    let mut tx = other.store().begin().await.unwrap();
    GuardRepo::touch(&mut *tx, &destination).await.unwrap();

    match send(&ctx, a, NUMBER).await {
        Err(err @ GatekeeperError::TransientConflict { attempts: 3, .. }) => {
            assert!(err.is_retryable());
            assert!(!err.is_denied());
        }
        result => panic!("expected TransientConflict after 3 attempts, got {:?}", result),
    }

    tx.rollback().await.unwrap();

    let message_id = send(&ctx, a, NUMBER).await.unwrap();
    assert_eq!(ctx.store().get_message(&message_id).await.unwrap().sender_id, a);
    assert_eq!(count(&ctx, NUMBER).await, 0);
}
