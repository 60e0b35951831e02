use chrono::{Duration as ChronoDuration, Utc};
use sprinkler_core::output::{RecordingSink, SinkCommand};
use sprinkler_core::source::RecordingMirror;
use sprinkler_core::{ActuationController, ActuatorState, AuditLogger, MemoryBlobStore};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const KEY: &str = "sprinkler_event.txt";

struct Rig {
    controller: ActuationController,
    sink: RecordingSink,
    store: Arc<MemoryBlobStore>,
}

fn rig() -> Rig {
    let sink = RecordingSink::new();
    let store = Arc::new(MemoryBlobStore::new());
    let audit = Arc::new(AuditLogger::new(store.clone(), KEY));
    let controller = ActuationController::new(
        Box::new(sink.clone()),
        audit,
        Arc::new(RecordingMirror::new()),
    );
    Rig {
        controller,
        sink,
        store,
    }
}

fn secs_from_now(secs: i64) -> chrono::DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(secs)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn idempotent_off_leaves_no_timer() {
    let r = rig();
    r.controller
        .handle(ActuatorState::on_until(secs_from_now(30)))
        .await;
    for _ in 0..5 {
        r.controller.handle(ActuatorState::off()).await;
    }
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(r.sink.count(SinkCommand::Low), 5);
    assert_eq!(r.store.text(KEY).lines().count(), 1);
    assert!(r.controller.pending_timer().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn only_the_latest_timer_fires() {
    let r = rig();
    for secs in [3, 2, 4, 1, 2] {
        r.controller
            .handle(ActuatorState::on_until(secs_from_now(secs)))
            .await;
    }
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(r.sink.count(SinkCommand::High), 5);
    assert_eq!(r.sink.count(SinkCommand::Low), 1);
    assert_eq!(r.sink.last(), Some(SinkCommand::Low));
    assert_eq!(r.store.put_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn later_timer_is_not_cut_short_by_earlier_one() {
    let r = rig();
    r.controller
        .handle(ActuatorState::on_until(secs_from_now(1)))
        .await;
    r.controller
        .handle(ActuatorState::on_until(secs_from_now(5)))
        .await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(r.sink.last(), Some(SinkCommand::High));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(r.sink.last(), Some(SinkCommand::Low));
}

#[tokio::test(start_paused = true)]
async fn past_off_time_is_immediate_low() {
    let r = rig();
    r.controller
        .handle(ActuatorState::on_until(secs_from_now(-5)))
        .await;

    assert_eq!(r.sink.commands(), vec![SinkCommand::Low]);
    assert!(r.controller.pending_timer().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn no_off_time_holds_high_until_off() {
    let r = rig();
    r.controller.handle(ActuatorState::on()).await;
    assert!(r.controller.pending_timer().await.is_none());

    tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
    assert_eq!(r.sink.commands(), vec![SinkCommand::High]);

    r.controller.handle(ActuatorState::off()).await;
    assert_eq!(r.sink.commands(), vec![SinkCommand::High, SinkCommand::Low]);
}

#[tokio::test]
async fn log_appends_concatenate() {
    let store = Arc::new(MemoryBlobStore::new());
    let logger = AuditLogger::new(store.clone(), KEY);
    logger.append(1000, false).await.unwrap();
    logger.append(2000, false).await.unwrap();

    assert_eq!(
        store.text(KEY),
        "Time: 1000\tStatus: False\n".to_string() + "Time: 2000\tStatus: False\n"
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_timer_never_fires() {
    let r = rig();
    r.controller
        .handle(ActuatorState::on_until(secs_from_now(2)))
        .await;
    r.controller.handle(ActuatorState::off()).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(r.sink.commands(), vec![SinkCommand::High, SinkCommand::Low]);
    assert_eq!(r.store.text(KEY).lines().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn new_on_after_cancel_gets_its_own_timer() {
    let r = rig();
    r.controller
        .handle(ActuatorState::on_until(secs_from_now(2)))
        .await;
    r.controller.handle(ActuatorState::off()).await;
    r.controller
        .handle(ActuatorState::on_until(secs_from_now(4)))
        .await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(r.sink.last(), Some(SinkCommand::High));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        r.sink.commands(),
        vec![
            SinkCommand::High,
            SinkCommand::Low,
            SinkCommand::High,
            SinkCommand::Low
        ]
    );
    assert_eq!(r.store.text(KEY).lines().count(), 2);
}
