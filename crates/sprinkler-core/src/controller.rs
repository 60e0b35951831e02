//! Turns remote snapshots into relay transitions.
//!
//! # Invariants
//!
//! - The controller is the only writer of the relay line; every command goes
//!   through the single mutex guarding [`ControllerState`].
//! - At most one auto-off timer is live. Arming always cancels the previous
//!   timer first, and cancelling bumps the generation so a timer task that
//!   already woke up finds a mismatch and does nothing.
//! - The relay command for a transition is issued before its audit entry.
//!   Audit and mirror failures are logged and never undo the command.
//!
//! ```text
//! snapshot ─► handle ─┬─► sink (high/low)
//!                     ├─► audit (first Low after non-Low)
//!                     └─► arm timer ──sleep──► fire(gen) ─► sink low, audit, mirror
//! ```

use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::audit::AuditLogger;
use crate::output::OutputSink;
use crate::source::StateMirror;
use crate::types::{ActuatorState, Level};

// ---------------------------------------------------------------------------
// PendingOffTimer
// ---------------------------------------------------------------------------

/// The live auto-off timer, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOffTimer {
    pub scheduled_at: DateTime<Utc>,
    pub fires_at: DateTime<Utc>,
    pub generation: u64,
}

struct ArmedTimer {
    info: PendingOffTimer,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// ControllerState
// ---------------------------------------------------------------------------

struct ControllerState {
    sink: Box<dyn OutputSink>,
    /// Last level commanded; `None` until the first command.
    level: Option<Level>,
    timer: Option<ArmedTimer>,
    generation: u64,
    shut_down: bool,
}

impl ControllerState {
    /// Command the line and return the previously commanded level.
    fn drive(&mut self, level: Level) -> Option<Level> {
        match level {
            Level::High => self.sink.set_high(),
            Level::Low => self.sink.set_low(),
        }
        self.level.replace(level)
    }

    fn cancel_timer(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
            tracing::info!(
                generation = timer.info.generation,
                fires_at = %timer.info.fires_at,
                "cancelled pending auto-off timer"
            );
        }
    }
}

/// What a snapshot left for the audit trail and the remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Followup {
    audit_off: bool,
    mirror_off: bool,
}

// ---------------------------------------------------------------------------
// ActuationController
// ---------------------------------------------------------------------------

struct Inner {
    state: Mutex<ControllerState>,
    audit: Arc<AuditLogger>,
    mirror: Arc<dyn StateMirror>,
}

/// Cheap to clone; clones drive the same relay.
#[derive(Clone)]
pub struct ActuationController {
    inner: Arc<Inner>,
}

impl ActuationController {
    pub fn new(
        sink: Box<dyn OutputSink>,
        audit: Arc<AuditLogger>,
        mirror: Arc<dyn StateMirror>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ControllerState {
                    sink,
                    level: None,
                    timer: None,
                    generation: 0,
                    shut_down: false,
                }),
                audit,
                mirror,
            }),
        }
    }

    /// Apply one snapshot. Snapshots must be handed in delivery order.
    pub async fn handle(&self, snapshot: ActuatorState) {
        let now = Utc::now();
        let weak = Arc::downgrade(&self.inner);
        let mut state = self.inner.state.lock().await;
        if state.shut_down {
            tracing::debug!("controller shut down; ignoring snapshot");
            return;
        }
        tracing::info!(
            is_on = snapshot.is_on,
            off_time = ?snapshot.off_time,
            "received document snapshot"
        );

        state.cancel_timer();
        let followup = match (snapshot.is_on, snapshot.off_time) {
            (false, _) => {
                let previous = state.drive(Level::Low);
                Followup {
                    audit_off: previous != Some(Level::Low),
                    mirror_off: false,
                }
            }
            (true, Some(off_time)) if off_time <= now => {
                tracing::info!(%off_time, "offTime is in the past, setting relay low immediately");
                let previous = state.drive(Level::Low);
                Followup {
                    audit_off: previous != Some(Level::Low),
                    mirror_off: true,
                }
            }
            (true, off_time) => {
                state.drive(Level::High);
                if let Some(off_time) = off_time {
                    arm(&mut state, weak, now, off_time);
                }
                Followup {
                    audit_off: false,
                    mirror_off: false,
                }
            }
        };

        if followup.audit_off {
            self.record_off().await;
        }
        if followup.mirror_off {
            self.mirror_off().await;
        }
    }

    /// Body of an auto-off timer. A no-op unless `generation` is still the
    /// live timer's.
    async fn fire(&self, generation: u64) {
        let mut state = self.inner.state.lock().await;
        let live = state.timer.as_ref().map(|t| t.info.generation);
        if state.shut_down || live != Some(generation) {
            tracing::debug!(generation, ?live, "stale auto-off timer ignored");
            return;
        }

        state.drive(Level::Low);
        // The task being dropped here is this one; detaching it is enough.
        state.timer = None;
        tracing::info!(generation, "auto-off timer fired, relay set low");

        self.record_off().await;
        self.mirror_off().await;
    }

    /// Cancel any pending timer without firing it and release the line.
    /// Later snapshots and timer fires are ignored. Idempotent.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        if state.shut_down {
            return;
        }
        state.cancel_timer();
        state.sink.release();
        state.shut_down = true;
        tracing::info!("controller shut down");
    }

    pub async fn level(&self) -> Option<Level> {
        self.inner.state.lock().await.level
    }

    pub async fn pending_timer(&self) -> Option<PendingOffTimer> {
        self.inner.state.lock().await.timer.as_ref().map(|t| t.info)
    }

    async fn record_off(&self) {
        let ts = Utc::now().timestamp_millis();
        if let Err(e) = self.inner.audit.append(ts, false).await {
            tracing::error!(key = self.inner.audit.key(), "error appending audit entry: {e}");
        }
    }

    async fn mirror_off(&self) {
        if let Err(e) = self.inner.mirror.mark_off().await {
            tracing::error!("error mirroring isOn=false to document: {e}");
        }
    }
}

/// Install a timer for `fires_at`. The slot must already be empty.
fn arm(
    state: &mut ControllerState,
    inner: Weak<Inner>,
    now: DateTime<Utc>,
    fires_at: DateTime<Utc>,
) {
    debug_assert!(
        state.timer.is_none(),
        "arming an auto-off timer while another is live"
    );
    state.generation += 1;
    let generation = state.generation;
    let delay = (fires_at - now).to_std().unwrap_or(Duration::ZERO);

    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = inner.upgrade() {
            ActuationController { inner }.fire(generation).await;
        }
    });

    tracing::info!(
        generation,
        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        %fires_at,
        "scheduled relay auto-off"
    );
    state.timer = Some(ArmedTimer {
        info: PendingOffTimer {
            scheduled_at: now,
            fires_at,
            generation,
        },
        task,
    });
}
