//! GC session lifecycle.
//!
//! Tracks the state machine of the logical GC session: Disconnected →
//! Announcing → Ready, with Ready → Recovering → Ready when the GC drops the
//! session, and back to Disconnected on exit. The retry timer lives in a
//! single slot, so the hello loop and the recovery loop can never both run.
//!
//! [`Session`] does no I/O. Its transition functions report what happened and
//! the client performs the sends and notifications.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::messages::ConnectionStatus;

/// State machine for the GC session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not running the app. Initial and post-exit state.
    Disconnected,
    /// Presence announced, hellos in flight.
    Announcing,
    /// GC session established.
    Ready,
    /// GC reported the session lost, hellos in flight again.
    Recovering,
}

/// Which retry loop a [`RetryTimer`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Initial handshake after launch.
    Hello,
    /// Re-handshake after a lost session.
    Recovery,
}

/// Recurring hello deadline, with an optional one-shot early kick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTimer {
    kind: TimerKind,
    period: Duration,
    next_due: Instant,
    kick: Option<Instant>,
}

impl RetryTimer {
    fn new(kind: TimerKind, now: Instant, period: Duration, kick_after: Option<Duration>) -> Self {
        Self {
            kind,
            period,
            next_due: now + period,
            kick: kick_after.map(|delay| now + delay),
        }
    }

    /// Which loop this timer belongs to.
    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// The earliest pending deadline.
    pub fn deadline(&self) -> Instant {
        match self.kick {
            Some(kick) if kick < self.next_due => kick,
            _ => self.next_due,
        }
    }

    /// Consume the deadline that is due at `now`. Returns `false` if nothing
    /// was due yet.
    fn fire(&mut self, now: Instant) -> bool {
        if self.deadline() > now {
            return false;
        }
        if let Some(kick) = self.kick
            && kick <= now
            && kick < self.next_due
        {
            self.kick = None;
            return true;
        }
        // Skip missed periods instead of bursting.
        self.next_due += self.period;
        if self.next_due <= now {
            self.next_due = now + self.period;
        }
        true
    }
}

/// Timing knobs for the retry loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Period of the hello loop after launch.
    pub hello_interval: Duration,
    /// Delay of the extra hello right after launch.
    pub hello_initial_delay: Duration,
    /// Period of the recovery loop.
    pub recovery_interval: Duration,
    /// Unanswered hellos after which the next tick reports a timeout.
    pub hello_timeout_threshold: u32,
}

impl From<&dota_gc_config::GcConfig> for RetryPolicy {
    fn from(config: &dota_gc_config::GcConfig) -> Self {
        Self {
            hello_interval: config.hello_interval(),
            hello_initial_delay: config.hello_initial_delay(),
            recovery_interval: config.recovery_interval(),
            hello_timeout_threshold: config.hello_timeout_threshold,
        }
    }
}

/// Outcome of a hello timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloTick {
    /// Nothing to do: no timer due, or the session is disconnected.
    Idle,
    /// Already ready; the timer was cancelled.
    Cancelled,
    /// Send a hello. `timed_out` is set when the threshold was reached.
    Send {
        /// Report a hello timeout before sending.
        timed_out: bool,
    },
}

/// Outcome of a connection-status push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Level unchanged, nothing to report.
    Unchanged,
    /// Session regained: now ready.
    Regained,
    /// Session lost: recovery loop started.
    Lost,
}

/// Mutable state of one GC session.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    connection_status: ConnectionStatus,
    hello_attempts: u32,
    timer: Option<RetryTimer>,
    policy: RetryPolicy,
}

impl Session {
    /// A disconnected session using `policy` for its retry loops.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: SessionState::Disconnected,
            connection_status: ConnectionStatus::NoSession,
            hello_attempts: 0,
            timer: None,
            policy,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the GC session is established.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Last status reported by the GC.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection_status
    }

    /// Hellos sent since launch or the last timeout report.
    pub fn hello_attempts(&self) -> u32 {
        self.hello_attempts
    }

    /// The active retry timer, if any.
    pub fn timer(&self) -> Option<&RetryTimer> {
        self.timer.as_ref()
    }

    /// Start the hello loop, replacing any timer already running.
    pub fn launch(&mut self, now: Instant) {
        self.state = SessionState::Announcing;
        self.connection_status = ConnectionStatus::NoSession;
        self.hello_attempts = 0;
        self.timer = Some(RetryTimer::new(
            TimerKind::Hello,
            now,
            self.policy.hello_interval,
            Some(self.policy.hello_initial_delay),
        ));
    }

    /// Advance the timer if it is due at `now` and decide what to send.
    pub fn hello_tick(&mut self, now: Instant) -> HelloTick {
        let Some(timer) = self.timer.as_mut() else {
            return HelloTick::Idle;
        };
        if !timer.fire(now) {
            return HelloTick::Idle;
        }

        match self.state {
            SessionState::Disconnected => {
                self.timer = None;
                HelloTick::Idle
            }
            SessionState::Ready => {
                self.timer = None;
                HelloTick::Cancelled
            }
            SessionState::Announcing | SessionState::Recovering => {
                let timed_out = self.hello_attempts >= self.policy.hello_timeout_threshold;
                if timed_out {
                    self.hello_attempts = 0;
                }
                self.hello_attempts += 1;
                HelloTick::Send { timed_out }
            }
        }
    }

    /// The GC welcomed us. Returns `true` when this made the session ready.
    pub fn welcome(&mut self) -> bool {
        match self.state {
            SessionState::Announcing | SessionState::Recovering => {
                self.timer = None;
                self.state = SessionState::Ready;
                self.connection_status = ConnectionStatus::HaveSession;
                true
            }
            SessionState::Ready | SessionState::Disconnected => false,
        }
    }

    /// Apply a connection-status push. Level-triggered: repeats are no-ops.
    pub fn connection_status_changed(
        &mut self,
        status: ConnectionStatus,
        now: Instant,
    ) -> StatusChange {
        if self.state == SessionState::Disconnected {
            return StatusChange::Unchanged;
        }
        self.connection_status = status;

        if status == ConnectionStatus::HaveSession {
            if self.timer.take().is_some() {
                self.state = SessionState::Ready;
                return StatusChange::Regained;
            }
            return StatusChange::Unchanged;
        }

        if self.timer.is_some() {
            return StatusChange::Unchanged;
        }
        self.state = SessionState::Recovering;
        self.hello_attempts = 0;
        self.timer = Some(RetryTimer::new(
            TimerKind::Recovery,
            now,
            self.policy.recovery_interval,
            None,
        ));
        StatusChange::Lost
    }

    /// Cancel any timer and drop back to Disconnected.
    pub fn exit(&mut self) {
        self.timer = None;
        self.state = SessionState::Disconnected;
    }
}

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// Observable session state backed by a [`watch`] channel.
///
/// Lets code outside the event loop await readiness without polling.
#[derive(Debug)]
pub struct SessionStateWatch {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateWatch {
    /// Create a new watch initialized to [`SessionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Disconnected);
        Self { tx }
    }

    /// Publish the current state if it changed.
    pub fn set(&self, state: SessionState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }
}

/// Wait until `rx` observes [`SessionState::Ready`].
///
/// Fails only if the watch's sender (the client) was dropped.
pub async fn wait_ready(
    rx: &mut watch::Receiver<SessionState>,
) -> Result<(), watch::error::RecvError> {
    rx.wait_for(|state| *state == SessionState::Ready).await?;
    Ok(())
}
