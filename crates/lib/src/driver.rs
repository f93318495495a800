//! Session driver: owns the connection lifecycle and runs the poll -> filter -> dispatch -> sleep loop.
//!
//! One cycle at a time; no concurrent reads and no overlapping dispatches.
//! Read and send failures are logged and the loop carries on; an authentication
//! failure ends the session.

use crate::alert::AlertIdentity;
use crate::catalog::AlertCatalog;
use crate::dispatch::Dispatcher;
use crate::error::TransportError;
use crate::events::find_alert;
use crate::transport::{ChatTransport, PostedReply};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Connection state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Authentication failed; the session cannot be resumed.
    Terminated,
}

/// Exclusive owner of the transport and the bot identity for one run.
pub struct Session<T: ChatTransport> {
    transport: T,
    bot_user_id: Option<String>,
    state: SessionState,
}

impl<T: ChatTransport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            bot_user_id: None,
            state: SessionState::Disconnected,
        }
    }

    /// Create a session and connect it. Errors are fatal for the run.
    pub async fn establish(transport: T) -> Result<Self, TransportError> {
        let mut session = Self::new(transport);
        session.connect().await?;
        Ok(session)
    }

    /// Authenticate and record the bot's user id. Not retried on failure.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        self.state = SessionState::Connecting;
        match self.transport.connect().await {
            Ok(user_id) => {
                log::info!("connected as bot user {}", user_id);
                self.bot_user_id = Some(user_id);
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Terminated;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The bot's own user id, once connected.
    pub fn bot_user_id(&self) -> Option<&str> {
        self.bot_user_id.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Cooperative stop signal for [`PollLoop::run`], checked once per cycle.
/// Stopping also wakes the loop out of its pacing and rate-limit sleeps.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<StopInner>);

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopHandle {
    pub fn stop(&self) {
        self.0.stopped.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.0.stopped.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` or until stopped, whichever comes first.
    pub async fn sleep(&self, duration: Duration) {
        // Registered before the flag check so a concurrent stop() is not missed.
        let notified = self.0.notify.notified();
        if self.is_stopped() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No alert in the batch.
    Idle,
    Dispatched {
        alert: AlertIdentity,
        reply: PostedReply,
    },
    /// An alert matched but the reply could not be sent.
    DispatchFailed { alert: AlertIdentity, error: String },
}

/// The poll loop: reads batches from a connected session and answers the first alert in each.
pub struct PollLoop {
    interval: Duration,
    dispatcher: Dispatcher,
    catalog: AlertCatalog,
    stop: StopHandle,
}

impl PollLoop {
    pub fn new(dispatcher: Dispatcher, catalog: AlertCatalog, interval: Duration) -> Self {
        Self {
            interval,
            dispatcher,
            catalog,
            stop: StopHandle::default(),
        }
    }

    /// Handle that ends [`PollLoop::run`]; a pending sleep ends early.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run one cycle: pull a batch, find the first alert, dispatch it.
    ///
    /// Read errors are returned. Send errors become [`CycleOutcome::DispatchFailed`]
    /// unless they are authentication failures, which are returned.
    pub async fn poll_once<T: ChatTransport>(
        &self,
        session: &mut Session<T>,
    ) -> Result<CycleOutcome, TransportError> {
        if session.state != SessionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let events = session.transport.read_events().await?;
        let Some(found) = find_alert(&events) else {
            if !events.is_empty() {
                log::debug!("no alert in batch of {} event(s)", events.len());
            }
            return Ok(CycleOutcome::Idle);
        };
        match self
            .dispatcher
            .dispatch(&session.transport, found.event, &found.alert, &self.catalog)
            .await
        {
            Ok(reply) => Ok(CycleOutcome::Dispatched {
                alert: found.alert,
                reply,
            }),
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                log::warn!(
                    "reply for alert '{}' in {} failed: {}",
                    found.alert,
                    found.event.channel_id,
                    e
                );
                Ok(CycleOutcome::DispatchFailed {
                    alert: found.alert,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Poll until stopped or the session loses authentication.
    ///
    /// Returns `Ok(())` after a requested stop; returns the error and marks the
    /// session [`SessionState::Terminated`] on an authentication failure.
    pub async fn run<T: ChatTransport>(
        &self,
        session: &mut Session<T>,
    ) -> Result<(), TransportError> {
        if session.state != SessionState::Connected {
            return Err(TransportError::NotConnected);
        }
        log::info!("poll loop started (interval {:?})", self.interval);
        while !self.stop.is_stopped() {
            match self.poll_once(session).await {
                Ok(CycleOutcome::Dispatched { alert, reply }) => {
                    log::debug!(
                        "replied to '{}' in {} thread {}",
                        alert,
                        reply.channel_id,
                        reply.thread_ts
                    );
                }
                Ok(_) => {}
                Err(e) if e.is_auth() => {
                    log::error!("session terminated: {}", e);
                    session.state = SessionState::Terminated;
                    return Err(e);
                }
                Err(TransportError::RateLimited { retry_after }) => {
                    log::warn!("rate limited, backing off {:?}", retry_after);
                    self.stop.sleep(retry_after).await;
                }
                Err(e) => {
                    log::warn!("reading events failed: {}", e);
                }
            }
            self.stop.sleep(self.interval).await;
        }
        session.state = SessionState::Disconnected;
        log::info!("poll loop stopped");
        Ok(())
    }
}
