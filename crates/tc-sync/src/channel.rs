//! Live sync channel: subscribe to a session's push socket and feed every
//! state frame into the `Baseline`.
//!
//! ```text
//!   Idle ──start──▶ Connecting ──opened──▶ Open
//!                     │  ▲                  │
//!          failed /   │  │ timer            │ closed
//!          closed     ▼  │                  ▼
//!                   Reconnecting ◀──────────┘
//!
//!   any ──stop──▶ Closed (terminal)
//! ```
//!
//! A dropped connection is never observable as `Closed`: it passes straight
//! to `Reconnecting` with the reconnect timer armed.
//!
//! `ChannelMachine` is the pure transition table; `LiveChannel` drives it
//! on a tokio task with a single pending reconnect timer.

use crate::baseline::Baseline;
use crate::error::SyncError;
use crate::protocol::decode_push;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::future::{self, Future};
use std::pin::Pin;
use std::time::Duration;
use tc_core::Session;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Sleep, sleep};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Text frames from one open connection. Ends when the connection closes.
pub type PushStream = BoxStream<'static, Result<String, SyncError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    /// Stopped by the caller. No further connection attempts are made.
    Closed,
    /// Waiting on the reconnect timer after a close or a failed attempt.
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after an established connection closes.
    pub after_close: Duration,
    /// Delay after a connection attempt fails outright.
    pub after_failure: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            after_close: Duration::from_millis(1500),
            after_failure: Duration::from_millis(2500),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Start,
    Opened,
    Message(String),
    Closed,
    ConnectFailed,
    TimerFired,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelAction {
    Connect,
    Apply(Session),
    ScheduleReconnect(Duration),
    CancelTimer,
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    stopped: bool,
    policy: ReconnectPolicy,
}

impl ChannelMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ChannelState::Idle,
            stopped: false,
            policy,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn handle(&mut self, event: ChannelEvent) -> Vec<ChannelAction> {
        use ChannelAction as A;
        use ChannelEvent as E;
        use ChannelState as S;

        if self.stopped {
            return Vec::new();
        }
        match (self.state, event) {
            (_, E::Stop) => {
                self.stopped = true;
                self.state = S::Closed;
                vec![A::CancelTimer, A::Disconnect]
            }
            (S::Idle, E::Start) | (S::Reconnecting, E::TimerFired) => {
                self.state = S::Connecting;
                vec![A::Connect]
            }
            (S::Connecting, E::Opened) => {
                self.state = S::Open;
                Vec::new()
            }
            (S::Connecting, E::ConnectFailed) => {
                self.state = S::Reconnecting;
                vec![A::ScheduleReconnect(self.policy.after_failure)]
            }
            (S::Connecting | S::Open, E::Closed) => {
                self.state = S::Reconnecting;
                vec![A::Disconnect, A::ScheduleReconnect(self.policy.after_close)]
            }
            (S::Open, E::Message(text)) => match decode_push(&text) {
                Ok(Some(session)) => vec![A::Apply(session)],
                Ok(None) => Vec::new(),
                Err(e) => {
                    log::warn!("discarding malformed push frame: {e}");
                    Vec::new()
                }
            },
            (state, event) => {
                log::trace!("channel ignores {event:?} while {state:?}");
                Vec::new()
            }
        }
    }
}

// ─── Transport ───────────────────────────────────────────────────────────

pub trait Connector: Send + Sync + 'static {
    fn connect(&self, session: &str) -> impl Future<Output = Result<PushStream, SyncError>> + Send;
}

/// Push socket at `/ws/{session}` on the session server.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base: Url,
}

impl WsConnector {
    /// `server` is the HTTP base URL; the scheme is switched to ws/wss.
    pub fn new(server: &str) -> Result<Self, SyncError> {
        let mut base = crate::http::base_url(server)?;
        let scheme = match base.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(SyncError::Scheme(other.to_string())),
        };
        base.set_scheme(scheme)
            .map_err(|()| SyncError::Scheme(server.to_string()))?;
        Ok(Self { base })
    }

    pub fn endpoint(&self, session: &str) -> Result<Url, SyncError> {
        let id = session.trim().to_uppercase();
        Ok(self.base.join(&format!("ws/{id}"))?)
    }
}

impl Connector for WsConnector {
    fn connect(&self, session: &str) -> impl Future<Output = Result<PushStream, SyncError>> + Send {
        let endpoint = self.endpoint(session);
        async move {
            let endpoint = endpoint?;
            let (ws, _response) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
            log::info!("push socket open: {endpoint}");
            let frames = ws.filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                    Ok(_) => None,
                    Err(e) => Some(Err(SyncError::from(e))),
                }
            });
            Ok(frames.boxed())
        }
    }
}

// ─── Driver ──────────────────────────────────────────────────────────────

/// A running subscription. Dropping it aborts the task; `stop` shuts it
/// down cleanly and suppresses any pending reconnect.
#[derive(Debug)]
pub struct LiveChannel {
    stop: watch::Sender<bool>,
    state: watch::Receiver<ChannelState>,
    task: Option<JoinHandle<()>>,
}

impl LiveChannel {
    pub fn spawn<C: Connector>(
        connector: C,
        session: impl Into<String>,
        baseline: Baseline,
        policy: ReconnectPolicy,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let (state_tx, state) = watch::channel(ChannelState::Idle);
        let driver = Driver {
            connector,
            session: session.into(),
            baseline,
            machine: ChannelMachine::new(policy),
            state: state_tx,
            stop: stop_rx,
        };
        let task = tokio::spawn(driver.run());
        Self {
            stop,
            state,
            task: Some(task),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    pub async fn stop(mut self) {
        self.stop.send_replace(true);
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            log::error!("live channel task failed: {e}");
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Driver<C> {
    connector: C,
    session: String,
    baseline: Baseline,
    machine: ChannelMachine,
    state: watch::Sender<ChannelState>,
    stop: watch::Receiver<bool>,
}

async fn next_frame(stream: &mut Option<PushStream>) -> Option<Result<String, SyncError>> {
    match stream {
        Some(s) => s.next().await,
        None => future::pending().await,
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => future::pending().await,
    }
}

impl<C: Connector> Driver<C> {
    async fn run(mut self) {
        let mut stream: Option<PushStream> = None;
        let mut timer: Option<Pin<Box<Sleep>>> = None;
        let mut actions = self.machine.handle(ChannelEvent::Start);

        loop {
            // Actions can produce follow-up events (connect → opened/failed).
            while !actions.is_empty() {
                let mut follow_up = Vec::new();
                for action in actions {
                    match action {
                        ChannelAction::Connect => {
                            let event = tokio::select! {
                                result = self.connector.connect(&self.session) => match result {
                                    Ok(s) => {
                                        stream = Some(s);
                                        ChannelEvent::Opened
                                    }
                                    Err(e) => {
                                        log::warn!("push connect for {} failed: {e}", self.session);
                                        ChannelEvent::ConnectFailed
                                    }
                                },
                                _ = self.stop.changed() => ChannelEvent::Stop,
                            };
                            follow_up.extend(self.machine.handle(event));
                        }
                        ChannelAction::Apply(session) => {
                            log::debug!("push snapshot for {}", session.id);
                            self.baseline.replace(session);
                        }
                        ChannelAction::ScheduleReconnect(delay) => {
                            log::info!("reconnecting {} in {delay:?}", self.session);
                            timer = Some(Box::pin(sleep(delay)));
                        }
                        ChannelAction::CancelTimer => timer = None,
                        ChannelAction::Disconnect => stream = None,
                    }
                }
                self.state.send_replace(self.machine.state());
                actions = follow_up;
            }

            if self.machine.is_stopped() {
                log::debug!("live channel for {} stopped", self.session);
                return;
            }

            let event = tokio::select! {
                _ = self.stop.changed() => ChannelEvent::Stop,
                frame = next_frame(&mut stream) => match frame {
                    Some(Ok(text)) => ChannelEvent::Message(text),
                    Some(Err(e)) => {
                        log::warn!("push socket error: {e}");
                        ChannelEvent::Closed
                    }
                    None => ChannelEvent::Closed,
                },
                _ = wait_timer(&mut timer) => ChannelEvent::TimerFired,
            };
            if event == ChannelEvent::TimerFired {
                timer = None;
            }
            actions = self.machine.handle(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state_frame(id: &str) -> String {
        format!(r#"{{"type":"state","payload":{{"id":"{id}"}}}}"#)
    }

    #[test]
    fn happy_path_applies_state() {
        let mut m = ChannelMachine::new(ReconnectPolicy::default());
        assert_eq!(m.handle(ChannelEvent::Start), vec![ChannelAction::Connect]);
        assert_eq!(m.handle(ChannelEvent::Opened), vec![]);
        assert_eq!(m.state(), ChannelState::Open);
        let actions = m.handle(ChannelEvent::Message(state_frame("ABC123")));
        assert!(matches!(&actions[..], [ChannelAction::Apply(s)] if s.id == "ABC123"));
    }

    #[test]
    fn keepalive_and_garbage_are_dropped() {
        let mut m = ChannelMachine::new(ReconnectPolicy::default());
        m.handle(ChannelEvent::Start);
        m.handle(ChannelEvent::Opened);
        assert_eq!(m.handle(ChannelEvent::Message("pong".into())), vec![]);
        assert_eq!(m.handle(ChannelEvent::Message("{oops".into())), vec![]);
        assert_eq!(m.state(), ChannelState::Open);
    }

    #[test]
    fn close_and_failure_use_their_own_delays() {
        let policy = ReconnectPolicy::default();
        let mut m = ChannelMachine::new(policy);
        m.handle(ChannelEvent::Start);
        assert_eq!(
            m.handle(ChannelEvent::ConnectFailed),
            vec![ChannelAction::ScheduleReconnect(Duration::from_millis(2500))]
        );
        assert_eq!(m.state(), ChannelState::Reconnecting);
        assert_eq!(m.handle(ChannelEvent::TimerFired), vec![ChannelAction::Connect]);
        m.handle(ChannelEvent::Opened);
        assert_eq!(
            m.handle(ChannelEvent::Closed),
            vec![
                ChannelAction::Disconnect,
                ChannelAction::ScheduleReconnect(Duration::from_millis(1500))
            ]
        );
        assert_eq!(m.state(), ChannelState::Reconnecting);
    }

    #[test]
    fn stop_is_terminal() {
        let mut m = ChannelMachine::new(ReconnectPolicy::default());
        m.handle(ChannelEvent::Start);
        m.handle(ChannelEvent::ConnectFailed);
        assert_eq!(
            m.handle(ChannelEvent::Stop),
            vec![ChannelAction::CancelTimer, ChannelAction::Disconnect]
        );
        assert_eq!(m.state(), ChannelState::Closed);
        // A timer that slipped through must not reopen the socket.
        assert_eq!(m.handle(ChannelEvent::TimerFired), vec![]);
        assert_eq!(m.handle(ChannelEvent::Message(state_frame("LATE00"))), vec![]);
    }

    #[test]
    fn ws_endpoint_from_http_base() {
        let c = WsConnector::new("https://table.example/dm/").unwrap();
        assert_eq!(c.endpoint("ab12cd").unwrap().as_str(), "wss://table.example/dm/ws/AB12CD");
        let c = WsConnector::new("http://localhost:8000").unwrap();
        assert_eq!(c.endpoint("X1Y2Z3").unwrap().as_str(), "ws://localhost:8000/ws/X1Y2Z3");
        assert!(matches!(WsConnector::new("ftp://host/"), Err(SyncError::Scheme(_))));
    }
}
