pub mod channel;
mod keepalive;
mod resize;
pub mod websocket;

use crate::config::{SessionConfig, TerminalPreferences};
use crate::frame::{ClientFrame, HostConfig, ServerFrame, TermSize};
use keepalive::KeepAlive;
use resize::ResizeDebouncer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

pub use channel::{
    Channel, ChannelCommand, ChannelConnector, ChannelEvent, MemoryConnector, RemoteChannel,
    memory_channel,
};
pub use websocket::WebSocketConnector;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Bracketed explanation written into the terminal stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    RemoteError(String),
    RemoteDisconnected(Option<String>),
    ConnectionClosed,
    ConnectionError,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::RemoteError(message) => write!(f, "[ERROR] {message}"),
            StatusLine::RemoteDisconnected(Some(message)) if !message.is_empty() => {
                write!(f, "[{message}]")
            }
            StatusLine::RemoteDisconnected(_) => f.write_str("[Disconnected]"),
            StatusLine::ConnectionClosed => f.write_str("[Connection closed]"),
            StatusLine::ConnectionError => f.write_str("[Connection error]"),
        }
    }
}

/// What the renderer should show, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutput {
    Data(String),
    Status(StatusLine),
}

impl TerminalOutput {
    pub fn render(&self) -> String {
        match self {
            TerminalOutput::Data(data) => data.clone(),
            TerminalOutput::Status(line) => format!("\r\n{line}\r\n"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub resize_debounce: Duration,
    pub keepalive_interval: Duration,
    pub right_click_paste: bool,
}

impl SessionOptions {
    pub fn from_config(session: &SessionConfig, preferences: &TerminalPreferences) -> Self {
        Self {
            resize_debounce: session.resize_debounce(),
            keepalive_interval: session.keepalive_interval(),
            right_click_paste: preferences.right_click_paste,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default(), &TerminalPreferences::default())
    }
}

#[derive(Debug)]
enum SessionCommand {
    Connect { host: HostConfig, size: TermSize },
    Input(String),
    Resize(TermSize),
    Disconnect,
}

/// Caller-side view of a running session. Every operation is fire-and-forget;
/// results show up on the output stream. Dropping the last handle tears the
/// session down.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
    right_click_paste: bool,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Open the channel and attach to `host` once it is up. A missing host
    /// configuration is a caller error and does nothing.
    pub fn connect(&self, host: Option<HostConfig>, cols: u16, rows: u16) {
        let Some(host) = host else {
            tracing::debug!(session_id = %self.id, "Connect without host config ignored");
            return;
        };
        self.submit(SessionCommand::Connect {
            host,
            size: TermSize::new(cols, rows),
        });
    }

    pub fn send_input(&self, data: impl Into<String>) {
        self.submit(SessionCommand::Input(data.into()));
    }

    pub fn request_resize(&self, cols: u16, rows: u16) {
        self.submit(SessionCommand::Resize(TermSize::new(cols, rows)));
    }

    /// Forward clipboard text as input when the right-click paste preference
    /// is on and the channel is open. Returns whether the text was forwarded.
    pub fn paste_from_context_menu(&self, text: &str) -> bool {
        if !self.right_click_paste || self.state() != SessionState::Open {
            return false;
        }
        self.send_input(text);
        true
    }

    pub fn disconnect(&self) {
        self.submit(SessionCommand::Disconnect);
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|state| *state == SessionState::Closed)
            .await;
    }

    fn submit(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!(session_id = %self.id, "Session already finished");
        }
    }
}

/// One remote shell attachment. Owned and driven by a single task; the
/// methods below are its only mutators.
pub struct Session {
    endpoint: Url,
    connector: Arc<dyn ChannelConnector>,
    host_config: Option<HostConfig>,
    initial_size: TermSize,
    channel: Option<Channel>,
    resize: ResizeDebouncer,
    keepalive: KeepAlive,
    disconnected_by_remote: bool,
    state: watch::Sender<SessionState>,
    output: mpsc::UnboundedSender<TerminalOutput>,
}

impl Session {
    /// Start an idle session bound to `endpoint`. The returned receiver yields
    /// terminal output until the session reaches `Closed`.
    pub fn spawn(
        connector: Arc<dyn ChannelConnector>,
        endpoint: Url,
        options: SessionOptions,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<TerminalOutput>) {
        let id = Uuid::new_v4().to_string();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let session = Session {
            endpoint,
            connector,
            host_config: None,
            initial_size: TermSize::new(0, 0),
            channel: None,
            resize: ResizeDebouncer::new(options.resize_debounce),
            keepalive: KeepAlive::new(options.keepalive_interval),
            disconnected_by_remote: false,
            state: state_tx,
            output: output_tx,
        };
        let span = tracing::debug_span!("session", session_id = %id);
        tokio::spawn(session.run(command_rx).instrument(span));

        let handle = SessionHandle {
            id,
            commands: command_tx,
            state: state_rx,
            right_click_paste: options.right_click_paste,
        };
        (handle, output_rx)
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        let mut attached = true;
        while self.state() != SessionState::Closed {
            tokio::select! {
                command = commands.recv(), if attached => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        attached = false;
                        tracing::debug!("All handles dropped");
                        self.disconnect();
                    }
                },
                event = next_event(&mut self.channel) => self.handle_event(event),
                _ = sleep_until_deadline(self.resize.deadline()) => self.flush_resize(),
                _ = self.keepalive.tick() => self.send_ping(),
            }
        }
        tracing::debug!("Session finished");
    }

    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = ?previous, to = ?next, "Session state changed");
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { host, size } => self.connect(host, size),
            SessionCommand::Input(data) => self.send_input(data),
            SessionCommand::Resize(size) => self.request_resize(size),
            SessionCommand::Disconnect => self.disconnect(),
        }
    }

    fn connect(&mut self, host: HostConfig, size: TermSize) {
        if self.state() != SessionState::Idle {
            tracing::warn!(state = ?self.state(), "Connect ignored; session already started");
            return;
        }
        tracing::debug!(host = %host.label(), endpoint = %self.endpoint, "Opening channel");
        self.host_config = Some(host);
        self.initial_size = size;
        self.channel = Some(self.connector.open(&self.endpoint));
        self.set_state(SessionState::Connecting);
    }

    fn send_input(&mut self, data: String) {
        if self.state() != SessionState::Open {
            tracing::debug!(bytes = data.len(), state = ?self.state(), "Input dropped; channel not open");
            return;
        }
        self.transmit(ClientFrame::Input(data));
    }

    fn request_resize(&mut self, size: TermSize) {
        if matches!(self.state(), SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.resize.request(size, Instant::now());
    }

    fn flush_resize(&mut self) {
        let open = self.state() == SessionState::Open;
        if let Some(size) = self.resize.take_due(open) {
            tracing::trace!(cols = size.cols, rows = size.rows, "Flushing resize");
            self.transmit(ClientFrame::Resize(size));
        }
    }

    fn send_ping(&mut self) {
        if self.state() == SessionState::Open {
            self.transmit(ClientFrame::Ping);
        }
    }

    /// Cancel the resize debounce, then keep-alive, then close the channel.
    fn disconnect(&mut self) {
        let state = self.state();
        if matches!(state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.resize.cancel();
        self.keepalive.cancel();
        match self.channel.as_mut() {
            Some(channel) => {
                channel.close();
                self.set_state(SessionState::Closing);
            }
            None => self.set_state(SessionState::Closed),
        }
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Open => self.on_open(),
            ChannelEvent::Message(text) => self.on_message(&text),
            ChannelEvent::Error(description) => {
                tracing::warn!(error = %description, "Channel error");
                self.emit(TerminalOutput::Status(StatusLine::ConnectionError));
            }
            ChannelEvent::Closed => self.on_closed(),
        }
    }

    fn on_open(&mut self) {
        if self.state() != SessionState::Connecting {
            tracing::debug!(state = ?self.state(), "Channel opened after teardown began");
            return;
        }
        let Some(host) = self.host_config.clone() else {
            return;
        };
        let size = self.resize.latest().unwrap_or(self.initial_size);
        self.set_state(SessionState::Open);
        if self.transmit(ClientFrame::connect(size, host)) {
            self.resize.acknowledge(size);
        }
        self.keepalive.start();
    }

    fn on_message(&mut self, text: &str) {
        let frame = match ServerFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "Dropping malformed frame");
                return;
            }
        };
        match frame {
            ServerFrame::Data { data } => self.emit(TerminalOutput::Data(data)),
            ServerFrame::Error { message } => {
                self.emit(TerminalOutput::Status(StatusLine::RemoteError(message)));
            }
            ServerFrame::Connected => tracing::debug!("Broker acknowledged attach"),
            ServerFrame::Disconnected { message } => {
                self.disconnected_by_remote = true;
                self.emit(TerminalOutput::Status(StatusLine::RemoteDisconnected(
                    message,
                )));
            }
            ServerFrame::Pong => tracing::trace!("Pong"),
        }
    }

    fn on_closed(&mut self) {
        let state = self.state();
        self.resize.cancel();
        self.keepalive.cancel();
        self.channel = None;
        if state != SessionState::Closing && !self.disconnected_by_remote {
            tracing::warn!(state = ?state, "Channel closed unexpectedly");
        }
        if !self.disconnected_by_remote {
            self.emit(TerminalOutput::Status(StatusLine::ConnectionClosed));
        }
        self.set_state(SessionState::Closed);
    }

    fn transmit(&self, frame: ClientFrame) -> bool {
        let Some(channel) = self.channel.as_ref() else {
            return false;
        };
        match frame.encode() {
            Ok(text) => {
                let sent = channel.send(text);
                if !sent {
                    tracing::debug!(frame = frame.kind(), "Channel refused frame");
                }
                sent
            }
            Err(err) => {
                tracing::warn!(frame = frame.kind(), error = %err, "Failed to encode frame");
                false
            }
        }
    }

    fn emit(&self, output: TerminalOutput) {
        let _ = self.output.send(output);
    }
}

async fn next_event(channel: &mut Option<Channel>) -> ChannelEvent {
    match channel {
        Some(channel) => channel.recv().await,
        None => future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn endpoint() -> Url {
        Url::parse("ws://localhost:8082").unwrap()
    }

    fn host() -> HostConfig {
        HostConfig::new(1, "10.0.0.5", 22)
    }

    struct Harness {
        handle: SessionHandle,
        output: mpsc::UnboundedReceiver<TerminalOutput>,
        remotes: mpsc::UnboundedReceiver<RemoteChannel>,
    }

    fn start(options: SessionOptions) -> Harness {
        let (connector, remotes) = MemoryConnector::new();
        let (handle, output) = Session::spawn(Arc::new(connector), endpoint(), options);
        Harness {
            handle,
            output,
            remotes,
        }
    }

    async fn next_frame(remote: &mut RemoteChannel) -> ClientFrame {
        let text = remote.next_sent().await.expect("frame");
        serde_json::from_str(&text).expect("client frame")
    }

    async fn attach(harness: &mut Harness) -> RemoteChannel {
        harness.handle.connect(Some(host()), 80, 24);
        let mut remote = harness.remotes.recv().await.expect("channel opened");
        remote.open();
        assert_eq!(
            next_frame(&mut remote).await,
            ClientFrame::connect(TermSize::new(80, 24), host())
        );
        remote
    }

    async fn drain(output: &mut mpsc::UnboundedReceiver<TerminalOutput>) -> Vec<TerminalOutput> {
        let mut collected = Vec::new();
        while let Some(item) = output.recv().await {
            collected.push(item);
        }
        collected
    }

    #[tokio::test(start_paused = true)]
    async fn connect_sends_single_connect_frame_after_open() {
        let mut harness = start(SessionOptions::default());
        harness.handle.connect(Some(host()), 80, 24);
        let mut remote = harness.remotes.recv().await.expect("channel opened");
        assert_eq!(remote.endpoint, endpoint());

        sleep(Duration::from_millis(10)).await;
        assert_eq!(remote.try_next_command(), None);
        assert_eq!(harness.handle.state(), SessionState::Connecting);

        remote.open();
        let frame = next_frame(&mut remote).await;
        assert_eq!(frame, ClientFrame::connect(TermSize::new(80, 24), host()));
        assert_eq!(harness.handle.state(), SessionState::Open);

        remote.message(r#"{"type":"connected"}"#);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(remote.try_next_command(), None);
        assert_eq!(harness.handle.state(), SessionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_without_host_is_noop() {
        let mut harness = start(SessionOptions::default());
        harness.handle.connect(None, 80, 24);
        sleep(Duration::from_millis(10)).await;
        assert!(harness.remotes.try_recv().is_err());
        assert_eq!(harness.handle.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_connect_is_ignored() {
        let mut harness = start(SessionOptions::default());
        let _remote = attach(&mut harness).await;
        harness.handle.connect(Some(HostConfig::new(2, "10.0.0.6", 22)), 80, 24);
        sleep(Duration::from_millis(10)).await;
        assert!(harness.remotes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn resize_burst_sends_only_final_size_after_quiet_window() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;

        harness.handle.request_resize(100, 30);
        sleep(Duration::from_millis(50)).await;
        harness.handle.request_resize(101, 31);
        let second_call = Instant::now();

        let frame = next_frame(&mut remote).await;
        assert_eq!(frame, ClientFrame::Resize(TermSize::new(101, 31)));
        let waited = second_call.elapsed();
        assert!(waited >= Duration::from_millis(140), "flushed after {waited:?}");
        assert!(waited < Duration::from_millis(150), "flushed after {waited:?}");

        sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn resize_matching_last_sent_or_non_positive_is_suppressed() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;

        harness.handle.request_resize(80, 24);
        sleep(Duration::from_millis(200)).await;
        harness.handle.request_resize(0, 30);
        sleep(Duration::from_millis(200)).await;
        harness.handle.request_resize(120, 0);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(remote.try_next_command(), None);

        harness.handle.request_resize(120, 40);
        assert_eq!(
            next_frame(&mut remote).await,
            ClientFrame::Resize(TermSize::new(120, 40))
        );
        harness.handle.request_resize(120, 40);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(remote.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn resize_while_connecting_rides_on_connect_frame() {
        let mut harness = start(SessionOptions::default());
        harness.handle.connect(Some(host()), 80, 24);
        let mut remote = harness.remotes.recv().await.expect("channel opened");
        harness.handle.request_resize(132, 43);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(remote.try_next_command(), None);

        remote.open();
        assert_eq!(
            next_frame(&mut remote).await,
            ClientFrame::connect(TermSize::new(132, 43), host())
        );
        harness.handle.request_resize(132, 43);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(remote.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn input_is_sent_in_call_order_and_dropped_before_open() {
        let mut harness = start(SessionOptions::default());
        harness.handle.connect(Some(host()), 80, 24);
        harness.handle.send_input("early");
        let mut remote = harness.remotes.recv().await.expect("channel opened");
        remote.open();
        assert!(matches!(
            next_frame(&mut remote).await,
            ClientFrame::ConnectToHost(_)
        ));

        for chunk in ["l", "s", " ", "-", "l", "\r"] {
            harness.handle.send_input(chunk);
        }
        let mut received = Vec::new();
        for _ in 0..6 {
            match next_frame(&mut remote).await {
                ClientFrame::Input(data) => received.push(data),
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(received, vec!["l", "s", " ", "-", "l", "\r"]);
    }

    #[tokio::test(start_paused = true)]
    async fn output_is_rendered_in_arrival_order() {
        let mut harness = start(SessionOptions::default());
        let remote = attach(&mut harness).await;
        remote.message(r#"{"type":"data","data":"a"}"#);
        remote.message(r#"{"type":"data","data":"b"}"#);
        remote.message(r#"{"type":"data","data":"b"}"#);
        remote.message(r#"{"type":"data","data":"c"}"#);
        remote.close();

        let output = drain(&mut harness.output).await;
        let data: Vec<_> = output
            .iter()
            .filter_map(|item| match item {
                TerminalOutput::Data(data) => Some(data.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["a", "b", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_skipped() {
        let mut harness = start(SessionOptions::default());
        let remote = attach(&mut harness).await;
        remote.message("{oops");
        remote.message(r#"{"type":"mystery"}"#);
        remote.message(r#"{"type":"data","data":"still here"}"#);
        remote.close();

        let output = drain(&mut harness.output).await;
        assert_eq!(
            output,
            vec![
                TerminalOutput::Data("still here".into()),
                TerminalOutput::Status(StatusLine::ConnectionClosed),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_is_shown_and_session_stays_open() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;
        remote.message(r#"{"type":"error","message":"Authentication failed"}"#);
        sleep(Duration::from_millis(10)).await;

        assert_eq!(harness.handle.state(), SessionState::Open);
        assert_eq!(
            harness.output.recv().await,
            Some(TerminalOutput::Status(StatusLine::RemoteError(
                "Authentication failed".into()
            )))
        );
        harness.handle.send_input("retry");
        assert_eq!(
            next_frame(&mut remote).await,
            ClientFrame::Input("retry".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn remote_disconnect_replaces_generic_close_message() {
        let mut harness = start(SessionOptions::default());
        let remote = attach(&mut harness).await;
        remote.message(r#"{"type":"disconnected","message":"bye"}"#);
        remote.close();

        harness.handle.wait_closed().await;
        let output = drain(&mut harness.output).await;
        assert_eq!(
            output,
            vec![TerminalOutput::Status(StatusLine::RemoteDisconnected(
                Some("bye".into())
            ))]
        );
        assert!(output[0].render().contains("bye"));
    }

    #[tokio::test(start_paused = true)]
    async fn bare_close_shows_generic_message() {
        let mut harness = start(SessionOptions::default());
        let remote = attach(&mut harness).await;
        remote.close();

        harness.handle.wait_closed().await;
        let output = drain(&mut harness.output).await;
        assert_eq!(
            output,
            vec![TerminalOutput::Status(StatusLine::ConnectionClosed)]
        );
        assert_eq!(output[0].render(), "\r\n[Connection closed]\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_is_reported_before_close() {
        let mut harness = start(SessionOptions::default());
        harness.handle.connect(Some(host()), 80, 24);
        let remote = harness.remotes.recv().await.expect("channel opened");
        remote.error("connection refused");
        remote.close();

        harness.handle.wait_closed().await;
        assert_eq!(
            drain(&mut harness.output).await,
            vec![
                TerminalOutput::Status(StatusLine::ConnectionError),
                TerminalOutput::Status(StatusLine::ConnectionClosed),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_twice_closes_channel_once() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;

        harness.handle.disconnect();
        harness.handle.disconnect();
        assert_eq!(remote.next_command().await, Some(ChannelCommand::Close));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(harness.handle.state(), SessionState::Closing);
        assert_eq!(remote.try_next_command(), None);

        remote.close();
        harness.handle.wait_closed().await;
        harness.handle.disconnect();
        assert_eq!(harness.handle.state(), SessionState::Closed);
        assert_eq!(remote.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_resize() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;
        harness.handle.request_resize(200, 50);
        harness.handle.disconnect();
        assert_eq!(remote.next_command().await, Some(ChannelCommand::Close));
        sleep(Duration::from_millis(500)).await;
        assert_eq!(remote.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_while_connecting_ignores_late_open() {
        let mut harness = start(SessionOptions::default());
        harness.handle.connect(Some(host()), 80, 24);
        let mut remote = harness.remotes.recv().await.expect("channel opened");

        harness.handle.disconnect();
        assert_eq!(remote.next_command().await, Some(ChannelCommand::Close));
        assert_eq!(harness.handle.state(), SessionState::Closing);

        remote.open();
        sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.try_next_command(), None);
        assert_eq!(harness.handle.state(), SessionState::Closing);

        remote.close();
        harness.handle.wait_closed().await;
        assert_eq!(
            drain(&mut harness.output).await,
            vec![TerminalOutput::Status(StatusLine::ConnectionClosed)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_before_connect_finishes_without_channel() {
        let mut harness = start(SessionOptions::default());
        harness.handle.disconnect();
        harness.handle.wait_closed().await;
        assert!(harness.remotes.try_recv().is_err());
        assert!(drain(&mut harness.output).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_only_while_open() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;
        let opened = Instant::now();

        for expected_secs in [30, 60] {
            assert_eq!(next_frame(&mut remote).await, ClientFrame::Ping);
            let elapsed = opened.elapsed();
            assert!(elapsed >= Duration::from_secs(expected_secs), "ping at {elapsed:?}");
            assert!(
                elapsed < Duration::from_secs(expected_secs) + Duration::from_millis(10),
                "ping at {elapsed:?}"
            );
        }

        harness.handle.disconnect();
        assert_eq!(remote.next_command().await, Some(ChannelCommand::Close));
        sleep(Duration::from_secs(120)).await;
        assert_eq!(remote.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_stops_when_remote_closes() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;
        sleep(Duration::from_secs(10)).await;
        remote.close();
        harness.handle.wait_closed().await;
        sleep(Duration::from_secs(90)).await;
        assert_eq!(remote.try_next_command(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_tears_down() {
        let mut harness = start(SessionOptions::default());
        let mut remote = attach(&mut harness).await;
        let Harness { handle, .. } = harness;
        drop(handle);
        assert_eq!(remote.next_command().await, Some(ChannelCommand::Close));
    }

    #[tokio::test(start_paused = true)]
    async fn context_menu_paste_follows_preference() {
        let mut enabled = start(SessionOptions {
            right_click_paste: true,
            ..SessionOptions::default()
        });
        assert!(!enabled.handle.paste_from_context_menu("too early"));
        let mut remote = attach(&mut enabled).await;
        assert!(enabled.handle.paste_from_context_menu("echo hi\r"));
        assert_eq!(
            next_frame(&mut remote).await,
            ClientFrame::Input("echo hi\r".into())
        );

        let mut disabled = start(SessionOptions::default());
        let mut remote = attach(&mut disabled).await;
        assert!(!disabled.handle.paste_from_context_menu("echo hi\r"));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(remote.try_next_command(), None);
    }

    #[test]
    fn status_lines_render_bracketed_text() {
        assert_eq!(
            StatusLine::RemoteError("boom".into()).to_string(),
            "[ERROR] boom"
        );
        assert_eq!(
            StatusLine::RemoteDisconnected(None).to_string(),
            "[Disconnected]"
        );
        assert_eq!(
            StatusLine::RemoteDisconnected(Some(String::new())).to_string(),
            "[Disconnected]"
        );
        assert_eq!(StatusLine::ConnectionError.to_string(), "[Connection error]");
    }
}
