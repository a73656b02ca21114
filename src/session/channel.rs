use tokio::sync::mpsc;
use url::Url;

/// Lifecycle and traffic reported by a transport to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(String),
    Error(String),
    Closed,
}

/// Requests a session makes of its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCommand {
    Send(String),
    Close,
}

/// Opens channels to a session broker.
///
/// `open` must return immediately; the handshake runs in the background and
/// resolves to `Open`, or to `Error` followed by `Closed`.
pub trait ChannelConnector: Send + Sync {
    fn open(&self, endpoint: &Url) -> Channel;
}

/// Session-side end of a bidirectional channel.
#[derive(Debug)]
pub struct Channel {
    commands: mpsc::UnboundedSender<ChannelCommand>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    close_requested: bool,
}

impl Channel {
    pub fn new(
        commands: mpsc::UnboundedSender<ChannelCommand>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Self {
        Self {
            commands,
            events,
            close_requested: false,
        }
    }

    pub fn send(&self, text: String) -> bool {
        if self.close_requested {
            return false;
        }
        self.commands.send(ChannelCommand::Send(text)).is_ok()
    }

    /// Ask the transport to close. Returns `true` only for the first call.
    pub fn close(&mut self) -> bool {
        if self.close_requested {
            return false;
        }
        self.close_requested = true;
        let _ = self.commands.send(ChannelCommand::Close);
        true
    }

    /// Next event, or `Closed` once the transport is gone.
    pub async fn recv(&mut self) -> ChannelEvent {
        self.events.recv().await.unwrap_or(ChannelEvent::Closed)
    }
}

/// Far end of a [`Channel`], standing in for a broker.
#[derive(Debug)]
pub struct RemoteChannel {
    pub endpoint: Url,
    commands: mpsc::UnboundedReceiver<ChannelCommand>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl RemoteChannel {
    pub fn open(&self) {
        self.emit(ChannelEvent::Open);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.emit(ChannelEvent::Message(text.into()));
    }

    pub fn error(&self, description: impl Into<String>) {
        self.emit(ChannelEvent::Error(description.into()));
    }

    pub fn close(&self) {
        self.emit(ChannelEvent::Closed);
    }

    pub fn emit(&self, event: ChannelEvent) {
        let _ = self.events.send(event);
    }

    pub async fn next_command(&mut self) -> Option<ChannelCommand> {
        self.commands.recv().await
    }

    pub fn try_next_command(&mut self) -> Option<ChannelCommand> {
        self.commands.try_recv().ok()
    }

    /// Next text sent by the session; `None` once it asks to close.
    pub async fn next_sent(&mut self) -> Option<String> {
        match self.commands.recv().await? {
            ChannelCommand::Send(text) => Some(text),
            ChannelCommand::Close => None,
        }
    }
}

pub fn memory_channel(endpoint: Url) -> (Channel, RemoteChannel) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        Channel::new(command_tx, event_rx),
        RemoteChannel {
            endpoint,
            commands: command_rx,
            events: event_tx,
        },
    )
}

/// Connector that hands each opened channel's far end to a receiver.
pub struct MemoryConnector {
    remotes: mpsc::UnboundedSender<RemoteChannel>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RemoteChannel>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { remotes: tx }, rx)
    }
}

impl ChannelConnector for MemoryConnector {
    fn open(&self, endpoint: &Url) -> Channel {
        let (channel, remote) = memory_channel(endpoint.clone());
        let _ = self.remotes.send(remote);
        channel
    }
}
