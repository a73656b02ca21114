use crate::session::channel::{Channel, ChannelCommand, ChannelConnector, ChannelEvent};
use futures_util::{SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

/// How long a locally initiated close waits for the broker's close reply.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Channels over a WebSocket to the session broker, one text message per frame.
///
/// Only plain `ws://` endpoints are supported without a TLS-enabled build of
/// tokio-tungstenite; `wss://` handshakes fail and surface as channel errors.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl ChannelConnector for WebSocketConnector {
    fn open(&self, endpoint: &Url) -> Channel {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let endpoint = endpoint.to_string();
        tokio::spawn(async move {
            run_socket(endpoint, command_rx, event_tx).await;
        });
        Channel::new(command_tx, event_rx)
    }
}

async fn run_socket(
    endpoint: String,
    mut commands: mpsc::UnboundedReceiver<ChannelCommand>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let handshake = tokio::select! {
        result = connect_async(endpoint.as_str()) => Some(result),
        _ = close_requested(&mut commands) => None,
    };
    let stream = match handshake {
        Some(Ok((stream, _response))) => stream,
        Some(Err(err)) => {
            tracing::warn!(endpoint = %endpoint, error = %err, "WebSocket handshake failed");
            let _ = events.send(ChannelEvent::Error(err.to_string()));
            let _ = events.send(ChannelEvent::Closed);
            return;
        }
        None => {
            tracing::debug!(endpoint = %endpoint, "WebSocket handshake abandoned");
            let _ = events.send(ChannelEvent::Closed);
            return;
        }
    };
    tracing::debug!(endpoint = %endpoint, "WebSocket open");
    let _ = events.send(ChannelEvent::Open);

    let (mut sink, mut source) = stream.split();
    let mut closing = false;
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ChannelCommand::Send(text)) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        report_error(&events, &err, false);
                        break;
                    }
                }
                Some(ChannelCommand::Close) | None => {
                    closing = true;
                    break;
                }
            },
            message = source.next() => match message {
                Some(Ok(message)) => {
                    if !deliver(&events, message) {
                        let _ = sink.close().await;
                        break;
                    }
                }
                Some(Err(err)) => {
                    report_error(&events, &err, false);
                    break;
                }
                None => break,
            },
        }
    }

    if closing {
        let close = async {
            if let Err(err) = sink.close().await {
                report_error(&events, &err, true);
                return;
            }
            drain(&mut source, &events).await;
        };
        if timeout(CLOSE_HANDSHAKE_TIMEOUT, close).await.is_err() {
            tracing::debug!(endpoint = %endpoint, "Close handshake timed out");
        }
    }

    tracing::debug!(endpoint = %endpoint, "WebSocket closed");
    let _ = events.send(ChannelEvent::Closed);
}

/// Resolves once the session asks for the channel to close or drops it.
/// Nothing is sent before open, so queued frames are discarded.
async fn close_requested(commands: &mut mpsc::UnboundedReceiver<ChannelCommand>) {
    while let Some(ChannelCommand::Send(_)) = commands.recv().await {}
}

/// Forward a data message to the session. Returns false on a close frame.
fn deliver(events: &mpsc::UnboundedSender<ChannelEvent>, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            let _ = events.send(ChannelEvent::Message(text));
        }
        Message::Binary(bytes) => {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            let _ = events.send(ChannelEvent::Message(text));
        }
        Message::Close(frame) => {
            tracing::debug!(?frame, "WebSocket close received");
            return false;
        }
        _ => {}
    }
    true
}

/// Read until the broker answers our close frame or goes away.
async fn drain<S>(source: &mut S, events: &mpsc::UnboundedSender<ChannelEvent>)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = source.next().await {
        match message {
            Ok(message) => {
                if !deliver(events, message) {
                    break;
                }
            }
            Err(err) => {
                report_error(events, &err, true);
                break;
            }
        }
    }
}

fn report_error(events: &mpsc::UnboundedSender<ChannelEvent>, err: &WsError, closing: bool) {
    if closing && matches!(err, WsError::ConnectionClosed | WsError::AlreadyClosed) {
        return;
    }
    tracing::warn!(error = %err, "WebSocket transport error");
    let _ = events.send(ChannelEvent::Error(err.to_string()));
}
