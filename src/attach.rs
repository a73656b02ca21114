//! Drive one session from the local terminal: raw stdin in, shell output out.

use crate::config::{AttachArgs, Config};
use crate::endpoint;
use crate::error::{ErrorCode, ErrorDetail, TermResult};
use crate::session::{Session, SessionHandle, SessionOptions, TerminalOutput, WebSocketConnector};
use crate::version;
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;
use tokio::signal::unix::{SignalKind, signal};

/// Ctrl-] detaches, as in telnet.
const DETACH_BYTE: u8 = 0x1d;

pub async fn run(config: &Config, args: &AttachArgs) -> TermResult<()> {
    let host = args.host_config()?;
    let endpoint = endpoint::resolve(&config.broker)?;
    let (cols, rows) = crossterm::terminal::size()
        .unwrap_or((config.session.default_cols, config.session.default_rows));

    let (handle, mut output) = Session::spawn(
        Arc::new(WebSocketConnector),
        endpoint.clone(),
        SessionOptions::from_config(&config.session, &config.terminal),
    );
    tracing::info!(
        session_id = handle.id(),
        host = %host.label(),
        endpoint = %endpoint,
        version = version::LABEL,
        git = version::GIT_SHA,
        "Attaching"
    );

    let mut window_changes = signal(SignalKind::window_change()).map_err(|err| {
        ErrorDetail::new(ErrorCode::IoError, "Failed to watch terminal size")
            .with_details(err.to_string())
    })?;
    let _raw_mode = RawModeGuard::enable()?;
    handle.connect(Some(host), cols, rows);
    spawn_stdin_reader(handle.clone());

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            item = output.recv() => match item {
                Some(item) => write_output(&mut stdout, &item)?,
                None => break,
            },
            Some(()) = window_changes.recv() => {
                if let Ok((cols, rows)) = crossterm::terminal::size() {
                    handle.request_resize(cols, rows);
                }
            }
        }
    }
    Ok(())
}

fn write_output(stdout: &mut std::io::Stdout, item: &TerminalOutput) -> TermResult<()> {
    let mut lock = stdout.lock();
    lock.write_all(item.render().as_bytes())?;
    lock.flush()?;
    Ok(())
}

fn spawn_stdin_reader(handle: SessionHandle) {
    thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buffer = [0u8; 4096];
        let mut carry = Vec::new();
        loop {
            let n = match stdin.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    tracing::warn!(error = %err, "Terminal input read failed");
                    break;
                }
            };
            let chunk = &buffer[..n];
            let detach_at = chunk.iter().position(|byte| *byte == DETACH_BYTE);
            carry.extend_from_slice(&chunk[..detach_at.unwrap_or(n)]);
            let text = take_complete_utf8(&mut carry);
            if !text.is_empty() {
                handle.send_input(text);
            }
            if detach_at.is_some() {
                tracing::debug!("Detach requested");
                break;
            }
        }
        handle.disconnect();
    });
}

/// Drain the longest decodable prefix of `pending`, leaving a trailing
/// partial UTF-8 sequence for the next read. Invalid bytes are replaced.
fn take_complete_utf8(pending: &mut Vec<u8>) -> String {
    let mut text = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(valid) => {
                text.push_str(valid);
                pending.clear();
                return text;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[..valid_up_to]));
                match err.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        pending.drain(..valid_up_to + len);
                    }
                    None => {
                        pending.drain(..valid_up_to);
                        return text;
                    }
                }
            }
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> TermResult<Self> {
        crossterm::terminal::enable_raw_mode().map_err(|err| {
            ErrorDetail::new(ErrorCode::Unsupported, "Failed to enable raw terminal mode")
                .with_details(err.to_string())
        })?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}
