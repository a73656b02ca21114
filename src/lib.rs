//! Client side of the terminal session transport: a framed JSON protocol over
//! a WebSocket to a session broker, and the per-view connection state machine
//! that drives it.

pub mod attach;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod logging;
pub mod session;
pub mod version;

pub use frame::{ClientFrame, HostConfig, ServerFrame, TermSize};
pub use session::{
    Session, SessionHandle, SessionOptions, SessionState, StatusLine, TerminalOutput,
};
