//! JSON frames exchanged with the session broker.
//!
//! Client frames are adjacently tagged (`{"type": ..., "data": ...}`), server
//! frames are internally tagged by `type`.

use crate::error::TermResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Connection target supplied by host management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub id: u64,
    pub ip: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<u64>,
    /// Fields the broker understands but this client does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HostConfig {
    pub fn new(id: u64, ip: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            ip: ip.into(),
            port,
            name: None,
            username: None,
            auth_type: None,
            credential_id: None,
            extra: Map::new(),
        }
    }

    pub fn label(&self) -> String {
        match &self.username {
            Some(user) => format!("{user}@{}:{}", self.ip, self.port),
            None => format!("{}:{}", self.ip, self.port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl TermSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    pub fn is_positive(&self) -> bool {
        self.cols > 0 && self.rows > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPayload {
    pub cols: u16,
    pub rows: u16,
    pub host_config: HostConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientFrame {
    ConnectToHost(ConnectPayload),
    Input(String),
    Resize(TermSize),
    Ping,
}

impl ClientFrame {
    pub fn connect(size: TermSize, host_config: HostConfig) -> Self {
        ClientFrame::ConnectToHost(ConnectPayload {
            cols: size.cols,
            rows: size.rows,
            host_config,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::ConnectToHost(_) => "connectToHost",
            ClientFrame::Input(_) => "input",
            ClientFrame::Resize(_) => "resize",
            ClientFrame::Ping => "ping",
        }
    }

    pub fn encode(&self) -> TermResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Data {
        data: String,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    Connected,
    Disconnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Pong,
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
