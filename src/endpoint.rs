use crate::config::{BrokerConfig, Environment};
use crate::error::{ErrorCode, ErrorDetail, TermResult};
use url::Url;

/// Resolve the session broker URL for the configured environment.
///
/// An explicit `broker.url` wins. Development talks to a fixed local port;
/// production follows the page the terminal is served from, upgrading to
/// `wss` when the page is served over TLS.
pub fn resolve(broker: &BrokerConfig) -> TermResult<Url> {
    if let Some(explicit) = broker.url.as_deref().filter(|value| !value.trim().is_empty()) {
        let url = Url::parse(explicit.trim())?;
        return ensure_websocket(url);
    }

    match broker.environment {
        Environment::Development => Ok(Url::parse(&format!(
            "ws://localhost:{}",
            broker.dev_port
        ))?),
        Environment::Production => from_page(&broker.page_url, &broker.path_prefix),
    }
}

fn from_page(page_url: &str, path_prefix: &str) -> TermResult<Url> {
    let page = Url::parse(page_url)?;
    let scheme = match page.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(ErrorDetail::new(
                ErrorCode::InvalidArgument,
                "Page URL must use http or https",
            )
            .with_details(other.to_string())
            .into());
        }
    };
    let host = page.host_str().ok_or_else(|| {
        ErrorDetail::new(ErrorCode::InvalidArgument, "Page URL has no host")
    })?;
    let authority = match page.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path = if path_prefix.starts_with('/') {
        path_prefix.to_string()
    } else {
        format!("/{path_prefix}")
    };
    Ok(Url::parse(&format!("{scheme}://{authority}{path}"))?)
}

fn ensure_websocket(url: Url) -> TermResult<Url> {
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ErrorDetail::new(
            ErrorCode::InvalidArgument,
            "Broker URL must use ws or wss",
        )
        .with_details(other.to_string())
        .into()),
    }
}
