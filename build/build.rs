use std::env;
use std::path::Path;
use std::process::Command;

fn main() {
    let label = env::var("TERMWIRE_VERSION_LABEL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    let git_sha = resolve_git_sha();
    let build_time = resolve_build_time();

    println!("cargo:rustc-env=TERMWIRE_VERSION_LABEL={label}");
    println!("cargo:rustc-env=TERMWIRE_GIT_SHA={git_sha}");
    println!("cargo:rustc-env=TERMWIRE_BUILD_TIME={build_time}");

    println!("cargo:rerun-if-env-changed=TERMWIRE_VERSION_LABEL");
    println!("cargo:rerun-if-changed=.git/HEAD");
}

fn resolve_git_sha() -> String {
    if let Ok(value) = env::var("GITHUB_SHA") {
        let trimmed = value.trim();
        return trimmed.chars().take(7).collect();
    }

    if !Path::new(".git").exists() {
        return String::new();
    }

    let Some(sha) = git_output(&["rev-parse", "--short", "HEAD"]) else {
        return String::new();
    };
    let dirty = git_output(&["status", "--porcelain"]).is_some_and(|s| !s.trim().is_empty());
    if dirty { format!("{sha}-dirty") } else { sha }
}

fn resolve_build_time() -> String {
    let from_epoch = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|epoch| time::OffsetDateTime::from_unix_timestamp(epoch).ok());

    from_epoch
        .unwrap_or_else(time::OffsetDateTime::now_utc)
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let value = text.trim();
    (!value.is_empty()).then(|| value.to_string())
}
