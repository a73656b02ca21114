//! Build metadata stamped in by `build/build.rs`.

pub const LABEL: &str = env!("TERMWIRE_VERSION_LABEL");
/// Short commit hash, empty when built outside a checkout.
pub const GIT_SHA: &str = env!("TERMWIRE_GIT_SHA");
pub const BUILD_TIME: &str = env!("TERMWIRE_BUILD_TIME");

/// `--version` text.
pub const VERSION: &str = if GIT_SHA.is_empty() {
    concat!(
        env!("TERMWIRE_VERSION_LABEL"),
        " (built ",
        env!("TERMWIRE_BUILD_TIME"),
        ")"
    )
} else {
    concat!(
        env!("TERMWIRE_VERSION_LABEL"),
        " (git ",
        env!("TERMWIRE_GIT_SHA"),
        ", built ",
        env!("TERMWIRE_BUILD_TIME"),
        ")"
    )
};
