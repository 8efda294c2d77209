//! Build metadata embedded by `build.rs`.

pub const GIT_HASH: &str = env!("TABSHIM_GIT_HASH");

/// `debug` or `release`.
pub const BUILD_PROFILE: &str = env!("TABSHIM_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `"0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}
