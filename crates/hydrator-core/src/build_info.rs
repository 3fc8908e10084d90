//! Build-time metadata embedded by the build script.
//!
//! Reported by `hydrator --version` and the proxy's `/health` route.

/// The git revision at build time (`git describe`, `-dirty` when modified).
pub const GIT_HASH: &str = env!("HYDRATOR_GIT_HASH");

/// The build timestamp as a Unix epoch string.
pub const BUILD_TIMESTAMP: &str = env!("HYDRATOR_BUILD_TIMESTAMP");

/// The build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("HYDRATOR_BUILD_PROFILE");

/// The crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version with git hash and profile, e.g. `"0.1.0 (abc1234, debug)"`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("HYDRATOR_GIT_HASH"),
    ", ",
    env!("HYDRATOR_BUILD_PROFILE"),
    ")"
);

/// Return a formatted version string including git hash and profile.
pub fn version_string() -> String {
    LONG_VERSION.to_string()
}
