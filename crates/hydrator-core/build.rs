use std::path::Path;
use std::process::Command;

/// Build metadata exported to `build_info`.
///
/// Builds from a source tarball have no git checkout; packagers can pin the
/// revision with `HYDRATOR_GIT_HASH` and the timestamp with
/// `SOURCE_DATE_EPOCH`.
fn main() {
    println!("cargo:rerun-if-env-changed=HYDRATOR_GIT_HASH");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let revision = std::env::var("HYDRATOR_GIT_HASH")
        .ok()
        .filter(|r| !r.is_empty())
        .or_else(|| git(&["describe", "--always", "--dirty", "--abbrev=7"]))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=HYDRATOR_GIT_HASH={revision}");

    let timestamp = std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .filter(|t| t.parse::<u64>().is_ok())
        .unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_secs())
                .to_string()
        });
    println!("cargo:rustc-env=HYDRATOR_BUILD_TIMESTAMP={timestamp}");

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=HYDRATOR_BUILD_PROFILE={profile}");

    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        let head = Path::new(&git_dir).join("HEAD");
        let index = Path::new(&git_dir).join("index");
        println!("cargo:rerun-if-changed={}", head.display());
        println!("cargo:rerun-if-changed={}", index.display());
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
