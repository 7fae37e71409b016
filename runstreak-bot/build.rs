//! Build script for runstreak-bot
//!
//! Captures build identification as compile-time environment variables.
//! `src/main.rs` reads them with `env!` and logs them in the banner the
//! `runstreak` binary prints at startup, so a log file names the exact
//! build that wrote it:
//! - `GIT_HASH`: git commit hash (short form)
//! - `BUILD_TIMESTAMP`: build timestamp
//! - `BUILD_PROFILE`: build profile (debug/release)

use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);

    // No rerun-if-changed directives: Cargo reruns this script on every build
}
