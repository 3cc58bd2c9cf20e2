//! Build script for autorebuild - embeds version information.
//!
//! `BUILD_INFO_HUMAN` is assembled from:
//!
//! 1. the crate version from Cargo.toml,
//! 2. `git describe --tags --always --dirty` when it names a tag, otherwise a
//!    pseudo-version `v{version}-{timestamp}-{commit}[+dirty]`,
//! 3. the `rustc --version` string.
//!
//! Clean checkouts use the commit timestamp so the same commit always yields
//! the same version; dirty checkouts and builds outside git use the build
//! time.

use std::process::Command;

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `None` when git is unavailable or this is not a checkout.
///
/// `.cargo-ok` is written by `cargo install --git` and is not a source
/// change.
fn is_dirty() -> Option<bool> {
    run("git", &["status", "--porcelain"]).map(|status| {
        status
            .lines()
            .filter_map(|line| line.get(3..))
            .any(|path| path != ".cargo-ok")
    })
    .or_else(|| run("git", &["rev-parse", "HEAD"]).map(|_| false))
}

fn pseudo_version() -> String {
    let commit =
        run("git", &["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".into());
    let dirty = is_dirty();

    let timestamp = match dirty {
        Some(false) => run("git", &["log", "-1", "--format=%ct"])
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
    .unwrap_or_else(Utc::now)
    .format(TIMESTAMP_FORMAT);

    let suffix = if dirty == Some(true) { "+dirty" } else { "" };

    format!(
        "v{}-{timestamp}-{commit}{suffix}",
        env!("CARGO_PKG_VERSION")
    )
}

fn git_version() -> String {
    match run("git", &["describe", "--tags", "--always", "--dirty"]) {
        // A bare hash means there are no tags to describe from.
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(),
    }
}

fn build_info() -> String {
    let mut parts = vec![
        env!("CARGO_PKG_VERSION").to_string(),
        format!("({})", git_version()),
    ];
    parts.extend(run("rustc", &["--version"]));
    parts.join(" ")
}
