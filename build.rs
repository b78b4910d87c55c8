// build.rs - Build metadata for PULSOX
//
// Exposes the values read by `pulsox::build_info` as compile-time env vars.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");

    println!(
        "cargo:rustc-env=PULSOX_BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339()
    );

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=PULSOX_TARGET={}", target);

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=PULSOX_PROFILE={}", profile);

    // Left unset outside a git checkout
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok());
    if let Some(hash) = git_hash {
        println!("cargo:rustc-env=PULSOX_GIT_HASH={}", hash.trim());
    }
}
