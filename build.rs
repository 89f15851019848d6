use std::{env, process::Command};

fn main() {
    capture_build_info();
}

fn capture_build_info() {
    // Generate build timestamp
    let build_timestamp = chrono::Utc::now().format("%Y%m%d.%H%M%S").to_string();
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);

    // Get git commit hash (short version)
    let git_hash = get_git_hash().unwrap_or_else(|| "unknown".to_string());
    let git_hash_short = if git_hash.len() >= 7 {
        git_hash[0..7].to_string()
    } else {
        git_hash.clone()
    };
    println!("cargo:rustc-env=GIT_HASH_SHORT={}", git_hash_short);

    // Target platform info
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_else(|_| "unknown".to_string());
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=TARGET_PLATFORM={}-{}", target_arch, target_os);

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    println!("cargo:rustc-env=BUILD_STRING={}.{}", version, build_timestamp);

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}

fn get_git_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        let hash = String::from_utf8(output.stdout).ok()?;
        Some(hash.trim().to_string())
    } else {
        None
    }
}
