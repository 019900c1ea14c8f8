use std::process::Command;

fn git_short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    let base = env!("CARGO_PKG_VERSION");

    // Pre-release label, e.g. WATTSON_PRERELEASE=rc1
    let prerelease = std::env::var("WATTSON_PRERELEASE")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    // CI builds without a checkout pass GIT_SHA instead
    let sha = git_short_sha().or_else(|| std::env::var("GIT_SHA").ok().filter(|s| !s.is_empty()));

    let version = match (prerelease, sha) {
        (Some(pre), Some(sha)) => format!("{base}-{pre}+{sha}"),
        (Some(pre), None) => format!("{base}-{pre}"),
        (None, _) => base.to_string(),
    };

    println!("cargo:rustc-env=APP_VERSION={version}");
    println!("cargo:rustc-env=APP_USER_AGENT=wattson/{version}");

    println!("cargo:rerun-if-env-changed=WATTSON_PRERELEASE");
    println!("cargo:rerun-if-env-changed=GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
