use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-env-changed=CONSENT_GATE_VCS_REVISION");

    if std::env::var_os("CONSENT_GATE_VCS_REVISION").is_some() {
        return;
    }
    let revision = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|revision| revision.trim().to_string())
        .filter(|revision| !revision.is_empty());
    if let Some(revision) = revision {
        println!("cargo:rustc-env=CONSENT_GATE_VCS_REVISION={revision}");
    }
}
