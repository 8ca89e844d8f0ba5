use std::fs;
use std::path::{Path, PathBuf};

const ALLOWED_RAW_BROADCAST_CALLERS: &[&str] = &["src/adapters/senders.rs"];

const ALLOWED_SEND_AND_CONFIRM_CALLERS: &[&str] = &[
    "src/strategy/claimer.rs",
    "src/strategy/orchestrator.rs",
    "src/strategy/submission.rs",
];

fn collect_rust_files(root: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rust_files(&path, out);
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            out.push(path);
        }
    }
}

/// `file:line: text` for every line matching `pattern` outside `allowed`.
fn offenders(pattern: &str, allowed: &[&str]) -> Vec<String> {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    collect_rust_files(&repo_root.join("src"), &mut files);

    let mut found = Vec::new();
    for file in files {
        let rel = file
            .strip_prefix(repo_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .replace('\\', "/");
        if allowed.iter().any(|a| *a == rel) {
            continue;
        }
        let content = fs::read_to_string(&file).unwrap_or_default();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("//") || !trimmed.contains(pattern) {
                continue;
            }
            found.push(format!("{rel}:{}: {}", idx + 1, trimmed));
        }
    }
    found
}

#[test]
fn raw_broadcasts_are_limited_to_sender_adapters() {
    let found = offenders(".send_transaction(", ALLOWED_RAW_BROADCAST_CALLERS);
    assert!(
        found.is_empty(),
        "raw transaction broadcast outside sender adapters:\n{}",
        found.join("\n")
    );
}

#[test]
fn writes_go_through_the_claim_and_sweep_paths() {
    let found = offenders(".send_and_confirm(", ALLOWED_SEND_AND_CONFIRM_CALLERS);
    assert!(
        found.is_empty(),
        "transaction submission outside the claim/sweep paths:\n{}",
        found.join("\n")
    );
}
