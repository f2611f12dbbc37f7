use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    let manifest = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let git_dir = manifest.ancestors().map(|p| p.join(".git")).find(|p| p.exists());

    let (sha, date) = match &git_dir {
        Some(dir) => {
            watch(dir);
            (
                git(dir, &["rev-parse", "--short=10", "HEAD"]),
                git(dir, &["log", "-1", "--format=%cs"]),
            )
        }
        None => (None, None),
    };

    // release builds outside a checkout pass the stamp in directly
    let sha = env::var("TALLY_BUILD_SHA").ok().or(sha).unwrap_or_else(|| "dev".into());
    let stamp = match date {
        Some(date) => format!("{sha} {date}"),
        None => sha,
    };
    println!("cargo:rustc-env=TALLY_BUILD_SHA={stamp}");
    println!("cargo:rerun-if-env-changed=TALLY_BUILD_SHA");
}

fn git(git_dir: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").arg("--git-dir").arg(git_dir).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// HEAD moves on checkout; the branch ref it names moves on commit.
fn watch(git_dir: &Path) {
    let head = git_dir.join("HEAD");
    println!("cargo:rerun-if-changed={}", head.display());
    if let Ok(contents) = std::fs::read_to_string(&head) {
        if let Some(reference) = contents.strip_prefix("ref: ") {
            println!("cargo:rerun-if-changed={}", git_dir.join(reference.trim()).display());
        }
    }
}
