//! Diff command - compare two local directories.

use anyhow::{Context, Result};
use std::path::Path;
use sync_types::DiffResult;

/// Run the diff command.
pub async fn run(local: &Path, remote: &Path, json: bool) -> Result<()> {
    let local_records = sync_store::try_generate(local)
        .await
        .with_context(|| format!("Failed to scan {}", local.display()))?;
    let remote_records = sync_store::try_generate(remote)
        .await
        .with_context(|| format!("Failed to scan {}", remote.display()))?;

    let diff = sync_core::compare(&local_records, &remote_records);
    tracing::debug!(
        local_only = diff.local_only.len(),
        remote_only = diff.remote_only.len(),
        renamed = diff.renamed.len(),
        "Compared directories"
    );

    if json {
        let bytes = diff.to_json()?;
        println!("{}", String::from_utf8_lossy(&bytes));
    } else {
        print!("{}", render(&diff));
    }
    Ok(())
}

/// `+` local only, `-` remote only, `~` same content under another name.
fn render(diff: &DiffResult) -> String {
    if diff.is_empty() {
        return "Directories are in sync\n".to_string();
    }

    let mut out = String::new();
    for entry in &diff.local_only {
        out.push_str(&format!("+ {}\n", entry.name));
    }
    for entry in &diff.remote_only {
        out.push_str(&format!("- {}\n", entry.name));
    }
    for entry in &diff.renamed {
        out.push_str(&format!("~ {} -> {}\n", entry.rename_from, entry.rename_to));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::FileRecord;
    use tempfile::tempdir;

    #[test]
    fn render_marks_each_partition() {
        let diff = sync_core::compare(
            &[FileRecord::new("mine.txt", "h1"), FileRecord::new("x.txt", "h3")],
            &[FileRecord::new("theirs.txt", "h2"), FileRecord::new("y.txt", "h3")],
        );
        let out = render(&diff);
        assert!(out.contains("+ mine.txt\n"));
        assert!(out.contains("- theirs.txt\n"));
        assert!(out.contains("~ y.txt -> x.txt\n"));
    }

    #[test]
    fn render_in_sync() {
        assert_eq!(render(&DiffResult::default()), "Directories are in sync\n");
    }

    #[tokio::test]
    async fn diff_two_directories() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        std::fs::write(a.path().join("a.txt"), b"a").unwrap();
        assert!(run(a.path(), b.path(), false).await.is_ok());
        assert!(run(a.path(), b.path(), true).await.is_ok());
    }
}
