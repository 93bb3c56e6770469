//! Scan command - print a directory snapshot.

use anyhow::{Context, Result};
use std::path::Path;
use sync_types::FileRecord;

/// Run the scan command.
pub async fn run(dir: &Path, json: bool) -> Result<()> {
    let records = sync_store::try_generate(dir)
        .await
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    tracing::debug!(dir = %dir.display(), files = records.len(), "Scanned directory");

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print!("{}", render(&records));
    }
    Ok(())
}

/// One line per file: hash, two spaces, name.
fn render(records: &[FileRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!("{}  {}\n", record.content_hash, record.name));
    }
    out.push_str(&format!("{} file(s)\n", records.len()));
    out
}
