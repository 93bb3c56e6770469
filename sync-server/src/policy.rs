//! Ingest strategies for uploaded files.
//!
//! When a client answers with `ClientFiles`, the active [`IngestPolicy`]
//! decides what gets written to the server directory and what gets
//! rebroadcast. Exactly one policy is active per server.

use std::sync::Mutex;

use async_trait::async_trait;
use sync_core::{standardize_file_name, PolicyKind, VersionDecision, VersionLedger};
use sync_store::FileStore;
use sync_types::ContentBlob;

/// Result of ingesting one `ClientFiles` envelope.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Names written to the server directory.
    pub stored: Vec<String>,
    /// Blobs to send to the other clients.
    pub broadcast: Vec<ContentBlob>,
    /// Incoming names that were not kept, with the reason.
    pub dropped: Vec<(String, String)>,
    /// Blobs that failed to decode or write.
    pub failed: usize,
}

/// Strategy applied to uploaded files.
#[async_trait]
pub trait IngestPolicy: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> PolicyKind;

    /// Persist `blobs` and pick what to rebroadcast.
    ///
    /// Best effort: a failing blob is counted and skipped, earlier writes
    /// stay on disk.
    async fn ingest(&self, store: &FileStore, blobs: Vec<ContentBlob>) -> IngestOutcome;
}

/// Build the policy selected in configuration.
pub fn policy_for(kind: PolicyKind) -> Box<dyn IngestPolicy> {
    match kind {
        PolicyKind::HashDiff => Box::new(HashDiffIngest),
        PolicyKind::Versioned => Box::new(VersionedIngest::new()),
    }
}

/// Store everything, broadcast everything that was stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashDiffIngest;

#[async_trait]
impl IngestPolicy for HashDiffIngest {
    fn kind(&self) -> PolicyKind {
        PolicyKind::HashDiff
    }

    async fn ingest(&self, store: &FileStore, blobs: Vec<ContentBlob>) -> IngestOutcome {
        let report = store.write_all(&blobs).await;
        let failed = report.failed.len();
        let broadcast = blobs
            .into_iter()
            .filter(|b| !report.failed.iter().any(|(name, _)| *name == b.name))
            .collect();

        IngestOutcome {
            stored: report.written,
            broadcast,
            dropped: Vec::new(),
            failed,
        }
    }
}

/// Keep only the newest version of each file.
///
/// Incoming files are matched against everything accepted since the
/// server started: first by identical payload, then by name with the
/// version suffix removed. Accepted files are stored as `stem_v<version>.ext`
/// and a superseded file is deleted.
///
/// Uploads are applied one blob at a time across all connections, so the
/// decision, the write and the ledger update for a blob never interleave
/// with another upload.
#[derive(Debug, Default)]
pub struct VersionedIngest {
    ledger: Mutex<VersionLedger>,
    gate: tokio::sync::Mutex<()>,
}

impl VersionedIngest {
    /// Policy with an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently tracked.
    pub fn tracked(&self) -> usize {
        self.ledger.lock().map(|l| l.len()).unwrap_or(0)
    }

    fn peek(&self, blob: &ContentBlob) -> VersionDecision {
        match self.ledger.lock() {
            Ok(ledger) => ledger.decide(blob),
            Err(poisoned) => poisoned.into_inner().decide(blob),
        }
    }

    fn offer(&self, blob: &ContentBlob) -> VersionDecision {
        match self.ledger.lock() {
            Ok(mut ledger) => ledger.offer(blob),
            Err(poisoned) => poisoned.into_inner().offer(blob),
        }
    }
}

#[async_trait]
impl IngestPolicy for VersionedIngest {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Versioned
    }

    async fn ingest(&self, store: &FileStore, blobs: Vec<ContentBlob>) -> IngestOutcome {
        let mut outcome = IngestOutcome::default();

        for blob in blobs {
            let named = blob.renamed(standardize_file_name(&blob.name, &blob.version));
            let _turn = self.gate.lock().await;

            // Write before recording so a failed write leaves the ledger as it was
            match self.peek(&named) {
                VersionDecision::Drop {
                    existing,
                    current_version,
                } => {
                    tracing::info!(
                        name = %blob.name,
                        version = %blob.version,
                        %existing,
                        %current_version,
                        "Dropping file, not newer than known version"
                    );
                    outcome.dropped.push((
                        blob.name.clone(),
                        format!("{existing} is at version {current_version}"),
                    ));
                    continue;
                }
                VersionDecision::New | VersionDecision::Replace { .. } => {}
            }

            if let Err(e) = store.write_blob(&named, None).await {
                tracing::warn!(name = %named.name, error = %e, "Failed to write file");
                outcome.failed += 1;
                continue;
            }

            match self.offer(&named) {
                VersionDecision::New => {}
                VersionDecision::Replace {
                    existing,
                    previous_version,
                } => {
                    if existing != named.name {
                        match store.remove(&existing).await {
                            Ok(_) => tracing::info!(
                                old = %existing,
                                %previous_version,
                                new = %named.name,
                                "Replaced older version"
                            ),
                            Err(e) => tracing::warn!(
                                name = %existing,
                                error = %e,
                                "Failed to remove superseded file"
                            ),
                        }
                    }
                }
                VersionDecision::Drop {
                    existing,
                    current_version,
                } => {
                    if existing != named.name {
                        let _ = store.remove(&named.name).await;
                    }
                    outcome.dropped.push((
                        blob.name.clone(),
                        format!("{existing} is at version {current_version}"),
                    ));
                    continue;
                }
            }

            outcome.stored.push(named.name.clone());
            outcome.broadcast.push(named);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(name: &str, content: &[u8], version: &str) -> ContentBlob {
        ContentBlob::encode(name, content).with_version(version)
    }

    fn setup() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn policy_for_selects_kind() {
        assert_eq!(policy_for(PolicyKind::HashDiff).kind(), PolicyKind::HashDiff);
        assert_eq!(policy_for(PolicyKind::Versioned).kind(), PolicyKind::Versioned);
    }

    #[tokio::test]
    async fn hash_diff_stores_and_broadcasts_all() {
        let (dir, store) = setup();
        let outcome = HashDiffIngest
            .ingest(&store, vec![blob("a.txt", b"a", "1.0"), blob("b.txt", b"b", "1.0")])
            .await;

        assert_eq!(outcome.stored, vec!["a.txt", "b.txt"]);
        assert_eq!(outcome.broadcast.len(), 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"a");
    }

    #[tokio::test]
    async fn hash_diff_skips_failed_blob_in_broadcast() {
        let (dir, store) = setup();
        let outcome = HashDiffIngest
            .ingest(
                &store,
                vec![
                    blob("good.txt", b"ok", "1.0"),
                    ContentBlob::new("bad.txt", "%%% not base64 %%%"),
                ],
            )
            .await;

        assert_eq!(outcome.stored, vec!["good.txt"]);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.broadcast.len(), 1);
        assert_eq!(outcome.broadcast[0].name, "good.txt");
        assert!(!dir.path().join("bad.txt").exists());
    }

    #[tokio::test]
    async fn versioned_stores_standardized_name() {
        let (dir, store) = setup();
        let policy = VersionedIngest::new();

        let outcome = policy.ingest(&store, vec![blob("tool.xml", b"v1", "1.0")]).await;

        assert_eq!(outcome.stored, vec!["tool_v1.0.xml"]);
        assert_eq!(outcome.broadcast[0].name, "tool_v1.0.xml");
        assert!(dir.path().join("tool_v1.0.xml").exists());
        assert_eq!(policy.tracked(), 1);
    }

    #[tokio::test]
    async fn versioned_newer_replaces_older() {
        let (dir, store) = setup();
        let policy = VersionedIngest::new();

        policy.ingest(&store, vec![blob("tool.xml", b"v1", "1.0")]).await;
        let outcome = policy.ingest(&store, vec![blob("tool.xml", b"v2", "2.0")]).await;

        assert_eq!(outcome.stored, vec!["tool_v2.0.xml"]);
        assert_eq!(outcome.broadcast.len(), 1);
        assert!(dir.path().join("tool_v2.0.xml").exists());
        assert!(!dir.path().join("tool_v1.0.xml").exists());
        assert_eq!(policy.tracked(), 1);
    }

    #[tokio::test]
    async fn versioned_older_or_equal_dropped() {
        let (dir, store) = setup();
        let policy = VersionedIngest::new();

        policy.ingest(&store, vec![blob("tool.xml", b"v2", "2.0")]).await;
        let outcome = policy
            .ingest(
                &store,
                vec![blob("tool.xml", b"v1", "1.0"), blob("tool.xml", b"other", "2.0")],
            )
            .await;

        assert!(outcome.stored.is_empty());
        assert!(outcome.broadcast.is_empty());
        assert_eq!(outcome.dropped.len(), 2);
        assert!(dir.path().join("tool_v2.0.xml").exists());
        assert!(!dir.path().join("tool_v1.0.xml").exists());
    }

    #[tokio::test]
    async fn versioned_failed_write_not_recorded() {
        let (_dir, store) = setup();
        let policy = VersionedIngest::new();

        let outcome = policy
            .ingest(&store, vec![ContentBlob::new("bad.txt", "%%% not base64 %%%")])
            .await;

        assert_eq!(outcome.failed, 1);
        assert_eq!(policy.tracked(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn versioned_concurrent_uploads_keep_disk_and_broadcast_consistent() {
        for _ in 0..20 {
            let (dir, store) = setup();
            let policy = std::sync::Arc::new(VersionedIngest::new());

            let uploads = [b"from a".as_slice(), b"from b".as_slice()].map(|content| {
                let policy = policy.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    policy
                        .ingest(&store, vec![blob("tool.xml", content, "2.0")])
                        .await
                })
            });

            let mut accepted = Vec::new();
            let mut dropped = 0;
            for upload in uploads {
                let outcome = upload.await.unwrap();
                accepted.extend(outcome.broadcast);
                dropped += outcome.dropped.len();
            }

            assert_eq!(accepted.len(), 1);
            assert_eq!(dropped, 1);
            let on_disk = std::fs::read(dir.path().join("tool_v2.0.xml")).unwrap();
            assert_eq!(on_disk, accepted[0].decode().unwrap());
            assert_eq!(policy.tracked(), 1);
        }
    }
}
