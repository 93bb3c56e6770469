//! Versioned file naming and the "newer version wins" ledger.
//!
//! Versioned files carry a `_v<digits>(.<digits>)*` suffix before the
//! extension, e.g. `tool_v1.2.xml`. The ledger remembers every blob it has
//! accepted and decides whether an incoming blob is new, replaces an older
//! version of a known file, or is dropped.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use sync_types::ContentBlob;

const VERSION_SUFFIX: &str = r"(_v\d+(\.\d+)*)$";

fn version_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VERSION_SUFFIX).expect("version suffix pattern is valid"))
}

fn split_extension(name: &str) -> (&str, &str) {
    match Path::new(name).extension() {
        Some(ext) => name.split_at(name.len() - ext.len() - 1),
        None => (name, ""),
    }
}

/// Rewrite `name` so it carries exactly one `_v<version>` suffix.
///
/// An existing suffix is replaced; the extension is kept.
/// `standardize_file_name("tool_v1.0.xml", "2.1") == "tool_v2.1.xml"`.
pub fn standardize_file_name(name: &str, version: &str) -> String {
    let (stem, ext) = split_extension(name);
    let stem = version_suffix().replace(stem, "");
    format!("{}_v{}{}", stem, version, ext)
}

/// Strip a `_v<version>` suffix from the stem, keeping the extension.
///
/// `remove_version_suffix("tool_v1.0.xml") == "tool.xml"`.
pub fn remove_version_suffix(name: &str) -> String {
    let (stem, ext) = split_extension(name);
    let stem = version_suffix().replace(stem, "");
    format!("{}{}", stem, ext)
}

/// True when `incoming` is strictly newer than `existing`.
///
/// Versions compare as plain strings, so `"10.0" < "9.0"`.
pub fn is_newer(incoming: &str, existing: &str) -> bool {
    incoming > existing
}

/// Outcome of offering a blob to the [`VersionLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionDecision {
    /// No similar file is known; store and broadcast it.
    New,
    /// Strictly newer than a known file; replace it and broadcast.
    Replace {
        /// Name of the file being superseded.
        existing: String,
        /// Its version.
        previous_version: String,
    },
    /// Not newer than a known file; do nothing.
    Drop {
        /// Name of the file that wins.
        existing: String,
        /// Its version.
        current_version: String,
    },
}

impl VersionDecision {
    /// Whether the blob should be stored and broadcast.
    pub fn accepts(&self) -> bool {
        !matches!(self, VersionDecision::Drop { .. })
    }
}

/// Files accepted so far, keyed by stored name.
#[derive(Debug, Default, Clone)]
pub struct VersionLedger {
    files: HashMap<String, ContentBlob>,
}

impl VersionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no files are known.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Find a known file similar to `blob`.
    ///
    /// An exact payload match is preferred; otherwise a file whose name
    /// matches once version suffixes are removed.
    pub fn find_similar(&self, blob: &ContentBlob) -> Option<&ContentBlob> {
        if let Some(found) = self.files.values().find(|f| f.payload == blob.payload) {
            return Some(found);
        }
        let base = remove_version_suffix(&blob.name);
        self.files
            .values()
            .find(|f| remove_version_suffix(&f.name) == base)
    }

    /// Decide what to do with `blob` without changing the ledger.
    pub fn decide(&self, blob: &ContentBlob) -> VersionDecision {
        match self.find_similar(blob) {
            None => VersionDecision::New,
            Some(existing) if is_newer(&blob.version, &existing.version) => {
                VersionDecision::Replace {
                    existing: existing.name.clone(),
                    previous_version: existing.version.clone(),
                }
            }
            Some(existing) => VersionDecision::Drop {
                existing: existing.name.clone(),
                current_version: existing.version.clone(),
            },
        }
    }

    /// Decide, and record the blob when it is accepted.
    pub fn offer(&mut self, blob: &ContentBlob) -> VersionDecision {
        let decision = self.decide(blob);
        match &decision {
            VersionDecision::New => self.record(blob.clone()),
            VersionDecision::Replace { existing, .. } => {
                self.files.remove(existing);
                self.record(blob.clone());
            }
            VersionDecision::Drop { .. } => {}
        }
        decision
    }

    /// Remember a blob unconditionally.
    pub fn record(&mut self, blob: ContentBlob) {
        self.files.insert(blob.name.clone(), blob);
    }
}
