//! Sync engine - reconciles local files against remote resources.
//!
//! Classification is pure (this module); fetching, prompting, and
//! filesystem writes live in the per-operation modules so the
//! classification can be unit-tested without stdout or network.

pub mod clear;
pub mod fetch;
pub mod pull;
pub mod push;

use crate::registry::RegistryEntry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// Wire types
// ============================================================================

/// Collection-listing entry: no content field, enough to decide what to
/// fetch in detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSummary {
    pub id: u64,
    pub name: String,
    pub app_id: Option<u64>,
}

/// Fully fetched remote record, including the synchronized content field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: u64,
    pub name: String,
    pub app_id: Option<u64>,
    pub content: String,
}

/// Parse a collection listing. Entries without an id or name are dropped.
#[must_use]
pub fn parse_summaries(value: &Value) -> Vec<RemoteSummary> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_u64()?;
            let name = entry.get("name")?.as_str()?.to_string();
            let app_id = entry.get("app_id").and_then(Value::as_u64);
            Some(RemoteSummary { id, name, app_id })
        })
        .collect()
}

/// Parse a detail record. Returns `None` when the expected content field
/// is missing, which the fetch layer reports as a per-item failure.
#[must_use]
pub fn parse_record(value: &Value, content_field: &str) -> Option<RemoteRecord> {
    let id = value.get("id")?.as_u64()?;
    let name = value.get("name")?.as_str()?.to_string();
    let app_id = value.get("app_id").and_then(Value::as_u64);
    let content = value.get(content_field)?.as_str()?.to_string();
    Some(RemoteRecord {
        id,
        name,
        app_id,
        content,
    })
}

// ============================================================================
// App scope
// ============================================================================

/// Result of applying the configured app scope to a listing.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    pub summaries: Vec<RemoteSummary>,
    /// No scope was configured: everything is visible, and the caller
    /// must warn instead of silently filtering.
    pub unscoped: bool,
}

/// Filter a listing by the configured app scope. Without a scope every
/// resource stays visible.
#[must_use]
pub fn filter_by_scope(summaries: Vec<RemoteSummary>, app_id: Option<u64>) -> ScopeFilter {
    match app_id {
        Some(scope) => ScopeFilter {
            summaries: summaries
                .into_iter()
                .filter(|s| s.app_id == Some(scope))
                .collect(),
            unscoped: false,
        },
        None => ScopeFilter {
            summaries,
            unscoped: true,
        },
    }
}

// ============================================================================
// Classification
// ============================================================================

/// What pull would do with one remote resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullAction {
    /// No local file exists yet.
    Create,
    /// A local file exists with different content; it would be replaced.
    Overwrite {
        /// Current local content, kept for diff rendering.
        local: String,
    },
}

/// One pull candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullItem {
    pub name: String,
    pub file_name: String,
    pub content: String,
    pub action: PullAction,
}

/// Pull classification result.
#[derive(Debug, Clone, Default)]
pub struct PullPlan {
    pub items: Vec<PullItem>,
    pub unchanged: Vec<String>,
}

/// Classify remote records against local files for a pull.
///
/// Equality is exact string equality of the synchronized field; no
/// whitespace or line-ending normalization is applied. Every remote
/// record lands in exactly one bucket; none are dropped.
#[must_use]
pub fn classify_pull(
    records: &BTreeMap<String, RemoteRecord>,
    local: &BTreeMap<String, String>,
    entry: &RegistryEntry,
) -> PullPlan {
    let mut plan = PullPlan::default();

    for record in records.values() {
        let file_name = entry.file_name(&record.name);
        match local.get(&file_name) {
            Some(existing) if *existing == record.content => {
                plan.unchanged.push(file_name);
            }
            Some(existing) => plan.items.push(PullItem {
                name: record.name.clone(),
                file_name,
                content: record.content.clone(),
                action: PullAction::Overwrite {
                    local: existing.clone(),
                },
            }),
            None => plan.items.push(PullItem {
                name: record.name.clone(),
                file_name,
                content: record.content.clone(),
                action: PullAction::Create,
            }),
        }
    }

    plan
}

/// What push would do with one local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAction {
    /// No remote resource with this name; requires an app scope.
    Create,
    /// Remote resource exists with different content.
    Update {
        id: u64,
        app_id: Option<u64>,
        /// Current remote content, kept for diff rendering.
        remote: String,
    },
}

/// One push candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushItem {
    pub name: String,
    pub file_name: String,
    pub content: String,
    pub action: PushAction,
}

/// Push classification result.
#[derive(Debug, Clone, Default)]
pub struct PushPlan {
    pub items: Vec<PushItem>,
    pub unchanged: Vec<String>,
}

/// Classify local files against remote records for a push.
#[must_use]
pub fn classify_push(
    local: &BTreeMap<String, String>,
    records: &BTreeMap<String, RemoteRecord>,
    entry: &RegistryEntry,
) -> PushPlan {
    let mut plan = PushPlan::default();

    for (file_name, content) in local {
        let name = entry.resource_name(file_name);
        match records.get(&name) {
            Some(record) if record.content == *content => {
                plan.unchanged.push(file_name.clone());
            }
            Some(record) => plan.items.push(PushItem {
                name,
                file_name: file_name.clone(),
                content: content.clone(),
                action: PushAction::Update {
                    id: record.id,
                    app_id: record.app_id,
                    remote: record.content.clone(),
                },
            }),
            None => plan.items.push(PushItem {
                name,
                file_name: file_name.clone(),
                content: content.clone(),
                action: PushAction::Create,
            }),
        }
    }

    plan
}

// ============================================================================
// Local files
// ============================================================================

/// Read every local file of a kind into memory, keyed by filename.
///
/// A missing directory means zero local files, not an error. Unreadable
/// individual files are skipped with a warning so one bad file does not
/// block the rest.
pub fn read_local_files(
    root: &Path,
    entry: &RegistryEntry,
) -> std::io::Result<BTreeMap<String, String>> {
    let dir = root.join(entry.dir);
    let mut files = BTreeMap::new();

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e),
    };

    for dir_entry in entries {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !entry.matches(file_name) {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => {
                files.insert(file_name.to_string(), content);
            }
            Err(e) => {
                log::warn!("skipping unreadable file {}: {e}", path.display());
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceKind;
    use tempfile::TempDir;

    fn record(id: u64, name: &str, app_id: Option<u64>, content: &str) -> RemoteRecord {
        RemoteRecord {
            id,
            name: name.to_string(),
            app_id,
            content: content.to_string(),
        }
    }

    fn record_map(records: Vec<RemoteRecord>) -> BTreeMap<String, RemoteRecord> {
        records.into_iter().map(|r| (r.name.clone(), r)).collect()
    }

    fn local_map(files: &[(&str, &str)]) -> BTreeMap<String, String> {
        files
            .iter()
            .map(|(name, content)| (name.to_string(), content.to_string()))
            .collect()
    }

    // ── wire parsing ─────────────────────────────────────────────────

    #[test]
    fn parse_summaries_drops_malformed_entries() {
        let value = serde_json::json!([
            {"id": 1, "name": "greet", "app_id": 10},
            {"id": 2},
            {"name": "orphan"},
            {"id": 3, "name": "report"},
        ]);
        let summaries = parse_summaries(&value);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "greet");
        assert_eq!(summaries[0].app_id, Some(10));
        assert_eq!(summaries[1].app_id, None);
    }

    #[test]
    fn parse_summaries_non_array_is_empty() {
        assert!(parse_summaries(&serde_json::json!({"id": 1})).is_empty());
    }

    #[test]
    fn parse_record_reads_configured_content_field() {
        let value = serde_json::json!({"id": 5, "name": "report", "app_id": 10, "sql": "select 1"});
        let record = parse_record(&value, "sql").unwrap();
        assert_eq!(record.content, "select 1");

        assert!(parse_record(&value, "code").is_none());
    }

    // ── scope filter ─────────────────────────────────────────────────

    #[test]
    fn scope_filter_keeps_matching_app() {
        let summaries = vec![
            RemoteSummary { id: 1, name: "a".into(), app_id: Some(10) },
            RemoteSummary { id: 2, name: "b".into(), app_id: Some(20) },
        ];
        let filtered = filter_by_scope(summaries, Some(10));
        assert!(!filtered.unscoped);
        assert_eq!(filtered.summaries.len(), 1);
        assert_eq!(filtered.summaries[0].name, "a");
    }

    #[test]
    fn scope_filter_unset_keeps_everything_and_flags_warning() {
        // Two resources from different apps must both stay visible.
        let summaries = vec![
            RemoteSummary { id: 1, name: "a".into(), app_id: Some(10) },
            RemoteSummary { id: 2, name: "b".into(), app_id: Some(20) },
        ];
        let filtered = filter_by_scope(summaries, None);
        assert!(filtered.unscoped);
        assert_eq!(filtered.summaries.len(), 2);
    }

    // ── pull classification ──────────────────────────────────────────

    #[test]
    fn pull_remote_only_is_a_create_candidate() {
        let entry = ResourceKind::Script.entry();
        let records = record_map(vec![record(1, "greet", Some(10), "body")]);
        let plan = classify_pull(&records, &BTreeMap::new(), entry);

        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].file_name, "greet.js");
        assert_eq!(plan.items[0].action, PullAction::Create);
        assert!(plan.unchanged.is_empty());
    }

    #[test]
    fn pull_identical_content_is_unchanged() {
        let entry = ResourceKind::Script.entry();
        let records = record_map(vec![record(1, "greet", Some(10), "same")]);
        let local = local_map(&[("greet.js", "same")]);
        let plan = classify_pull(&records, &local, entry);

        assert!(plan.items.is_empty());
        assert_eq!(plan.unchanged, vec!["greet.js".to_string()]);
    }

    #[test]
    fn pull_differing_content_is_overwrite_with_local_kept() {
        let entry = ResourceKind::Script.entry();
        let records = record_map(vec![record(1, "greet", Some(10), "remote")]);
        let local = local_map(&[("greet.js", "local")]);
        let plan = classify_pull(&records, &local, entry);

        assert_eq!(plan.items.len(), 1);
        assert_eq!(
            plan.items[0].action,
            PullAction::Overwrite { local: "local".to_string() }
        );
    }

    #[test]
    fn pull_no_normalization_of_line_endings() {
        let entry = ResourceKind::Script.entry();
        let records = record_map(vec![record(1, "greet", None, "a\nb\n")]);
        let local = local_map(&[("greet.js", "a\r\nb\r\n")]);
        let plan = classify_pull(&records, &local, entry);
        // CRLF vs LF is a real difference.
        assert_eq!(plan.items.len(), 1);
    }

    // ── push classification ──────────────────────────────────────────

    #[test]
    fn push_local_only_is_create_never_update() {
        let entry = ResourceKind::Script.entry();
        let local = local_map(&[("new.js", "fresh")]);
        let plan = classify_push(&local, &BTreeMap::new(), entry);

        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].name, "new");
        assert_eq!(plan.items[0].action, PushAction::Create);
    }

    #[test]
    fn push_update_carries_remote_id_and_old_content() {
        // Local greet.js says "A", remote greet says "B": an update with
        // old content "B" and new content "A".
        let entry = ResourceKind::Script.entry();
        let local = local_map(&[("greet.js", "A")]);
        let records = record_map(vec![record(7, "greet", Some(10), "B")]);
        let plan = classify_push(&local, &records, entry);

        assert_eq!(plan.items.len(), 1);
        let item = &plan.items[0];
        assert_eq!(item.content, "A");
        assert_eq!(
            item.action,
            PushAction::Update {
                id: 7,
                app_id: Some(10),
                remote: "B".to_string()
            }
        );
    }

    #[test]
    fn push_identical_content_is_skipped() {
        let entry = ResourceKind::Query.entry();
        let local = local_map(&[("report.sql", "select 1")]);
        let records = record_map(vec![record(3, "report", Some(10), "select 1")]);
        let plan = classify_push(&local, &records, entry);

        assert!(plan.items.is_empty());
        assert_eq!(plan.unchanged, vec!["report.sql".to_string()]);
    }

    #[test]
    fn push_is_idempotent_after_apply() {
        // First push classifies one update; once the remote carries the
        // local content, the second run classifies nothing.
        let entry = ResourceKind::Script.entry();
        let local = local_map(&[("greet.js", "A")]);
        let mut records = record_map(vec![record(7, "greet", Some(10), "B")]);

        let first = classify_push(&local, &records, entry);
        assert_eq!(first.items.len(), 1);

        records.get_mut("greet").unwrap().content = "A".to_string();
        let second = classify_push(&local, &records, entry);
        assert!(second.items.is_empty());
        assert_eq!(second.unchanged.len(), 1);
    }

    #[test]
    fn push_template_names_keep_extension() {
        let entry = ResourceKind::Template.entry();
        let local = local_map(&[("index.html", "<h1>hi</h1>")]);
        let plan = classify_push(&local, &BTreeMap::new(), entry);
        assert_eq!(plan.items[0].name, "index.html");
    }

    // ── local files ──────────────────────────────────────────────────

    #[test]
    fn missing_directory_is_zero_local_files() {
        let tmp = TempDir::new().unwrap();
        let files = read_local_files(tmp.path(), ResourceKind::Script.entry()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn read_local_files_filters_by_extension() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("scripts");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("greet.js"), "body").unwrap();
        fs::write(dir.join("notes.txt"), "ignore").unwrap();
        fs::write(dir.join("other.sql"), "ignore").unwrap();

        let files = read_local_files(tmp.path(), ResourceKind::Script.entry()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["greet.js"], "body");
    }

    #[test]
    fn read_local_files_ignores_subdirectories() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("queries");
        fs::create_dir_all(dir.join("nested.sql")).unwrap();
        fs::write(dir.join("top.sql"), "select 1").unwrap();

        let files = read_local_files(tmp.path(), ResourceKind::Query.entry()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("top.sql"));
    }

    #[test]
    fn pull_roundtrip_written_file_classifies_unchanged() {
        // Write remote content locally, classify again: zero writes.
        let tmp = TempDir::new().unwrap();
        let entry = ResourceKind::Script.entry();
        let dir = tmp.path().join(entry.dir);
        fs::create_dir_all(&dir).unwrap();

        let records = record_map(vec![record(1, "greet", None, "hello\n")]);
        fs::write(dir.join("greet.js"), "hello\n").unwrap();

        let local = read_local_files(tmp.path(), entry).unwrap();
        let plan = classify_pull(&records, &local, entry);
        assert!(plan.items.is_empty());
        assert_eq!(plan.unchanged.len(), 1);
    }
}
