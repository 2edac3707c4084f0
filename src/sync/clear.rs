//! Clear: delete every synced file from the local working tree.
//!
//! Deletion is irreversible, so unlike pull and push the confirmation
//! defaults to "no", and silent mode declines instead of auto-accepting
//! unless `--yes` was passed explicitly.

use crate::registry::ResourceKind;
use crate::{Context, ui};
use anyhow::{Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

/// Run `quill clear`.
pub fn run(ctx: &Context, yes: bool) -> Result<()> {
    let files = collect_files(&ctx.root)?;

    if files.is_empty() {
        if !ctx.silent {
            ui::dim("no synced files found, nothing to clear");
        }
        return Ok(());
    }

    if !ctx.silent {
        ui::header("Clearing synced files");
        for path in &files {
            let shown = path.strip_prefix(&ctx.root).unwrap_or(path);
            ui::dim(&shown.display().to_string());
        }
    }

    let confirmed = if yes {
        true
    } else if ctx.silent {
        log::warn!("clear skipped: confirmation required (pass --yes to delete)");
        false
    } else {
        ui::confirm(&format!("Delete {} file(s)?", files.len()), false)?
    };

    if !confirmed {
        if !ctx.silent {
            ui::info("clear cancelled, no files deleted");
        }
        return Ok(());
    }

    let (deleted, failed) = apply_clear(&files);

    if !ctx.silent {
        if failed == 0 {
            ui::success(&format!("deleted {deleted} file(s)"));
        } else {
            ui::warn(&format!("deleted {deleted} file(s), {failed} failed"));
        }
    }
    if failed > 0 {
        bail!("{failed} file(s) could not be deleted");
    }
    Ok(())
}

/// Every file across all registered kind directories matching that kind's
/// extension, in stable order.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for kind in ResourceKind::all() {
        let entry = kind.entry();
        let dir = root.join(entry.dir);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for dir_entry in entries {
            let path = dir_entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| entry.matches(name));
            if path.is_file() && matches {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Delete each file independently; one failure does not stop the rest.
fn apply_clear(files: &[PathBuf]) -> (usize, usize) {
    let mut deleted = 0usize;
    let mut failed = 0usize;

    for path in files {
        match fs::remove_file(path) {
            Ok(()) => {
                deleted += 1;
                log::info!("deleted {}", path.display());
            }
            Err(e) => {
                failed += 1;
                ui::error(&format!("delete {}: {e}", path.display()));
            }
        }
    }

    (deleted, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(root: &Path) {
        fs::create_dir_all(root.join("scripts")).unwrap();
        fs::create_dir_all(root.join("queries")).unwrap();
        fs::write(root.join("scripts/greet.js"), "a").unwrap();
        fs::write(root.join("scripts/notes.txt"), "keep").unwrap();
        fs::write(root.join("queries/report.sql"), "b").unwrap();
    }

    #[test]
    fn collect_spans_all_kind_directories() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());

        let files = collect_files(tmp.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["report.sql", "greet.js"]);
    }

    #[test]
    fn collect_with_no_directories_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(collect_files(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn apply_clear_deletes_and_keeps_unrelated_files() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());

        let files = collect_files(tmp.path()).unwrap();
        let (deleted, failed) = apply_clear(&files);

        assert_eq!((deleted, failed), (2, 0));
        assert!(!tmp.path().join("scripts/greet.js").exists());
        assert!(!tmp.path().join("queries/report.sql").exists());
        assert!(tmp.path().join("scripts/notes.txt").exists());
    }

    #[test]
    fn apply_clear_isolates_failures() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());

        let mut files = collect_files(tmp.path()).unwrap();
        files.push(tmp.path().join("scripts/ghost.js"));

        let (deleted, failed) = apply_clear(&files);
        assert_eq!((deleted, failed), (2, 1));
    }
}
