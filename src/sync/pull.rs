//! Pull: bring remote resources down into the local working tree.

use super::fetch::fetch_details;
use super::{PullAction, PullPlan, classify_pull, filter_by_scope, parse_summaries, read_local_files};
use crate::config::WorkspaceConfig;
use crate::registry::{RegistryEntry, ResourceKind};
use crate::{Context, commands, diff, ui};
use anyhow::{Result, bail};
use authkit::{Client, Method};
use colored::Colorize;
use std::fs;
use std::path::Path;

/// Run `quill pull` for one kind or all of them.
pub fn run(ctx: &Context, kind: Option<ResourceKind>, dry_run: bool) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    let kinds: Vec<ResourceKind> = match kind {
        Some(kind) => vec![kind],
        None => ResourceKind::all().collect(),
    };

    let mut failed_kinds = 0usize;
    for kind in kinds {
        match pull_kind(ctx, &client, &cfg, kind, dry_run) {
            Ok(()) => {}
            Err(e) if e.downcast_ref::<authkit::Error>().is_some_and(authkit::Error::is_fatal) => {
                return Err(e);
            }
            Err(e) => {
                ui::error(&format!("pull {} failed: {e}", kind.plural()));
                failed_kinds += 1;
            }
        }
    }

    if failed_kinds > 0 {
        bail!("pull failed for {failed_kinds} resource kind(s)");
    }
    Ok(())
}

fn pull_kind(
    ctx: &Context,
    client: &Client,
    cfg: &WorkspaceConfig,
    kind: ResourceKind,
    dry_run: bool,
) -> Result<()> {
    let entry = kind.entry();

    if !ctx.silent {
        ui::header(&format!("Pulling {}", kind.plural()));
    }

    let response = client.request(Method::Get, entry.endpoint, None)?;
    let summaries = response.json().map(parse_summaries).unwrap_or_default();

    let scoped = filter_by_scope(summaries, cfg.app_id);
    if scoped.unscoped && !scoped.summaries.is_empty() {
        warn_unscoped(ctx, kind);
    }

    let local = read_local_files(&ctx.root, entry)?;

    if scoped.summaries.is_empty() {
        if local.is_empty() {
            if !ctx.silent {
                ui::dim(&format!("no {} remotely or locally, nothing to do", kind.plural()));
            }
        } else if !ctx.silent {
            ui::dim(&format!("no remote {} to pull", kind.plural()));
        }
        return Ok(());
    }

    let report = fetch_details(client, entry, &scoped.summaries, !ctx.silent);
    for (name, reason) in &report.failures {
        ui::error(&format!("fetch {name}: {reason}"));
    }

    let plan = classify_pull(&report.records, &local, entry);

    if plan.items.is_empty() {
        if !ctx.silent {
            ui::success(&format!(
                "{} up to date ({} unchanged)",
                kind.plural(),
                plan.unchanged.len()
            ));
        }
        return Ok(());
    }

    present_plan(ctx, entry, &plan, dry_run)?;

    if dry_run {
        if !ctx.silent {
            ui::dim("dry run - no files written");
        }
        return Ok(());
    }

    let accepted = if ctx.silent {
        true
    } else {
        ui::confirm(
            &format!("Write {} file(s) to {}/?", plan.items.len(), entry.dir),
            true,
        )?
    };
    if !accepted {
        ui::info("pull cancelled, no files written");
        return Ok(());
    }

    let (written, failed) = apply_pull(&ctx.root, entry, &plan, ctx.silent);

    if !ctx.silent {
        if failed == 0 {
            ui::success(&format!("pulled {written} file(s)"));
        } else {
            ui::warn(&format!("pulled {written} file(s), {failed} failed"));
        }
    }
    if failed > 0 {
        bail!("{failed} file(s) could not be written");
    }
    Ok(())
}

fn warn_unscoped(ctx: &Context, kind: ResourceKind) {
    let message = format!(
        "no app scope configured; operating on {} from all applications",
        kind.plural()
    );
    if ctx.silent {
        log::warn!("{message}");
    } else {
        ui::warn(&message);
    }
}

/// Show the flat change summary and, on request, full diffs of the files
/// whose local content would be replaced.
fn present_plan(ctx: &Context, entry: &RegistryEntry, plan: &PullPlan, dry_run: bool) -> Result<()> {
    if ctx.silent {
        return Ok(());
    }

    for item in &plan.items {
        let overwrites = matches!(item.action, PullAction::Overwrite { .. });
        println!("{}", diff::summary_line(&item.file_name, overwrites));
    }
    if !plan.unchanged.is_empty() {
        ui::dim(&format!("{} unchanged", plan.unchanged.len()));
    }

    let overwrites: Vec<_> = plan
        .items
        .iter()
        .filter_map(|item| match &item.action {
            PullAction::Overwrite { local } => Some((item, local)),
            PullAction::Create => None,
        })
        .collect();

    if overwrites.is_empty() || dry_run {
        return Ok(());
    }

    if ui::confirm(
        &format!("Review diffs of {} overwritten file(s)?", overwrites.len()),
        false,
    )? {
        for (item, local) in overwrites {
            let rendered = diff::render_diff(
                local,
                &item.content,
                &format!("{}/{} (local)", entry.dir, item.file_name),
                &format!("{} (remote)", item.name),
            );
            println!();
            print!("{rendered}");
        }
        println!();
    }

    Ok(())
}

/// Write every planned file, isolating per-file failures.
fn apply_pull(root: &Path, entry: &RegistryEntry, plan: &PullPlan, silent: bool) -> (usize, usize) {
    let dir = root.join(entry.dir);
    if let Err(e) = fs::create_dir_all(&dir) {
        ui::error(&format!("cannot create {}: {e}", dir.display()));
        return (0, plan.items.len());
    }

    let mut written = 0usize;
    let mut failed = 0usize;

    for item in &plan.items {
        let path = dir.join(&item.file_name);
        match fs::write(&path, &item.content) {
            Ok(()) => {
                written += 1;
                if !silent {
                    println!(
                        "  {} {}/{}",
                        "↓".cyan(),
                        entry.dir,
                        item.file_name
                    );
                }
            }
            Err(e) => {
                failed += 1;
                ui::error(&format!("write {}: {e}", path.display()));
            }
        }
    }

    (written, failed)
}
