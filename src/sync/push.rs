//! Push: send local edits up to the remote application.

use super::fetch::fetch_details;
use super::{
    PushAction, PushPlan, classify_push, filter_by_scope, parse_summaries, read_local_files,
};
use crate::config::WorkspaceConfig;
use crate::registry::{RegistryEntry, ResourceKind};
use crate::{Context, commands, diff, ui};
use anyhow::{Result, bail};
use authkit::{Client, Method};
use colored::Colorize;
use serde_json::json;

/// Run `quill push` for one kind or all of them.
pub fn run(ctx: &Context, kind: Option<ResourceKind>, dry_run: bool) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    let kinds: Vec<ResourceKind> = match kind {
        Some(kind) => vec![kind],
        None => ResourceKind::all().collect(),
    };

    let mut failed_kinds = 0usize;
    let mut failed_items = 0usize;
    for kind in kinds {
        match push_kind(ctx, &client, &cfg, kind, dry_run) {
            Ok(failures) => failed_items += failures,
            Err(e) if e.downcast_ref::<authkit::Error>().is_some_and(|e| e.is_fatal()) => {
                return Err(e);
            }
            Err(e) => {
                ui::error(&format!("push {} failed: {e}", kind.plural()));
                failed_kinds += 1;
            }
        }
    }

    if failed_kinds > 0 || failed_items > 0 {
        bail!(
            "push completed with errors ({failed_kinds} kind(s) aborted, {failed_items} item(s) failed)"
        );
    }
    Ok(())
}

/// Push one kind. Returns the number of items that failed individually.
fn push_kind(
    ctx: &Context,
    client: &Client,
    cfg: &WorkspaceConfig,
    kind: ResourceKind,
    dry_run: bool,
) -> Result<usize> {
    let entry = kind.entry();

    if !ctx.silent {
        ui::header(&format!("Pushing {}", kind.plural()));
    }

    let mut local = read_local_files(&ctx.root, entry)?;

    let response = client.request(Method::Get, entry.endpoint, None)?;
    let summaries = response.json().map(parse_summaries).unwrap_or_default();
    let scoped = filter_by_scope(summaries, cfg.app_id);
    if scoped.unscoped && !scoped.summaries.is_empty() {
        let message = format!(
            "no app scope configured; comparing against {} from all applications",
            kind.plural()
        );
        if ctx.silent {
            log::warn!("{message}");
        } else {
            ui::warn(&message);
        }
    }

    if local.is_empty() && scoped.summaries.is_empty() {
        if !ctx.silent {
            ui::dim(&format!("no {} locally or remotely, nothing to do", kind.plural()));
        }
        return Ok(0);
    }

    let report = fetch_details(client, entry, &scoped.summaries, !ctx.silent);
    for (name, reason) in &report.failures {
        ui::error(&format!("fetch {name}: {reason}"));
    }

    // A file whose remote counterpart exists but could not be fetched has
    // unknown remote content; classifying it as a create would duplicate
    // the resource, so it is skipped for this run.
    for (name, _) in &report.failures {
        let file_name = entry.file_name(name);
        if local.remove(&file_name).is_some() {
            ui::warn(&format!(
                "skipping {file_name}: remote content could not be fetched"
            ));
        }
    }

    let plan = classify_push(&local, &report.records, entry);

    if plan.items.is_empty() {
        if !ctx.silent {
            ui::success(&format!(
                "{} up to date ({} unchanged)",
                kind.plural(),
                plan.unchanged.len()
            ));
        }
        return Ok(report.failures.len());
    }

    present_plan(ctx, entry, &plan, cfg.app_id, dry_run)?;

    if dry_run {
        if !ctx.silent {
            ui::dim("dry run - no changes sent");
        }
        return Ok(0);
    }

    let accepted = if ctx.silent {
        true
    } else {
        ui::confirm(&format!("Push {} change(s)?", plan.items.len()), true)?
    };
    if !accepted {
        ui::info("push cancelled, nothing sent");
        return Ok(0);
    }

    let (applied, failed) = apply_push(client, entry, &plan, cfg.app_id, ctx.silent);

    if !ctx.silent {
        if failed == 0 {
            ui::success(&format!("pushed {applied} change(s)"));
        } else {
            ui::warn(&format!("pushed {applied} change(s), {failed} failed"));
        }
    }
    Ok(failed + report.failures.len())
}

fn present_plan(
    ctx: &Context,
    entry: &RegistryEntry,
    plan: &PushPlan,
    app_scope: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    if ctx.silent {
        return Ok(());
    }

    for item in &plan.items {
        match &item.action {
            PushAction::Create => {
                println!("  {} {} {}", "+".green(), item.file_name, "(new)".dimmed());
            }
            PushAction::Update { .. } => {
                println!("  {} {}", "~".yellow(), item.file_name);
            }
        }
    }
    if !plan.unchanged.is_empty() {
        ui::dim(&format!("{} unchanged", plan.unchanged.len()));
    }

    if app_scope.is_none() && plan.items.iter().any(|i| i.action == PushAction::Create) {
        ui::warn("creates need an app scope; those items will fail until one is configured");
    }

    let updates: Vec<_> = plan
        .items
        .iter()
        .filter_map(|item| match &item.action {
            PushAction::Update { remote, .. } => Some((item, remote)),
            PushAction::Create => None,
        })
        .collect();

    if updates.is_empty() || dry_run {
        return Ok(());
    }

    if ui::confirm(&format!("Review diffs of {} update(s)?", updates.len()), false)? {
        for (item, remote) in updates {
            let rendered = diff::render_diff(
                remote,
                &item.content,
                &format!("{} (remote)", item.name),
                &format!("{}/{} (local)", entry.dir, item.file_name),
            );
            println!();
            print!("{rendered}");
        }
        println!();
    }

    Ok(())
}

/// Execute the planned writes one by one, isolating per-item failures.
///
/// Sequential on purpose: the operator reads the per-item feedback as it
/// happens, and mutation ordering stays predictable.
fn apply_push(
    client: &Client,
    entry: &RegistryEntry,
    plan: &PushPlan,
    app_scope: Option<u64>,
    silent: bool,
) -> (usize, usize) {
    let mut applied = 0usize;
    let mut failed = 0usize;

    for item in &plan.items {
        let result = match &item.action {
            PushAction::Update { id, app_id, .. } => {
                let mut body = json!({ "name": item.name });
                body[entry.content_field] = json!(item.content);
                if let Some(app_id) = app_id.or(app_scope) {
                    body["app_id"] = json!(app_id);
                }
                client
                    .request(Method::Put, &format!("{}/{}", entry.endpoint, id), Some(body))
                    .map(|_| "updated")
            }
            PushAction::Create => match app_scope {
                Some(app_id) => {
                    let mut body = json!({ "name": item.name, "app_id": app_id });
                    body[entry.content_field] = json!(item.content);
                    if let Some(runtime) = entry.create_runtime {
                        body["runtime"] = json!(runtime);
                    }
                    client
                        .request(Method::Post, entry.endpoint, Some(body))
                        .map(|_| "created")
                }
                None => Err(authkit::Error::Config(format!(
                    "cannot create `{}` without an app scope; run `quill configure --app <id>`",
                    item.name
                ))),
            },
        };

        match result {
            Ok(verb) => {
                applied += 1;
                if !silent {
                    println!("  {} {verb} {}", "↑".cyan(), item.name);
                }
            }
            Err(e) => {
                failed += 1;
                ui::error(&format!("{}: {e}", item.file_name));
            }
        }
    }

    (applied, failed)
}
