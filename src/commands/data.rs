//! Thin request-response commands: script execution, SQL, environment
//! variables, and key/value records.

use crate::config::WorkspaceConfig;
use crate::registry::ResourceKind;
use crate::sync::{RemoteSummary, filter_by_scope, parse_summaries};
use crate::{Context, commands, ui};
use anyhow::{Context as _, Result, bail};
use authkit::{ApiResponse, Client, Method, Payload};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Script execution
// ============================================================================

/// `quill run <name>` - execute a remote script and print its result.
pub fn run_script(ctx: &Context, name: &str, args: &[String]) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    let entry = ResourceKind::Script.entry();
    let script = find_resource(&client, entry.endpoint, &cfg, name)
        .with_context(|| format!("script '{name}' not found"))?;

    let mut params = serde_json::Map::new();
    for pair in args {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--arg expects key=value, got '{pair}'"))?;
        params.insert(key.to_string(), json!(value));
    }

    let response = client.request(
        Method::Post,
        &format!("{}/{}/run", entry.endpoint, script.id),
        Some(json!({ "args": params })),
    )?;

    print_payload(&response);
    Ok(())
}

// ============================================================================
// SQL
// ============================================================================

/// Where an SQL argument came from: a file on disk, or the literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlSource {
    File(PathBuf),
    Inline(String),
}

/// Decide whether the argument names a file or is the statement itself.
///
/// The filesystem check comes first and literal text is the fallback;
/// this order is user-facing behavior and must not change.
#[must_use]
pub fn resolve_sql_input(root: &Path, input: &str) -> SqlSource {
    let candidate = root.join(input);
    if candidate.is_file() {
        SqlSource::File(candidate)
    } else {
        SqlSource::Inline(input.to_string())
    }
}

/// `quill sql <statement|file>` - run a statement against the app database.
pub fn sql(ctx: &Context, input: &str) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    let query = match resolve_sql_input(&ctx.root, input) {
        SqlSource::File(path) => {
            if !ctx.silent {
                ui::dim(&format!("running {}", path.display()));
            }
            fs::read_to_string(&path)
                .with_context(|| format!("Could not read {}", path.display()))?
        }
        SqlSource::Inline(statement) => statement,
    };

    let response = client.request(Method::Post, "data/sql", Some(json!({ "query": query })))?;
    print_payload(&response);
    Ok(())
}

// ============================================================================
// Environment variables
// ============================================================================

pub fn env_list(ctx: &Context) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    let response = client.request(Method::Get, "env", None)?;
    let Some(Value::Array(entries)) = response.json().cloned() else {
        print_payload(&response);
        return Ok(());
    };

    if entries.is_empty() && !ctx.silent {
        ui::dim("no environment variables set");
        return Ok(());
    }
    for entry in entries {
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("?");
        let value = entry.get("value").and_then(Value::as_str).unwrap_or("");
        if ctx.silent {
            println!("{name}={value}");
        } else {
            ui::kv(name, value);
        }
    }
    Ok(())
}

pub fn env_set(ctx: &Context, name: &str, value: &str) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    client.request(
        Method::Post,
        "env",
        Some(json!({ "name": name, "value": value })),
    )?;
    if !ctx.silent {
        ui::success(&format!("set {name}"));
    }
    Ok(())
}

pub fn env_unset(ctx: &Context, name: &str) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    client.request(Method::Delete, &format!("env/{name}"), None)?;
    if !ctx.silent {
        ui::success(&format!("unset {name}"));
    }
    Ok(())
}

// ============================================================================
// Key/value records
// ============================================================================

pub fn record_get(ctx: &Context, key: &str) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    let response = client.request(Method::Get, &format!("record/{key}"), None)?;
    print_payload(&response);
    Ok(())
}

pub fn record_set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    // Values that parse as JSON are stored structured; anything else is a
    // plain string.
    let parsed: Value = serde_json::from_str(value).unwrap_or_else(|_| json!(value));
    client.request(
        Method::Put,
        &format!("record/{key}"),
        Some(json!({ "value": parsed })),
    )?;
    if !ctx.silent {
        ui::success(&format!("stored {key}"));
    }
    Ok(())
}

pub fn record_rm(ctx: &Context, key: &str) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;
    let client = commands::api_client(&cfg);

    client.request(Method::Delete, &format!("record/{key}"), None)?;
    if !ctx.silent {
        ui::success(&format!("removed {key}"));
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Look a resource up by name in a collection, honoring the app scope.
fn find_resource(
    client: &Client,
    endpoint: &str,
    cfg: &WorkspaceConfig,
    name: &str,
) -> Result<RemoteSummary> {
    let response = client.request(Method::Get, endpoint, None)?;
    let summaries = response.json().map(parse_summaries).unwrap_or_default();
    let scoped = filter_by_scope(summaries, cfg.app_id);

    match scoped.summaries.into_iter().find(|s| s.name == name) {
        Some(summary) => Ok(summary),
        None => bail!("no resource named '{name}' in the configured scope"),
    }
}

/// Print a response payload: JSON pretty-printed, CSV and text raw.
fn print_payload(response: &ApiResponse) {
    match &response.payload {
        Payload::Json(value) => {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            println!("{pretty}");
        }
        Payload::Csv(raw) | Payload::Text(raw) => {
            print!("{raw}");
            if !raw.ends_with('\n') {
                println!();
            }
        }
    }
}
