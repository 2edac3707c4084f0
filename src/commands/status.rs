//! Workspace status: config presence, app scope, and token health.
//! Never touches the network.

use crate::config::WorkspaceConfig;
use crate::{Context, ui};
use anyhow::Result;
use authkit::{RENEWAL_THRESHOLD_DAYS, decode_expiry, needs_renewal};

pub fn run(ctx: &Context) -> Result<()> {
    let cfg = WorkspaceConfig::load_from(&ctx.root)?;

    if !ctx.silent {
        ui::header("Workspace status");
    }

    if cfg.exists() {
        ui::kv("Config", &cfg.path().display().to_string());
    } else {
        ui::warn(&format!(
            "no config found at {}; run `quill configure`",
            cfg.path().display()
        ));
    }
    ui::kv("API base", &cfg.api_base);

    match cfg.app_id {
        Some(app_id) => ui::kv("App scope", &app_id.to_string()),
        None => ui::warn("no app scope set; push creates are disabled"),
    }

    match &cfg.refresh_token {
        None => {
            ui::error("no refresh token stored; run `quill configure` to sign in");
        }
        Some(token) => match decode_expiry(token) {
            Ok(claims) => {
                let check = needs_renewal(token);
                ui::kv(
                    "Token expires",
                    &format!(
                        "{} ({} day(s) left)",
                        claims.expires_at.format("%Y-%m-%d"),
                        check.days_remaining
                    ),
                );
                if check.needs_renewal {
                    ui::dim(&format!(
                        "below the {RENEWAL_THRESHOLD_DAYS}-day threshold, will be renewed on next use"
                    ));
                }
            }
            Err(_) => {
                ui::warn("stored token is not decodable; it will be renewed on next use");
            }
        },
    }

    Ok(())
}
