//! Initial setup: exchange credentials for a refresh token and persist
//! the workspace configuration.

use crate::cli::ConfigureArgs;
use crate::config::WorkspaceConfig;
use crate::{Context, ui};
use anyhow::{Context as _, Result, bail};
use authkit::{HttpTransport, TokenManager, decode_expiry};
use dialoguer::{Input, Password};
use std::io::IsTerminal;

pub fn run(ctx: &Context, args: &ConfigureArgs) -> Result<()> {
    let mut cfg = WorkspaceConfig::load_from(&ctx.root)?;
    if let Some(base) = &args.api_base {
        cfg.api_base = base.trim_end_matches('/').to_string();
    }

    let email = match &args.email {
        Some(email) => email.clone(),
        None => {
            require_terminal("--email")?;
            Input::new()
                .with_prompt("Email")
                .interact_text()
                .context("Failed to read email")?
        }
    };

    let password = match &args.password {
        Some(password) => password.clone(),
        None => {
            require_terminal("QUILL_PASSWORD")?;
            Password::new()
                .with_prompt("Password")
                .interact()
                .context("Failed to read password")?
        }
    };

    let transport = HttpTransport::new();
    let manager = TokenManager::new(&transport, &cfg.api_base);
    let token = manager.initial_exchange(&email, &password)?;

    cfg.refresh_token = Some(token);
    if let Some(app) = args.app {
        cfg.app_id = Some(app);
    }
    cfg.save()?;

    if ctx.silent {
        return Ok(());
    }

    ui::success(&format!("Signed in, config written to {}", cfg.path().display()));
    if let Some(token) = &cfg.refresh_token {
        if let Ok(claims) = decode_expiry(token) {
            ui::kv(
                "Token valid until",
                &claims.expires_at.format("%Y-%m-%d").to_string(),
            );
        }
    }
    match cfg.app_id {
        Some(app_id) => ui::kv("App scope", &app_id.to_string()),
        None => ui::warn("no app scope set; pass --app <id> to enable push creates"),
    }

    Ok(())
}

fn require_terminal(alternative: &str) -> Result<()> {
    if !std::io::stdin().is_terminal() {
        bail!("stdin is not a terminal; pass {alternative} instead");
    }
    Ok(())
}
