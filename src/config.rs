use anyhow::{Context, Result};
use authkit::TokenStore;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the per-workspace config file.
pub const CONFIG_FILE: &str = ".quillrc";

/// Default API base when the config does not override it.
pub const DEFAULT_API_BASE: &str = "https://api.quill.dev/v1";

const TOKEN_KEY: &str = "QUILL_REFRESH_TOKEN";
const APP_KEY: &str = "QUILL_APP_ID";
const API_BASE_KEY: &str = "QUILL_API_BASE";

/// Workspace configuration loaded from `.quillrc` in the working directory.
///
/// Loaded once per invocation and passed explicitly to whatever needs it;
/// nothing reads ambient environment state.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    path: PathBuf,
    pub refresh_token: Option<String>,
    pub app_id: Option<u64>,
    pub api_base: String,
}

impl WorkspaceConfig {
    /// Load the config from a directory. A missing file yields an empty
    /// config (the `configure` command creates it).
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = Self {
            path: path.clone(),
            refresh_token: None,
            app_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
        };

        if !path.exists() {
            return Ok(config);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = unquote(value.trim());
            match key.trim() {
                TOKEN_KEY => config.refresh_token = Some(value.to_string()),
                APP_KEY => config.app_id = value.parse().ok(),
                API_BASE_KEY => config.api_base = value.trim_end_matches('/').to_string(),
                _ => {}
            }
        }

        Ok(config)
    }

    /// Whether the config file exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full config file. Used by `configure`; the renewal path
    /// uses [`TokenStore::save_refresh_token`] instead so it only touches
    /// the token line.
    pub fn save(&self) -> Result<()> {
        let mut content = String::new();
        if let Some(token) = &self.refresh_token {
            content.push_str(&format!("{TOKEN_KEY}=\"{token}\"\n"));
        }
        if let Some(app_id) = self.app_id {
            content.push_str(&format!("{APP_KEY}={app_id}\n"));
        }
        if self.api_base != DEFAULT_API_BASE {
            content.push_str(&format!("{API_BASE_KEY}={}\n", self.api_base));
        }
        fs::write(&self.path, content)
            .with_context(|| format!("Could not write {}", self.path.display()))?;
        Ok(())
    }
}

impl TokenStore for WorkspaceConfig {
    fn refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    /// Replace the refresh-token line in place, preserving every other
    /// line of the file. Appends the line when none exists yet.
    fn save_refresh_token(&mut self, token: &str) -> io::Result<()> {
        let replacement = format!("{TOKEN_KEY}=\"{token}\"");
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let pattern = Regex::new(&format!(r"(?m)^{TOKEN_KEY}=.*$")).expect("static pattern");
        let updated = if pattern.is_match(&content) {
            pattern
                .replace(&content, regex::NoExpand(&replacement))
                .into_owned()
        } else {
            let mut updated = content;
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(&replacement);
            updated.push('\n');
            updated
        };

        fs::write(&self.path, updated)?;
        self.refresh_token = Some(token.to_string());
        Ok(())
    }
}

/// Strip one pair of surrounding quotes, if present.
fn unquote(value: &str) -> &str {
    let value = value.trim();
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
