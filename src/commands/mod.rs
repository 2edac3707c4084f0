pub mod configure;
pub mod data;
pub mod status;

use crate::config::WorkspaceConfig;
use authkit::{Client, HttpTransport};

/// Build the authenticated API client for a loaded workspace config.
///
/// The client takes its own copy of the config as the token store, so a
/// mid-command renewal rewrites the token line of `.quillrc` without
/// disturbing the caller's view of the rest of the config.
pub fn api_client(cfg: &WorkspaceConfig) -> Client {
    Client::new(
        Box::new(HttpTransport::new()),
        cfg.api_base.clone(),
        Box::new(cfg.clone()),
    )
}
