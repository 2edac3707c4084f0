//! Resource registry - the declarative table behind the sync engine.
//!
//! Each entry names where a resource kind lives locally, which remote
//! collection it maps to, and how its content field and filename are
//! derived. The sync engine is written once against this shape and works
//! for scripts, queries, and templates uniformly.

use std::fmt;

/// A synchronizable resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Server-side JavaScript scripts.
    Script,
    /// SQL queries.
    Query,
    /// HTML templates.
    Template,
}

/// Registry row for one resource kind.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub kind: ResourceKind,
    /// Local directory, relative to the workspace root.
    pub dir: &'static str,
    /// Remote collection endpoint, relative to the API base.
    pub endpoint: &'static str,
    /// Local file extension, with leading dot.
    pub extension: &'static str,
    /// Field of the remote record that holds the synchronized content.
    pub content_field: &'static str,
    /// Display names of this kind already carry the extension, so the
    /// filename must not append it a second time.
    pub name_embeds_extension: bool,
    /// Runtime tag sent with `POST` creates for this kind, when the
    /// platform requires one.
    pub create_runtime: Option<&'static str>,
}

/// The full registry, in stable display order.
pub static REGISTRY: [RegistryEntry; 3] = [
    RegistryEntry {
        kind: ResourceKind::Script,
        dir: "scripts",
        endpoint: "script",
        extension: ".js",
        content_field: "code",
        name_embeds_extension: false,
        create_runtime: Some("javascript"),
    },
    RegistryEntry {
        kind: ResourceKind::Query,
        dir: "queries",
        endpoint: "query",
        extension: ".sql",
        content_field: "sql",
        name_embeds_extension: false,
        create_runtime: None,
    },
    RegistryEntry {
        kind: ResourceKind::Template,
        dir: "templates",
        endpoint: "template",
        extension: ".html",
        content_field: "html",
        name_embeds_extension: true,
        create_runtime: None,
    },
];

impl ResourceKind {
    /// All registered kinds, in registry order.
    #[must_use]
    pub fn all() -> impl Iterator<Item = Self> {
        REGISTRY.iter().map(|entry| entry.kind)
    }

    /// The registry row for this kind.
    #[must_use]
    pub fn entry(&self) -> &'static RegistryEntry {
        REGISTRY
            .iter()
            .find(|entry| entry.kind == *self)
            .expect("every kind has a registry row")
    }

    /// Singular label for messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Query => "query",
            Self::Template => "template",
        }
    }

    /// Plural label for headings.
    #[must_use]
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Script => "scripts",
            Self::Query => "queries",
            Self::Template => "templates",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl RegistryEntry {
    /// Local filename for a remote resource name. Deterministic and
    /// reversible together with [`Self::resource_name`].
    #[must_use]
    pub fn file_name(&self, resource_name: &str) -> String {
        if self.name_embeds_extension && resource_name.ends_with(self.extension) {
            resource_name.to_string()
        } else {
            format!("{resource_name}{}", self.extension)
        }
    }

    /// Remote resource name for a local filename.
    #[must_use]
    pub fn resource_name(&self, file_name: &str) -> String {
        if self.name_embeds_extension {
            file_name.to_string()
        } else {
            file_name
                .strip_suffix(self.extension)
                .unwrap_or(file_name)
                .to_string()
        }
    }

    /// Whether a filename belongs to this kind.
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.ends_with(self.extension)
    }
}
