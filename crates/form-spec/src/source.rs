use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::spec::form::FormSchema;
use crate::store::{KeyValueStore, Storage};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("schema request failed: {0}")]
    Transport(String),
    #[error("schema request returned HTTP {0}")]
    Status(u16),
    #[error("schema request timed out")]
    Timeout,
}

/// Fetches the raw body of a remote schema document.
pub trait SchemaFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// A configured schema URL together with the fetcher used to read it.
pub struct RemoteSource<'a> {
    pub url: String,
    pub fetcher: &'a dyn SchemaFetcher,
}

impl<'a> RemoteSource<'a> {
    pub fn new(url: impl Into<String>, fetcher: &'a dyn SchemaFetcher) -> Self {
        Self {
            url: url.into(),
            fetcher,
        }
    }

    fn load(&self) -> Option<FormSchema> {
        let body = match self.fetcher.fetch(&self.url) {
            Ok(body) => body,
            Err(err) => {
                warn!(url = %self.url, error = %err, "remote schema unavailable, falling back");
                return None;
            }
        };
        match FormSchema::from_json(&body) {
            Ok(schema) => Some(schema),
            Err(err) => {
                warn!(url = %self.url, error = %err, "remote schema is invalid, falling back");
                None
            }
        }
    }
}

/// Where a resolved schema came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaOrigin {
    Remote { url: String },
    Published,
    Draft,
    Default,
}

impl SchemaOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaOrigin::Remote { .. } => "remote",
            SchemaOrigin::Published => "published",
            SchemaOrigin::Draft => "draft",
            SchemaOrigin::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSchema {
    pub origin: SchemaOrigin,
    pub schema: FormSchema,
}

impl ResolvedSchema {
    fn new(origin: SchemaOrigin, schema: FormSchema) -> Self {
        Self { origin, schema }
    }
}

/// Remote URL first, then the published slot, then the built-in default.
/// Every failure falls through; this never errors.
pub fn resolve_published_schema<S: KeyValueStore>(
    remote: Option<RemoteSource<'_>>,
    storage: &Storage<S>,
) -> ResolvedSchema {
    if let Some(remote) = remote {
        debug!(url = %remote.url, "resolving schema from url");
        if let Some(schema) = remote.load() {
            return ResolvedSchema::new(SchemaOrigin::Remote { url: remote.url }, schema);
        }
    }
    match storage.load_published_schema() {
        Ok(Some(schema)) => return ResolvedSchema::new(SchemaOrigin::Published, schema),
        Ok(None) => debug!("no published schema stored"),
        Err(err) => warn!(error = %err, "published schema unreadable, using default"),
    }
    ResolvedSchema::new(SchemaOrigin::Default, FormSchema::default_schema())
}

/// Schema for the admin editor: the draft slot, else whatever is published.
pub fn resolve_draft_schema<S: KeyValueStore>(
    remote: Option<RemoteSource<'_>>,
    storage: &Storage<S>,
) -> ResolvedSchema {
    match storage.load_draft_schema() {
        Ok(Some(schema)) => return ResolvedSchema::new(SchemaOrigin::Draft, schema),
        Ok(None) => debug!("no draft schema stored"),
        Err(err) => warn!(error = %err, "draft schema unreadable, ignoring"),
    }
    resolve_published_schema(remote, storage)
}
