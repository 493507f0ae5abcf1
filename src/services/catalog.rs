//! 意图目录加载
//!
//! Reads the JSON rule file into an [`IntentCatalog`]. Loading never fails the
//! caller: a missing, malformed or non-JSON file yields an empty catalog and a
//! diagnostic in the log.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::config::IntentsConfig;
use crate::models::intent::{Intent, IntentCatalog, RuleFile};

/// Why the rule file could not be turned into a catalog.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error("rule file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rule file {0} contains an HTML page instead of intent data")]
    UnexpectedContent(PathBuf),

    #[error("rule file {path} is not valid intent JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 意图目录加载器
#[derive(Debug, Clone)]
pub struct IntentCatalogLoader {
    path: PathBuf,
}

impl IntentCatalogLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog, degrading to an empty one on any load error.
    pub fn load(&self) -> IntentCatalog {
        match self.try_load() {
            Ok(catalog) => catalog,
            Err(e) => {
                match &e {
                    CatalogLoadError::NotFound(_) => {
                        error!("Intent rule file is missing, continuing with no intents: {}", e)
                    }
                    CatalogLoadError::Io { .. } => {
                        error!("Intent rule file could not be read: {}", e)
                    }
                    CatalogLoadError::UnexpectedContent(_) => {
                        error!("Intent rule file holds a web page, not data: {}", e)
                    }
                    CatalogLoadError::Malformed { .. } => {
                        error!("Intent rule file is not valid JSON, check its format: {}", e)
                    }
                }
                IntentCatalog::empty()
            }
        }
    }

    /// Load the catalog, reporting why it could not be read.
    pub fn try_load(&self) -> Result<IntentCatalog, CatalogLoadError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CatalogLoadError::NotFound(self.path.clone())
            } else {
                CatalogLoadError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        parse_catalog(&raw).map_err(|e| match e {
            ParseFailure::Html => CatalogLoadError::UnexpectedContent(self.path.clone()),
            ParseFailure::Json(source) => CatalogLoadError::Malformed {
                path: self.path.clone(),
                source,
            },
        })
    }
}

enum ParseFailure {
    Html,
    Json(serde_json::Error),
}

/// Parse rule file text. Structurally broken intents are skipped with a warning.
fn parse_catalog(raw: &str) -> Result<IntentCatalog, ParseFailure> {
    if looks_like_html(raw) {
        return Err(ParseFailure::Html);
    }
    let file: RuleFile = serde_json::from_str(raw).map_err(ParseFailure::Json)?;

    let mut seen = HashSet::new();
    let mut intents = Vec::with_capacity(file.intents.len());
    for definition in file.intents {
        if seen.contains(&definition.tag) {
            warn!("Skipping duplicate intent tag '{}'", definition.tag);
            continue;
        }

        let patterns = definition
            .patterns
            .iter()
            .filter_map(|p| match Intent::compile_pattern(&definition.tag, p) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Skipping pattern: {}", e);
                    None
                }
            })
            .collect();

        match Intent::new(definition.tag, patterns, definition.responses) {
            Ok(intent) => {
                seen.insert(intent.tag().to_string());
                intents.push(intent);
            }
            Err(e) => warn!("Skipping intent: {}", e),
        }
    }

    debug!("Parsed {} intents", intents.len());
    Ok(IntentCatalog::new(intents))
}

fn looks_like_html(raw: &str) -> bool {
    let head: String = raw.trim_start().chars().take(16).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Shared access to the current catalog.
///
/// With `reload_each_turn` every [`current`](Self::current) call re-reads the
/// rule file; otherwise the cached catalog is served until [`reload`](Self::reload).
#[derive(Debug)]
pub struct IntentCatalogStore {
    loader: Option<IntentCatalogLoader>,
    cached: RwLock<Arc<IntentCatalog>>,
    reload_each_turn: bool,
}

impl IntentCatalogStore {
    /// Create the store and perform the initial load.
    pub fn new(loader: IntentCatalogLoader, reload_each_turn: bool) -> Self {
        let catalog = loader.load();
        info!(
            "Loaded {} intents from {}",
            catalog.len(),
            loader.path().display()
        );
        Self {
            loader: Some(loader),
            cached: RwLock::new(Arc::new(catalog)),
            reload_each_turn,
        }
    }

    pub fn from_config(config: &IntentsConfig) -> Self {
        Self::new(
            IntentCatalogLoader::new(config.path.clone()),
            config.reload_each_turn,
        )
    }

    /// Store around a fixed catalog that is never re-read from disk.
    pub fn fixed(catalog: IntentCatalog) -> Self {
        Self {
            loader: None,
            cached: RwLock::new(Arc::new(catalog)),
            reload_each_turn: false,
        }
    }

    /// Catalog to use for the next turn.
    pub async fn current(&self) -> Arc<IntentCatalog> {
        if self.reload_each_turn {
            return self.reload().await;
        }
        self.cached.read().clone()
    }

    /// Re-read the rule file and replace the cached catalog wholesale.
    pub async fn reload(&self) -> Arc<IntentCatalog> {
        let Some(loader) = self.loader.clone() else {
            return self.snapshot();
        };
        let catalog = match tokio::task::spawn_blocking(move || loader.load()).await {
            Ok(catalog) => Arc::new(catalog),
            Err(e) => {
                error!("Intent catalog reload task failed: {}", e);
                Arc::new(IntentCatalog::empty())
            }
        };
        *self.cached.write() = catalog.clone();
        catalog
    }

    /// Catalog as of the last load, without touching the file.
    pub fn snapshot(&self) -> Arc<IntentCatalog> {
        self.cached.read().clone()
    }
}
