use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;
use walkdir::WalkDir;

/// Content type recorded for files without an extension.
pub const UNKNOWN_CONTENT_TYPE: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),
    #[error("refusing to serve symbolic link: {0}")]
    Symlink(PathBuf),
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Flat list of absolute file paths under `root`.
///
/// A file root yields itself. A directory root yields every regular file
/// beneath it, depth-first, sorted by name within each directory. Any
/// traversal error or symlink aborts the whole build; a partial catalog is
/// never returned.
pub fn build_catalog(root: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    let root = std::fs::canonicalize(root).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            CatalogError::NotFound(root.to_path_buf())
        } else {
            CatalogError::Io {
                path: root.to_path_buf(),
                source,
            }
        }
    })?;

    if root.is_file() {
        return Ok(vec![root]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|source| CatalogError::Walk {
            root: root.clone(),
            source,
        })?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            return Err(CatalogError::Symlink(entry.into_path()));
        }
        if file_type.is_file() {
            files.push(entry.into_path());
        }
    }
    tracing::debug!("Cataloged {} files under {}", files.len(), root.display());
    Ok(files)
}

/// Content type recorded on a [`MediaItem`]: the extension with its leading
/// dot, or [`UNKNOWN_CONTENT_TYPE`].
pub fn content_type_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!(".{ext}"),
        _ => UNKNOWN_CONTENT_TYPE.to_string(),
    }
}

/// Builds the URLs receivers use to pull media from this host.
#[derive(Debug, Clone)]
pub struct MediaLinks {
    base: Url,
}

impl MediaLinks {
    pub fn new(host: IpAddr, port: u16) -> Result<Self, url::ParseError> {
        let base = Url::parse(&format!("http://{}/", SocketAddr::new(host, port)))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url_for(&self, path: &Path, transcode: bool) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("media_file", &path.to_string_lossy())
            .append_pair("live_streaming", if transcode { "true" } else { "false" });
        url.into()
    }
}

/// One file made available for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub filename: PathBuf,
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(rename = "contentURL")]
    pub url: String,
    /// Reserved; nothing is transcoded.
    pub transcode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: usize,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("{0} not found in loaded media")]
    NotFound(String),
    #[error("'{needle}' matches multiple loaded; try again")]
    Ambiguous {
        needle: String,
        candidates: Vec<Candidate>,
    },
}

/// The set of servable items built by one media `/load`.
#[derive(Debug, Clone, Default)]
pub struct MediaCatalog {
    items: Vec<MediaItem>,
}

impl MediaCatalog {
    pub fn from_paths(paths: Vec<PathBuf>, links: &MediaLinks) -> Self {
        let items = paths
            .into_iter()
            .map(|filename| MediaItem {
                content_type: content_type_for(&filename),
                url: links.url_for(&filename, false),
                transcode: false,
                filename,
            })
            .collect();
        Self { items }
    }

    pub fn load(root: &Path, links: &MediaLinks) -> Result<Self, CatalogError> {
        Ok(Self::from_paths(build_catalog(root)?, links))
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn get(&self, id: usize) -> Option<&MediaItem> {
        self.items.get(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Indices of every item whose path contains `needle`.
    pub fn matches(&self, needle: &str) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.filename.to_string_lossy().contains(needle))
            .map(|(i, _)| i)
            .collect()
    }

    /// The single item matching `needle`. Never guesses between several.
    pub fn resolve(&self, needle: &str) -> Result<&MediaItem, MatchError> {
        match self.matches(needle).as_slice() {
            [] => Err(MatchError::NotFound(needle.to_string())),
            [only] => Ok(&self.items[*only]),
            many => Err(MatchError::Ambiguous {
                needle: needle.to_string(),
                candidates: many
                    .iter()
                    .map(|&id| Candidate {
                        id,
                        url: self.items[id].url.clone(),
                    })
                    .collect(),
            }),
        }
    }

    /// `id,url` CSV listing of every item.
    pub fn listing(&self) -> String {
        let mut out = String::from("id,url\n");
        for (i, item) in self.items.iter().enumerate() {
            out.push_str(&format!("{},{}\n", i, item.url));
        }
        out
    }
}
