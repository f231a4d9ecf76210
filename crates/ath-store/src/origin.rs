use std::path::{Path, PathBuf};
use std::{env, fs};

use url::Url;

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Default base directory for all ath storage.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".addtohomescreen")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

// ---------------------------------------------------------------------------
// Pure parsing helpers (no I/O, fully unit-testable)
// ---------------------------------------------------------------------------

/// The serialized origin of a URL: `scheme://host[:port]`, with default
/// ports dropped.
///
/// Browsers partition local storage by origin; so do we. Anything without
/// a scheme is taken as a bare host. Opaque origins (`file:`, `data:`)
/// have no storage partition.
pub fn extract_origin(url: &str) -> Option<String> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) if !url.is_empty() => {
            Url::parse(&format!("http://{url}")).ok()?
        }
        Err(_) => return None,
    };
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

/// Sanitize a name for use as a filename.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `https://example.com:8443` → `https_example.com_8443`.
pub fn origin_id(origin: &str) -> String {
    sanitize_name(&origin.replacen("://", "_", 1))
}

// ---------------------------------------------------------------------------
// Per-origin stores
// ---------------------------------------------------------------------------

/// Local storage for one origin.
///
/// Layout:
/// ```text
/// ~/.addtohomescreen/
/// └── origins/
///     ├── https_example.com.db
///     └── ...
/// ```
pub struct OriginStore {
    store: Store,
    origin: String,
    path: PathBuf,
}

impl OriginStore {
    /// Open the store for the origin of `url`, creating directories as needed.
    /// `base_dir` overrides the default base directory.
    pub fn open(url: &str, base_dir: Option<&Path>) -> Result<Self> {
        let origin = extract_origin(url)
            .ok_or_else(|| StoreError::InvalidData(format!("no origin in '{url}'")))?;

        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        let origins_dir = base.join("origins");
        fs::create_dir_all(&origins_dir).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", origins_dir.display()))
        })?;

        let path = origins_dir.join(format!("{}.db", origin_id(&origin)));
        let store = Store::open(&path)?;
        store.set_metadata("origin", &origin)?;
        tracing::debug!("opened storage for {origin} at {}", path.display());

        Ok(Self {
            store,
            origin,
            path,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }
}

/// Origins with a database under `base_dir`, sorted.
pub fn list_origins(base_dir: &Path) -> Result<Vec<String>> {
    let dir = base_dir.join("origins");
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StoreError::InvalidData(format!(
                "failed to read {}: {e}",
                dir.display()
            )));
        }
    };

    let mut origins = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "db") {
            let store = Store::open(&path)?;
            if let Some(origin) = store.get_metadata("origin")? {
                origins.push(origin);
            }
        }
    }
    origins.sort();
    Ok(origins)
}
