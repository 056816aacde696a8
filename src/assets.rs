//! Resource manifest and loader dispatch
//!
//! The store decides which loader handles each declared file (by extension),
//! tracks completion, and raises a single ready signal. Fetching and decoding
//! is the host's job: it asks for [`AssetStore::requests`] and reports back
//! through [`AssetStore::complete`] / [`AssetStore::fail`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid asset manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("no loader for `{path}` (extension `{extension}`)")]
    NoLoader { path: String, extension: String },

    #[error("asset `{0}` declared twice")]
    Duplicate(String),

    #[error("unknown asset `{0}`")]
    Unknown(String),

    #[error("asset `{0}` failed to load")]
    Failed(String),
}

/// Which loader a resource goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Model,
    Texture,
    Font,
    Sound,
}

impl AssetKind {
    /// Loader registry, keyed by lowercase file extension
    const LOADERS: [(&'static [&'static str], AssetKind); 4] = [
        (&["gltf", "glb", "fbx"], AssetKind::Model),
        (&["png", "jpg", "jpeg"], AssetKind::Texture),
        (&["json"], AssetKind::Font),
        (&["mp3", "ogg", "wav"], AssetKind::Sound),
    ];

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        Self::LOADERS
            .iter()
            .find(|(exts, _)| exts.contains(&extension.as_str()))
            .map(|(_, kind)| *kind)
    }
}

/// Lowercase file stem used as the lookup key: `models/Boop.GLTF` -> `boop`
pub fn asset_name(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = file.split('.').next().unwrap_or(file);
    stem.to_ascii_lowercase()
}

fn extension(path: &str) -> &str {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file.rsplit_once('.').map_or("", |(_, ext)| ext)
}

/// Opaque id handed out once a resource is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    pub kind: AssetKind,
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Loaded(AssetHandle),
    Failed,
}

#[derive(Debug, Clone)]
struct Entry {
    path: String,
    kind: AssetKind,
    state: AssetState,
}

/// Declared resources, as shipped in `assets.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
pub struct AssetStore {
    entries: BTreeMap<String, Entry>,
    next_id: u32,
    ready_sent: bool,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON manifest. Files without a loader are
    /// logged and skipped.
    pub fn from_manifest(json: &str) -> Result<Self, AssetError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        let mut store = Self::new();
        for path in &manifest.files {
            if let Err(err) = store.declare(path) {
                log::warn!("Skipping asset: {}", err);
            }
        }
        log::info!("{} assets declared", store.entries.len());
        Ok(store)
    }

    /// Register one file; returns the lookup name
    pub fn declare(&mut self, path: &str) -> Result<String, AssetError> {
        let ext = extension(path);
        let kind = AssetKind::from_extension(ext).ok_or_else(|| AssetError::NoLoader {
            path: path.to_string(),
            extension: ext.to_string(),
        })?;

        let name = asset_name(path);
        if self.entries.contains_key(&name) {
            return Err(AssetError::Duplicate(name));
        }
        self.entries.insert(
            name.clone(),
            Entry {
                path: path.to_string(),
                kind,
                state: AssetState::Pending,
            },
        );
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resources still waiting on the host: `(name, path, kind)`
    pub fn requests(&self) -> impl Iterator<Item = (&str, &str, AssetKind)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state == AssetState::Pending)
            .map(|(name, e)| (name.as_str(), e.path.as_str(), e.kind))
    }

    fn resolve(&mut self, name: &str, loaded: bool) -> Result<AssetState, AssetError> {
        let id = self.next_id;
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| AssetError::Unknown(name.to_string()))?;
        if entry.state == AssetState::Pending {
            entry.state = if loaded {
                self.next_id += 1;
                AssetState::Loaded(AssetHandle { kind: entry.kind, id })
            } else {
                log::warn!("Asset `{}` failed to load", name);
                AssetState::Failed
            };
        }
        Ok(entry.state)
    }

    /// Host finished loading `name`
    pub fn complete(&mut self, name: &str) -> Result<AssetHandle, AssetError> {
        match self.resolve(name, true)? {
            AssetState::Loaded(handle) => Ok(handle),
            _ => Err(AssetError::Failed(name.to_string())),
        }
    }

    /// Host gave up on `name`; it counts as resolved but has no handle
    pub fn fail(&mut self, name: &str) -> Result<(), AssetError> {
        self.resolve(name, false).map(|_| ())
    }

    pub fn get(&self, name: &str) -> Option<AssetHandle> {
        match self.entries.get(name)?.state {
            AssetState::Loaded(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn state(&self, name: &str) -> Option<AssetState> {
        self.entries.get(name).map(|e| e.state)
    }

    /// Share of declared resources resolved, for the loading bar
    pub fn progress(&self) -> f32 {
        if self.entries.is_empty() {
            return 1.0;
        }
        let done = self
            .entries
            .values()
            .filter(|e| e.state != AssetState::Pending)
            .count();
        done as f32 / self.entries.len() as f32
    }

    /// True exactly once, as soon as nothing is pending
    pub fn take_ready(&mut self) -> bool {
        if self.ready_sent || self.progress() < 1.0 {
            return false;
        }
        self.ready_sent = true;
        log::info!("All assets ready");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_dispatch_by_extension() {
        assert_eq!(AssetKind::from_extension("GLB"), Some(AssetKind::Model));
        assert_eq!(AssetKind::from_extension("jpeg"), Some(AssetKind::Texture));
        assert_eq!(AssetKind::from_extension("ogg"), Some(AssetKind::Sound));
        assert_eq!(AssetKind::from_extension("exe"), None);
        assert_eq!(asset_name("/models/Boop.gltf"), "boop");
    }

    #[test]
    fn test_unknown_extensions_are_skipped() {
        let json = r#"{"files": ["models/boop.gltf", "notes.txt", "sounds/jump.mp3"]}"#;
        let store = AssetStore::from_manifest(json).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.state("notes").is_none());
    }

    #[test]
    fn test_ready_fires_once_after_everything_resolves() {
        let mut store = AssetStore::new();
        store.declare("textures/floor.png").unwrap();
        store.declare("fonts/title.json").unwrap();
        assert!(matches!(
            store.declare("other/floor.jpg"),
            Err(AssetError::Duplicate(_))
        ));
        assert!(!store.take_ready());

        let handle = store.complete("floor").unwrap();
        assert_eq!(handle.kind, AssetKind::Texture);
        assert_eq!(store.get("floor"), Some(handle));
        assert_eq!(store.progress(), 0.5);
        assert!(!store.take_ready());

        store.fail("title").unwrap();
        assert!(store.get("title").is_none());
        assert!(store.take_ready());
        assert!(!store.take_ready());
        assert!(matches!(store.complete("title"), Err(AssetError::Failed(_))));
        assert!(matches!(store.complete("ghost"), Err(AssetError::Unknown(_))));
    }

    #[test]
    fn test_empty_store_is_ready_immediately() {
        let mut store = AssetStore::from_manifest(r#"{"files": []}"#).unwrap();
        assert_eq!(store.requests().count(), 0);
        assert!(store.take_ready());
    }
}
