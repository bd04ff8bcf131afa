//! Durable load/save of whole documents.

use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, StoreError};

/// Load/save contract the stores depend on.
///
/// A missing document is an empty, valid initial state rather than an error.
pub trait Persistence<D>: Send + Sync {
    fn load(&self) -> Result<D>;
    fn save(&self, doc: &D) -> Result<()>;
}

/// Pretty-printed JSON file, replaced atomically on save.
#[derive(Debug)]
pub struct JsonFile<D> {
    path: PathBuf,
    _doc: PhantomData<fn() -> D>,
}

impl<D> JsonFile<D> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D> Persistence<D> for JsonFile<D>
where
    D: Serialize + DeserializeOwned + Default,
{
    fn load(&self) -> Result<D> {
        if !self.path.exists() {
            return Ok(D::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| {
            StoreError::Persistence(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(D::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            StoreError::Persistence(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, doc: &D) -> Result<()> {
        let content = serde_json::to_string_pretty(doc)
            .map_err(|e| StoreError::Persistence(format!("Failed to serialize document: {}", e)))?;
        atomic_write(&self.path, &content)
    }
}

/// Write to a sibling temp file, then rename over the target.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let io_error =
        |e: std::io::Error| StoreError::Persistence(format!("Failed to write {}: {}", path.display(), e));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(io_error)?;
    file.write_all(content.as_bytes()).map_err(io_error)?;
    file.write_all(b"\n").map_err(io_error)?;
    file.sync_all().map_err(io_error)?;
    fs::rename(&tmp, path).map_err(io_error)
}

/// Document held in memory only. Used by tests and embedders.
#[derive(Debug, Default)]
pub struct InMemory<D> {
    doc: Mutex<Option<D>>,
}

impl<D> InMemory<D> {
    pub fn new() -> Self {
        Self {
            doc: Mutex::new(None),
        }
    }

    pub fn with_document(doc: D) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
        }
    }
}

impl<D> Persistence<D> for InMemory<D>
where
    D: Clone + Default + Send,
{
    fn load(&self) -> Result<D> {
        let doc = self.doc.lock().expect("document lock poisoned");
        Ok(doc.clone().unwrap_or_default())
    }

    fn save(&self, doc: &D) -> Result<()> {
        *self.doc.lock().expect("document lock poisoned") = Some(doc.clone());
        Ok(())
    }
}
