//! Object-store seam shared by the sink and the CSV transformer.
//!
//! The contract is deliberately small: write (atomically), list, open,
//! derive a sub-store. Retries belong to the concrete driver, never here.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by object-store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object {name:?}: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },
    #[error("object {0:?} not found")]
    NotFound(String),
}

impl StoreError {
    fn io(name: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            name: name.into(),
            source,
        }
    }
}

/// Contract implemented by bundle destinations.
pub trait ObjectStore: Send + Sync {
    /// Writes a whole object. The object must appear atomically: readers
    /// never observe a partially written object under its final name.
    fn write_object(&self, name: &str, content: &[u8]) -> Result<(), StoreError>;

    /// Streams an object from a reader, with the same atomicity contract.
    fn write_object_stream(&self, name: &str, reader: &mut dyn Read) -> Result<(), StoreError>;

    /// Opens an object for buffered reading.
    fn open_object(&self, name: &str) -> Result<Box<dyn BufRead + Send>, StoreError>;

    /// Lists object names in lexicographic order.
    fn list_objects(&self) -> Result<Vec<String>, StoreError>;

    /// Derives a store rooted at `prefix` under this one.
    fn sub_store(&self, prefix: &str) -> Result<Arc<dyn ObjectStore>, StoreError>;
}

/// Local-filesystem store. Objects are staged to a dotted temporary name in
/// the same directory and renamed into place.
pub struct LocalFileStore {
    base: PathBuf,
}

impl LocalFileStore {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        std::fs::create_dir_all(&base)
            .map_err(|err| StoreError::io(base.display().to_string(), err))?;
        Ok(LocalFileStore { base })
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    fn staging_path(&self, name: &str) -> PathBuf {
        self.base.join(format!(".{name}.tmp"))
    }
}

impl ObjectStore for LocalFileStore {
    fn write_object(&self, name: &str, content: &[u8]) -> Result<(), StoreError> {
        self.write_object_stream(name, &mut &content[..])
    }

    fn write_object_stream(&self, name: &str, reader: &mut dyn Read) -> Result<(), StoreError> {
        let staging = self.staging_path(name);
        let target = self.object_path(name);

        let mut file =
            std::fs::File::create(&staging).map_err(|err| StoreError::io(name, err))?;
        std::io::copy(reader, &mut file).map_err(|err| StoreError::io(name, err))?;
        file.flush().map_err(|err| StoreError::io(name, err))?;
        drop(file);

        std::fs::rename(&staging, &target).map_err(|err| StoreError::io(name, err))
    }

    fn open_object(&self, name: &str) -> Result<Box<dyn BufRead + Send>, StoreError> {
        let path = self.object_path(name);
        let file = std::fs::File::open(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::io(name, err),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn list_objects(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(&self.base)
            .map_err(|err| StoreError::io(self.base.display().to_string(), err))?;
        for entry in entries {
            let entry = entry.map_err(|err| StoreError::io(self.base.display().to_string(), err))?;
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn sub_store(&self, prefix: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        Ok(Arc::new(LocalFileStore::new(self.base.join(prefix))?))
    }
}

/// In-memory store backed by a shared map, keyed by full object path.
/// Sub-stores share the map and prepend their prefix.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    prefix: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn full_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    /// Snapshot of every object under every prefix, for assertions.
    pub fn all_objects(&self) -> BTreeMap<String, Vec<u8>> {
        self.objects.lock().unwrap().clone()
    }
}

impl ObjectStore for MemoryStore {
    fn write_object(&self, name: &str, content: &[u8]) -> Result<(), StoreError> {
        self.objects
            .lock()
            .unwrap()
            .insert(self.full_name(name), content.to_vec());
        Ok(())
    }

    fn write_object_stream(&self, name: &str, reader: &mut dyn Read) -> Result<(), StoreError> {
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .map_err(|err| StoreError::io(name, err))?;
        self.write_object(name, &content)
    }

    fn open_object(&self, name: &str) -> Result<Box<dyn BufRead + Send>, StoreError> {
        let objects = self.objects.lock().unwrap();
        let content = objects
            .get(&self.full_name(name))
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?
            .clone();
        Ok(Box::new(std::io::Cursor::new(content)))
    }

    fn list_objects(&self) -> Result<Vec<String>, StoreError> {
        let objects = self.objects.lock().unwrap();
        let prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };
        Ok(objects
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn sub_store(&self, prefix: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        Ok(Arc::new(MemoryStore {
            objects: Arc::clone(&self.objects),
            prefix: self.full_name(prefix),
        }))
    }
}

/// Keeps `Path`-based call sites tidy when deriving a local store.
pub fn local_store(base: &Path) -> Result<Arc<dyn ObjectStore>, StoreError> {
    Ok(Arc::new(LocalFileStore::new(base)?))
}
