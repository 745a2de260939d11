//! JSON document storage for analysed documents and templates.
//!
//! Layout under the store root:
//!
//! ```text
//! indexes/<index>.json    id -> document path
//! <index>/<id>.json       one document
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, index: &str, id: &str) -> StoreResult<Option<Value>>;
    async fn get_all(&self, index: &str) -> StoreResult<Vec<Value>>;
}

type IndexEntries = BTreeMap<String, PathBuf>;

pub struct JsonFileStore {
    root: PathBuf,
    indexes: RwLock<HashMap<String, IndexEntries>>,
}

impl JsonFileStore {
    /// Opens a store with the given indexes. Missing index files start empty;
    /// an index file that cannot be parsed is treated as empty as well.
    pub async fn open<P: AsRef<Path>>(root: P, names: &[String]) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let mut indexes = HashMap::new();

        for name in names {
            let path = index_file(&root, name);
            let entries = match tokio::fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<IndexEntries>(&content).unwrap_or_else(|e| {
                    warn!("Index file {} is corrupt and was reset: {}", path.display(), e);
                    IndexEntries::new()
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexEntries::new(),
                Err(source) => return Err(StoreError::Io { path, source }),
            };
            debug!("Index '{}' holds {} documents", name, entries.len());
            indexes.insert(name.clone(), entries);
        }

        info!("Opened document store at {} with {} indexes", root.display(), indexes.len());
        Ok(Self {
            root,
            indexes: RwLock::new(indexes),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ids(&self, index: &str) -> StoreResult<Vec<String>> {
        let indexes = self.indexes.read().await;
        let entries = indexes
            .get(index)
            .ok_or_else(|| StoreError::UnknownIndex(index.to_string()))?;
        Ok(entries.keys().cloned().collect())
    }

    /// Writes a document and records it in the index. Returns `false` without
    /// writing when the id exists and `overwrite` is not set.
    pub async fn put(&self, index: &str, id: &str, document: &Value, overwrite: bool) -> StoreResult<bool> {
        check_id(id)?;
        let mut indexes = self.indexes.write().await;
        let entries = indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::UnknownIndex(index.to_string()))?;

        if entries.contains_key(id) && !overwrite {
            debug!("Document {} already exists in '{}'", id, index);
            return Ok(false);
        }

        let folder = self.root.join(index);
        create_dir(&folder).await?;
        let path = folder.join(format!("{}.json", id));
        let content = serde_json::to_string_pretty(document)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| StoreError::Io { path: path.clone(), source })?;

        entries.insert(id.to_string(), path);
        self.save_index(index, entries).await?;
        debug!("Stored document {} in '{}'", id, index);
        Ok(true)
    }

    /// Deletes a document and its index entry. Returns `false` if the id was unknown.
    pub async fn remove(&self, index: &str, id: &str) -> StoreResult<bool> {
        let mut indexes = self.indexes.write().await;
        let entries = indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::UnknownIndex(index.to_string()))?;

        let Some(path) = entries.get(id).cloned() else {
            return Ok(false);
        };
        // The entry stays indexed until its file is gone.
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Document file {} was already gone", path.display());
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        }
        entries.remove(id);
        self.save_index(index, entries).await?;
        Ok(true)
    }

    /// Rebuilds an index from the `*.json` files in its folder. A document's `id`
    /// field names it; files without one are named by their file stem.
    pub async fn rebuild_index(&self, index: &str) -> StoreResult<usize> {
        let mut indexes = self.indexes.write().await;
        let entries = indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::UnknownIndex(index.to_string()))?;

        let folder = self.root.join(index);
        let mut rebuilt = IndexEntries::new();
        if folder.is_dir() {
            for entry in WalkDir::new(&folder).follow_links(true) {
                let entry = entry?;
                let path = entry.path();
                if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                let document = match read_document(path).await {
                    Ok(document) => document,
                    Err(e) => {
                        warn!("Skipping {} while rebuilding '{}': {}", path.display(), index, e);
                        continue;
                    }
                };
                let id = match document.get("id") {
                    Some(Value::String(id)) => id.clone(),
                    Some(Value::Number(id)) => id.to_string(),
                    _ => match path.file_stem().and_then(|s| s.to_str()) {
                        Some(stem) => stem.to_string(),
                        None => continue,
                    },
                };
                rebuilt.insert(id, path.to_path_buf());
            }
        }

        *entries = rebuilt;
        self.save_index(index, entries).await?;
        info!("Rebuilt index '{}' with {} documents", index, entries.len());
        Ok(entries.len())
    }

    async fn save_index(&self, index: &str, entries: &IndexEntries) -> StoreResult<()> {
        let path = index_file(&self.root, index);
        if let Some(parent) = path.parent() {
            create_dir(parent).await?;
        }
        let content = serde_json::to_string_pretty(entries)
            .map_err(|source| StoreError::Json { path: path.clone(), source })?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    async fn document_path(&self, index: &str, id: &str) -> StoreResult<Option<PathBuf>> {
        let indexes = self.indexes.read().await;
        let entries = indexes
            .get(index)
            .ok_or_else(|| StoreError::UnknownIndex(index.to_string()))?;
        Ok(entries.get(id).cloned())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn get(&self, index: &str, id: &str) -> StoreResult<Option<Value>> {
        match self.document_path(index, id).await? {
            Some(path) => read_document(&path).await.map(Some),
            None => Ok(None),
        }
    }

    async fn get_all(&self, index: &str) -> StoreResult<Vec<Value>> {
        let paths: Vec<PathBuf> = {
            let indexes = self.indexes.read().await;
            let entries = indexes
                .get(index)
                .ok_or_else(|| StoreError::UnknownIndex(index.to_string()))?;
            entries.values().cloned().collect()
        };

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(read_document(&path).await?);
        }
        Ok(documents)
    }
}

/// Read-through cache over another store, keyed by `(index, id)`.
///
/// Only single-document reads are cached. Writes through the inner store are not
/// seen until the affected entries are invalidated.
pub struct CachedStore<S> {
    inner: S,
    cache: Mutex<HashMap<(String, String), Value>>,
}

impl<S: DocumentStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub async fn invalidate(&self, index: &str, id: &str) {
        self.cache.lock().await.remove(&(index.to_string(), id.to_string()));
    }

    pub async fn invalidate_index(&self, index: &str) {
        self.cache.lock().await.retain(|(i, _), _| i != index);
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for CachedStore<S> {
    async fn get(&self, index: &str, id: &str) -> StoreResult<Option<Value>> {
        let key = (index.to_string(), id.to_string());
        if let Some(document) = self.cache.lock().await.get(&key) {
            debug!("Cache hit for {}/{}", index, id);
            return Ok(Some(document.clone()));
        }

        let document = self.inner.get(index, id).await?;
        if let Some(document) = &document {
            self.cache.lock().await.insert(key, document.clone());
        }
        Ok(document)
    }

    async fn get_all(&self, index: &str) -> StoreResult<Vec<Value>> {
        self.inner.get_all(index).await
    }
}

fn index_file(root: &Path, index: &str) -> PathBuf {
    root.join("indexes").join(format!("{}.json", index))
}

fn check_id(id: &str) -> StoreResult<()> {
    if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

async fn create_dir(path: &Path) -> StoreResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })
}

async fn read_document(path: &Path) -> StoreResult<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Json { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn names() -> Vec<String> {
        vec!["analyse".to_string(), "question_template".to_string()]
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path(), &names()).await.unwrap();

        assert!(store.put("analyse", "doc-1", &json!({"id": "doc-1"}), false).await.unwrap());
        assert!(!store.put("analyse", "doc-1", &json!({"id": "other"}), false).await.unwrap());
        assert_eq!(store.get("analyse", "doc-1").await.unwrap(), Some(json!({"id": "doc-1"})));
        assert_eq!(store.get_all("analyse").await.unwrap().len(), 1);

        assert!(store.remove("analyse", "doc-1").await.unwrap());
        assert!(!store.remove("analyse", "doc-1").await.unwrap());
        assert_eq!(store.get("analyse", "doc-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_remove_keeps_the_entry() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path(), &names()).await.unwrap();
        store.put("analyse", "doc-1", &json!({"id": "doc-1"}), false).await.unwrap();

        // A directory in place of the document cannot be removed as a file.
        let path = dir.path().join("analyse/doc-1.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(store.remove("analyse", "doc-1").await, Err(StoreError::Io { .. })));
        assert_eq!(store.ids("analyse").await.unwrap(), vec!["doc-1".to_string()]);

        let reopened = JsonFileStore::open(dir.path(), &names()).await.unwrap();
        assert_eq!(reopened.ids("analyse").await.unwrap(), vec!["doc-1".to_string()]);
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::open(dir.path(), &names()).await.unwrap();
            store.put("question_template", "t1", &json!({"broader_questionType": "A"}), false).await.unwrap();
        }
        let store = JsonFileStore::open(dir.path(), &names()).await.unwrap();
        assert_eq!(store.ids("question_template").await.unwrap(), vec!["t1".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_index_and_bad_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path(), &names()).await.unwrap();
        assert!(matches!(store.get("upload", "x").await, Err(StoreError::UnknownIndex(_))));
        assert!(matches!(
            store.put("analyse", "../escape", &json!({}), false).await,
            Err(StoreError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_index_loads_empty_and_rebuilds() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("indexes")).unwrap();
        std::fs::write(dir.path().join("indexes/analyse.json"), "{not json").unwrap();
        std::fs::create_dir_all(dir.path().join("analyse")).unwrap();
        std::fs::write(dir.path().join("analyse/a.json"), r#"{"id": "doc-a"}"#).unwrap();
        std::fs::write(dir.path().join("analyse/b.json"), r#"{"title": "untitled"}"#).unwrap();
        std::fs::write(dir.path().join("analyse/notes.txt"), "ignored").unwrap();

        let store = JsonFileStore::open(dir.path(), &names()).await.unwrap();
        assert!(store.ids("analyse").await.unwrap().is_empty());

        assert_eq!(store.rebuild_index("analyse").await.unwrap(), 2);
        assert_eq!(store.ids("analyse").await.unwrap(), vec!["b".to_string(), "doc-a".to_string()]);
    }

    #[tokio::test]
    async fn test_cache_reads_through_until_invalidated() {
        let dir = TempDir::new().unwrap();
        let store = CachedStore::new(JsonFileStore::open(dir.path(), &names()).await.unwrap());
        store.inner().put("analyse", "d", &json!({"v": 1}), false).await.unwrap();

        assert_eq!(store.get("analyse", "d").await.unwrap(), Some(json!({"v": 1})));
        assert_eq!(store.cached().await, 1);

        store.inner().put("analyse", "d", &json!({"v": 2}), true).await.unwrap();
        assert_eq!(store.get("analyse", "d").await.unwrap(), Some(json!({"v": 1})));
        // get_all bypasses the cache.
        assert_eq!(store.get_all("analyse").await.unwrap(), vec![json!({"v": 2})]);

        store.invalidate("analyse", "d").await;
        assert_eq!(store.get("analyse", "d").await.unwrap(), Some(json!({"v": 2})));

        store.invalidate_index("analyse").await;
        assert_eq!(store.cached().await, 0);

        assert_eq!(store.get("analyse", "missing").await.unwrap(), None);
        assert_eq!(store.cached().await, 0);
        store.clear().await;
    }
}
