use async_trait::async_trait;
use std::collections::BTreeMap;
use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

#[derive(Debug)]
pub enum WatchlistError {
    Io(io::Error),
    JsonParse(serde_json::Error),
}

impl fmt::Display for WatchlistError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            WatchlistError::Io(ref err) => write!(f, "Watchlist I/O Error: {}", err),
            WatchlistError::JsonParse(ref err) => write!(f, "Watchlist JSON Error: {}", err),
        }
    }
}

impl error::Error for WatchlistError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            WatchlistError::Io(ref err) => Some(err),
            WatchlistError::JsonParse(ref err) => Some(err),
        }
    }
}

impl From<io::Error> for WatchlistError {
    fn from(err: io::Error) -> WatchlistError {
        WatchlistError::Io(err)
    }
}

impl From<serde_json::Error> for WatchlistError {
    fn from(err: serde_json::Error) -> WatchlistError {
        WatchlistError::JsonParse(err)
    }
}

/// String-keyed string storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, WatchlistError>;
    async fn set(&self, key: &str, value: String) -> Result<(), WatchlistError>;
}

/// Keeps every key in one JSON object on disk. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut file_name = self.path.file_name().unwrap_or_default().to_os_string();
        file_name.push(".tmp");
        self.path.with_file_name(file_name)
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, WatchlistError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, WatchlistError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), WatchlistError> {
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value);

        // write next to the target, then swap it in
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, serde_json::to_string_pretty(&entries)?).await?;
        if let Err(err) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}

/// The user's list of asset ids, stored JSON-encoded under one key.
pub struct Watchlist<S> {
    storage: S,
    key: String,
}

impl<S: KeyValueStore> Watchlist<S> {
    pub fn new(storage: S, key: &str) -> Self {
        Self {
            storage,
            key: key.to_string(),
        }
    }

    pub async fn ids(&self) -> Result<Vec<String>, WatchlistError> {
        match self.storage.get(&self.key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Appends `id`; returns `false` if it was already present.
    pub async fn add(&self, id: &str) -> Result<bool, WatchlistError> {
        let mut ids = self.ids().await?;
        if ids.iter().any(|existing| existing == id) {
            return Ok(false);
        }
        ids.push(id.to_string());
        self.save(&ids).await?;
        debug!("Added {} to watchlist", id);
        Ok(true)
    }

    /// Returns `false` if `id` wasn't in the list.
    pub async fn remove(&self, id: &str) -> Result<bool, WatchlistError> {
        let mut ids = self.ids().await?;
        let before = ids.len();
        ids.retain(|existing| existing != id);
        if ids.len() == before {
            return Ok(false);
        }
        self.save(&ids).await?;
        debug!("Removed {} from watchlist", id);
        Ok(true)
    }

    async fn save(&self, ids: &[String]) -> Result<(), WatchlistError> {
        self.storage.set(&self.key, serde_json::to_string(ids)?).await
    }
}
