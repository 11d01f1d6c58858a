//! Durable list of configured provider instances.
//!
//! The whole collection is serialized to a single JSON blob and rewritten on
//! every mutation. A missing or unreadable blob reads back as no providers.

use crate::api::Error;
use crate::model::{ProviderId, ProviderInstance, ProviderType, Settings};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const CREDENTIALS_KEY: &str = "credentials";

/// Key/value storage for JSON blobs.
pub trait BlobStore {
    fn read(&self, key: &str) -> Result<Option<String>, Error>;
    fn write(&self, key: &str, blob: &str) -> Result<(), Error>;
}

/// Blobs kept as `<key>.json` files under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        FileStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl BlobStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        match fs::read_to_string(self.path(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::Storage(e.to_string()))?;
        fs::write(self.path(key), blob).map_err(|e| Error::Storage(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl BlobStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, Error> {
        self.blobs
            .lock()
            .map(|blobs| blobs.get(key).cloned())
            .map_err(|e| Error::Storage(e.to_string()))
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), Error> {
        self.blobs
            .lock()
            .map(|mut blobs| {
                blobs.insert(key.to_owned(), blob.to_owned());
            })
            .map_err(|e| Error::Storage(e.to_string()))
    }
}

pub struct CredentialStore<S> {
    storage: S,
    key: String,
}

impl<S: BlobStore> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        CredentialStore {
            storage,
            key: CREDENTIALS_KEY.to_owned(),
        }
    }

    /// Providers in insertion order.
    pub fn list(&self) -> Vec<ProviderInstance> {
        let blob = match self.storage.read(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Unable to read stored providers: {}", e);
                return Vec::new();
            }
        };

        serde_json::from_str(&blob).unwrap_or_else(|e| {
            log::warn!("Ignoring corrupt provider list: {}", e);
            Vec::new()
        })
    }

    pub fn get(&self, id: &ProviderId) -> Option<ProviderInstance> {
        self.list().into_iter().find(|p| &p.id == id)
    }

    pub fn add(&self, provider_type: ProviderType) -> Result<ProviderInstance, Error> {
        let mut providers = self.list();

        let mut instance = ProviderInstance::new(provider_type);
        while providers.iter().any(|p| p.id == instance.id) {
            instance.id = ProviderId::generate();
        }

        providers.push(instance.clone());
        self.save(&providers)?;
        log::info!("Added {} provider {}", provider_type, instance.id);
        Ok(instance)
    }

    pub fn remove(&self, id: &ProviderId) -> Result<(), Error> {
        let providers = self.list();
        let remaining: Vec<ProviderInstance> =
            providers.iter().filter(|p| &p.id != id).cloned().collect();

        if remaining.len() == providers.len() {
            return Ok(());
        }
        self.save(&remaining)?;
        log::info!("Removed provider {}", id);
        Ok(())
    }

    /// Replace the settings of `id`. The provider's type never changes.
    pub fn update_settings(&self, id: &ProviderId, settings: Settings) -> Result<(), Error> {
        let mut providers = self.list();

        match providers.iter_mut().find(|p| &p.id == id) {
            Some(provider) => provider.settings = settings,
            None => return Ok(()),
        }
        self.save(&providers)
    }

    fn save(&self, providers: &[ProviderInstance]) -> Result<(), Error> {
        let blob = serde_json::to_string(providers).map_err(|e| Error::Storage(e.to_string()))?;
        self.storage.write(&self.key, &blob)
    }
}
