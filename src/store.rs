use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::app_dirs::AppDirs;
use crate::error::{Result, TutorError};
use crate::stats::UserProfile;

/// Every known profile, keyed by user name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileCollection {
    profiles: BTreeMap<String, UserProfile>,
}

impl ProfileCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a zeroed profile; false when the name is empty or already taken
    pub fn create_profile(&mut self, name: &str) -> bool {
        if name.trim().is_empty() || self.profiles.contains_key(name) {
            return false;
        }
        self.profiles
            .insert(name.to_string(), UserProfile::new(name));
        log::info!("created profile {name:?}");
        true
    }

    pub fn get_profile(&self, name: &str) -> Result<&UserProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| TutorError::NotFound(name.to_string()))
    }

    pub fn get_profile_mut(&mut self, name: &str) -> Result<&mut UserProfile> {
        self.profiles
            .get_mut(name)
            .ok_or_else(|| TutorError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Normalise a freshly parsed collection and reject broken invariants
    fn validate(mut self, path: &Path) -> Result<Self> {
        for (key, profile) in self.profiles.iter_mut() {
            if *key != profile.name {
                return Err(TutorError::InconsistentState {
                    path: path.to_path_buf(),
                    reason: format!("entry {key:?} holds profile {:?}", profile.name),
                });
            }
            profile.fill_missing_symbols();
            if let Some(reason) = profile.check_invariants() {
                return Err(TutorError::InconsistentState {
                    path: path.to_path_buf(),
                    reason,
                });
            }
        }
        Ok(self)
    }
}

/// Durable storage for the profile collection
pub trait ProfileStore: Send + 'static {
    fn load(&self) -> Result<ProfileCollection>;
    fn save(&self, profiles: &ProfileCollection) -> Result<()>;
}

/// Pretty-printed JSON file holding the whole collection
#[derive(Debug, Clone)]
pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::profiles_path().unwrap_or_else(|| PathBuf::from("profiles.json")),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Like `load`, but moves an unreadable file aside and starts empty
    pub fn load_or_reset(&self) -> Result<ProfileCollection> {
        match self.load() {
            Err(err) if err.is_corrupt_state() => {
                let backup = self.path.with_extension(format!(
                    "json.corrupt-{}",
                    Utc::now().format("%Y%m%d%H%M%S")
                ));
                log::warn!(
                    "{err}; moving it to {} and starting with no profiles",
                    backup.display()
                );
                fs::rename(&self.path, &backup).map_err(|e| TutorError::io(&backup, e))?;
                Ok(ProfileCollection::new())
            }
            other => other,
        }
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<ProfileCollection> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "no profile file at {}, starting empty",
                    self.path.display()
                );
                return Ok(ProfileCollection::new());
            }
            Err(e) => return Err(TutorError::io(&self.path, e)),
        };

        let profiles: ProfileCollection =
            serde_json::from_slice(&bytes).map_err(|source| TutorError::CorruptState {
                path: self.path.clone(),
                source,
            })?;
        let profiles = profiles.validate(&self.path)?;
        log::info!(
            "loaded {} profile(s) from {}",
            profiles.len(),
            self.path.display()
        );
        Ok(profiles)
    }

    fn save(&self, profiles: &ProfileCollection) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| TutorError::io(parent, e))?;
            }
        }

        let data = serde_json::to_vec_pretty(profiles)
            .map_err(|e| TutorError::Persist(e.to_string()))?;

        // Write next to the target and rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| TutorError::io(&tmp, e))?;
        file.write_all(&data)
            .and_then(|_| file.sync_all())
            .map_err(|e| TutorError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| TutorError::io(&self.path, e))?;

        log::debug!(
            "saved {} profile(s) to {}",
            profiles.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory store for headless runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    saved: Arc<Mutex<Option<ProfileCollection>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last collection handed to `save`
    pub fn snapshot(&self) -> Option<ProfileCollection> {
        self.saved.lock().ok().and_then(|saved| saved.clone())
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> Result<ProfileCollection> {
        Ok(self.snapshot().unwrap_or_default())
    }

    fn save(&self, profiles: &ProfileCollection) -> Result<()> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|_| TutorError::Persist("memory store lock poisoned".to_string()))?;
        *saved = Some(profiles.clone());
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
