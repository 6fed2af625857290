//! Key-value settings channel shared with the settings UI.
//!
//! Every value is a JSON-encoded string. Writes made by the companion never produce change
//! events; only edits coming from the settings UI do.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CompanionError;

/// Notification delivered to the change listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub new_value: Option<String>,
    pub old_value: Option<String>,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>, new_value: Option<String>) -> Self {
        Self {
            key: key.into(),
            new_value,
            old_value: None,
        }
    }
}

pub trait SettingsStorage {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CompanionError>;

    fn remove_item(&mut self, key: &str) -> Result<(), CompanionError>;

    /// Register the change listener with the channel.
    ///
    /// Each registration receives its own copy of every subsequent event.
    fn add_change_listener(&mut self);
}

/// Decode the JSON value stored under `key`, if any.
pub fn read_json<S, T>(settings: &S, key: &str) -> Result<Option<T>, CompanionError>
where
    S: SettingsStorage + ?Sized,
    T: DeserializeOwned,
{
    settings
        .get_item(key)
        .map(|raw| serde_json::from_str(&raw).map_err(|err| CompanionError::malformed(key, err)))
        .transpose()
}

pub fn write_json<S, T>(settings: &mut S, key: &str, value: &T) -> Result<(), CompanionError>
where
    S: SettingsStorage + ?Sized,
    T: Serialize + ?Sized,
{
    let encoded = serde_json::to_string(value).map_err(|err| CompanionError::malformed(key, err))?;
    settings.set_item(key, &encoded)
}

/// In-memory settings channel that records companion writes.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    items: BTreeMap<String, String>,
    listeners: usize,
    /// Every `set_item` (`Some`) and `remove_item` (`None`) issued by the companion, oldest first.
    pub writes: Vec<(String, Option<String>)>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without recording it as a companion write.
    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
    }

    /// Simulate the settings UI changing `key`.
    ///
    /// Stores the value and returns the event once per registered listener.
    pub fn user_change(&mut self, key: &str, value: &str) -> Vec<ChangeEvent> {
        let old_value = self.items.insert(key.to_owned(), value.to_owned());
        let event = ChangeEvent {
            key: key.to_owned(),
            new_value: Some(value.to_owned()),
            old_value,
        };
        vec![event; self.listeners]
    }

    pub fn writes_to(&self, key: &str) -> usize {
        self.writes.iter().filter(|(written, _)| written == key).count()
    }
}

impl SettingsStorage for MemorySettings {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CompanionError> {
        self.items.insert(key.to_owned(), value.to_owned());
        self.writes.push((key.to_owned(), Some(value.to_owned())));
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), CompanionError> {
        self.items.remove(key);
        self.writes.push((key.to_owned(), None));
        Ok(())
    }

    fn add_change_listener(&mut self) {
        self.listeners += 1;
    }
}

/// Settings channel persisted as a single JSON object on disk.
///
/// Used by the command line front end, which dispatches its own edits and therefore has no
/// change notifications to subscribe to.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileSettings {
    /// Load the settings file, starting empty when it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CompanionError> {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| CompanionError::malformed(&path.display().to_string(), err))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CompanionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let encoded = serde_json::to_vec_pretty(&self.items)
            .map_err(|err| CompanionError::malformed(&self.path.display().to_string(), err))?;
        fs::write(&self.path, encoded)?;
        Ok(())
    }
}

impl SettingsStorage for FileSettings {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CompanionError> {
        self.items.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn remove_item(&mut self, key: &str) -> Result<(), CompanionError> {
        if self.items.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn add_change_listener(&mut self) {
        log::debug!("{} has no change notifications", self.path.display());
    }
}
