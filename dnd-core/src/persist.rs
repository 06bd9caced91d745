//! Character persistence.
//!
//! State is kept per guild and per user: each user owns a set of named
//! characters and an optional active-character pointer. The roller only talks
//! to the [`CharacterRepository`] trait and always works on an owned copy of
//! a user's record, so nothing it resolves can change underneath it.

use crate::world::Character;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// Guild id used for direct messages.
pub const DIRECT_MESSAGE_GUILD: &str = "None";

/// Identifies one user within one guild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey {
    pub guild: String,
    pub user: String,
}

impl UserKey {
    pub fn new(guild: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            guild: guild.into(),
            user: user.into(),
        }
    }

    /// A user talking to the roller outside of any guild.
    pub fn direct(user: impl Into<String>) -> Self {
        Self::new(DIRECT_MESSAGE_GUILD, user)
    }
}

/// Everything stored for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Last seen display name.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub characters: BTreeMap<String, Character>,

    /// Character used when a command does not name one.
    #[serde(default)]
    pub active: Option<String>,
}

impl UserRecord {
    pub fn active_character(&self) -> Option<(&str, &Character)> {
        let name = self.active.as_deref()?;
        self.characters.get(name).map(|c| (name, c))
    }

    /// Remove a character, clearing the active pointer if it pointed there.
    pub fn delete_character(&mut self, name: &str) -> Option<Character> {
        let removed = self.characters.remove(name);
        if removed.is_some() && self.active.as_deref() == Some(name) {
            self.active = None;
        }
        removed
    }
}

/// All users of one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildState {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
}

/// The complete persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    /// Save format version for compatibility checking.
    pub version: u32,

    #[serde(default)]
    pub guilds: BTreeMap<String, GuildState>,
}

impl Default for SavedState {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            guilds: BTreeMap::new(),
        }
    }
}

impl SavedState {
    pub fn user(&self, key: &UserKey) -> Option<&UserRecord> {
        self.guilds.get(&key.guild)?.users.get(&key.user)
    }

    pub fn set_user(&mut self, key: &UserKey, record: UserRecord) {
        self.guilds
            .entry(key.guild.clone())
            .or_default()
            .users
            .insert(key.user.clone(), record);
    }

    /// Save to a JSON file, replacing it only once the new content is written.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content).await?;
        fs::rename(&staging, path).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }
}

/// Keyed access to users and their characters.
///
/// Implementations only need `load_user` and `save_user`; the character
/// helpers are read-modify-write cycles over a whole [`UserRecord`]. Callers
/// that need several of them to be atomic should serialise per [`UserKey`]
/// themselves, as the roller does.
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    /// The user's record, or an empty one for a user never seen before.
    async fn load_user(&self, key: &UserKey) -> Result<UserRecord, PersistError>;

    async fn save_user(&self, key: &UserKey, record: UserRecord) -> Result<(), PersistError>;

    async fn get_character(
        &self,
        key: &UserKey,
        name: &str,
    ) -> Result<Option<Character>, PersistError> {
        Ok(self.load_user(key).await?.characters.get(name).cloned())
    }

    async fn put_character(
        &self,
        key: &UserKey,
        name: &str,
        character: Character,
    ) -> Result<(), PersistError> {
        let mut record = self.load_user(key).await?;
        record.characters.insert(name.to_string(), character);
        self.save_user(key, record).await
    }

    /// Returns whether the character existed.
    async fn delete_character(&self, key: &UserKey, name: &str) -> Result<bool, PersistError> {
        let mut record = self.load_user(key).await?;
        if record.delete_character(name).is_none() {
            return Ok(false);
        }
        self.save_user(key, record).await?;
        Ok(true)
    }

    /// Returns false, changing nothing, when the user has no such character.
    async fn set_active(&self, key: &UserKey, name: &str) -> Result<bool, PersistError> {
        let mut record = self.load_user(key).await?;
        if !record.characters.contains_key(name) {
            return Ok(false);
        }
        record.active = Some(name.to_string());
        self.save_user(key, record).await?;
        Ok(true)
    }

    async fn active_character(
        &self,
        key: &UserKey,
    ) -> Result<Option<(String, Character)>, PersistError> {
        let record = self.load_user(key).await?;
        Ok(record
            .active_character()
            .map(|(name, character)| (name.to_string(), character.clone())))
    }
}

/// Repository that lives and dies with the process.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<SavedState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: SavedState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// A copy of everything stored so far.
    pub async fn snapshot(&self) -> SavedState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl CharacterRepository for MemoryRepository {
    async fn load_user(&self, key: &UserKey) -> Result<UserRecord, PersistError> {
        Ok(self.state.read().await.user(key).cloned().unwrap_or_default())
    }

    async fn save_user(&self, key: &UserKey, record: UserRecord) -> Result<(), PersistError> {
        self.state.write().await.set_user(key, record);
        Ok(())
    }
}

/// Repository backed by a single JSON file, rewritten after every save.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    state: RwLock<SavedState>,
}

impl JsonFileRepository {
    /// Load `path`, starting empty when the file does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let state = match SavedState::load_json(&path).await {
            Ok(state) => {
                info!(path = %path.display(), guilds = state.guilds.len(), "loaded character store");
                state
            }
            Err(PersistError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no character store yet, starting empty");
                SavedState::default()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CharacterRepository for JsonFileRepository {
    async fn load_user(&self, key: &UserKey) -> Result<UserRecord, PersistError> {
        Ok(self.state.read().await.user(key).cloned().unwrap_or_default())
    }

    async fn save_user(&self, key: &UserKey, record: UserRecord) -> Result<(), PersistError> {
        // Holding the write lock across the file write keeps saves ordered.
        let mut state = self.state.write().await;
        state.set_user(key, record);
        state.save_json(&self.path).await?;
        debug!(path = %self.path.display(), guild = %key.guild, user = %key.user, "saved character store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::AbilityScores;

    fn urso() -> Character {
        Character::new(3, AbilityScores::new(16, 12, 14, 6, 10, 6))
    }

    #[test]
    fn test_delete_clears_active_pointer() {
        let mut record = UserRecord::default();
        record.characters.insert("urso".to_string(), urso());
        record.characters.insert("mira".to_string(), urso());
        record.active = Some("urso".to_string());

        assert!(record.delete_character("mira").is_some());
        assert_eq!(record.active.as_deref(), Some("urso"));

        assert!(record.delete_character("urso").is_some());
        assert_eq!(record.active, None);
        assert!(record.delete_character("urso").is_none());
    }

    #[test]
    fn test_saved_state_nesting() {
        let mut state = SavedState::default();
        let key = UserKey::new("guild-1", "user-1");
        assert!(state.user(&key).is_none());

        state.set_user(&key, UserRecord {
            name: "Ana".to_string(),
            ..Default::default()
        });
        assert_eq!(state.user(&key).map(|r| r.name.as_str()), Some("Ana"));
        assert!(state.user(&UserKey::direct("user-1")).is_none());
    }

    #[tokio::test]
    async fn test_memory_repository_character_helpers() {
        let repo = MemoryRepository::new();
        let key = UserKey::new("guild", "user");

        assert_eq!(repo.get_character(&key, "urso").await.unwrap(), None);
        repo.put_character(&key, "urso", urso()).await.unwrap();
        assert_eq!(repo.get_character(&key, "urso").await.unwrap(), Some(urso()));

        assert!(!repo.set_active(&key, "mira").await.unwrap());
        assert!(repo.set_active(&key, "urso").await.unwrap());
        let (name, _) = repo.active_character(&key).await.unwrap().unwrap();
        assert_eq!(name, "urso");

        assert!(repo.delete_character(&key, "urso").await.unwrap());
        assert!(!repo.delete_character(&key, "urso").await.unwrap());
        assert!(repo.active_character(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_repository_seeded_state() {
        let alice = UserKey::new("guild", "alice");
        let mut seeded = SavedState::default();
        let mut record = UserRecord::default();
        record.characters.insert("urso".to_string(), urso());
        seeded.set_user(&alice, record);

        let repo = MemoryRepository::from_state(seeded.clone());
        assert_eq!(repo.get_character(&alice, "urso").await.unwrap(), Some(urso()));
        assert_eq!(repo.snapshot().await, seeded);

        let bob = UserKey::direct("bob");
        repo.put_character(&bob, "mira", urso()).await.unwrap();
        let snapshot = repo.snapshot().await;
        assert!(snapshot.user(&alice).is_some());
        assert!(snapshot.guilds[DIRECT_MESSAGE_GUILD].users["bob"].characters.contains_key("mira"));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let repo = MemoryRepository::new();
        let alice = UserKey::new("guild", "alice");
        let bob = UserKey::new("guild", "bob");

        repo.put_character(&alice, "urso", urso()).await.unwrap();
        assert!(repo.get_character(&bob, "urso").await.unwrap().is_none());
        assert!(repo
            .get_character(&UserKey::new("other", "alice"), "urso")
            .await
            .unwrap()
            .is_none());
    }
}
