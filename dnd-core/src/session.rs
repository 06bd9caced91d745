//! Roller - the command dispatcher behind the chat bot.
//!
//! Every message goes through [`Roller::handle`]. Commands start with `!`;
//! anything else is ignored. Each command loads the sender's record, works
//! on an owned copy, and saves it back while holding a lock for that user,
//! so two commands from the same user never interleave while different
//! users are served in parallel.

use crate::character_builder::{validate_name, CharacterBuilder, CharacterUpdate};
use crate::dice::{DiceEvaluator, StandardDice};
use crate::modifiers::RollModifiers;
use crate::persist::{CharacterRepository, JsonFileRepository, PersistError, UserKey, UserRecord};
use crate::rules::build_roll;
use crate::summary::describe;
use crate::world::{capitalize, Character};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Environment variable naming the storage directory.
pub const STORAGE_ENV: &str = "DND_ROLLER_STORAGE";

/// File the character store is kept in, inside the storage directory.
pub const STORE_FILE: &str = "cache.json";

const HELP: &str = "\
Commands:
  !roll (!r) [character] <target> [modifiers] - roll a stat, skill, macro or dice, e.g. !r stealth adv
  !character (!c) - create and manage characters, see !c help
  !macro (!m) - named rolls on a character, see !m help
  !variable (!v) - named bonuses on a character, see !v help
Modifiers: save, adv/a, dis/d, tadv/ta, crit, or any variable name.";

const CHARACTER_HELP: &str = "\
!c create <name> <level> <str> <dex> <con> <int> <wis> <cha> | <saves> | <skills> | <expertise>
!c update <name> main|saves|skills|expertise|bonus <values>
!c list, !c active [name], !c info [name], !c delete <name>";

const NO_SUCH_CHARACTER: &str = "No such character exists for you.";

const NO_ACTIVE_CHARACTER: &str =
    "You have no active character, create one with !character create.";

/// Errors that stop a command from completing.
///
/// Mistakes in the command itself are answered in the reply instead.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Configuration for a [`Roller`].
#[derive(Debug, Clone)]
pub struct RollerConfig {
    /// Directory holding the character store.
    pub storage_dir: PathBuf,

    /// Name used when rolling without any character.
    pub placeholder_name: String,
}

impl RollerConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            placeholder_name: "You".to_string(),
        }
    }

    /// Read the storage directory from the environment, loading `.env` first.
    ///
    /// Falls back to the current directory.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let storage_dir = std::env::var(STORAGE_ENV).unwrap_or_else(|_| ".".to_string());
        Self::new(storage_dir)
    }

    pub fn with_storage_dir(mut self, storage_dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = storage_dir.into();
        self
    }

    pub fn with_placeholder_name(mut self, name: impl Into<String>) -> Self {
        self.placeholder_name = name.into();
        self
    }

    pub fn store_path(&self) -> PathBuf {
        self.storage_dir.join(STORE_FILE)
    }
}

impl Default for RollerConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Macro and variable commands share everything but their wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Macro,
    Variable,
}

impl Entry {
    fn noun(self) -> &'static str {
        match self {
            Entry::Macro => "macro",
            Entry::Variable => "variable",
        }
    }

    fn entries(self, character: &mut Character) -> &mut BTreeMap<String, String> {
        match self {
            Entry::Macro => &mut character.macros,
            Entry::Variable => &mut character.variables,
        }
    }

    fn help(self) -> String {
        let command = match self {
            Entry::Macro => "!m",
            Entry::Variable => "!v",
        };
        format!(
            "{command} set [character] <name> <value>, {command} delete [character] <name>, \
             {command} list [character]. Values may use $references such as $str_mod or $prof."
        )
    }
}

/// Dispatches chat commands for every guild and user.
pub struct Roller {
    config: RollerConfig,
    repository: Arc<dyn CharacterRepository>,
    dice: Arc<dyn DiceEvaluator>,
    /// Only users with a command in flight have an entry.
    locks: Mutex<HashMap<UserKey, Arc<Mutex<()>>>>,
}

impl Roller {
    pub fn new(config: RollerConfig, repository: Arc<dyn CharacterRepository>) -> Self {
        Self {
            config,
            repository,
            dice: Arc::new(StandardDice),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open the JSON store in the configured storage directory.
    pub async fn open(config: RollerConfig) -> Result<Self, SessionError> {
        let repository = JsonFileRepository::open(config.store_path()).await?;
        Ok(Self::new(config, Arc::new(repository)))
    }

    /// Replace the dice evaluator, e.g. with a deterministic one in tests.
    pub fn with_dice(mut self, dice: Arc<dyn DiceEvaluator>) -> Self {
        self.dice = dice;
        self
    }

    pub fn config(&self) -> &RollerConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn CharacterRepository> {
        &self.repository
    }

    /// Handle one message. Returns the reply, or `None` for non-commands.
    pub async fn handle(
        &self,
        guild: &str,
        user: &str,
        display_name: &str,
        text: &str,
    ) -> Result<Option<String>, SessionError> {
        let text = text.trim().to_lowercase();
        if !text.starts_with('!') {
            return Ok(None);
        }
        let fields: Vec<&str> = text.split_whitespace().collect();
        let Some((command, args)) = fields.split_first() else {
            return Ok(None);
        };

        let key = UserKey::new(guild, user);
        let user_lock = self.user_lock(&key).await;
        let reply = {
            let _guard = user_lock.lock().await;
            self.run_command(&key, display_name, command, args).await
        };
        self.release_user_lock(&key, user_lock).await;

        let reply = reply?;
        debug!(guild, user, command = *command, "handled command");
        Ok(Some(reply))
    }

    /// One load, mutate, save cycle. Callers hold the user's lock.
    async fn run_command(
        &self,
        key: &UserKey,
        display_name: &str,
        command: &str,
        args: &[&str],
    ) -> Result<String, SessionError> {
        let mut record = self.repository.load_user(key).await?;
        record.name = display_name.to_string();

        let reply = match command {
            "!r" | "!roll" => self.roll(&record, args),
            "!c" | "!char" | "!character" => character_command(&mut record, args),
            "!m" | "!macro" => entry_command(Entry::Macro, &mut record, args),
            "!v" | "!var" | "!variable" => entry_command(Entry::Variable, &mut record, args),
            "!h" | "!help" => HELP.to_string(),
            other => format!("Unknown command {other}, try !help."),
        };

        self.repository.save_user(key, record).await?;
        Ok(reply)
    }

    async fn user_lock(&self, key: &UserKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.clone()).or_default().clone()
    }

    /// Forget the user's lock once no other command holds or waits on it.
    async fn release_user_lock(&self, key: &UserKey, user_lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one here.
        if Arc::strong_count(&user_lock) == 2 {
            locks.remove(key);
        }
    }

    fn roll(&self, record: &UserRecord, args: &[&str]) -> String {
        let Some(first) = args.first() else {
            return "Roll what? Try !r stealth or !r 1d20+3.".to_string();
        };

        // A leading character name picks that character for this roll only.
        let (name, character, rest) = match record.characters.get(*first) {
            Some(character) => (first.to_string(), character.clone(), &args[1..]),
            None => match record.active_character() {
                Some((name, character)) => (name.to_string(), character.clone(), args),
                None => (
                    self.config.placeholder_name.clone(),
                    Character::placeholder(),
                    args,
                ),
            },
        };

        let Some((target, tokens)) = rest.split_first() else {
            return format!("Roll what for {}?", capitalize(&name));
        };

        let modifiers = RollModifiers::parse(tokens, &character.variables);
        let notation = match build_roll(&character, target, &modifiers) {
            Ok(notation) => notation,
            Err(e) => return format!("Error: {e}."),
        };
        let summary = describe(&name, target, &modifiers, &character.macros);

        match self.dice.evaluate(&notation) {
            Ok(outcome) => {
                debug!(character = %name, notation = %notation, total = outcome.total, "rolled");
                format!("{summary}:\n{}", outcome.rendered)
            }
            Err(e) => format!("Error: could not roll {notation}: {e}."),
        }
    }
}

fn character_command(record: &mut UserRecord, args: &[&str]) -> String {
    match args {
        [] | ["help" | "h", ..] => CHARACTER_HELP.to_string(),

        ["list" | "l", ..] => {
            if record.characters.is_empty() {
                "You have no characters.".to_string()
            } else {
                let names: Vec<String> = record.characters.keys().map(|n| capitalize(n)).collect();
                format!("Your characters are: {}.", names.join(", "))
            }
        }

        ["active" | "a"] => match record.active_character() {
            Some((name, _)) => format!("Your current active character is {}.", capitalize(name)),
            None => NO_ACTIVE_CHARACTER.to_string(),
        },

        ["active" | "a", name, ..] => {
            if record.characters.contains_key(*name) {
                record.active = Some(name.to_string());
                format!("{} set as the active character.", capitalize(name))
            } else {
                NO_SUCH_CHARACTER.to_string()
            }
        }

        ["info" | "i" | "show" | "s", rest @ ..] => {
            let named = rest
                .first()
                .and_then(|n| record.characters.get_key_value(*n));
            match named.or_else(|| {
                let (name, _) = record.active_character()?;
                record.characters.get_key_value(name)
            }) {
                Some((name, character)) => character.sheet(name),
                None => NO_SUCH_CHARACTER.to_string(),
            }
        }

        ["create" | "c", name, template @ ..] => match CharacterBuilder::from_template(template) {
            Ok(builder) => {
                record.characters.insert(name.to_string(), builder.build());
                record.active = Some(name.to_string());
                info!(character = *name, "character created");
                format!("Character {} created and set as active.", capitalize(name))
            }
            Err(e) => format!("Could not create the character: {e}. Use !c help for help."),
        },

        ["update" | "u", name, section, fields @ ..] => {
            let Some(character) = record.characters.get_mut(*name) else {
                return NO_SUCH_CHARACTER.to_string();
            };
            match CharacterUpdate::parse(section, fields) {
                Ok(update) => {
                    update.apply(character);
                    info!(character = *name, section = *section, "character updated");
                    format!("Character {} was updated.", capitalize(name))
                }
                Err(e) => format!("Could not update the character: {e}."),
            }
        }

        ["delete" | "d", name, ..] => match record.delete_character(name) {
            Some(_) => {
                info!(character = *name, "character deleted");
                let mut reply = format!("Removed character {}.", capitalize(name));
                if record.active.is_none() && !record.characters.is_empty() {
                    reply.push_str(" You may need to set a new active character.");
                }
                reply
            }
            None => NO_SUCH_CHARACTER.to_string(),
        },

        _ => "Unknown character command, try !c help.".to_string(),
    }
}

fn entry_command(entry: Entry, record: &mut UserRecord, args: &[&str]) -> String {
    let Some((action, rest)) = args.split_first() else {
        return entry.help();
    };
    if matches!(*action, "help" | "h") {
        return entry.help();
    }

    // The character is optional and defaults to the active one.
    let (name, rest) = match rest.first() {
        Some(first) if record.characters.contains_key(*first) => (first.to_string(), &rest[1..]),
        _ => match &record.active {
            Some(active) => (active.clone(), rest),
            None => return NO_ACTIVE_CHARACTER.to_string(),
        },
    };
    let Some(character) = record.characters.get_mut(&name) else {
        return NO_SUCH_CHARACTER.to_string();
    };
    let display = capitalize(&name);
    let noun = entry.noun();
    let entries = entry.entries(character);

    match (*action, rest) {
        ("set" | "s", [key, value @ ..]) if !value.is_empty() => {
            if let Err(e) = validate_name(key) {
                return format!("Error: {e}.");
            }
            entries.insert(key.to_string(), value.concat());
            format!("Added {noun} {key} to {display}.")
        }
        ("delete" | "d", [key, ..]) => match entries.remove(*key) {
            Some(_) => format!("Removed {noun} {key} from {display}."),
            None => format!("No such {noun} exists on {display}."),
        },
        ("list" | "l", _) => {
            if entries.is_empty() {
                format!("{display} has no {noun}s.")
            } else {
                let listed: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{key}[{value}]"))
                    .collect();
                format!("{display} has the following {noun}s: {}.", listed.join(", "))
            }
        }
        _ => entry.help(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryRepository;

    fn urso() -> UserRecord {
        let mut record = UserRecord::default();
        let mut args = vec!["create", "urso"];
        args.extend("3 16 12 14 6 10 6 | str con | athletics |".split_whitespace());
        let reply = character_command(&mut record, &args);
        assert!(reply.starts_with("Character Urso created"), "{reply}");
        record
    }

    #[test]
    fn test_config_builders() {
        let config = RollerConfig::new("/tmp/dnd").with_placeholder_name("Someone");
        assert_eq!(config.store_path(), PathBuf::from("/tmp/dnd/cache.json"));
        assert_eq!(config.placeholder_name, "Someone");

        let config = config.with_storage_dir("data");
        assert_eq!(config.store_path(), PathBuf::from("data/cache.json"));
    }

    #[test]
    fn test_create_sets_active() {
        let record = urso();
        assert_eq!(record.active.as_deref(), Some("urso"));
        let character = &record.characters["urso"];
        assert_eq!(character.level, 3);
        assert_eq!(character.proficiency_bonus(), 2);
    }

    #[test]
    fn test_create_rejects_bad_template() {
        let mut record = UserRecord::default();
        let reply = character_command(&mut record, &["create", "urso", "3", "16"]);
        assert!(reply.starts_with("Could not create the character"), "{reply}");
        assert!(record.characters.is_empty());
    }

    #[test]
    fn test_active_and_list() {
        let mut record = urso();
        assert_eq!(
            character_command(&mut record, &["active"]),
            "Your current active character is Urso."
        );
        assert_eq!(
            character_command(&mut record, &["active", "mira"]),
            NO_SUCH_CHARACTER
        );
        assert_eq!(character_command(&mut record, &["list"]), "Your characters are: Urso.");
    }

    #[test]
    fn test_update_keeps_macros() {
        let mut record = urso();
        entry_command(Entry::Macro, &mut record, &["set", "axe", "1d12+$str_mod"]);
        let reply = character_command(&mut record, &["update", "urso", "main", "5", "18", "12", "14", "6", "10", "6"]);
        assert_eq!(reply, "Character Urso was updated.");

        let character = &record.characters["urso"];
        assert_eq!(character.level, 5);
        assert_eq!(character.macros["axe"], "1d12+$str_mod");
    }

    #[test]
    fn test_entries_on_named_and_active_character() {
        let mut record = urso();
        assert_eq!(
            entry_command(Entry::Variable, &mut record, &["set", "bless", "1d4"]),
            "Added variable bless to Urso."
        );
        assert_eq!(
            entry_command(Entry::Variable, &mut record, &["set", "urso", "rage", "2"]),
            "Added variable rage to Urso."
        );
        assert_eq!(
            entry_command(Entry::Variable, &mut record, &["list"]),
            "Urso has the following variables: bless[1d4], rage[2]."
        );
        assert_eq!(
            entry_command(Entry::Variable, &mut record, &["delete", "urso", "bless"]),
            "Removed variable bless from Urso."
        );
        assert_eq!(
            entry_command(Entry::Variable, &mut record, &["delete", "bless"]),
            "No such variable exists on Urso."
        );
    }

    #[test]
    fn test_entry_value_is_joined() {
        let mut record = urso();
        entry_command(Entry::Macro, &mut record, &["set", "axe", "1d12", "+", "$str_mod"]);
        assert_eq!(record.characters["urso"].macros["axe"], "1d12+$str_mod");
    }

    #[test]
    fn test_reserved_entry_names() {
        let mut record = urso();
        let reply = entry_command(Entry::Macro, &mut record, &["set", "stealth", "1d20"]);
        assert!(reply.contains("reserved"), "{reply}");
        assert!(record.characters["urso"].macros.is_empty());
    }

    #[test]
    fn test_entries_need_a_character() {
        let mut record = UserRecord::default();
        assert_eq!(
            entry_command(Entry::Macro, &mut record, &["set", "axe", "1d12"]),
            NO_ACTIVE_CHARACTER
        );
    }

    #[tokio::test]
    async fn test_user_locks_are_released() {
        let roller = Roller::new(RollerConfig::default(), Arc::new(MemoryRepository::new()));
        for user in ["alice", "bob", "carol"] {
            roller.handle("guild", user, "Someone", "!help").await.unwrap();
        }
        roller.handle("guild", "alice", "Alice", "just chatting").await.unwrap();
        assert!(roller.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_held_user_lock_is_kept() {
        let roller = Roller::new(RollerConfig::default(), Arc::new(MemoryRepository::new()));
        let key = UserKey::new("guild", "alice");
        let waiting = roller.user_lock(&key).await;

        roller.handle("guild", "alice", "Alice", "!help").await.unwrap();
        assert!(roller.locks.lock().await.contains_key(&key));

        roller.release_user_lock(&key, waiting).await;
        assert!(roller.locks.lock().await.is_empty());
    }

    #[test]
    fn test_delete_active_character() {
        let mut record = urso();
        assert_eq!(
            character_command(&mut record, &["delete", "urso"]),
            "Removed character Urso."
        );
        assert_eq!(record.active, None);
        assert_eq!(character_command(&mut record, &["delete", "urso"]), NO_SUCH_CHARACTER);
    }
}
