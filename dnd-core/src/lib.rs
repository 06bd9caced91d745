//! D&D 5e roll resolution for chat dice bots.
//!
//! This crate provides:
//! - Characters with ability scores, proficiencies, macros and variables
//! - `$reference` substitution and modifier parsing (`adv`, `save`, `crit`, ...)
//! - Roll building and the human-readable summary for every roll
//! - A dice engine with keep-highest/keep-lowest notation
//! - Per-guild, per-user persistence and the `!command` dispatcher
//!
//! # Quick Start
//!
//! ```ignore
//! use dnd_core::{Roller, RollerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let roller = Roller::open(RollerConfig::from_env()).await?;
//!
//!     roller
//!         .handle("guild", "user", "Ana", "!c create urso 3 16 12 14 6 10 6 | str con | athletics |")
//!         .await?;
//!     if let Some(reply) = roller.handle("guild", "user", "Ana", "!r athletics adv").await? {
//!         println!("{reply}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod character_builder;
pub mod dice;
pub mod modifiers;
pub mod persist;
pub mod references;
pub mod rules;
pub mod session;
pub mod summary;
pub mod testing;
pub mod world;

// Primary public API
pub use character_builder::{CharacterBuilder, CharacterError, CharacterUpdate};
pub use dice::{Advantage, DiceError, DiceEvaluator, DiceExpression, RollOutcome, StandardDice};
pub use modifiers::RollModifiers;
pub use persist::{CharacterRepository, JsonFileRepository, MemoryRepository, PersistError, UserKey};
pub use rules::{build_roll, RollError};
pub use session::{Roller, RollerConfig, SessionError};
pub use summary::describe;
pub use testing::{EchoDice, TestHarness};
pub use world::{Ability, AbilityScores, Character, Skill};
