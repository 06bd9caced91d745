//! Testing utilities for the roller.
//!
//! - `EchoDice` for deterministic rolls that show the built notation
//! - `TestHarness` for scripted conversations with a single user

use crate::dice::{DiceError, DiceEvaluator, DiceExpression, RollOutcome};
use crate::persist::{CharacterRepository, MemoryRepository, UserKey, UserRecord};
use crate::session::{Roller, RollerConfig, SessionError};
use std::sync::Arc;

/// A dice evaluator that never rolls.
///
/// The notation is still validated, and the rendered result is the notation
/// itself, so tests can assert on exactly what would have been rolled.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoDice;

impl DiceEvaluator for EchoDice {
    fn evaluate(&self, notation: &str) -> Result<RollOutcome, DiceError> {
        let expression = DiceExpression::parse(notation)?;
        Ok(RollOutcome {
            total: expression.modifier,
            rendered: notation.to_string(),
        })
    }
}

/// Test harness for scripted roller conversations.
pub struct TestHarness {
    pub roller: Roller,
    pub key: UserKey,
    pub display_name: String,
}

impl TestHarness {
    /// A roller over an in-memory store, with echoing dice.
    pub fn new() -> Self {
        Self::with_repository(Arc::new(MemoryRepository::new()))
    }

    pub fn with_repository(repository: Arc<dyn CharacterRepository>) -> Self {
        let roller = Roller::new(RollerConfig::default(), repository).with_dice(Arc::new(EchoDice));
        Self {
            roller,
            key: UserKey::new("guild", "user"),
            display_name: "Tester".to_string(),
        }
    }

    /// Talk as a different user of the same roller.
    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.key.user = user.into();
        self
    }

    /// Send a message and return the reply, empty when there is none.
    pub async fn send(&self, text: &str) -> Result<String, SessionError> {
        let reply = self
            .roller
            .handle(&self.key.guild, &self.key.user, &self.display_name, text)
            .await?;
        Ok(reply.unwrap_or_default())
    }

    /// Create a character from a template string.
    pub async fn create(&self, name: &str, template: &str) -> Result<String, SessionError> {
        self.send(&format!("!c create {name} {template}")).await
    }

    /// What is currently stored for this user.
    pub async fn record(&self) -> Result<UserRecord, SessionError> {
        Ok(self.roller.repository().load_user(&self.key).await?)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
