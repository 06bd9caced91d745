//! Roll modifiers: the words after the roll target.
//!
//! `!r stealth adv bless` rolls stealth with advantage and adds the `bless`
//! variable. Each token is classified on its own; unknown tokens are
//! ignored and the last roll mode given wins.

use crate::dice::Advantage;
use std::collections::BTreeMap;

/// A single classified modifier token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifierToken {
    Mode(Advantage),
    Save,
    Critical,
    Variable(String),
    Ignored,
}

impl ModifierToken {
    /// Classify `token` against the keyword set and the character's variables.
    pub fn classify(token: &str, variables: &BTreeMap<String, String>) -> Self {
        match token {
            "save" => ModifierToken::Save,
            "crit" | "critical" => ModifierToken::Critical,
            "a" | "adv" | "advantage" => ModifierToken::Mode(Advantage::Advantage),
            "ta" | "tadv" | "tadvantage" => ModifierToken::Mode(Advantage::TripleAdvantage),
            "d" | "dis" | "disadvantage" => ModifierToken::Mode(Advantage::Disadvantage),
            name if variables.contains_key(name) => ModifierToken::Variable(name.to_string()),
            _ => ModifierToken::Ignored,
        }
    }
}

/// Everything that changes how a roll is built and described.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollModifiers {
    pub mode: Advantage,
    pub save: bool,
    pub critical: bool,
    /// Variables to add, in command order. Repeats add the variable again.
    pub variables: Vec<String>,
}

impl RollModifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse<S: AsRef<str>>(tokens: &[S], variables: &BTreeMap<String, String>) -> Self {
        let mut modifiers = Self::new();
        for token in tokens {
            match ModifierToken::classify(token.as_ref(), variables) {
                ModifierToken::Mode(mode) => modifiers.mode = mode,
                ModifierToken::Save => modifiers.save = true,
                ModifierToken::Critical => modifiers.critical = true,
                ModifierToken::Variable(name) => modifiers.variables.push(name),
                ModifierToken::Ignored => {}
            }
        }
        modifiers
    }

    pub fn with_mode(mut self, mode: Advantage) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_save(mut self) -> Self {
        self.save = true;
        self
    }

    pub fn with_critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(name.into());
        self
    }
}
