//! Character templates for create and update commands.
//!
//! A full template looks like
//! `3 16 12 14 6 10 6 | str con | athletics nature stealth | perception`:
//! level and the six scores, then save proficiencies, skill proficiencies and
//! skill expertise separated by `|`. Every template is parsed completely
//! before anything is written, so a malformed update never leaves a
//! character half-modified.

use crate::world::{is_reserved_name, Ability, AbilityScores, Character, Skill};
use std::collections::BTreeSet;
use thiserror::Error;

/// Structural problems in a character create/update command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CharacterError {
    #[error("unknown stat {0}")]
    UnknownAbility(String),

    #[error("unknown skill {0}")]
    UnknownSkill(String),

    #[error("expected {expected} values for {section}, got {got}")]
    WrongFieldCount {
        section: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{0} is not a number")]
    InvalidNumber(String),

    #[error("{0} is out of range, values must be within -{MAX_VALUE} to {MAX_VALUE}")]
    OutOfRange(i32),

    #[error("missing '|' after the {0}")]
    MissingSeparator(&'static str),

    #[error("unknown section {0}, expected main, saves, skills, expertise or bonus")]
    UnknownSection(String),

    #[error("{0} is a reserved word and cannot be used as a name")]
    ReservedName(String),
}

/// Reject macro and variable names that would shadow a stat, skill or modifier.
pub fn validate_name(name: &str) -> Result<(), CharacterError> {
    if is_reserved_name(name) {
        Err(CharacterError::ReservedName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Bound on levels, scores and flat bonuses.
pub const MAX_VALUE: i32 = 1000;

fn parse_number(token: &str) -> Result<i32, CharacterError> {
    let value: i32 = token
        .parse()
        .map_err(|_| CharacterError::InvalidNumber(token.to_string()))?;
    if !(-MAX_VALUE..=MAX_VALUE).contains(&value) {
        return Err(CharacterError::OutOfRange(value));
    }
    Ok(value)
}

fn expect_count(section: &'static str, fields: &[&str], expected: usize) -> Result<(), CharacterError> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(CharacterError::WrongFieldCount {
            section,
            expected,
            got: fields.len(),
        })
    }
}

/// Level and ability scores, the `main` section of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainStats {
    pub level: i32,
    pub ability_scores: AbilityScores,
}

impl MainStats {
    /// Parse `<level> <str> <dex> <con> <int> <wis> <cha>`.
    pub fn parse(fields: &[&str]) -> Result<Self, CharacterError> {
        expect_count("main stats", fields, 7)?;
        let values = fields
            .iter()
            .map(|f| parse_number(f))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            level: values[0],
            ability_scores: AbilityScores::new(
                values[1], values[2], values[3], values[4], values[5], values[6],
            ),
        })
    }
}

pub fn parse_abilities(fields: &[&str]) -> Result<BTreeSet<Ability>, CharacterError> {
    fields.iter().map(|f| f.parse()).collect()
}

pub fn parse_skills(fields: &[&str]) -> Result<BTreeSet<Skill>, CharacterError> {
    fields.iter().map(|f| f.parse()).collect()
}

/// A single validated `!character update` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterUpdate {
    Main(MainStats),
    Saves(BTreeSet<Ability>),
    Skills(BTreeSet<Skill>),
    Expertise(BTreeSet<Skill>),
    Bonus { ability: i32, skill: i32 },
}

impl CharacterUpdate {
    pub fn parse(section: &str, fields: &[&str]) -> Result<Self, CharacterError> {
        match section {
            "main" => Ok(CharacterUpdate::Main(MainStats::parse(fields)?)),
            "saves" => Ok(CharacterUpdate::Saves(parse_abilities(fields)?)),
            "skills" => Ok(CharacterUpdate::Skills(parse_skills(fields)?)),
            "expertise" => Ok(CharacterUpdate::Expertise(parse_skills(fields)?)),
            "bonus" => {
                expect_count("bonus", fields, 2)?;
                Ok(CharacterUpdate::Bonus {
                    ability: parse_number(fields[0])?,
                    skill: parse_number(fields[1])?,
                })
            }
            other => Err(CharacterError::UnknownSection(other.to_string())),
        }
    }

    /// Replace the section on `character`; macros and variables are kept.
    pub fn apply(self, character: &mut Character) {
        match self {
            CharacterUpdate::Main(main) => {
                character.level = main.level;
                character.ability_scores = main.ability_scores;
            }
            CharacterUpdate::Saves(saves) => character.save_proficiencies = saves,
            CharacterUpdate::Skills(skills) => character.skill_proficiencies = skills,
            CharacterUpdate::Expertise(skills) => character.skill_expertise = skills,
            CharacterUpdate::Bonus { ability, skill } => {
                character.ability_bonus = ability;
                character.skill_bonus = skill;
            }
        }
    }
}

/// Builder for characters created from a full template.
#[derive(Debug, Clone, Default)]
pub struct CharacterBuilder {
    main: Option<MainStats>,
    saves: BTreeSet<Ability>,
    skills: BTreeSet<Skill>,
    expertise: BTreeSet<Skill>,
}

impl CharacterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a full template, split on standalone `|` tokens.
    pub fn from_template(fields: &[&str]) -> Result<Self, CharacterError> {
        let mut sections: Vec<&[&str]> = Vec::with_capacity(4);
        let mut rest = fields;
        for name in ["main stats", "saves", "skills"] {
            let split = rest
                .iter()
                .position(|f| *f == "|")
                .ok_or(CharacterError::MissingSeparator(name))?;
            sections.push(&rest[..split]);
            rest = &rest[split + 1..];
        }
        // Any further `|` lands here and is reported as an unknown skill.
        sections.push(rest);

        Ok(Self::new()
            .main(MainStats::parse(sections[0])?)
            .saves(parse_abilities(sections[1])?)
            .skills(parse_skills(sections[2])?)
            .expertise(parse_skills(sections[3])?))
    }

    pub fn main(mut self, main: MainStats) -> Self {
        self.main = Some(main);
        self
    }

    pub fn saves(mut self, saves: BTreeSet<Ability>) -> Self {
        self.saves = saves;
        self
    }

    pub fn skills(mut self, skills: BTreeSet<Skill>) -> Self {
        self.skills = skills;
        self
    }

    pub fn expertise(mut self, expertise: BTreeSet<Skill>) -> Self {
        self.expertise = expertise;
        self
    }

    /// Build the character. Without main stats this is the placeholder's level and scores.
    pub fn build(self) -> Character {
        let mut character = match self.main {
            Some(main) => Character::new(main.level, main.ability_scores),
            None => Character::placeholder(),
        };
        character.save_proficiencies = self.saves;
        character.skill_proficiencies = self.skills;
        character.skill_expertise = self.expertise;
        character
    }
}
