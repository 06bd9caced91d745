//! Character data model for the roller.
//!
//! Contains the closed ability and skill sets, the per-character record that
//! checks, saves and macros are resolved against, and the reserved words that
//! user-chosen macro and variable names must avoid.

use crate::character_builder::CharacterError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Ability {
    #[serde(rename = "str")]
    Strength,
    #[serde(rename = "dex")]
    Dexterity,
    #[serde(rename = "con")]
    Constitution,
    #[serde(rename = "int")]
    Intelligence,
    #[serde(rename = "wis")]
    Wisdom,
    #[serde(rename = "cha")]
    Charisma,
}

impl Ability {
    /// The short code used in commands and references (`str`, `dex`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            Ability::Strength => "str",
            Ability::Dexterity => "dex",
            Ability::Constitution => "con",
            Ability::Intelligence => "int",
            Ability::Wisdom => "wis",
            Ability::Charisma => "cha",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Ability {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ability::all()
            .into_iter()
            .find(|ability| ability.code() == s)
            .ok_or_else(|| CharacterError::UnknownAbility(s.to_string()))
    }
}

/// Ability scores container.
///
/// Scores are plain integers; nothing stops a homebrew 0 or 35.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(rename = "str")]
    pub strength: i32,
    #[serde(rename = "dex")]
    pub dexterity: i32,
    #[serde(rename = "con")]
    pub constitution: i32,
    #[serde(rename = "int")]
    pub intelligence: i32,
    #[serde(rename = "wis")]
    pub wisdom: i32,
    #[serde(rename = "cha")]
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        // Floor division so that low scores go negative: 8-9 = -1, 6-7 = -2
        self.get(ability).div_euclid(2) - 5
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Skills
// ============================================================================

/// D&D 5e skills.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Acrobatics,
    AnimalHandling,
    Arcana,
    Athletics,
    Deception,
    History,
    Insight,
    Intimidation,
    Investigation,
    Medicine,
    Nature,
    Perception,
    Performance,
    Persuasion,
    Religion,
    SleightOfHand,
    Stealth,
    Survival,
}

impl Skill {
    pub fn ability(&self) -> Ability {
        match self {
            Skill::Athletics => Ability::Strength,
            Skill::Acrobatics | Skill::SleightOfHand | Skill::Stealth => Ability::Dexterity,
            Skill::Arcana
            | Skill::History
            | Skill::Investigation
            | Skill::Nature
            | Skill::Religion => Ability::Intelligence,
            Skill::AnimalHandling
            | Skill::Insight
            | Skill::Medicine
            | Skill::Perception
            | Skill::Survival => Ability::Wisdom,
            Skill::Deception | Skill::Intimidation | Skill::Performance | Skill::Persuasion => {
                Ability::Charisma
            }
        }
    }

    /// The snake_case code used in commands and references.
    pub fn code(&self) -> &'static str {
        match self {
            Skill::Acrobatics => "acrobatics",
            Skill::AnimalHandling => "animal_handling",
            Skill::Arcana => "arcana",
            Skill::Athletics => "athletics",
            Skill::Deception => "deception",
            Skill::History => "history",
            Skill::Insight => "insight",
            Skill::Intimidation => "intimidation",
            Skill::Investigation => "investigation",
            Skill::Medicine => "medicine",
            Skill::Nature => "nature",
            Skill::Perception => "perception",
            Skill::Performance => "performance",
            Skill::Persuasion => "persuasion",
            Skill::Religion => "religion",
            Skill::SleightOfHand => "sleight_of_hand",
            Skill::Stealth => "stealth",
            Skill::Survival => "survival",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Acrobatics => "Acrobatics",
            Skill::AnimalHandling => "Animal Handling",
            Skill::Arcana => "Arcana",
            Skill::Athletics => "Athletics",
            Skill::Deception => "Deception",
            Skill::History => "History",
            Skill::Insight => "Insight",
            Skill::Intimidation => "Intimidation",
            Skill::Investigation => "Investigation",
            Skill::Medicine => "Medicine",
            Skill::Nature => "Nature",
            Skill::Perception => "Perception",
            Skill::Performance => "Performance",
            Skill::Persuasion => "Persuasion",
            Skill::Religion => "Religion",
            Skill::SleightOfHand => "Sleight of Hand",
            Skill::Stealth => "Stealth",
            Skill::Survival => "Survival",
        }
    }

    pub fn all() -> [Skill; 18] {
        [
            Skill::Acrobatics,
            Skill::AnimalHandling,
            Skill::Arcana,
            Skill::Athletics,
            Skill::Deception,
            Skill::History,
            Skill::Insight,
            Skill::Intimidation,
            Skill::Investigation,
            Skill::Medicine,
            Skill::Nature,
            Skill::Perception,
            Skill::Performance,
            Skill::Persuasion,
            Skill::Religion,
            Skill::SleightOfHand,
            Skill::Stealth,
            Skill::Survival,
        ]
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Skill {
    type Err = CharacterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Skill::all()
            .into_iter()
            .find(|skill| skill.code() == s)
            .ok_or_else(|| CharacterError::UnknownSkill(s.to_string()))
    }
}

// ============================================================================
// Reserved Words
// ============================================================================

/// Roll modifier keywords, see [`crate::modifiers`].
pub const MODIFIER_KEYWORDS: [&str; 12] = [
    "a",
    "ta",
    "adv",
    "tadv",
    "advantage",
    "tadvantage",
    "d",
    "dis",
    "disadvantage",
    "crit",
    "critical",
    "save",
];

/// Whether `name` collides with an ability code, a skill code or a modifier keyword.
pub fn is_reserved_name(name: &str) -> bool {
    MODIFIER_KEYWORDS.contains(&name)
        || Ability::all().iter().any(|a| a.code() == name)
        || Skill::all().iter().any(|s| s.code() == name)
}

/// Uppercase the first letter and lowercase the rest, for display names.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Character
// ============================================================================

/// Level used by the placeholder character so its proficiency bonus is zero.
pub const PLACEHOLDER_LEVEL: i32 = -7;

/// A player character as stored for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub level: i32,
    pub ability_scores: AbilityScores,
    #[serde(default)]
    pub save_proficiencies: BTreeSet<Ability>,
    #[serde(default)]
    pub skill_proficiencies: BTreeSet<Skill>,
    #[serde(default)]
    pub skill_expertise: BTreeSet<Skill>,
    /// Flat bonus added to every ability check and save.
    #[serde(default)]
    pub ability_bonus: i32,
    /// Flat bonus added to every skill check.
    #[serde(default)]
    pub skill_bonus: i32,
    #[serde(default)]
    pub macros: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl Character {
    pub fn new(level: i32, ability_scores: AbilityScores) -> Self {
        Self {
            level,
            ability_scores,
            save_proficiencies: BTreeSet::new(),
            skill_proficiencies: BTreeSet::new(),
            skill_expertise: BTreeSet::new(),
            ability_bonus: 0,
            skill_bonus: 0,
            macros: BTreeMap::new(),
            variables: BTreeMap::new(),
        }
    }

    /// The transient stand-in used when a user rolls without any character.
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_LEVEL, AbilityScores::default())
    }

    pub fn proficiency_bonus(&self) -> i32 {
        self.level.saturating_sub(1).div_euclid(4) + 2
    }

    pub fn ability_modifier(&self, ability: Ability) -> i32 {
        self.ability_scores.modifier(ability)
    }

    pub fn is_save_proficient(&self, ability: Ability) -> bool {
        self.save_proficiencies.contains(&ability)
    }

    pub fn is_skill_proficient(&self, skill: Skill) -> bool {
        self.skill_proficiencies.contains(&skill)
    }

    pub fn has_expertise(&self, skill: Skill) -> bool {
        self.skill_expertise.contains(&skill)
    }

    /// Total modifier of a skill check, excluding the flat skill bonus.
    ///
    /// Proficiency and expertise stack independently, so a skill that is
    /// both gets three times the proficiency bonus.
    pub fn skill_modifier(&self, skill: Skill) -> i32 {
        let prof = self.proficiency_bonus();
        let mut modifier = self.ability_modifier(skill.ability());
        if self.is_skill_proficient(skill) {
            modifier = modifier.saturating_add(prof);
        }
        if self.has_expertise(skill) {
            modifier = modifier.saturating_add(prof.saturating_mul(2));
        }
        modifier
    }

    /// Render the character sheet shown by `!character info`.
    pub fn sheet(&self, name: &str) -> String {
        let prof = self.proficiency_bonus();
        let mut lines = vec![
            "```".to_string(),
            format!("Name: {}", capitalize(name)),
            format!("Level: {}", self.level),
            format!("Proficiency: {prof}"),
            format!("Ability Check Bonus: {}", self.ability_bonus),
            format!("Skill Check Bonus: {}", self.skill_bonus),
            String::new(),
        ];

        for ability in Ability::all() {
            let score = self.ability_scores.get(ability);
            let check = self.ability_modifier(ability).saturating_add(self.ability_bonus);
            if self.is_save_proficient(ability) {
                lines.push(format!(
                    "{:>15}: {:>2} ({}/{}) ✓",
                    ability.name(),
                    score,
                    check,
                    check.saturating_add(prof)
                ));
            } else {
                lines.push(format!("{:>15}: {:>2} ({}/{})", ability.name(), score, check, check));
            }
        }

        lines.push(String::new());

        for skill in Skill::all() {
            let modifier = self.skill_modifier(skill).saturating_add(self.skill_bonus);
            let marker = if self.has_expertise(skill) {
                "✓✓"
            } else if self.is_skill_proficient(skill) {
                "✓"
            } else {
                ""
            };
            let line = format!(
                "{:>15}: {:>2} ({}|{}) {}",
                skill.name(),
                modifier,
                skill.ability().code(),
                modifier.saturating_add(10),
                marker
            );
            lines.push(line.trim_end().to_string());
        }

        lines.push("```".to_string());
        lines.join("\n")
    }
}
