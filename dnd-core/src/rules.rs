//! Roll building: from a target and its modifiers to finished dice notation.
//!
//! The pipeline runs in a fixed order:
//! 1. base expression (resolved macro body, raw notation, or a check:
//!    `1d20` + ability modifier + proficiency + expertise)
//! 2. flat ability or skill bonus
//! 3. active variables, each resolved and appended
//! 4. advantage/disadvantage, only when the expression leads with `1d20`
//! 5. critical doubling of d4–d12 dice
//!
//! Nothing here rolls dice. The notation goes to a
//! [`DiceEvaluator`](crate::dice::DiceEvaluator).

use crate::dice::{Advantage, DiceExpression};
use crate::modifiers::RollModifiers;
use crate::references::{resolve, unresolved_references};
use crate::world::{Ability, Character, Skill};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;
use tracing::{debug, warn};

/// The die every check starts from.
pub const BASE_DIE: &str = "1d20";

lazy_static! {
    /// Damage dice doubled on a critical hit, with an optional keep suffix.
    static ref CRIT_DICE: Regex =
        Regex::new(r"\b(\d*)d(4|6|8|10|12)(k[hl]\d+)?\b").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RollError {
    #[error("unknown target {0}")]
    UnknownTarget(String),
}

/// What a roll target names.
///
/// Macros shadow everything else; a target that is not a macro, ability or
/// skill is treated as raw notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind<'a> {
    Macro { name: &'a str, body: &'a str },
    Ability(Ability),
    Skill(Skill),
    Raw(&'a str),
}

impl<'a> TargetKind<'a> {
    pub fn classify(target: &'a str, macros: &'a BTreeMap<String, String>) -> Self {
        if let Some((name, body)) = macros.get_key_value(target) {
            return TargetKind::Macro { name, body };
        }
        if let Ok(ability) = target.parse() {
            return TargetKind::Ability(ability);
        }
        if let Ok(skill) = target.parse() {
            return TargetKind::Skill(skill);
        }
        TargetKind::Raw(target)
    }

    /// Checks and saves are worded as such; macros and raw rolls are not.
    pub fn is_check(&self) -> bool {
        matches!(self, TargetKind::Ability(_) | TargetKind::Skill(_))
    }
}

fn push_term(roll: &mut String, value: i32) {
    // Writing to a String cannot fail.
    let _ = write!(roll, "{value:+}");
}

/// `1d20` + ability modifier + proficiency + expertise.
fn check_roll(character: &Character, ability: Ability, skill: Option<Skill>, save: bool) -> String {
    let mut roll = BASE_DIE.to_string();
    push_term(&mut roll, character.ability_modifier(ability));

    let save_proficient = save && character.is_save_proficient(ability);
    let skill_proficient = skill.is_some_and(|s| character.is_skill_proficient(s));
    if save_proficient || skill_proficient {
        push_term(&mut roll, character.proficiency_bonus());
    }

    // Stacks with the proficiency above.
    if skill.is_some_and(|s| character.has_expertise(s)) {
        push_term(&mut roll, character.proficiency_bonus().saturating_mul(2));
    }

    roll
}

fn leads_with_plain_d20(roll: &str) -> bool {
    roll.strip_prefix(BASE_DIE)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_alphanumeric()))
}

/// Swap a leading `1d20` for the advantage/disadvantage pool.
pub fn apply_advantage(roll: String, mode: Advantage) -> String {
    match mode.die_term() {
        Some(term) if leads_with_plain_d20(&roll) => format!("{term}{}", &roll[BASE_DIE.len()..]),
        _ => roll,
    }
}

/// Double the dice count of every d4, d6, d8, d10 and d12 term.
pub fn double_damage_dice(roll: &str) -> String {
    CRIT_DICE
        .replace_all(roll, |caps: &Captures| {
            let count = if caps[1].is_empty() {
                Some(1)
            } else {
                caps[1].parse::<u64>().ok()
            };
            match count {
                Some(count) => format!(
                    "{}d{}{}",
                    count.saturating_mul(2),
                    &caps[2],
                    caps.get(3).map_or("", |m| m.as_str())
                ),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Build the dice notation for `target` rolled by `character`.
pub fn build_roll(
    character: &Character,
    target: &str,
    modifiers: &RollModifiers,
) -> Result<String, RollError> {
    let kind = TargetKind::classify(target, &character.macros);

    let mut roll = match kind {
        TargetKind::Macro { body, .. } => resolve(character, body),
        TargetKind::Ability(ability) => check_roll(character, ability, None, modifiers.save),
        TargetKind::Skill(skill) => {
            check_roll(character, skill.ability(), Some(skill), modifiers.save)
        }
        TargetKind::Raw(text) => {
            let resolved = resolve(character, text);
            if DiceExpression::parse(&resolved).is_err() {
                return Err(RollError::UnknownTarget(target.to_string()));
            }
            resolved
        }
    };

    match kind {
        TargetKind::Ability(_) if character.ability_bonus != 0 => {
            push_term(&mut roll, character.ability_bonus)
        }
        TargetKind::Skill(_) if character.skill_bonus != 0 => {
            push_term(&mut roll, character.skill_bonus)
        }
        _ => {}
    }

    for name in &modifiers.variables {
        if let Some(body) = character.variables.get(name) {
            roll.push('+');
            roll.push_str(&resolve(character, body));
        }
    }

    let mut roll = apply_advantage(roll, modifiers.mode);
    if modifiers.critical {
        roll = double_damage_dice(&roll);
    }

    let unresolved = unresolved_references(&roll);
    if !unresolved.is_empty() {
        warn!(roll_target = target, notation = %roll, ?unresolved, "roll has unresolved references");
    }
    debug!(roll_target = target, notation = %roll, "built roll");

    Ok(roll)
}
