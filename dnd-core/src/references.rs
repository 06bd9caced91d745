//! `$reference` substitution for macro bodies, variable bodies and raw rolls.
//!
//! References are replaced in a single left-to-right pass over the input.
//! At each `$` the [`reference_table`] is consulted in order and the first
//! token that matches at that position wins; substituted text is never
//! scanned again, so a variable whose body mentions another variable is
//! inserted verbatim. A token only matches when the character after it
//! cannot continue an identifier, which keeps `$int` from eating the front
//! of `$intimidation` and `$str` from eating `$str_mod`.
//!
//! Unknown references are left in place untouched.

use crate::world::{Ability, Character, Skill};

/// What a `$token` stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Level,
    Proficiency,
    AbilityModifier(Ability),
    AbilityScore(Ability),
    Skill(Skill),
    Variable(String),
}

impl Reference {
    pub fn token(&self) -> String {
        match self {
            Reference::Level => "$level".to_string(),
            Reference::Proficiency => "$prof".to_string(),
            Reference::AbilityModifier(ability) => format!("${}_mod", ability.code()),
            Reference::AbilityScore(ability) => format!("${}", ability.code()),
            Reference::Skill(skill) => format!("${}", skill.code()),
            Reference::Variable(name) => format!("${name}"),
        }
    }

    /// The replacement text, or `None` for a variable the character lacks.
    pub fn value(&self, character: &Character) -> Option<String> {
        match self {
            Reference::Level => Some(character.level.to_string()),
            Reference::Proficiency => Some(character.proficiency_bonus().to_string()),
            Reference::AbilityModifier(ability) => {
                Some(character.ability_modifier(*ability).to_string())
            }
            Reference::AbilityScore(ability) => {
                Some(character.ability_scores.get(*ability).to_string())
            }
            Reference::Skill(skill) => Some(character.skill_modifier(*skill).to_string()),
            Reference::Variable(name) => character.variables.get(name).cloned(),
        }
    }
}

/// All references known for `character`, in precedence order.
///
/// Level, proficiency, then per ability the modifier before the raw score,
/// then the eighteen skills, then the character's variables.
pub fn reference_table(character: &Character) -> Vec<Reference> {
    let mut table = vec![Reference::Level, Reference::Proficiency];
    for ability in Ability::all() {
        table.push(Reference::AbilityModifier(ability));
        table.push(Reference::AbilityScore(ability));
    }
    table.extend(Skill::all().into_iter().map(Reference::Skill));
    table.extend(character.variables.keys().cloned().map(Reference::Variable));
    table
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn matches_at(candidate: &str, token: &str) -> bool {
    candidate.starts_with(token)
        && !candidate[token.len()..]
            .chars()
            .next()
            .is_some_and(is_identifier_char)
}

/// Substitute every known reference in `expression`.
pub fn resolve(character: &Character, expression: &str) -> String {
    if !expression.contains('$') {
        return expression.to_string();
    }

    let table: Vec<(String, String)> = reference_table(character)
        .into_iter()
        .filter_map(|reference| Some((reference.token(), reference.value(character)?)))
        .collect();

    let mut resolved = String::with_capacity(expression.len());
    let mut rest = expression;
    while let Some(pos) = rest.find('$') {
        resolved.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match table.iter().find(|(token, _)| matches_at(candidate, token)) {
            Some((token, value)) => {
                resolved.push_str(value);
                rest = &candidate[token.len()..];
            }
            None => {
                resolved.push('$');
                rest = &candidate[1..];
            }
        }
    }
    resolved.push_str(rest);
    resolved
}

/// Names of `$references` still present in a resolved expression.
pub fn unresolved_references(expression: &str) -> Vec<&str> {
    expression
        .match_indices('$')
        .filter_map(|(pos, _)| {
            let name = &expression[pos + 1..];
            let end = name
                .find(|c: char| !is_identifier_char(c))
                .unwrap_or(name.len());
            (end > 0).then(|| &name[..end])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::AbilityScores;

    fn fighter() -> Character {
        let mut character = Character::new(5, AbilityScores::new(18, 14, 12, 8, 10, 16));
        character.skill_proficiencies.insert(Skill::Athletics);
        character.skill_proficiencies.insert(Skill::Stealth);
        character.skill_expertise.insert(Skill::Stealth);
        character.skill_expertise.insert(Skill::Intimidation);
        character
    }

    #[test]
    fn test_modifier_before_score() {
        let mut character = fighter();
        character.variables.insert("kol".to_string(), "$str_mod".to_string());
        assert_eq!(resolve(&character, "$str_mod+$str"), "4+18");
        assert_eq!(resolve(&character, "$str+$str_mod"), "18+4");
    }

    #[test]
    fn test_level_and_proficiency() {
        assert_eq!(resolve(&fighter(), "1d20+$level+$prof"), "1d20+5+3");
    }

    #[test]
    fn test_negative_modifier() {
        assert_eq!(resolve(&fighter(), "1d20+$int_mod"), "1d20+-1");
    }

    #[test]
    fn test_skill_references() {
        let character = fighter();
        // str 18 (+4) + proficiency 3
        assert_eq!(resolve(&character, "$athletics"), "7");
        // dex 14 (+2) + proficiency 3 + expertise 6
        assert_eq!(resolve(&character, "$stealth"), "11");
        // unproficient skills still resolve to the ability modifier
        assert_eq!(resolve(&character, "$arcana"), "-1");
    }

    #[test]
    fn test_skill_reference_counts_expertise_on_top_of_proficiency() {
        let character = fighter();
        let expected = character.ability_modifier(Ability::Dexterity) + 3 * character.proficiency_bonus();
        assert_eq!(resolve(&character, "$stealth"), expected.to_string());
    }

    #[test]
    fn test_extreme_skill_reference() {
        let mut character = Character::new(i32::MAX, AbilityScores::new(10, i32::MAX, 10, 10, 10, 10));
        character.skill_proficiencies.insert(Skill::Stealth);
        character.skill_expertise.insert(Skill::Stealth);
        assert_eq!(resolve(&character, "1d20+$stealth"), "1d20+2147483647");
    }

    #[test]
    fn test_ability_code_does_not_eat_skill() {
        // cha 16 (+3) + expertise 6
        assert_eq!(resolve(&fighter(), "$intimidation"), "9");
        assert_eq!(resolve(&fighter(), "$int"), "8");
    }

    #[test]
    fn test_variables_are_not_expanded_twice() {
        let mut character = fighter();
        character.variables.insert("kol".to_string(), "$str_mod".to_string());
        character.variables.insert("smite".to_string(), "2d8+$kol".to_string());

        assert_eq!(resolve(&character, "$kol"), "$str_mod");
        assert_eq!(resolve(&character, "1d8+$smite"), "1d8+2d8+$kol");
    }

    #[test]
    fn test_variable_prefixes() {
        let mut character = fighter();
        character.variables.insert("bless".to_string(), "1d4".to_string());
        character.variables.insert("blessing".to_string(), "2".to_string());
        assert_eq!(resolve(&character, "$blessing+$bless"), "2+1d4");
    }

    #[test]
    fn test_unknown_references_stay_literal() {
        let resolved = resolve(&fighter(), "1d20+$bless+$str");
        assert_eq!(resolved, "1d20+$bless+18");
        assert_eq!(unresolved_references(&resolved), vec!["bless"]);
        assert_eq!(resolve(&fighter(), "5$"), "5$");
        assert!(unresolved_references("5$").is_empty());
    }

    #[test]
    fn test_table_order() {
        let mut character = fighter();
        character.variables.insert("rage".to_string(), "2".to_string());
        let tokens: Vec<String> = reference_table(&character)
            .iter()
            .map(Reference::token)
            .collect();

        assert_eq!(tokens[..4], ["$level", "$prof", "$str_mod", "$str"]);
        assert_eq!(tokens[13], "$cha");
        assert_eq!(tokens[14], "$acrobatics");
        assert_eq!(tokens.last().map(String::as_str), Some("$rage"));
        assert_eq!(tokens.len(), 2 + 12 + 18 + 1);
    }

    #[test]
    fn test_placeholder_character() {
        let you = Character::placeholder();
        assert_eq!(resolve(&you, "1d20+$prof+$wis_mod"), "1d20+0+0");
    }
}
