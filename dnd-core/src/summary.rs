//! The one-line description that precedes every roll result.
//!
//! Built from the same [`TargetKind`] classification as the roll itself, so
//! a roll and its summary always agree on what was rolled.

use crate::modifiers::RollModifiers;
use crate::rules::TargetKind;
use crate::world::capitalize;
use std::collections::BTreeMap;

/// Describe a roll, e.g. `Urso rolled for a(n) stealth check with advantage plus bless`.
pub fn describe(
    character_name: &str,
    target: &str,
    modifiers: &RollModifiers,
    macros: &BTreeMap<String, String>,
) -> String {
    let kind = TargetKind::classify(target, macros);
    let mut summary = format!("{} rolled", capitalize(character_name));

    match kind {
        TargetKind::Macro { name, .. } => {
            summary.push_str(" using the macro ");
            summary.push_str(name);
        }
        TargetKind::Ability(ability) => {
            summary.push_str(" for a(n) ");
            summary.push_str(&ability.name().to_lowercase());
        }
        TargetKind::Skill(skill) => {
            summary.push_str(" for a(n) ");
            summary.push_str(&skill.name().to_lowercase());
        }
        TargetKind::Raw(text) => {
            summary.push(' ');
            summary.push_str(text);
        }
    }

    if kind.is_check() {
        summary.push_str(if modifiers.save { " save" } else { " check" });
    }

    let mut extras: Vec<&str> = modifiers.mode.phrase().into_iter().collect();
    extras.extend(modifiers.variables.iter().map(String::as_str));
    if !extras.is_empty() {
        summary.push_str(" with ");
        summary.push_str(&extras.join(" plus "));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::Advantage;
    use crate::rules::build_roll;
    use crate::world::Character;

    fn macros() -> BTreeMap<String, String> {
        BTreeMap::from([("greataxe".to_string(), "1d12+$str_mod".to_string())])
    }

    #[test]
    fn test_ability_and_skill() {
        let plain = RollModifiers::new();
        assert_eq!(
            describe("urso", "str", &plain, &macros()),
            "Urso rolled for a(n) strength check"
        );
        assert_eq!(
            describe("urso", "sleight_of_hand", &plain, &macros()),
            "Urso rolled for a(n) sleight of hand check"
        );
        assert_eq!(
            describe("urso", "con", &RollModifiers::new().with_save(), &macros()),
            "Urso rolled for a(n) constitution save"
        );
    }

    #[test]
    fn test_macro_and_raw_are_not_checks() {
        let save = RollModifiers::new().with_save();
        assert_eq!(
            describe("urso", "greataxe", &save, &macros()),
            "Urso rolled using the macro greataxe"
        );
        assert_eq!(describe("You", "2d6+3", &save, &macros()), "You rolled 2d6+3");
    }

    #[test]
    fn test_modifier_phrases() {
        let modifiers = RollModifiers::new()
            .with_mode(Advantage::TripleAdvantage)
            .with_variable("bless")
            .with_variable("rage");
        assert_eq!(
            describe("urso", "athletics", &modifiers, &macros()),
            "Urso rolled for a(n) athletics check with triple advantage plus bless plus rage"
        );

        let modifiers = RollModifiers::new().with_variable("bless");
        assert_eq!(
            describe("urso", "greataxe", &modifiers, &macros()),
            "Urso rolled using the macro greataxe with bless"
        );

        let modifiers = RollModifiers::new().with_mode(Advantage::Disadvantage).with_critical();
        assert_eq!(
            describe("urso", "1d20", &modifiers, &macros()),
            "Urso rolled 1d20 with disadvantage"
        );
    }

    #[test]
    fn test_save_wording_matches_the_built_roll() {
        let mut character = Character::placeholder();
        character.macros = macros();
        character.save_proficiencies.insert(crate::world::Ability::Wisdom);

        for target in ["wis", "perception", "greataxe", "1d8"] {
            for modifiers in [RollModifiers::new(), RollModifiers::new().with_save()] {
                let kind = TargetKind::classify(target, &character.macros);
                assert!(build_roll(&character, target, &modifiers).is_ok());

                let summary = describe("you", target, &modifiers, &character.macros);
                let worded = summary.ends_with(" save") || summary.ends_with(" check");
                assert_eq!(worded, kind.is_check(), "{summary}");
                assert_eq!(summary.ends_with(" save"), kind.is_check() && modifiers.save);
            }
        }
    }
}
