//! D&D dice notation.
//!
//! Supports the notation the roll builder emits: XdY terms with optional
//! keep highest/lowest (`2d20kh1`, `4d6kl3`), flat integers, and any mix
//! joined by `+`/`-`. The engine only ever produces notation; evaluation
//! goes through the [`DiceEvaluator`] seam so another evaluator can be
//! swapped in.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on dice in a single term, to keep a typo from allocating forever.
pub const MAX_DICE: u32 = 1000;

/// Largest die accepted; keeps a full term's total well inside `u32`.
pub const MAX_SIDES: u32 = 1_000_000;

/// Error type for dice parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Too many dice: {0} (at most {MAX_DICE} per term)")]
    TooManyDice(u32),
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// Roll mode for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    /// Three d20s, keep the highest (Elven Accuracy and friends).
    TripleAdvantage,
    Disadvantage,
}

impl Advantage {
    /// The term that replaces a leading `1d20`, if any.
    pub fn die_term(&self) -> Option<&'static str> {
        match self {
            Advantage::Normal => None,
            Advantage::Advantage => Some("2d20kh1"),
            Advantage::TripleAdvantage => Some("3d20kh1"),
            Advantage::Disadvantage => Some("2d20kl1"),
        }
    }

    /// How the roll summary words this mode.
    pub fn phrase(&self) -> Option<&'static str> {
        match self {
            Advantage::Normal => None,
            Advantage::Advantage => Some("advantage"),
            Advantage::TripleAdvantage => Some("triple advantage"),
            Advantage::Disadvantage => Some("disadvantage"),
        }
    }
}

/// Standard D&D die types, plus anything else a macro asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
    Other(u32),
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
            DieType::Other(sides) => *sides,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            0 | 1 => None,
            sides if sides > MAX_SIDES => None,
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            other => Some(DieType::Other(other)),
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
    /// Subtracted rather than added (`1d20-1d4`).
    pub negative: bool,
}

/// A complete dice expression (e.g., 2d20kh1+3+1d4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    ///
    /// Runs of signs fold together, so the `1d20+-1` a negative modifier
    /// produces reads as `1d20-1`.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;
        let mut dangling_operator = false;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                        sign = 1;
                    }
                    if ch == '-' {
                        sign = -sign;
                    }
                    dangling_operator = true;
                }
                c if c.is_whitespace() => continue,
                _ => {
                    current.push(ch);
                    dangling_operator = false;
                }
            }
        }

        if dangling_operator {
            return Err(DiceError::InvalidNotation(notation));
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            let count_str = &s[..d_pos];
            let rest = &s[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };

            if count == 0 {
                return Err(DiceError::InvalidNotation(s.to_string()));
            }
            if count > MAX_DICE {
                return Err(DiceError::TooManyDice(count));
            }

            let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
                let sides = &rest[..kh_pos];
                let keep: u32 = rest[kh_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (sides, Some(keep), None)
            } else if let Some(kl_pos) = rest.find("kl") {
                let sides = &rest[..kl_pos];
                let keep: u32 = rest[kl_pos + 2..]
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
                (sides, None, Some(keep))
            } else {
                (rest, None, None)
            };

            let sides: u32 = sides_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;

            let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

            // Validate keep count doesn't exceed dice count
            if let Some(keep) = keep_highest.or(keep_lowest) {
                if keep > count {
                    return Err(DiceError::InvalidKeepCount {
                        keep,
                        count,
                        notation: s.to_string(),
                    });
                }
            }

            components.push(DiceComponent {
                count,
                die_type,
                keep_highest,
                keep_lowest,
                negative: sign < 0,
            });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier = modifier.saturating_add(sign * value);
        }

        Ok(())
    }

    /// Roll the dice expression and return the result.
    pub fn roll(&self) -> RollResult {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> RollResult {
        let mut component_results = Vec::new();

        for component in &self.components {
            let rolls: Vec<u32> = (0..component.count)
                .map(|_| rng.gen_range(1..=component.die_type.sides()))
                .collect();

            let mut sorted = rolls.clone();
            let kept = if let Some(keep) = component.keep_highest {
                sorted.sort_by(|a, b| b.cmp(a));
                sorted.truncate(keep as usize);
                sorted
            } else if let Some(keep) = component.keep_lowest {
                sorted.sort();
                sorted.truncate(keep as usize);
                sorted
            } else {
                rolls.clone()
            };

            let subtotal = kept.iter().fold(0u32, |acc, &roll| acc.saturating_add(roll));
            component_results.push(ComponentResult {
                die_type: component.die_type,
                rolls,
                kept,
                subtotal,
                negative: component.negative,
            });
        }

        let dice_total = component_results.iter().fold(0i64, |acc, c| {
            let subtotal = i64::from(c.subtotal);
            acc.saturating_add(if c.negative { -subtotal } else { subtotal })
        });
        let total = dice_total
            .saturating_add(i64::from(self.modifier))
            .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;

        RollResult {
            expression: self.clone(),
            component_results,
            modifier: self.modifier,
            total,
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResult {
    pub die_type: DieType,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u32,
    pub negative: bool,
}

impl ComponentResult {
    /// `[15, (3)]` style listing, dropped dice in parentheses.
    fn display(&self) -> String {
        if self.rolls.len() > self.kept.len() {
            let mut kept_used = vec![false; self.kept.len()];
            let shown: Vec<String> = self
                .rolls
                .iter()
                .map(|&roll| {
                    let is_kept = self.kept.iter().enumerate().any(|(i, &k)| {
                        if k == roll && !kept_used[i] {
                            kept_used[i] = true;
                            true
                        } else {
                            false
                        }
                    });
                    if is_kept {
                        format!("{roll}")
                    } else {
                        format!("({roll})")
                    }
                })
                .collect();
            format!("[{}]", shown.join(", "))
        } else {
            format!(
                "[{}]",
                self.rolls
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    }
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: DiceExpression,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
}

impl RollResult {
    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let mut out = String::new();
        for (i, c) in self.component_results.iter().enumerate() {
            match (i, c.negative) {
                (0, false) => {}
                (0, true) => out.push('-'),
                (_, false) => out.push_str(" + "),
                (_, true) => out.push_str(" - "),
            }
            out.push_str(&c.display());
        }

        match (out.is_empty(), self.modifier) {
            (_, 0) => out,
            (true, m) => m.to_string(),
            (false, m) if m > 0 => format!("{out} + {m}"),
            (false, m) => format!("{out} - {}", m.abs()),
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.component_results.is_empty() {
            write!(f, "`{}`", self.total)
        } else {
            write!(f, "{} = `{}`", self.dice_display(), self.total)
        }
    }
}

/// Convenience function to roll dice from a notation string.
pub fn roll(notation: &str) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll())
}

/// What an evaluator hands back: the number and its rendered breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub total: i32,
    pub rendered: String,
}

/// Turns finished notation into a rolled outcome.
pub trait DiceEvaluator: Send + Sync {
    fn evaluate(&self, notation: &str) -> Result<RollOutcome, DiceError>;
}

/// The default evaluator, backed by the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDice;

impl DiceEvaluator for StandardDice {
    fn evaluate(&self, notation: &str) -> Result<RollOutcome, DiceError> {
        let result = roll(notation)?;
        Ok(RollOutcome {
            total: result.total,
            rendered: format!("{}: {}", result.expression, result),
        })
    }
}
