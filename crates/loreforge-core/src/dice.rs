//! Deterministic seeded dice.
//!
//! Every tool call that rolls dice creates its own [`SeededDice`] stream
//! from a seed string (e.g. `"stunt-<encounter>-<actor>-<timestamp>"`).
//! The stream is never process-global, so concurrent resolutions stay
//! independent, and a given `(seed, counter)` pair yields the same value
//! on every run.
//!
//! The seed string is reduced to a `u64` through SHA-256 rather than the
//! standard library hasher, whose output is not guaranteed stable across
//! releases.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use sha2::{Digest, Sha256};

use loreforge_types::AdvantageMode;

/// Errors produced while parsing a dice-notation expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiceParseError {
    /// The expression was empty or whitespace.
    #[error("empty dice expression")]
    Empty,
    /// The expression did not match `NdM`, `NdM+K`, `NdM-K`, or a bare
    /// integer.
    #[error("malformed dice expression: {0:?}")]
    Malformed(String),
    /// The die has zero sides or the expression rolls zero dice.
    #[error("degenerate dice expression: {0:?}")]
    Degenerate(String),
}

// ---------------------------------------------------------------------------
// DiceExpr
// ---------------------------------------------------------------------------

/// A parsed dice-notation expression: `count` dice of `sides` sides plus a
/// flat `modifier`. A bare integer parses as zero dice with that modifier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiceExpr {
    /// Number of dice rolled.
    pub count: u32,
    /// Sides per die.
    pub sides: u32,
    /// Flat modifier added to the sum.
    pub modifier: i64,
}

impl DiceExpr {
    /// A single die with no modifier.
    pub const fn single(sides: u32) -> Self {
        Self {
            count: 1,
            sides,
            modifier: 0,
        }
    }

    /// A flat amount with no dice.
    pub const fn flat(amount: i64) -> Self {
        Self {
            count: 0,
            sides: 0,
            modifier: amount,
        }
    }

    /// The minimum value this expression can roll.
    pub const fn minimum(&self) -> i64 {
        self.modifier.saturating_add(self.count as i64)
    }
}

impl core::fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.count == 0 {
            return write!(f, "{}", self.modifier);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        if self.modifier > 0 {
            write!(f, "+{}", self.modifier)?;
        } else if self.modifier < 0 {
            write!(f, "{}", self.modifier)?;
        }
        Ok(())
    }
}

impl core::str::FromStr for DiceExpr {
    type Err = DiceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DiceParseError::Empty);
        }

        // Bare integer: a flat amount, e.g. damage "6".
        if let Ok(flat) = trimmed.parse::<i64>() {
            return Ok(Self::flat(flat));
        }

        let lower = trimmed.to_ascii_lowercase();
        let (count_str, rest) = lower
            .split_once('d')
            .ok_or_else(|| DiceParseError::Malformed(s.to_owned()))?;

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceParseError::Malformed(s.to_owned()))?
        };

        // The remainder is the sides, optionally followed by +K or -K.
        let (sides_str, modifier) = if let Some((sides, m)) = rest.split_once('+') {
            let parsed: i64 = m
                .parse()
                .map_err(|_| DiceParseError::Malformed(s.to_owned()))?;
            (sides, parsed)
        } else if let Some((sides, m)) = rest.split_once('-') {
            let parsed: i64 = m
                .parse()
                .map_err(|_| DiceParseError::Malformed(s.to_owned()))?;
            (sides, parsed.saturating_neg())
        } else {
            (rest, 0)
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| DiceParseError::Malformed(s.to_owned()))?;

        if count == 0 || sides == 0 {
            return Err(DiceParseError::Degenerate(s.to_owned()));
        }

        Ok(Self {
            count,
            sides,
            modifier,
        })
    }
}

// ---------------------------------------------------------------------------
// Roll results
// ---------------------------------------------------------------------------

/// The full breakdown of one expression roll, suitable for the
/// `calculations` audit table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RollBreakdown {
    /// The expression as rolled, in canonical notation.
    pub expression: String,
    /// Each individual die result, in roll order.
    pub rolls: Vec<i64>,
    /// The flat modifier applied after the dice.
    pub modifier: i64,
    /// Sum of rolls plus modifier.
    pub total: i64,
}

/// A d20 roll taken under an advantage mode.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct D20Roll {
    /// Every die rolled (one die normally, two under advantage or
    /// disadvantage).
    pub rolls: Vec<i64>,
    /// The die kept.
    pub result: i64,
    /// The mode the roll was taken under.
    pub mode: AdvantageMode,
}

impl D20Roll {
    /// Whether the kept die is a natural 20.
    pub fn is_natural_twenty(&self) -> bool {
        self.result == 20
    }

    /// Whether the kept die is a natural 1.
    pub fn is_natural_one(&self) -> bool {
        self.result == 1
    }
}

// ---------------------------------------------------------------------------
// SeededDice
// ---------------------------------------------------------------------------

/// A deterministic dice stream scoped to one tool call.
#[derive(Debug, Clone)]
pub struct SeededDice {
    seed: String,
    counter: u64,
    rng: SmallRng,
}

impl SeededDice {
    /// Create a new stream from a seed string.
    pub fn new(seed: &str) -> Self {
        Self {
            seed: seed.to_owned(),
            counter: 0,
            rng: SmallRng::seed_from_u64(derive_seed(seed)),
        }
    }

    /// The seed string this stream was created from.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// How many dice have been rolled on this stream.
    pub const fn counter(&self) -> u64 {
        self.counter
    }

    /// Roll one die with the given number of sides (1-based result).
    pub fn roll(&mut self, sides: u32) -> i64 {
        self.counter = self.counter.saturating_add(1);
        if sides == 0 {
            return 0;
        }
        i64::from(self.rng.random_range(1..=sides))
    }

    /// Roll a d20.
    pub fn d20(&mut self) -> i64 {
        self.roll(20)
    }

    /// Roll a d100 (uniform percent, 1–100).
    pub fn d100(&mut self) -> i64 {
        self.roll(100)
    }

    /// Roll a d20 under an advantage mode. Advantage keeps the higher of
    /// two dice, disadvantage the lower; the two never stack.
    pub fn d20_with(&mut self, mode: AdvantageMode) -> D20Roll {
        match mode {
            AdvantageMode::Normal => {
                let roll = self.d20();
                D20Roll {
                    rolls: vec![roll],
                    result: roll,
                    mode,
                }
            }
            AdvantageMode::Advantage => {
                let first = self.d20();
                let second = self.d20();
                D20Roll {
                    rolls: vec![first, second],
                    result: first.max(second),
                    mode,
                }
            }
            AdvantageMode::Disadvantage => {
                let first = self.d20();
                let second = self.d20();
                D20Roll {
                    rolls: vec![first, second],
                    result: first.min(second),
                    mode,
                }
            }
        }
    }

    /// Roll a full expression and return the breakdown.
    pub fn roll_expr(&mut self, expr: &DiceExpr) -> RollBreakdown {
        let mut rolls = Vec::with_capacity(expr.count as usize);
        let mut sum: i64 = 0;
        for _ in 0..expr.count {
            let roll = self.roll(expr.sides);
            sum = sum.saturating_add(roll);
            rolls.push(roll);
        }
        RollBreakdown {
            expression: expr.to_string(),
            rolls,
            modifier: expr.modifier,
            total: sum.saturating_add(expr.modifier),
        }
    }
}

/// Reduce a seed string to a `u64` through SHA-256 (stable across runs,
/// platforms, and releases).
fn derive_seed(seed: &str) -> u64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0_u8; 8];
    for (dst, src) in bytes.iter_mut().zip(digest.iter()) {
        *dst = *src;
    }
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SeededDice::new("battle-1");
        let mut b = SeededDice::new("battle-1");
        for _ in 0..50 {
            assert_eq!(a.d20(), b.d20());
        }
        assert_eq!(a.counter(), 50);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SeededDice::new("battle-1");
        let mut b = SeededDice::new("battle-2");
        let left: Vec<i64> = (0..20).map(|_| a.d20()).collect();
        let right: Vec<i64> = (0..20).map(|_| b.d20()).collect();
        assert_ne!(left, right);
    }

    #[test]
    fn rolls_stay_in_range() {
        let mut dice = SeededDice::new("range-check");
        for _ in 0..200 {
            let roll = dice.d20();
            assert!((1..=20).contains(&roll));
        }
        for _ in 0..200 {
            let roll = dice.d100();
            assert!((1..=100).contains(&roll));
        }
    }

    #[test]
    fn parse_full_notation() {
        let expr: DiceExpr = "2d6+3".parse().unwrap();
        assert_eq!(
            expr,
            DiceExpr {
                count: 2,
                sides: 6,
                modifier: 3
            }
        );
        assert_eq!(expr.to_string(), "2d6+3");
    }

    #[test]
    fn parse_without_count_or_modifier() {
        let expr: DiceExpr = "d20".parse().unwrap();
        assert_eq!(expr, DiceExpr::single(20));
        let expr: DiceExpr = "1d8-1".parse().unwrap();
        assert_eq!(
            expr,
            DiceExpr {
                count: 1,
                sides: 8,
                modifier: -1
            }
        );
    }

    #[test]
    fn parse_bare_integer_as_flat() {
        let expr: DiceExpr = "6".parse().unwrap();
        assert_eq!(expr, DiceExpr::flat(6));
        let mut dice = SeededDice::new("flat");
        assert_eq!(dice.roll_expr(&expr).total, 6);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<DiceExpr>().is_err());
        assert!("xd6".parse::<DiceExpr>().is_err());
        assert!("2d".parse::<DiceExpr>().is_err());
        assert!("0d6".parse::<DiceExpr>().is_err());
        assert!("2d0".parse::<DiceExpr>().is_err());
        assert!("fireball".parse::<DiceExpr>().is_err());
    }

    #[test]
    fn advantage_keeps_higher_disadvantage_lower() {
        let mut dice = SeededDice::new("adv");
        for _ in 0..20 {
            let roll = dice.d20_with(AdvantageMode::Advantage);
            assert_eq!(roll.result, *roll.rolls.iter().max().unwrap());
        }
        let mut dice = SeededDice::new("dis");
        for _ in 0..20 {
            let roll = dice.d20_with(AdvantageMode::Disadvantage);
            assert_eq!(roll.result, *roll.rolls.iter().min().unwrap());
        }
    }

    #[test]
    fn expression_breakdown_sums() {
        let mut dice = SeededDice::new("sum");
        let expr: DiceExpr = "4d6+2".parse().unwrap();
        let breakdown = dice.roll_expr(&expr);
        assert_eq!(breakdown.rolls.len(), 4);
        let sum: i64 = breakdown.rolls.iter().sum();
        assert_eq!(breakdown.total, sum + 2);
    }
}
