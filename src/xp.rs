//! XP / level / tier evaluation over acquired certifications.
//!
//! Pure functions. The same evaluator runs for the local fallback and for
//! checking summaries received from the backend, so both agree exactly.

use serde::{Deserialize, Serialize};

/// XP granted for an item whose difficulty is unknown.
pub const DEFAULT_CERT_XP: f64 = 3.0;
pub const MIN_CERT_XP: f64 = 0.5;
pub const MAX_LEVEL: u8 = 9;

/// Level `n` starts at `LEVEL_XP_THRESHOLDS[n - 1]`.
pub const LEVEL_XP_THRESHOLDS: [u32; 9] = [0, 5, 15, 35, 70, 120, 190, 290, 430];

/// Rounds to two decimals on the exact binary value, ties to even.
///
/// Float formatting rounds the exact value half-to-even, which is what the
/// backend's `round(x, 2)` does, so `5.125` becomes `5.12` on both sides.
fn round2(x: f64) -> f64 {
    format!("{x:.2}").parse().unwrap_or(x)
}

fn difficulty_bonus(d: f64) -> f64 {
    if d >= 9.0 {
        12.0
    } else if d >= 8.0 {
        8.0
    } else if d >= 7.0 {
        5.0
    } else if d >= 6.0 {
        2.0
    } else if d >= 5.0 {
        0.0
    } else if d >= 4.0 {
        -0.5
    } else if d >= 3.0 {
        -1.0
    } else {
        -0.5
    }
}

/// XP for a single item.
pub fn cert_xp(difficulty: Option<f64>) -> f64 {
    match difficulty {
        None => DEFAULT_CERT_XP,
        Some(d) => round2(d + difficulty_bonus(d)).max(MIN_CERT_XP),
    }
}

pub fn total_xp<I>(difficulties: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    difficulties.into_iter().map(cert_xp).sum()
}

pub fn level_from_xp(total_xp: f64) -> u8 {
    let mut level = 1u8;
    for (i, threshold) in LEVEL_XP_THRESHOLDS.iter().enumerate() {
        if total_xp >= f64::from(*threshold) {
            level = (i + 1) as u8;
        }
    }
    level.min(MAX_LEVEL)
}

/// Threshold of the next level, or `None` at the top.
pub fn xp_for_next_level(level: u8) -> Option<u32> {
    if level >= MAX_LEVEL {
        return None;
    }
    LEVEL_XP_THRESHOLDS.get(usize::from(level)).copied()
}

pub fn xp_for_current_level(level: u8) -> u32 {
    let idx = usize::from(level.clamp(1, MAX_LEVEL)) - 1;
    LEVEL_XP_THRESHOLDS[idx]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    pub fn from_level(level: u8) -> Self {
        match level {
            0..=2 => Tier::Bronze,
            3 | 4 => Tier::Silver,
            5 | 6 => Tier::Gold,
            7 | 8 => Tier::Platinum,
            _ => Tier::Diamond,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
            Tier::Platinum => "Platinum",
            Tier::Diamond => "Diamond",
        }
    }

    /// Badge colour.
    pub fn color(self) -> &'static str {
        match self {
            Tier::Bronze => "#a97241",
            Tier::Silver => "#9da8b3",
            Tier::Gold => "#f5c518",
            Tier::Platinum => "#54e0c7",
            Tier::Diamond => "#b9f2ff",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XpSummary {
    pub total_xp: f64,
    pub level: u8,
    pub tier: Tier,
    pub tier_color: String,
    pub current_level_xp: u32,
    pub next_level_xp: Option<u32>,
}

impl XpSummary {
    pub fn from_total(total_xp: f64) -> Self {
        let level = level_from_xp(total_xp);
        let tier = Tier::from_level(level);
        Self {
            total_xp: round2(total_xp),
            level,
            tier,
            tier_color: tier.color().to_string(),
            current_level_xp: xp_for_current_level(level),
            next_level_xp: xp_for_next_level(level),
        }
    }

    /// Fraction of the way from the current level's threshold to the next (1.0 at max level).
    pub fn progress(&self) -> f64 {
        match self.next_level_xp {
            None => 1.0,
            Some(next) => {
                let span = f64::from(next - self.current_level_xp);
                ((self.total_xp - f64::from(self.current_level_xp)) / span).clamp(0.0, 1.0)
            }
        }
    }
}

/// Summary over an ordered list of difficulties; `None` when the list is empty.
pub fn summarize(difficulties: &[Option<f64>]) -> Option<XpSummary> {
    if difficulties.is_empty() {
        return None;
    }
    Some(XpSummary::from_total(total_xp(difficulties.iter().copied())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonus_buckets() {
        assert_eq!(cert_xp(Some(9.5)), 21.5);
        assert_eq!(cert_xp(Some(8.0)), 16.0);
        assert_eq!(cert_xp(Some(7.3)), 12.3);
        assert_eq!(cert_xp(Some(6.0)), 8.0);
        assert_eq!(cert_xp(Some(5.5)), 5.5);
        assert_eq!(cert_xp(Some(4.0)), 3.5);
        assert_eq!(cert_xp(Some(3.0)), 2.0);
        assert_eq!(cert_xp(Some(1.0)), 0.5);
        assert_eq!(cert_xp(Some(0.2)), MIN_CERT_XP);
        assert_eq!(cert_xp(None), DEFAULT_CERT_XP);
    }

    #[test]
    fn exact_ties_round_to_even() {
        assert_eq!(cert_xp(Some(5.125)), 5.12);
        assert_eq!(cert_xp(Some(6.125)), 8.12);
        assert_eq!(cert_xp(Some(5.375)), 5.38);
        assert_eq!(cert_xp(Some(4.625)), 4.12);
        // 5.675 is stored just below the tie, so it rounds down.
        assert_eq!(cert_xp(Some(5.675)), 5.67);
    }

    #[test]
    fn mixed_input_lands_in_silver() {
        let s = summarize(&[Some(9.5), Some(6.0), None]).unwrap();
        assert_eq!(s.total_xp, 32.5);
        assert_eq!(s.level, 3);
        assert_eq!(s.tier, Tier::Silver);
        assert_eq!(s.tier_color, "#9da8b3");
        assert_eq!(s.current_level_xp, 15);
        assert_eq!(s.next_level_xp, Some(35));
    }

    #[test]
    fn empty_input_has_no_summary() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn level_ladder_edges() {
        assert_eq!(level_from_xp(0.0), 1);
        assert_eq!(level_from_xp(4.99), 1);
        assert_eq!(level_from_xp(5.0), 2);
        assert_eq!(level_from_xp(429.99), 8);
        assert_eq!(level_from_xp(430.0), 9);
        assert_eq!(level_from_xp(10_000.0), 9);
        assert_eq!(xp_for_next_level(9), None);
        assert_eq!(xp_for_next_level(1), Some(5));
        assert_eq!(xp_for_current_level(9), 430);
    }

    #[test]
    fn tiers_follow_levels() {
        let tiers: Vec<Tier> = (1..=9).map(Tier::from_level).collect();
        assert_eq!(
            tiers,
            vec![
                Tier::Bronze,
                Tier::Bronze,
                Tier::Silver,
                Tier::Silver,
                Tier::Gold,
                Tier::Gold,
                Tier::Platinum,
                Tier::Platinum,
                Tier::Diamond
            ]
        );
    }

    #[test]
    fn progress_within_level() {
        let s = XpSummary::from_total(25.0);
        assert_eq!(s.level, 3);
        assert!((s.progress() - 0.5).abs() < 1e-9);
        assert_eq!(XpSummary::from_total(500.0).progress(), 1.0);
    }
}
