use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::table::ConfigurationError;

/// Highest score the FORD scale reports; raw sums are clamped into `0..=MAX_SCORE`.
pub const MAX_SCORE: u8 = 10;

const SCORE_SLOTS: usize = MAX_SCORE as usize + 1;

/// One tier per `RiskLevel`.
pub const TIER_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    #[serde(rename = "Low-Moderate")]
    LowModerate,
    #[serde(rename = "Moderate-High")]
    ModerateHigh,
    High,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::LowModerate => "Low-Moderate",
            Self::ModerateHigh => "Moderate-High",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskColor {
    Green,
    Orange,
    Red,
}

/// Inclusive score band with its historical non-home discharge rate (percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub level: RiskLevel,
    pub min_score: u8,
    pub max_score: u8,
    pub discharge_rate: f64,
    pub color: RiskColor,
}

impl RiskTier {
    pub fn contains(&self, score: u8) -> bool {
        self.min_score <= score && score <= self.max_score
    }

    /// "0–1" style range text, or the single score when the band is one wide.
    pub fn score_range(&self) -> String {
        if self.min_score == self.max_score {
            self.min_score.to_string()
        } else {
            format!("{}\u{2013}{}", self.min_score, self.max_score)
        }
    }
}

/// Row of the risk-level reference table shown beside a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskLevelReference {
    pub score_range: String,
    pub level: RiskLevel,
    pub label: &'static str,
    pub discharge_rate: f64,
    pub color: RiskColor,
}

/// Tiers that partition `0..=MAX_SCORE`, with a precomputed score -> tier index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RiskTier>", into = "Vec<RiskTier>")]
pub struct RiskTierTable {
    tiers: Vec<RiskTier>,
    by_score: [usize; SCORE_SLOTS],
}

impl RiskTierTable {
    pub fn new(tiers: Vec<RiskTier>) -> Result<Self, ConfigurationError> {
        let mut by_score: [Option<usize>; SCORE_SLOTS] = [None; SCORE_SLOTS];
        let mut levels = HashSet::new();

        for (index, tier) in tiers.iter().enumerate() {
            if tier.min_score > tier.max_score || tier.max_score > MAX_SCORE {
                return Err(ConfigurationError::TierOutOfBounds {
                    level: tier.level,
                    min_score: tier.min_score,
                    max_score: tier.max_score,
                });
            }
            if !(tier.discharge_rate.is_finite() && (0.0..=100.0).contains(&tier.discharge_rate)) {
                return Err(ConfigurationError::InvalidRate {
                    context: format!("tier {}", tier.level.label()),
                    rate: tier.discharge_rate,
                });
            }
            if !levels.insert(tier.level) {
                return Err(ConfigurationError::DuplicateTierLevel { level: tier.level });
            }

            for score in tier.min_score..=tier.max_score {
                let slot = &mut by_score[score as usize];
                if slot.is_some() {
                    return Err(ConfigurationError::TierOverlap { score });
                }
                *slot = Some(index);
            }
        }

        let mut resolved = [0usize; SCORE_SLOTS];
        for (score, slot) in by_score.iter().enumerate() {
            resolved[score] = slot.ok_or(ConfigurationError::TierGap {
                score: score as u8,
            })?;
        }
        if tiers.len() != TIER_COUNT {
            return Err(ConfigurationError::TierCount {
                expected: TIER_COUNT,
                found: tiers.len(),
            });
        }

        Ok(Self {
            tiers,
            by_score: resolved,
        })
    }

    pub fn standard() -> Self {
        Self::from_validated(standard_tiers())
    }

    fn from_validated(tiers: Vec<RiskTier>) -> Self {
        let mut by_score = [0usize; SCORE_SLOTS];
        for (index, tier) in tiers.iter().enumerate() {
            for score in tier.min_score..=tier.max_score {
                by_score[score as usize] = index;
            }
        }
        Self { tiers, by_score }
    }

    /// Tier for an already clamped score. Coverage of every score is checked at
    /// construction, so the lookup cannot miss.
    pub fn classify(&self, score: u8) -> &RiskTier {
        let score = score.min(MAX_SCORE);
        &self.tiers[self.by_score[score as usize]]
    }

    pub fn tiers(&self) -> &[RiskTier] {
        &self.tiers
    }

    /// Reference rows ordered by score, whatever order the tiers were declared in.
    pub fn reference(&self) -> Vec<RiskLevelReference> {
        let mut ordered: Vec<&RiskTier> = self.tiers.iter().collect();
        ordered.sort_by_key(|tier| tier.min_score);

        ordered
            .into_iter()
            .map(|tier| RiskLevelReference {
                score_range: tier.score_range(),
                level: tier.level,
                label: tier.level.label(),
                discharge_rate: tier.discharge_rate,
                color: tier.color,
            })
            .collect()
    }
}

impl TryFrom<Vec<RiskTier>> for RiskTierTable {
    type Error = ConfigurationError;

    fn try_from(tiers: Vec<RiskTier>) -> Result<Self, Self::Error> {
        Self::new(tiers)
    }
}

impl From<RiskTierTable> for Vec<RiskTier> {
    fn from(table: RiskTierTable) -> Self {
        table.tiers
    }
}

/// Historical non-home discharge rate for each individual score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ScoreRate>", into = "Vec<ScoreRate>")]
pub struct ScoreRateTable {
    rates: [f64; SCORE_SLOTS],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRate {
    pub score: u8,
    pub rate: f64,
}

impl ScoreRateTable {
    pub fn new(entries: Vec<ScoreRate>) -> Result<Self, ConfigurationError> {
        let mut rates: [Option<f64>; SCORE_SLOTS] = [None; SCORE_SLOTS];

        for entry in entries {
            if entry.score > MAX_SCORE {
                return Err(ConfigurationError::ScoreRateOutOfBounds { score: entry.score });
            }
            if !(entry.rate.is_finite() && (0.0..=100.0).contains(&entry.rate)) {
                return Err(ConfigurationError::InvalidRate {
                    context: format!("score {}", entry.score),
                    rate: entry.rate,
                });
            }
            let slot = &mut rates[entry.score as usize];
            if slot.is_some() {
                return Err(ConfigurationError::DuplicateScoreRate { score: entry.score });
            }
            *slot = Some(entry.rate);
        }

        let mut resolved = [0.0; SCORE_SLOTS];
        for (score, slot) in rates.iter().enumerate() {
            resolved[score] = slot.ok_or(ConfigurationError::MissingScoreRate {
                score: score as u8,
            })?;
        }

        Ok(Self { rates: resolved })
    }

    pub fn standard() -> Self {
        Self {
            rates: [0.7, 1.7, 2.8, 2.9, 3.9, 9.6, 9.3, 14.7, 18.0, 22.9, 44.8],
        }
    }

    pub fn rate_for(&self, score: u8) -> f64 {
        self.rates[score.min(MAX_SCORE) as usize]
    }
}

impl TryFrom<Vec<ScoreRate>> for ScoreRateTable {
    type Error = ConfigurationError;

    fn try_from(entries: Vec<ScoreRate>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<ScoreRateTable> for Vec<ScoreRate> {
    fn from(table: ScoreRateTable) -> Self {
        table
            .rates
            .iter()
            .enumerate()
            .map(|(score, rate)| ScoreRate {
                score: score as u8,
                rate: *rate,
            })
            .collect()
    }
}

pub(crate) fn standard_tiers() -> Vec<RiskTier> {
    vec![
        RiskTier {
            level: RiskLevel::Low,
            min_score: 0,
            max_score: 1,
            discharge_rate: 1.2,
            color: RiskColor::Green,
        },
        RiskTier {
            level: RiskLevel::LowModerate,
            min_score: 2,
            max_score: 3,
            discharge_rate: 3.1,
            color: RiskColor::Orange,
        },
        RiskTier {
            level: RiskLevel::ModerateHigh,
            min_score: 4,
            max_score: 6,
            discharge_rate: 7.0,
            color: RiskColor::Orange,
        },
        RiskTier {
            level: RiskLevel::High,
            min_score: 7,
            max_score: 10,
            discharge_rate: 26.4,
            color: RiskColor::Red,
        },
    ]
}
