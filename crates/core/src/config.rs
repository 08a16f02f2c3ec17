use crate::{GridShape, HandCategory, StraightRule, MAX_SLOTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandRule {
    pub category: HandCategory,
    pub display_name: String,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComboConfig {
    /// Each chained glitch contributes `final_score * growth_factor^combo_count`.
    pub growth_factor: f64,
    pub iteration_cap: u32,
}

impl Default for ComboConfig {
    fn default() -> Self {
        Self {
            growth_factor: 1.5,
            iteration_cap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridShape,
    pub hands: Vec<HandRule>,
    pub straight: StraightRule,
    pub combo: ComboConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid: GridShape::REFERENCE,
            hands: default_hand_rules(),
            straight: StraightRule::default(),
            combo: ComboConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("grid {rows}x{columns} must hold between 1 and {max} slots", max = MAX_SLOTS)]
    InvalidGrid { rows: usize, columns: usize },
    #[error("hand multiplier for {0:?} must be finite and non-negative")]
    InvalidHandMultiplier(HandCategory),
    #[error("combo growth factor {0} must be finite and positive")]
    InvalidGrowthFactor(f64),
    #[error("combo iteration cap must be at least 1")]
    ZeroIterationCap,
    #[error("straight length {0} must be within 2..=6")]
    InvalidStraightLength(usize),
}

impl EngineConfig {
    pub fn hand_rule(&self, category: HandCategory) -> Option<&HandRule> {
        self.hands.iter().find(|rule| rule.category == category)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.checked_len().is_none() {
            return Err(ConfigError::InvalidGrid {
                rows: self.grid.rows,
                columns: self.grid.columns,
            });
        }
        for rule in &self.hands {
            if !rule.multiplier.is_finite() || rule.multiplier < 0.0 {
                return Err(ConfigError::InvalidHandMultiplier(rule.category));
            }
        }
        let growth = self.combo.growth_factor;
        if !growth.is_finite() || growth <= 0.0 {
            return Err(ConfigError::InvalidGrowthFactor(growth));
        }
        if self.combo.iteration_cap == 0 {
            return Err(ConfigError::ZeroIterationCap);
        }
        if let StraightRule::Consecutive(length) = self.straight {
            if !(2..=6).contains(&length) {
                return Err(ConfigError::InvalidStraightLength(length));
            }
        }
        Ok(())
    }
}

pub fn default_hand_rules() -> Vec<HandRule> {
    HandCategory::ALL
        .into_iter()
        .map(|category| HandRule {
            category,
            display_name: default_display_name(category).to_string(),
            multiplier: default_hand_multiplier(category),
        })
        .collect()
}

pub fn default_hand_multiplier(category: HandCategory) -> f64 {
    match category {
        HandCategory::HighCard => 1.0,
        HandCategory::OnePair => 2.0,
        HandCategory::TwoPair => 3.0,
        HandCategory::ThreeOfAKind => 4.0,
        HandCategory::Straight => 6.0,
        HandCategory::FullHouse => 8.0,
        HandCategory::FourOfAKind => 12.0,
        HandCategory::FiveOfAKind => 20.0,
    }
}

pub fn default_display_name(category: HandCategory) -> &'static str {
    match category {
        HandCategory::HighCard => "No Pair",
        HandCategory::OnePair => "One Pair",
        HandCategory::TwoPair => "Two Pair",
        HandCategory::ThreeOfAKind => "Three of a Kind (GLITCH!)",
        HandCategory::Straight => "Straight",
        HandCategory::FullHouse => "Full House (GLITCH!)",
        HandCategory::FourOfAKind => "Four of a Kind (GLITCH!)",
        HandCategory::FiveOfAKind => "Five of a Kind (GLITCH!)",
    }
}
