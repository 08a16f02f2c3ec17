use crate::HandCategory;
use serde::{Deserialize, Serialize};

/// Tracks repeated categories across resolutions for streak upgrades.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandStreak {
    pub last: Option<HandCategory>,
    pub repeats: u32,
}

impl HandStreak {
    /// Records `category`; returns true when it repeats the previous one.
    pub fn record(&mut self, category: HandCategory) -> bool {
        let repeated = self.last == Some(category);
        self.repeats = if repeated { self.repeats + 1 } else { 0 };
        self.last = Some(category);
        repeated
    }
}

/// Everything outside the board that dice and upgrades read during a resolve.
/// The engine only reads it; updated counters come back in the `Resolution`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringContext {
    pub hands_left: u32,
    pub max_hands: u32,
    pub chips: i64,
    pub upgrades_removed: u32,
    pub global_multiplier: f64,
    pub streak: HandStreak,
}

impl Default for ScoringContext {
    fn default() -> Self {
        Self {
            hands_left: 3,
            max_hands: 3,
            chips: 10,
            upgrades_removed: 0,
            global_multiplier: 1.0,
            streak: HandStreak::default(),
        }
    }
}

impl ScoringContext {
    pub fn hands_spent(&self) -> u32 {
        self.max_hands.saturating_sub(self.hands_left)
    }
}
