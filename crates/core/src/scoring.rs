use crate::dice::clamp_points;
use crate::{
    apply_upgrades, classify_with_rule, default_display_name, default_hand_multiplier, Board,
    ConfigError, EffectRegistry, EngineConfig, FiredUpgrade, HandCategory, HandStreak, Points,
    RngState, ScoringContext, Upgrade, UpgradeScope,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ScoreTables {
    hand_rules: HashMap<HandCategory, (String, f64)>,
}

impl ScoreTables {
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut hand_rules = HashMap::new();
        for rule in &config.hands {
            hand_rules.insert(rule.category, (rule.display_name.clone(), rule.multiplier));
        }
        Self { hand_rules }
    }

    pub fn hand_multiplier(&self, category: HandCategory) -> f64 {
        self.hand_rules
            .get(&category)
            .map(|(_, multiplier)| *multiplier)
            .unwrap_or_else(|| default_hand_multiplier(category))
    }

    pub fn display_name(&self, category: HandCategory) -> String {
        match self.hand_rules.get(&category) {
            Some((name, _)) => name.clone(),
            None => default_display_name(category).to_string(),
        }
    }
}

impl Default for ScoreTables {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HandResult {
    pub category: HandCategory,
    pub display_name: String,
    pub hand_multiplier: f64,
    pub final_score: Points,
    pub is_glitch: bool,
}

/// Everything one resolve produced. Counters that the caller carries between
/// resolves (the hand streak) come back here instead of being mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub hand: HandResult,
    pub raw_sum: i64,
    pub fired: Vec<FiredUpgrade>,
    /// Acquisition orders of consumable upgrades that fired and should be removed.
    pub consumed: Vec<u32>,
    pub streak: HandStreak,
    pub rerolls_granted: u32,
}

/// `raw_sum * hand_multiplier * global_multiplier`, rounded half away from zero
/// and clamped to `0..=Points::MAX`.
pub fn saturating_final_score(raw_sum: i64, hand_multiplier: f64, global_multiplier: f64) -> Points {
    clamp_points(raw_sum as f64 * hand_multiplier * global_multiplier)
}

#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    tables: ScoreTables,
    effects: EffectRegistry,
}

impl Default for Engine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            tables: ScoreTables::from_config(&config),
            config,
            effects: EffectRegistry::builtin(),
        }
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tables: ScoreTables::from_config(&config),
            config,
            effects: EffectRegistry::builtin(),
        })
    }

    pub fn with_effects(mut self, effects: EffectRegistry) -> Self {
        self.effects = effects;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tables(&self) -> &ScoreTables {
        &self.tables
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.effects
    }

    /// Resolves dice effects, classifies the hand, applies upgrades in
    /// acquisition order and aggregates the final score.
    pub fn resolve(
        &self,
        board: &mut Board,
        upgrades: &[Upgrade],
        ctx: &ScoringContext,
        rng: &mut RngState,
    ) -> Resolution {
        if board.is_empty() {
            return self.empty_resolution(ctx);
        }

        self.effects.resolve(board, ctx, rng);
        let category = classify_with_rule(&board.effective_values(), self.config.straight);
        let outcome = apply_upgrades(upgrades, board, category, ctx, rng);

        let hand_multiplier = (self.tables.hand_multiplier(category)
            + outcome.hand_multiplier_delta)
            .max(0.0);
        let dice_sum: i64 = board.dice().map(|(_, die)| i64::from(die.total())).sum();
        let raw_sum = dice_sum.saturating_add(outcome.flat_points);
        let final_score = saturating_final_score(raw_sum, hand_multiplier, ctx.global_multiplier);
        let is_glitch = category.glitches()
            || (category == HandCategory::Straight && outcome.glitch_straight);

        let consumed = outcome
            .fired
            .iter()
            .filter(|fired| fired.scope == UpgradeScope::Consumable)
            .map(|fired| fired.acquisition_order)
            .collect();

        debug!(
            hand = category.id(),
            raw_sum = raw_sum,
            hand_multiplier = hand_multiplier,
            final_score = final_score,
            is_glitch = is_glitch,
            "hand resolved"
        );

        Resolution {
            hand: HandResult {
                category,
                display_name: self.tables.display_name(category),
                hand_multiplier,
                final_score,
                is_glitch,
            },
            raw_sum,
            fired: outcome.fired,
            consumed,
            streak: outcome.streak,
            rerolls_granted: outcome.rerolls_granted,
        }
    }

    fn empty_resolution(&self, ctx: &ScoringContext) -> Resolution {
        let category = HandCategory::HighCard;
        Resolution {
            hand: HandResult {
                category,
                display_name: self.tables.display_name(category),
                hand_multiplier: self.tables.hand_multiplier(category),
                final_score: 0,
                is_glitch: false,
            },
            raw_sum: 0,
            fired: Vec::new(),
            consumed: Vec::new(),
            streak: ctx.streak,
            rerolls_granted: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Die, DieKind, HandRule, UpgradeKind};

    fn board_of(values: &[u8]) -> Board {
        let mut board = Board::default();
        for (slot, value) in values.iter().enumerate() {
            board.place(slot, Die::normal(*value)).expect("place");
        }
        board
    }

    fn resolve(board: &mut Board, upgrades: &[Upgrade]) -> Resolution {
        let mut rng = RngState::from_seed(11);
        Engine::default().resolve(board, upgrades, &ScoringContext::default(), &mut rng)
    }

    #[test]
    fn full_house_of_normal_dice() {
        let mut board = board_of(&[3, 3, 5, 5, 5]);
        let resolution = resolve(&mut board, &[]);
        assert_eq!(resolution.hand.category, HandCategory::FullHouse);
        assert_eq!(resolution.raw_sum, 21);
        assert_eq!(resolution.hand.final_score, 168);
        assert!(resolution.hand.is_glitch);
        assert_eq!(resolution.hand.display_name, "Full House (GLITCH!)");
    }

    #[test]
    fn straight_needs_glitch_usb_to_chain() {
        let mut board = board_of(&[1, 2, 3, 4, 6]);
        let plain = resolve(&mut board, &[]);
        assert_eq!(plain.hand.category, HandCategory::Straight);
        assert!(!plain.hand.is_glitch);

        let usb = [Upgrade::consumable(UpgradeKind::GlitchUsb, 4)];
        let chained = resolve(&mut board, &usb);
        assert!(chained.hand.is_glitch);
        assert_eq!(chained.consumed, vec![4]);
        assert_eq!(chained.hand.final_score, plain.hand.final_score);
    }

    #[test]
    fn empty_board_scores_nothing() {
        let mut board = Board::default();
        let upgrades = [
            Upgrade::passive(UpgradeKind::DevilDice, 0),
            Upgrade::passive(UpgradeKind::FireAura, 1),
        ];
        let resolution = resolve(&mut board, &upgrades);
        assert_eq!(resolution.hand.category, HandCategory::HighCard);
        assert_eq!(resolution.hand.final_score, 0);
        assert!(resolution.fired.is_empty());
    }

    #[test]
    fn upgrades_shift_multiplier_and_raw_sum() {
        let mut board = Board::default();
        board.place(0, Die::normal(2)).expect("place");
        board.place(1, Die::normal(2)).expect("place");
        board.place(4, Die::new(6, DieKind::Steel)).expect("place");
        let upgrades = [
            Upgrade::passive(UpgradeKind::SkillScanner, 0),
            Upgrade::passive(UpgradeKind::HeavyShackle, 1),
        ];
        let resolution = resolve(&mut board, &upgrades);
        assert_eq!(resolution.hand.category, HandCategory::OnePair);
        assert_eq!(resolution.raw_sum, 10 + 30);
        assert_eq!(resolution.hand.hand_multiplier, 3.0);
        assert_eq!(resolution.hand.final_score, 120);
    }

    #[test]
    fn global_multiplier_applies_last() {
        let mut board = board_of(&[6]);
        let ctx = ScoringContext {
            global_multiplier: 2.5,
            ..ScoringContext::default()
        };
        let mut rng = RngState::from_seed(1);
        let resolution = Engine::default().resolve(&mut board, &[], &ctx, &mut rng);
        assert_eq!(resolution.hand.final_score, 15);
    }

    #[test]
    fn final_score_saturates() {
        assert_eq!(saturating_final_score(10_000_000, 20.0, 50.0), Points::MAX);
        assert_eq!(saturating_final_score(10, f64::INFINITY, 1.0), Points::MAX);
        assert_eq!(saturating_final_score(-5, 2.0, 1.0), 0);
        assert_eq!(saturating_final_score(7, 1.5, 1.0), 11);
    }

    #[test]
    fn custom_hand_table() {
        let mut config = EngineConfig::default();
        config.hands = vec![HandRule {
            category: HandCategory::OnePair,
            display_name: "Twins".to_string(),
            multiplier: 10.0,
        }];
        let engine = Engine::new(config).expect("valid config");
        let mut board = board_of(&[4, 4]);
        let mut rng = RngState::from_seed(1);
        let resolution = engine.resolve(&mut board, &[], &ScoringContext::default(), &mut rng);
        assert_eq!(resolution.hand.display_name, "Twins");
        assert_eq!(resolution.hand.final_score, 80);
        // Categories missing from the table fall back to built-in values.
        assert_eq!(engine.tables().hand_multiplier(HandCategory::Straight), 6.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.combo.iteration_cap = 0;
        assert_eq!(Engine::new(config).err(), Some(ConfigError::ZeroIterationCap));
    }
}
