use crate::{Board, DieKind, HandCategory, HandStreak, RngState, ScoringContext};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UpgradeKind {
    FireAura,
    Vampire,
    HeavyWeight,
    ArtisanWhetstone,
    Blackjack,
    DevilDice,
    DevilsContract,
    HeavyHand,
    HeavyShackle,
    SniperScope,
    OddEye,
    UnderdogsHope,
    GoldenScale,
    SoulCollector,
    OrderEmblem,
    ArtifactCollector,
    DiceCollector,
    PandorasBox,
    SkillScanner,
    AncientBattery,
    GlitchUsb,
    DejaVu,
    TwinsBlessing,
    MagicDice,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 24] = [
        UpgradeKind::FireAura,
        UpgradeKind::Vampire,
        UpgradeKind::HeavyWeight,
        UpgradeKind::ArtisanWhetstone,
        UpgradeKind::Blackjack,
        UpgradeKind::DevilDice,
        UpgradeKind::DevilsContract,
        UpgradeKind::HeavyHand,
        UpgradeKind::HeavyShackle,
        UpgradeKind::SniperScope,
        UpgradeKind::OddEye,
        UpgradeKind::UnderdogsHope,
        UpgradeKind::GoldenScale,
        UpgradeKind::SoulCollector,
        UpgradeKind::OrderEmblem,
        UpgradeKind::ArtifactCollector,
        UpgradeKind::DiceCollector,
        UpgradeKind::PandorasBox,
        UpgradeKind::SkillScanner,
        UpgradeKind::AncientBattery,
        UpgradeKind::GlitchUsb,
        UpgradeKind::DejaVu,
        UpgradeKind::TwinsBlessing,
        UpgradeKind::MagicDice,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UpgradeKind::FireAura => "Fire Aura",
            UpgradeKind::Vampire => "Vampire",
            UpgradeKind::HeavyWeight => "Heavy Weight",
            UpgradeKind::ArtisanWhetstone => "Artisan Whetstone",
            UpgradeKind::Blackjack => "Blackjack",
            UpgradeKind::DevilDice => "Devil Dice",
            UpgradeKind::DevilsContract => "Devil's Contract",
            UpgradeKind::HeavyHand => "Heavy Hand",
            UpgradeKind::HeavyShackle => "Heavy Shackle",
            UpgradeKind::SniperScope => "Sniper Scope",
            UpgradeKind::OddEye => "Odd Eye",
            UpgradeKind::UnderdogsHope => "Underdog's Hope",
            UpgradeKind::GoldenScale => "Golden Scale",
            UpgradeKind::SoulCollector => "Soul Collector",
            UpgradeKind::OrderEmblem => "Order Emblem",
            UpgradeKind::ArtifactCollector => "Artifact Collector",
            UpgradeKind::DiceCollector => "Dice Collector",
            UpgradeKind::PandorasBox => "Pandora's Box",
            UpgradeKind::SkillScanner => "Skill Scanner",
            UpgradeKind::AncientBattery => "Ancient Battery",
            UpgradeKind::GlitchUsb => "Glitch USB",
            UpgradeKind::DejaVu => "Deja Vu",
            UpgradeKind::TwinsBlessing => "Twin's Blessing",
            UpgradeKind::MagicDice => "Magic Dice",
        }
    }

    /// Upgrades that rewrite the first roll of a round instead of scoring.
    /// `RandomBoardProvider` applies them; `apply_upgrades` never fires them.
    pub fn acts_on_roll(self) -> bool {
        matches!(self, UpgradeKind::TwinsBlessing | UpgradeKind::MagicDice)
    }

    /// Matches display names loosely: case, spacing and punctuation are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        UpgradeKind::ALL
            .into_iter()
            .find(|kind| normalize(kind.name()) == wanted)
    }
}

fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum UpgradeScope {
    #[default]
    Passive,
    Consumable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Upgrade {
    pub kind: UpgradeKind,
    pub acquisition_order: u32,
    #[serde(default)]
    pub scope: UpgradeScope,
}

impl Upgrade {
    pub fn passive(kind: UpgradeKind, acquisition_order: u32) -> Self {
        Self {
            kind,
            acquisition_order,
            scope: UpgradeScope::Passive,
        }
    }

    pub fn consumable(kind: UpgradeKind, acquisition_order: u32) -> Self {
        Self {
            kind,
            acquisition_order,
            scope: UpgradeScope::Consumable,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FiredUpgrade {
    pub kind: UpgradeKind,
    pub acquisition_order: u32,
    pub scope: UpgradeScope,
}

/// Aggregate effect of the upgrade list on one resolution. All multiplier
/// changes are additive deltas on top of the category's base multiplier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpgradeOutcome {
    pub hand_multiplier_delta: f64,
    pub flat_points: i64,
    pub glitch_straight: bool,
    pub rerolls_granted: u32,
    pub fired: Vec<FiredUpgrade>,
    pub streak: HandStreak,
}

struct BoardFacts {
    dice: usize,
    specials: usize,
    value_sum: u32,
    all_odd: bool,
}

impl BoardFacts {
    fn of(board: &Board) -> Self {
        let mut facts = Self {
            dice: 0,
            specials: 0,
            value_sum: 0,
            all_odd: true,
        };
        for (_, die) in board.dice() {
            let value = die.effective_value();
            facts.dice += 1;
            facts.value_sum += u32::from(value);
            facts.all_odd &= value % 2 == 1;
            if die.kind.is_special() {
                facts.specials += 1;
            }
        }
        facts.all_odd &= facts.dice > 0;
        facts
    }
}

/// Applies upgrades in acquisition order. Die-level bonuses are written into
/// the board's derived scores and every die total is refreshed afterwards.
pub fn apply_upgrades(
    upgrades: &[Upgrade],
    board: &mut Board,
    category: HandCategory,
    ctx: &ScoringContext,
    rng: &mut RngState,
) -> UpgradeOutcome {
    let mut ordered: Vec<&Upgrade> = upgrades.iter().collect();
    ordered.sort_by_key(|upgrade| upgrade.acquisition_order);

    let facts = BoardFacts::of(board);
    let mut outcome = UpgradeOutcome {
        streak: ctx.streak,
        ..UpgradeOutcome::default()
    };
    let mut streak_recorded = false;

    for upgrade in ordered {
        let fired_before = outcome.fired.len();
        let fired = match upgrade.kind {
            UpgradeKind::FireAura => add_bonus(board, 1, |_, _| true),
            UpgradeKind::Vampire => {
                let lost = ctx.hands_spent() as i32;
                lost > 0 && add_bonus(board, lost, |_, _| true)
            }
            UpgradeKind::HeavyWeight => add_bonus(board, 3, |value, _| value >= 4),
            UpgradeKind::ArtisanWhetstone => {
                let mut any = false;
                for (_, die) in board.dice_mut() {
                    if die.kind == DieKind::Normal {
                        die.score.score_multiplier += 1.0;
                        any = true;
                    }
                }
                any
            }
            UpgradeKind::Blackjack => {
                add_delta(&mut outcome, facts.value_sum == 21, 6.0)
            }
            UpgradeKind::DevilDice | UpgradeKind::DevilsContract => {
                add_delta(&mut outcome, true, 4.0)
            }
            UpgradeKind::HeavyHand | UpgradeKind::HeavyShackle => {
                add_delta(&mut outcome, true, 1.0)
            }
            UpgradeKind::SniperScope => {
                add_delta(&mut outcome, category == HandCategory::OnePair, 1.0)
            }
            UpgradeKind::OddEye => add_delta(&mut outcome, facts.all_odd, 2.0),
            UpgradeKind::UnderdogsHope => {
                add_delta(&mut outcome, facts.value_sum <= 24, 2.0)
            }
            UpgradeKind::GoldenScale => {
                let stacks = if ctx.chips > 0 { ctx.chips / 10 } else { 0 };
                add_delta(&mut outcome, stacks > 0, 0.1 * stacks as f64)
            }
            UpgradeKind::SoulCollector => {
                // The game doubles the score per removed upgrade: x2^n becomes +(2^n - 1).
                let removed = ctx.upgrades_removed;
                let exponent = i32::try_from(removed.min(1023)).unwrap_or(1023);
                add_delta(&mut outcome, removed > 0, 2f64.powi(exponent) - 1.0)
            }
            UpgradeKind::OrderEmblem => {
                add_delta(&mut outcome, category == HandCategory::Straight, 7.0)
            }
            UpgradeKind::ArtifactCollector => {
                let others = upgrades.len().saturating_sub(1);
                add_delta(&mut outcome, others > 0, 0.5 * others as f64)
            }
            UpgradeKind::DiceCollector => {
                add_delta(&mut outcome, facts.dice > 0, 0.2 * facts.dice as f64)
            }
            UpgradeKind::PandorasBox => {
                let roll = rng.range_f64(0.5, 3.0);
                add_delta(&mut outcome, true, roll - 1.0)
            }
            UpgradeKind::SkillScanner => {
                outcome.flat_points += 30 * facts.specials as i64;
                facts.specials > 0
            }
            UpgradeKind::AncientBattery => {
                outcome.flat_points += 50 * fired_before as i64;
                fired_before > 0
            }
            UpgradeKind::GlitchUsb => {
                let straight = category == HandCategory::Straight;
                outcome.glitch_straight |= straight;
                straight
            }
            UpgradeKind::DejaVu => {
                if streak_recorded {
                    false
                } else {
                    streak_recorded = true;
                    let repeated = outcome.streak.record(category);
                    if repeated {
                        outcome.rerolls_granted += 1;
                    }
                    repeated
                }
            }
            UpgradeKind::TwinsBlessing | UpgradeKind::MagicDice => false,
        };
        if fired {
            debug!(upgrade = upgrade.name(), order = upgrade.acquisition_order, "upgrade fired");
            outcome.fired.push(FiredUpgrade {
                kind: upgrade.kind,
                acquisition_order: upgrade.acquisition_order,
                scope: upgrade.scope,
            });
        }
    }

    for (_, die) in board.dice_mut() {
        die.score.finalize();
    }
    outcome
}

fn add_bonus(board: &mut Board, amount: i32, applies: impl Fn(u8, DieKind) -> bool) -> bool {
    let mut any = false;
    for (_, die) in board.dice_mut() {
        if applies(die.effective_value(), die.kind) {
            die.score.bonus_score = die.score.bonus_score.saturating_add(amount);
            any = true;
        }
    }
    any
}

fn add_delta(outcome: &mut UpgradeOutcome, condition: bool, delta: f64) -> bool {
    if condition {
        outcome.hand_multiplier_delta += delta;
    }
    condition
}
