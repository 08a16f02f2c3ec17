use crate::{GridShape, Points, MAX_SLOTS};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const MIN_PIPS: u8 = 1;
pub const MAX_PIPS: u8 = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "String")]
pub enum DieKind {
    Normal,
    Time,
    Ice,
    Rubber,
    Buff,
    Comeback,
    Spring,
    Mirror,
    Reflect,
    Steel,
    Chameleon,
    Splash,
    Absorb,
    Ancient,
    Laser,
    Offer,
    Glass,
    TimeAttack,
}

impl DieKind {
    pub const ALL: [DieKind; 18] = [
        DieKind::Normal,
        DieKind::Time,
        DieKind::Ice,
        DieKind::Rubber,
        DieKind::Buff,
        DieKind::Comeback,
        DieKind::Spring,
        DieKind::Mirror,
        DieKind::Reflect,
        DieKind::Steel,
        DieKind::Chameleon,
        DieKind::Splash,
        DieKind::Absorb,
        DieKind::Ancient,
        DieKind::Laser,
        DieKind::Offer,
        DieKind::Glass,
        DieKind::TimeAttack,
    ];

    pub fn id(self) -> &'static str {
        match self {
            DieKind::Normal => "normal",
            DieKind::Time => "time",
            DieKind::Ice => "ice",
            DieKind::Rubber => "rubber",
            DieKind::Buff => "buff",
            DieKind::Comeback => "comeback",
            DieKind::Spring => "spring",
            DieKind::Mirror => "mirror",
            DieKind::Reflect => "reflect",
            DieKind::Steel => "steel",
            DieKind::Chameleon => "chameleon",
            DieKind::Splash => "splash",
            DieKind::Absorb => "absorb",
            DieKind::Ancient => "ancient",
            DieKind::Laser => "laser",
            DieKind::Offer => "offer",
            DieKind::Glass => "glass",
            DieKind::TimeAttack => "time_attack",
        }
    }

    /// Accepts ids, variant names and shop names ("Buff Dice"), case-insensitively.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized: String = tag
            .trim()
            .to_lowercase()
            .trim_end_matches("dice")
            .trim_end_matches("die")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        DieKind::ALL
            .into_iter()
            .find(|kind| kind.id().replace('_', "") == normalized)
    }

    /// Unknown tags resolve to `Normal` so a stale board never blocks scoring.
    pub fn from_tag_lenient(tag: &str) -> Self {
        match Self::from_tag(tag) {
            Some(kind) => kind,
            None => {
                warn!(tag = %tag, "unknown die tag, treating as normal");
                DieKind::Normal
            }
        }
    }

    pub fn is_special(self) -> bool {
        self != DieKind::Normal
    }
}

impl From<String> for DieKind {
    fn from(value: String) -> Self {
        DieKind::from_tag_lenient(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOverride {
    Zero,
    Multiplier(f64),
}

/// Per-resolution derived fields. Rebuilt from scratch on every resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct DieScore {
    pub effective_value: u8,
    pub base_score: i32,
    pub bonus_score: i32,
    pub score_multiplier: f64,
    pub external_buff_multiplier: f64,
    pub external_nerf_multiplier: f64,
    pub nerf_immune: bool,
    pub score_override: Option<ScoreOverride>,
    pub total_score_calculated: Points,
}

impl Default for DieScore {
    fn default() -> Self {
        Self::reset(MIN_PIPS, false)
    }
}

impl DieScore {
    pub fn reset(value: u8, nerf_immune: bool) -> Self {
        Self {
            effective_value: value,
            base_score: i32::from(value),
            bonus_score: 0,
            score_multiplier: 1.0,
            external_buff_multiplier: 1.0,
            external_nerf_multiplier: 1.0,
            nerf_immune,
            score_override: None,
            total_score_calculated: 0,
        }
    }

    pub fn effective_external_multiplier(&self) -> f64 {
        let nerf = if self.nerf_immune {
            1.0
        } else {
            self.external_nerf_multiplier
        };
        self.external_buff_multiplier * nerf
    }

    pub fn add_nerf(&mut self, amount: f64) {
        self.external_nerf_multiplier = (self.external_nerf_multiplier - amount).max(0.0);
    }

    pub fn finalize(&mut self) -> Points {
        let multiplier = match self.score_override {
            Some(ScoreOverride::Zero) => {
                self.total_score_calculated = 0;
                return 0;
            }
            Some(ScoreOverride::Multiplier(forced)) => forced,
            None => self.score_multiplier,
        };
        let points = i64::from(self.base_score) + i64::from(self.bonus_score);
        let raw = points as f64 * self.effective_external_multiplier() * multiplier;
        self.total_score_calculated = clamp_points(raw);
        self.total_score_calculated
    }
}

pub(crate) fn clamp_points(raw: f64) -> Points {
    if raw.is_nan() || raw <= 0.0 {
        return 0;
    }
    let rounded = raw.round();
    if rounded >= Points::MAX as f64 {
        Points::MAX
    } else {
        rounded as Points
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Die {
    pub value: u8,
    #[serde(default = "default_kind")]
    pub kind: DieKind,
    #[serde(default)]
    pub rounds_held: u32,
    #[serde(skip)]
    pub score: DieScore,
}

fn default_kind() -> DieKind {
    DieKind::Normal
}

impl Die {
    pub fn new(value: u8, kind: DieKind) -> Self {
        Self {
            value,
            kind,
            rounds_held: 0,
            score: DieScore::reset(value, false),
        }
    }

    pub fn normal(value: u8) -> Self {
        Self::new(value, DieKind::Normal)
    }

    pub fn with_rounds_held(mut self, rounds_held: u32) -> Self {
        self.rounds_held = rounds_held;
        self
    }

    pub fn effective_value(&self) -> u8 {
        self.score.effective_value
    }

    pub fn total(&self) -> Points {
        self.score.total_score_calculated
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("slot {index} is outside a board of {len} slots")]
    InvalidPlacement { index: usize, len: usize },
    #[error("die value {0} is outside 1..=6")]
    InvalidValue(u8),
    #[error("grid {rows}x{columns} must hold between 1 and {max} slots", max = MAX_SLOTS)]
    InvalidShape { rows: usize, columns: usize },
    #[error("board lists {found} slots but its {rows}x{columns} grid has {expected}")]
    SlotCountMismatch {
        rows: usize,
        columns: usize,
        expected: usize,
        found: usize,
    },
}

/// Serialized boards are rebuilt through `Board::try_new` and `Board::place`,
/// so a deserialized board always passes the same checks as a built one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawBoard")]
pub struct Board {
    shape: GridShape,
    slots: Vec<Option<Die>>,
}

#[derive(Deserialize)]
struct RawBoard {
    shape: GridShape,
    slots: Vec<Option<Die>>,
}

impl TryFrom<RawBoard> for Board {
    type Error = BoardError;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> {
        let mut board = Board::try_new(raw.shape)?;
        if raw.slots.len() != board.slots.len() {
            return Err(BoardError::SlotCountMismatch {
                rows: raw.shape.rows,
                columns: raw.shape.columns,
                expected: board.slots.len(),
                found: raw.slots.len(),
            });
        }
        for (index, die) in raw.slots.into_iter().enumerate() {
            if let Some(die) = die {
                board.place(index, die)?;
            }
        }
        Ok(board)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(GridShape::REFERENCE)
    }
}

impl Board {
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            slots: vec![None; shape.len()],
        }
    }

    /// Builds an empty board from untrusted dimensions.
    pub fn try_new(shape: GridShape) -> Result<Self, BoardError> {
        if shape.checked_len().is_none() {
            return Err(BoardError::InvalidShape {
                rows: shape.rows,
                columns: shape.columns,
            });
        }
        Ok(Self::new(shape))
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Places a die, returning whatever occupied the slot before.
    pub fn place(&mut self, index: usize, die: Die) -> Result<Option<Die>, BoardError> {
        if !self.shape.contains(index) {
            return Err(BoardError::InvalidPlacement {
                index,
                len: self.shape.len(),
            });
        }
        if !(MIN_PIPS..=MAX_PIPS).contains(&die.value) {
            return Err(BoardError::InvalidValue(die.value));
        }
        let Some(slot) = self.slots.get_mut(index) else {
            return Err(BoardError::InvalidPlacement {
                index,
                len: self.slots.len(),
            });
        };
        Ok(slot.replace(die))
    }

    pub fn remove(&mut self, index: usize) -> Option<Die> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn die(&self, index: usize) -> Option<&Die> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn die_mut(&mut self, index: usize) -> Option<&mut Die> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn dice(&self) -> impl Iterator<Item = (usize, &Die)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|die| (idx, die)))
    }

    pub fn dice_mut(&mut self) -> impl Iterator<Item = (usize, &mut Die)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_mut().map(|die| (idx, die)))
    }

    pub fn occupied(&self) -> Vec<usize> {
        self.dice().map(|(idx, _)| idx).collect()
    }

    pub fn dice_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.dice_count() == 0
    }

    pub fn effective_values(&self) -> Vec<u8> {
        self.dice().map(|(_, die)| die.effective_value()).collect()
    }

    pub fn totals(&self) -> Vec<(usize, Points)> {
        self.dice().map(|(idx, die)| (idx, die.total())).collect()
    }
}
