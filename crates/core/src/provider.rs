use crate::{Board, Die, DieKind, GridShape, RngState, Upgrade, UpgradeKind};
use std::collections::VecDeque;
use tracing::warn;

/// Supplies the next board when a glitch chains into another resolution.
pub trait BoardProvider {
    fn next_board(&mut self, rng: &mut RngState) -> Board;
}

impl<F> BoardProvider for F
where
    F: FnMut(&mut RngState) -> Board,
{
    fn next_board(&mut self, rng: &mut RngState) -> Board {
        self(rng)
    }
}

/// Pips Twin's Blessing forces on the first five dice of a round.
pub const TWINS_BLESSING_PIPS: [u8; 5] = [2, 2, 4, 4, 6];

/// Rolls `dice_per_roll` dice into shuffled distinct slots.
///
/// The first roll after [`RandomBoardProvider::start_round`] honors the
/// roll upgrades: Twin's Blessing rewrites the lowest five slots to
/// [`TWINS_BLESSING_PIPS`] and Magic Dice turns the lowest slot into a six.
/// Kinds are kept.
#[derive(Debug, Clone)]
pub struct RandomBoardProvider {
    pub shape: GridShape,
    pub dice_per_roll: usize,
    /// Probability that a rolled die is drawn from `special_pool` instead of `Normal`.
    pub special_chance: f64,
    pub special_pool: Vec<DieKind>,
    pub twins_blessing: bool,
    pub magic_dice: bool,
    fresh_round: bool,
}

impl RandomBoardProvider {
    pub fn new(shape: GridShape) -> Self {
        Self {
            shape,
            dice_per_roll: 5,
            special_chance: 0.0,
            special_pool: DieKind::ALL
                .into_iter()
                .filter(|kind| kind.is_special())
                .collect(),
            twins_blessing: false,
            magic_dice: false,
            fresh_round: true,
        }
    }

    pub fn with_special_chance(mut self, chance: f64) -> Self {
        self.special_chance = chance;
        self
    }

    /// Enables the roll upgrades present in `upgrades`.
    pub fn with_roll_upgrades(mut self, upgrades: &[Upgrade]) -> Self {
        self.twins_blessing = upgrades
            .iter()
            .any(|upgrade| upgrade.kind == UpgradeKind::TwinsBlessing);
        self.magic_dice = upgrades
            .iter()
            .any(|upgrade| upgrade.kind == UpgradeKind::MagicDice);
        self
    }

    /// Marks the next roll as the first of a round.
    pub fn start_round(&mut self) {
        self.fresh_round = true;
    }

    fn bless_first_roll(&self, rolls: &mut [(usize, u8, DieKind)]) {
        if self.twins_blessing && rolls.len() >= TWINS_BLESSING_PIPS.len() {
            for (roll, pips) in rolls.iter_mut().zip(TWINS_BLESSING_PIPS) {
                roll.1 = pips;
            }
        }
        if self.magic_dice {
            if let Some(first) = rolls.first_mut() {
                first.1 = 6;
            }
        }
    }
}

impl Default for RandomBoardProvider {
    fn default() -> Self {
        Self::new(GridShape::REFERENCE)
    }
}

impl BoardProvider for RandomBoardProvider {
    fn next_board(&mut self, rng: &mut RngState) -> Board {
        let mut board = Board::new(self.shape);
        let mut slots: Vec<usize> = (0..self.shape.len()).collect();
        rng.shuffle(&mut slots);
        let mut rolls: Vec<(usize, u8, DieKind)> = slots
            .into_iter()
            .take(self.dice_per_roll)
            .map(|slot| {
                let value = rng.roll_pips();
                let kind = if rng.chance(self.special_chance) {
                    rng.pick(&self.special_pool).copied().unwrap_or(DieKind::Normal)
                } else {
                    DieKind::Normal
                };
                (slot, value, kind)
            })
            .collect();
        rolls.sort_by_key(|roll| roll.0);
        if std::mem::take(&mut self.fresh_round) {
            self.bless_first_roll(&mut rolls);
        }
        for (slot, value, kind) in rolls {
            if let Err(err) = board.place(slot, Die::new(value, kind)) {
                warn!(error = %err, "skipping rolled die");
            }
        }
        board
    }
}

/// Replays prepared boards in order, then keeps handing out empty boards.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBoards {
    boards: VecDeque<Board>,
}

impl ScriptedBoards {
    pub fn new(boards: impl IntoIterator<Item = Board>) -> Self {
        Self {
            boards: boards.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.boards.len()
    }
}

impl BoardProvider for ScriptedBoards {
    fn next_board(&mut self, _rng: &mut RngState) -> Board {
        self.boards.pop_front().unwrap_or_default()
    }
}
