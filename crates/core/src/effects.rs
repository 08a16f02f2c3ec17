use crate::{Board, Die, DieKind, DieScore, Neighborhood, RngState, ScoreOverride, ScoringContext};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

pub const ANCIENT_EVOLVE_ROUNDS: u32 = 3;

/// Area handlers run stage by stage so swaps and dampening see every emitted buff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AreaStage {
    Emit,
    Transform,
    Dampen,
}

impl AreaStage {
    pub const ALL: [AreaStage; 3] = [AreaStage::Emit, AreaStage::Transform, AreaStage::Dampen];
}

pub type SelfEffect = fn(&PhaseView<'_>, &mut DieScore);
pub type AreaEffect = fn(&mut AreaView<'_>);

/// Read-only view for the self and copy passes. Neighbor state comes from a
/// snapshot taken when the pass started.
pub struct PhaseView<'a> {
    pub slot: usize,
    pub die: &'a Die,
    pub board: &'a Board,
    pub ctx: &'a ScoringContext,
    snapshot: &'a [Option<DieScore>],
}

impl<'a> PhaseView<'a> {
    pub fn neighbors(&self, shape: Neighborhood) -> impl Iterator<Item = (usize, &'a DieScore)> + 'a {
        let snapshot = self.snapshot;
        self.board
            .shape()
            .neighbors(self.slot, shape)
            .into_iter()
            .filter_map(move |idx| snapshot.get(idx).and_then(Option::as_ref).map(|s| (idx, s)))
    }
}

pub struct AreaView<'a> {
    pub slot: usize,
    pub die: &'a Die,
    pub board: &'a Board,
    pub ctx: &'a ScoringContext,
    pub rng: &'a mut RngState,
    scores: &'a mut [Option<DieScore>],
}

impl AreaView<'_> {
    /// Occupied neighbor slots in ascending order.
    pub fn neighbor_slots(&self, shape: Neighborhood) -> Vec<usize> {
        self.board
            .shape()
            .neighbors(self.slot, shape)
            .into_iter()
            .filter(|idx| matches!(self.scores.get(*idx), Some(Some(_))))
            .collect()
    }

    pub fn score_mut(&mut self, slot: usize) -> Option<&mut DieScore> {
        self.scores.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn acting_mut(&mut self) -> Option<&mut DieScore> {
        let slot = self.slot;
        self.score_mut(slot)
    }

    pub fn for_each_neighbor(&mut self, shape: Neighborhood, mut apply: impl FnMut(&mut DieScore)) {
        for idx in self.neighbor_slots(shape) {
            if let Some(score) = self.score_mut(idx) {
                apply(score);
            }
        }
    }
}

#[derive(Clone, Copy, Default)]
pub struct DieHandlers {
    pub nerf_immune: bool,
    pub on_self: Option<SelfEffect>,
    pub on_copy: Option<SelfEffect>,
    pub on_area: Option<(AreaStage, AreaEffect)>,
}

impl fmt::Debug for DieHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DieHandlers")
            .field("nerf_immune", &self.nerf_immune)
            .field("on_self", &self.on_self.is_some())
            .field("on_copy", &self.on_copy.is_some())
            .field("on_area", &self.on_area.map(|(stage, _)| stage))
            .finish()
    }
}

/// Per-kind handler table. Kinds without an entry resolve as `Normal`.
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    handlers: HashMap<DieKind, DieHandlers>,
}

impl EffectRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(
            DieKind::Steel,
            DieHandlers {
                nerf_immune: true,
                ..DieHandlers::default()
            },
        );
        registry.register_self(DieKind::Time, time_self);
        registry.register_self(DieKind::Ancient, ancient_self);
        registry.register_self(DieKind::Ice, ice_self);
        registry.register_self(DieKind::Comeback, comeback_self);
        registry.register_self(DieKind::Laser, laser_self);
        registry.register_self(DieKind::Glass, glass_self);
        registry.register(
            DieKind::Chameleon,
            DieHandlers {
                on_copy: Some(chameleon_copy),
                ..DieHandlers::default()
            },
        );
        registry.register(
            DieKind::Mirror,
            DieHandlers {
                on_copy: Some(mirror_copy),
                ..DieHandlers::default()
            },
        );
        registry.register(
            DieKind::Offer,
            DieHandlers {
                on_self: Some(offer_self),
                on_area: Some((AreaStage::Emit, offer_area)),
                ..DieHandlers::default()
            },
        );
        registry.register_area(DieKind::Buff, AreaStage::Emit, buff_area);
        registry.register_area(DieKind::Spring, AreaStage::Emit, spring_area);
        registry.register_area(DieKind::Splash, AreaStage::Emit, splash_area);
        registry.register_area(DieKind::TimeAttack, AreaStage::Emit, time_attack_area);
        registry.register_area(DieKind::Reflect, AreaStage::Transform, reflect_area);
        registry.register_area(DieKind::Absorb, AreaStage::Transform, absorb_area);
        registry.register_area(DieKind::Rubber, AreaStage::Dampen, rubber_area);
        registry
    }

    pub fn register(&mut self, kind: DieKind, handlers: DieHandlers) -> Option<DieHandlers> {
        self.handlers.insert(kind, handlers)
    }

    fn register_self(&mut self, kind: DieKind, effect: SelfEffect) {
        self.register(
            kind,
            DieHandlers {
                on_self: Some(effect),
                ..DieHandlers::default()
            },
        );
    }

    fn register_area(&mut self, kind: DieKind, stage: AreaStage, effect: AreaEffect) {
        self.register(
            kind,
            DieHandlers {
                on_area: Some((stage, effect)),
                ..DieHandlers::default()
            },
        );
    }

    pub fn handlers(&self, kind: DieKind) -> DieHandlers {
        self.handlers.get(&kind).copied().unwrap_or_default()
    }

    /// Recomputes every die's derived fields. Reset discards all prior state,
    /// so an unchanged board and RNG state always produce the same totals.
    pub fn resolve(&self, board: &mut Board, ctx: &ScoringContext, rng: &mut RngState) {
        let len = board.shape().len();
        let mut scores: Vec<Option<DieScore>> = (0..len)
            .map(|idx| {
                board
                    .die(idx)
                    .map(|die| DieScore::reset(die.value, self.handlers(die.kind).nerf_immune))
            })
            .collect();

        self.run_self_pass(board, ctx, &mut scores, |handlers| handlers.on_self);
        self.run_self_pass(board, ctx, &mut scores, |handlers| handlers.on_copy);
        self.run_area_phase(board, ctx, rng, &mut scores);

        let mut total: i64 = 0;
        for (slot, die) in board.dice_mut() {
            if let Some(mut score) = scores.get_mut(slot).and_then(Option::take) {
                total += i64::from(score.finalize());
                die.score = score;
            }
        }
        debug!(dice = board.dice_count(), total = total, "dice resolved");
    }

    fn run_self_pass(
        &self,
        board: &Board,
        ctx: &ScoringContext,
        scores: &mut [Option<DieScore>],
        pick: impl Fn(&DieHandlers) -> Option<SelfEffect>,
    ) {
        let snapshot = scores.to_vec();
        for (slot, die) in board.dice() {
            let Some(effect) = pick(&self.handlers(die.kind)) else {
                continue;
            };
            let Some(score) = scores.get_mut(slot).and_then(Option::as_mut) else {
                continue;
            };
            let view = PhaseView {
                slot,
                die,
                board,
                ctx,
                snapshot: &snapshot,
            };
            effect(&view, score);
        }
    }

    fn run_area_phase(
        &self,
        board: &Board,
        ctx: &ScoringContext,
        rng: &mut RngState,
        scores: &mut [Option<DieScore>],
    ) {
        for stage in AreaStage::ALL {
            for (slot, die) in board.dice() {
                let Some((die_stage, effect)) = self.handlers(die.kind).on_area else {
                    continue;
                };
                if die_stage != stage {
                    continue;
                }
                let mut view = AreaView {
                    slot,
                    die,
                    board,
                    ctx,
                    rng: &mut *rng,
                    scores: &mut *scores,
                };
                effect(&mut view);
            }
        }
    }
}

/// Integer halving truncates toward zero.
pub fn halve(value: i32) -> i32 {
    value / 2
}

fn time_self(view: &PhaseView<'_>, score: &mut DieScore) {
    score.score_multiplier += 0.1 * f64::from(view.die.rounds_held);
}

fn ancient_self(view: &PhaseView<'_>, score: &mut DieScore) {
    if view.die.rounds_held >= ANCIENT_EVOLVE_ROUNDS {
        score.bonus_score += 10;
    }
}

fn ice_self(view: &PhaseView<'_>, score: &mut DieScore) {
    score.bonus_score += if view.slot % 2 == 0 { 5 } else { -4 };
}

fn comeback_self(view: &PhaseView<'_>, score: &mut DieScore) {
    if view.ctx.hands_left == 1 {
        score.score_multiplier += 0.5;
    }
}

fn laser_self(view: &PhaseView<'_>, score: &mut DieScore) {
    let lined = view.neighbors(Neighborhood::Lines).count() as i32;
    score.bonus_score += 3 * lined;
}

fn glass_self(_view: &PhaseView<'_>, score: &mut DieScore) {
    if score.effective_value <= 2 {
        score.score_override = Some(ScoreOverride::Zero);
    } else {
        score.score_multiplier += 1.0;
    }
}

fn offer_self(_view: &PhaseView<'_>, score: &mut DieScore) {
    score.score_override = Some(ScoreOverride::Zero);
}

fn chameleon_copy(view: &PhaseView<'_>, score: &mut DieScore) {
    let highest = view
        .neighbors(Neighborhood::Orthogonal)
        .map(|(_, neighbor)| neighbor.effective_value)
        .max();
    if let Some(value) = highest {
        score.effective_value = value;
        score.base_score = i32::from(value);
    }
}

fn mirror_copy(view: &PhaseView<'_>, score: &mut DieScore) {
    let best = view
        .neighbors(Neighborhood::Orthogonal)
        .min_by_key(|(slot, neighbor)| (Reverse(neighbor.effective_value), *slot));
    if let Some((_, neighbor)) = best {
        score.bonus_score = neighbor.bonus_score;
        score.score_override = Some(ScoreOverride::Multiplier(neighbor.score_multiplier));
    }
}

fn buff_area(view: &mut AreaView<'_>) {
    view.for_each_neighbor(Neighborhood::Orthogonal, |n| {
        n.external_buff_multiplier += 2.0;
    });
}

fn spring_area(view: &mut AreaView<'_>) {
    view.for_each_neighbor(Neighborhood::Orthogonal, |n| {
        n.external_buff_multiplier += 1.0;
    });
    view.for_each_neighbor(Neighborhood::Diagonal, |n| n.add_nerf(0.5));
}

fn splash_area(view: &mut AreaView<'_>) {
    for idx in view.neighbor_slots(Neighborhood::Orthogonal) {
        let roulette = view.rng.range_f64(0.5, 2.0);
        if let Some(n) = view.score_mut(idx) {
            if roulette >= 1.0 {
                n.external_buff_multiplier += roulette - 1.0;
            } else {
                n.add_nerf(1.0 - roulette);
            }
        }
    }
}

fn offer_area(view: &mut AreaView<'_>) {
    view.for_each_neighbor(Neighborhood::Block, |n| {
        n.external_buff_multiplier += 2.0;
    });
}

fn time_attack_area(view: &mut AreaView<'_>) {
    let bonus = i32::try_from(view.ctx.hands_spent())
        .unwrap_or(i32::MAX)
        .saturating_mul(2);
    if bonus == 0 {
        return;
    }
    view.for_each_neighbor(Neighborhood::Orthogonal, |n| {
        n.bonus_score = n.bonus_score.saturating_add(bonus);
    });
}

fn reflect_area(view: &mut AreaView<'_>) {
    view.for_each_neighbor(Neighborhood::Orthogonal, |n| {
        std::mem::swap(
            &mut n.external_buff_multiplier,
            &mut n.external_nerf_multiplier,
        );
    });
}

fn absorb_area(view: &mut AreaView<'_>) {
    let mut absorbed = 0.0;
    view.for_each_neighbor(Neighborhood::Block, |n| {
        if n.external_buff_multiplier > 1.0 {
            absorbed += n.external_buff_multiplier - 1.0;
            n.external_buff_multiplier = 1.0;
        }
    });
    if let Some(acting) = view.acting_mut() {
        acting.external_buff_multiplier += absorbed;
    }
}

fn rubber_area(view: &mut AreaView<'_>) {
    view.for_each_neighbor(Neighborhood::Block, |n| {
        n.external_buff_multiplier = 1.0 + (n.external_buff_multiplier - 1.0) * 0.5;
        n.external_nerf_multiplier = 1.0 - (1.0 - n.external_nerf_multiplier) * 0.5;
        n.bonus_score = halve(n.bonus_score);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(board: &mut Board) {
        resolve_with(board, &ScoringContext::default());
    }

    fn resolve_with(board: &mut Board, ctx: &ScoringContext) {
        let mut rng = RngState::from_seed(1);
        EffectRegistry::builtin().resolve(board, ctx, &mut rng);
    }

    fn board_with(dice: &[(usize, u8, DieKind)]) -> Board {
        let mut board = Board::default();
        for (slot, value, kind) in dice {
            board.place(*slot, Die::new(*value, *kind)).expect("place");
        }
        board
    }

    fn score(board: &Board, slot: usize) -> &DieScore {
        &board.die(slot).expect("die").score
    }

    #[test]
    fn buff_reaches_only_orthogonal_neighbors() {
        let mut board = Board::default();
        for slot in 0..15 {
            board.place(slot, Die::normal(2)).expect("place");
        }
        board.place(7, Die::new(2, DieKind::Buff)).expect("place");
        resolve(&mut board);
        for slot in 0..15 {
            let expected = if [2, 6, 8, 12].contains(&slot) { 3.0 } else { 1.0 };
            assert_eq!(score(&board, slot).external_buff_multiplier, expected, "slot {slot}");
        }
        assert_eq!(score(&board, 2).total_score_calculated, 6);
    }

    #[test]
    fn steel_ignores_nerfs() {
        // Spring at 7 nerfs diagonals 1, 3, 11, 13.
        let mut board = board_with(&[
            (7, 1, DieKind::Spring),
            (1, 4, DieKind::Steel),
            (3, 4, DieKind::Normal),
        ]);
        resolve(&mut board);
        let steel = score(&board, 1);
        assert!(steel.nerf_immune);
        assert_eq!(steel.external_nerf_multiplier, 0.5);
        assert_eq!(steel.effective_external_multiplier(), 1.0);
        assert_eq!(steel.total_score_calculated, 4);
        assert_eq!(score(&board, 3).total_score_calculated, 2);
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let mut board = board_with(&[
            (0, 3, DieKind::Laser),
            (1, 5, DieKind::Buff),
            (2, 2, DieKind::Chameleon),
            (6, 6, DieKind::Absorb),
            (7, 4, DieKind::Splash),
            (8, 1, DieKind::Rubber),
            (12, 3, DieKind::Mirror),
        ]);
        let ctx = ScoringContext::default();
        let registry = EffectRegistry::builtin();
        let rng = RngState::from_seed(99);

        registry.resolve(&mut board, &ctx, &mut rng.clone());
        let first = board.totals();
        registry.resolve(&mut board, &ctx, &mut rng.clone());
        assert_eq!(board.totals(), first);
    }

    #[test]
    fn chameleon_copies_highest_orthogonal_value() {
        let mut board = board_with(&[
            (7, 1, DieKind::Chameleon),
            (6, 5, DieKind::Normal),
            (8, 3, DieKind::Normal),
            (1, 6, DieKind::Normal),
        ]);
        resolve(&mut board);
        let chameleon = score(&board, 7);
        assert_eq!(chameleon.effective_value, 5);
        assert_eq!(chameleon.base_score, 5);
        assert_eq!(board.die(7).map(|die| die.value), Some(1));
    }

    #[test]
    fn chameleon_without_neighbors_keeps_its_value() {
        let mut board = board_with(&[(7, 2, DieKind::Chameleon), (0, 6, DieKind::Normal)]);
        resolve(&mut board);
        assert_eq!(score(&board, 7).effective_value, 2);
    }

    #[test]
    fn mirror_copies_best_neighbor_after_self_pass() {
        let mut board = board_with(&[
            (7, 2, DieKind::Mirror),
            (6, 5, DieKind::Glass),
            (8, 5, DieKind::Normal),
        ]);
        resolve(&mut board);
        let mirror = score(&board, 7);
        // Tie on value 5: the lower slot (the glass die, multiplier 2.0) wins.
        assert_eq!(mirror.score_override, Some(ScoreOverride::Multiplier(2.0)));
        assert_eq!(mirror.total_score_calculated, 4);
    }

    #[test]
    fn absorb_takes_positive_buffs() {
        let mut board = board_with(&[
            (7, 2, DieKind::Buff),
            (8, 3, DieKind::Absorb),
            (2, 4, DieKind::Normal),
        ]);
        resolve(&mut board);
        // Buff gives +2.0 to 2 and 8; absorb sits next to 2 (diagonal) and takes it.
        assert_eq!(score(&board, 2).external_buff_multiplier, 1.0);
        assert_eq!(score(&board, 8).external_buff_multiplier, 5.0);
        assert_eq!(score(&board, 8).total_score_calculated, 15);
    }

    #[test]
    fn reflect_swaps_after_emitters() {
        let mut board = board_with(&[
            (0, 2, DieKind::Spring),
            (6, 4, DieKind::Normal),
            (7, 3, DieKind::Reflect),
        ]);
        resolve(&mut board);
        // Spring nerfs 6 to 0.5, reflect then swaps it into the buff slot.
        let target = score(&board, 6);
        assert_eq!(target.external_buff_multiplier, 0.5);
        assert_eq!(target.external_nerf_multiplier, 1.0);
        assert_eq!(target.total_score_calculated, 2);
    }

    #[test]
    fn rubber_halves_toward_neutral_and_truncates_bonus() {
        let mut board = board_with(&[
            (0, 4, DieKind::Laser),
            (1, 2, DieKind::Buff),
            (6, 1, DieKind::Rubber),
        ]);
        resolve(&mut board);
        let laser = score(&board, 0);
        // Laser sees slot 1 in its row: bonus 3, halved toward zero to 1.
        assert_eq!(laser.bonus_score, 1);
        assert_eq!(laser.external_buff_multiplier, 2.0);
        assert_eq!(laser.total_score_calculated, 10);
        assert_eq!(halve(-3), -1);
        assert_eq!(halve(3), 1);
    }

    #[test]
    fn glass_and_offer_overrides() {
        let mut board = board_with(&[
            (0, 2, DieKind::Glass),
            (4, 5, DieKind::Glass),
            (11, 6, DieKind::Offer),
            (5, 3, DieKind::Normal),
        ]);
        resolve(&mut board);
        assert_eq!(score(&board, 0).total_score_calculated, 0);
        assert_eq!(score(&board, 4).total_score_calculated, 10);
        assert_eq!(score(&board, 11).total_score_calculated, 0);
        assert_eq!(score(&board, 5).total_score_calculated, 9);
    }

    #[test]
    fn context_driven_dice() {
        let ctx = ScoringContext {
            hands_left: 1,
            max_hands: 3,
            ..ScoringContext::default()
        };
        let mut board = board_with(&[
            (0, 4, DieKind::Comeback),
            (10, 2, DieKind::TimeAttack),
            (5, 4, DieKind::Normal),
        ]);
        board
            .place(14, Die::new(5, DieKind::Time).with_rounds_held(10))
            .expect("place");
        board
            .place(12, Die::new(1, DieKind::Ancient).with_rounds_held(3))
            .expect("place");
        resolve_with(&mut board, &ctx);
        assert_eq!(score(&board, 0).total_score_calculated, 6);
        // Two hands spent: time attack at 10 adds 4 points to its cross neighbor 5.
        assert_eq!(score(&board, 5).bonus_score, 4);
        assert_eq!(score(&board, 5).external_buff_multiplier, 1.0);
        assert_eq!(score(&board, 5).total_score_calculated, 8);
        assert_eq!(score(&board, 14).total_score_calculated, 10);
        assert_eq!(score(&board, 12).total_score_calculated, 11);
    }

    #[test]
    fn splash_rolls_one_roulette_per_neighbor() {
        for seed in 0..16 {
            let mut board = board_with(&[
                (7, 3, DieKind::Splash),
                (2, 6, DieKind::Normal),
                (6, 6, DieKind::Normal),
                (8, 6, DieKind::Normal),
                (12, 6, DieKind::Normal),
            ]);
            let ctx = ScoringContext::default();
            EffectRegistry::builtin().resolve(&mut board, &ctx, &mut RngState::from_seed(seed));

            let mut replay = RngState::from_seed(seed);
            for slot in [2, 6, 8, 12] {
                let roulette = replay.range_f64(0.5, 2.0);
                let target = score(&board, slot);
                if roulette >= 1.0 {
                    assert!((1.0..2.0).contains(&target.external_buff_multiplier));
                    assert_eq!(target.external_buff_multiplier, 1.0 + (roulette - 1.0));
                    assert_eq!(target.external_nerf_multiplier, 1.0);
                } else {
                    assert_eq!(target.external_buff_multiplier, 1.0);
                    assert!((0.5..1.0).contains(&target.external_nerf_multiplier));
                    assert_eq!(target.external_nerf_multiplier, 1.0 - (1.0 - roulette));
                }
            }
            assert_eq!(score(&board, 7).external_buff_multiplier, 1.0);
        }
    }

    #[test]
    fn splash_follows_the_seed() {
        let build = || {
            board_with(&[
                (7, 3, DieKind::Splash),
                (2, 6, DieKind::Normal),
                (6, 6, DieKind::Normal),
                (8, 6, DieKind::Normal),
                (12, 6, DieKind::Normal),
            ])
        };
        let ctx = ScoringContext::default();
        let registry = EffectRegistry::builtin();
        let totals_for = |seed: u64| {
            let mut board = build();
            registry.resolve(&mut board, &ctx, &mut RngState::from_seed(seed));
            board.totals()
        };

        assert_eq!(totals_for(21), totals_for(21));
        let distinct: std::collections::BTreeSet<Vec<(usize, i32)>> =
            (0..32).map(totals_for).collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn time_attack_waits_for_a_spent_hand() {
        let mut board = board_with(&[(10, 2, DieKind::TimeAttack), (5, 4, DieKind::Normal)]);
        resolve(&mut board);
        assert_eq!(score(&board, 5).bonus_score, 0);
        assert_eq!(score(&board, 5).total_score_calculated, 4);
    }

    #[test]
    fn ice_depends_on_slot_parity() {
        let mut board = board_with(&[(2, 3, DieKind::Ice), (3, 6, DieKind::Ice)]);
        resolve(&mut board);
        assert_eq!(score(&board, 2).total_score_calculated, 8);
        assert_eq!(score(&board, 3).total_score_calculated, 2);
    }

    #[test]
    fn unregistered_kind_behaves_as_normal() {
        let mut board = board_with(&[(7, 3, DieKind::Buff), (8, 3, DieKind::Normal)]);
        let mut rng = RngState::from_seed(1);
        EffectRegistry::empty().resolve(&mut board, &ScoringContext::default(), &mut rng);
        assert_eq!(board.totals(), vec![(7, 3), (8, 3)]);
    }
}
