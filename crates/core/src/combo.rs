use crate::dice::clamp_points;
use crate::{
    BoardProvider, ComboConfig, Engine, Event, EventBus, Points, Resolution, RngState,
    ScoringContext, Upgrade,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComboState {
    pub combo_count: u32,
    pub stored_score: Points,
}

impl ComboState {
    /// Scales `final_score` by `growth^combo_count` at the current count.
    pub fn scaled(&self, final_score: Points, growth_factor: f64) -> Points {
        let exponent = i32::try_from(self.combo_count).unwrap_or(i32::MAX);
        clamp_points(f64::from(final_score) * growth_factor.powi(exponent))
    }

    /// Banks a glitch hand and bumps the combo count. Returns the contribution.
    pub fn absorb(&mut self, final_score: Points, growth_factor: f64) -> Points {
        let contribution = self.scaled(final_score, growth_factor);
        self.stored_score = self.stored_score.saturating_add(contribution);
        self.combo_count += 1;
        contribution
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComboPhase {
    Idle,
    Resolving,
    GlitchContinue,
    Settled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComboProgress {
    pub resolution: Resolution,
    pub contribution: Points,
    pub state: ComboState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComboOutcome {
    /// The hand that ended the chain. When the cap forced settlement this is
    /// the last glitch hand, already banked in `state.stored_score`.
    pub resolution: Resolution,
    pub state: ComboState,
    pub settled_score: Points,
    pub round_total: Points,
    pub capped: bool,
    pub rerolls_granted: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComboStep {
    Continue(ComboProgress),
    Settled(ComboOutcome),
}

/// Drives glitch chains for one round: Idle, then Resolving, looping through
/// GlitchContinue while hands glitch, until a non-glitch hand or the
/// iteration cap settles the round.
#[derive(Debug)]
pub struct ComboLoop<'e> {
    engine: &'e Engine,
    config: ComboConfig,
    phase: ComboPhase,
    state: ComboState,
    iterations: u32,
    rerolls_granted: u32,
    settled: Option<ComboOutcome>,
}

impl<'e> ComboLoop<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            config: engine.config().combo,
            phase: ComboPhase::Idle,
            state: ComboState::default(),
            iterations: 0,
            rerolls_granted: 0,
            settled: None,
        }
    }

    pub fn phase(&self) -> ComboPhase {
        self.phase
    }

    pub fn state(&self) -> ComboState {
        self.state
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn start_round(&mut self) {
        self.phase = ComboPhase::Idle;
        self.state = ComboState::default();
        self.iterations = 0;
        self.rerolls_granted = 0;
        self.settled = None;
    }

    /// Hands back the settled outcome, if any, and resets for the next round.
    pub fn submit(&mut self) -> Option<ComboOutcome> {
        let outcome = self.settled.take();
        self.start_round();
        outcome
    }

    /// Resolves one board. Once settled, repeated calls return the same
    /// outcome without pulling another board.
    pub fn step(
        &mut self,
        provider: &mut dyn BoardProvider,
        upgrades: &[Upgrade],
        ctx: &mut ScoringContext,
        rng: &mut RngState,
        events: &mut EventBus,
    ) -> ComboStep {
        if let Some(outcome) = &self.settled {
            return ComboStep::Settled(outcome.clone());
        }

        self.phase = ComboPhase::Resolving;
        let mut board = provider.next_board(rng);
        let resolution = self.engine.resolve(&mut board, upgrades, ctx, rng);
        ctx.streak = resolution.streak;
        self.iterations += 1;
        self.rerolls_granted += resolution.rerolls_granted;

        events.push(Event::HandResolved {
            category: resolution.hand.category,
            final_score: resolution.hand.final_score,
            is_glitch: resolution.hand.is_glitch,
        });
        for fired in &resolution.fired {
            events.push(Event::UpgradeFired {
                upgrade: fired.kind,
                acquisition_order: fired.acquisition_order,
            });
        }

        let growth = self.config.growth_factor;
        if !resolution.hand.is_glitch {
            let settled_score = self.state.scaled(resolution.hand.final_score, growth);
            return self.settle(resolution, settled_score, false, events);
        }

        let contribution = self.state.absorb(resolution.hand.final_score, growth);
        debug!(
            combo = self.state.combo_count,
            contribution = contribution,
            stored = self.state.stored_score,
            "glitch chained"
        );
        events.push(Event::GlitchChained {
            combo_count: self.state.combo_count,
            contribution,
            stored_score: self.state.stored_score,
        });

        if self.iterations >= self.config.iteration_cap {
            warn!(
                cap = self.config.iteration_cap,
                stored = self.state.stored_score,
                "combo iteration cap reached, settling"
            );
            return self.settle(resolution, 0, true, events);
        }

        self.phase = ComboPhase::GlitchContinue;
        ComboStep::Continue(ComboProgress {
            resolution,
            contribution,
            state: self.state,
        })
    }

    /// Steps until the round settles.
    pub fn run_to_settle(
        &mut self,
        provider: &mut dyn BoardProvider,
        upgrades: &[Upgrade],
        ctx: &mut ScoringContext,
        rng: &mut RngState,
        events: &mut EventBus,
    ) -> ComboOutcome {
        loop {
            if let ComboStep::Settled(outcome) = self.step(provider, upgrades, ctx, rng, events) {
                return outcome;
            }
        }
    }

    fn settle(
        &mut self,
        resolution: Resolution,
        settled_score: Points,
        capped: bool,
        events: &mut EventBus,
    ) -> ComboStep {
        let round_total = self.state.stored_score.saturating_add(settled_score);
        events.push(Event::ComboSettled {
            combo_count: self.state.combo_count,
            stored_score: self.state.stored_score,
            round_total,
            capped,
        });
        let outcome = ComboOutcome {
            resolution,
            state: self.state,
            settled_score,
            round_total,
            capped,
            rerolls_granted: self.rerolls_granted,
        };
        self.phase = ComboPhase::Settled;
        self.settled = Some(outcome.clone());
        ComboStep::Settled(outcome)
    }
}
