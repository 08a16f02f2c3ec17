use crate::{HandCategory, Points, UpgradeKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    HandResolved {
        category: HandCategory,
        final_score: Points,
        is_glitch: bool,
    },
    UpgradeFired {
        upgrade: UpgradeKind,
        acquisition_order: u32,
    },
    GlitchChained {
        combo_count: u32,
        contribution: Points,
        stored_score: Points,
    },
    ComboSettled {
        combo_count: u32,
        stored_score: Points,
        round_total: Points,
        capped: bool,
    },
}

#[derive(Debug, Default)]
pub struct EventBus {
    queue: Vec<Event>,
}

impl EventBus {
    pub fn push(&mut self, event: Event) {
        self.queue.push(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
