//! Dice scoring engine. Keep this crate free of IO and platform concerns.

pub mod combo;
pub mod config;
pub mod dice;
pub mod effects;
pub mod events;
pub mod grid;
pub mod hand;
pub mod provider;
pub mod rng;
pub mod scoring;
pub mod state;
pub mod upgrades;

/// Score unit. Every aggregate saturates at `Points::MAX` and never goes negative.
pub type Points = i32;

pub use combo::*;
pub use config::*;
pub use dice::*;
pub use effects::*;
pub use events::*;
pub use grid::*;
pub use hand::*;
pub use provider::*;
pub use rng::*;
pub use scoring::*;
pub use state::*;
pub use upgrades::*;
