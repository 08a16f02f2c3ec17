use crate::schema::{BoardSpec, LoadoutSpec};
use anyhow::Context;
use glitchdice_core::{
    Board, Die, DieKind, EngineConfig, GridShape, ScoringContext, Upgrade, UpgradeKind,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub const ENGINE_CONFIG_FILE: &str = "engine.json";

/// Upgrades plus the scoring context they were captured with.
#[derive(Debug, Clone, Default)]
pub struct Loadout {
    pub upgrades: Vec<Upgrade>,
    pub context: ScoringContext,
}

/// Reads `engine.json` from an assets directory. A missing file yields the
/// built-in defaults; a present file must parse and validate.
pub fn load_engine_config(dir: &Path) -> anyhow::Result<EngineConfig> {
    let path = dir.join(ENGINE_CONFIG_FILE);
    if !path.exists() {
        debug!(path = %path.display(), "no engine config, using defaults");
        return Ok(EngineConfig::default());
    }
    let config: EngineConfig = load_json(&path)?;
    config
        .validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(config)
}

pub fn load_board(path: &Path) -> anyhow::Result<Board> {
    let spec: BoardSpec = load_json(path)?;
    board_from_spec(&spec).with_context(|| format!("build board {}", path.display()))
}

pub fn board_from_spec(spec: &BoardSpec) -> anyhow::Result<Board> {
    let shape = GridShape::new(spec.rows, spec.columns);
    let mut board = Board::try_new(shape).context("board dimensions")?;
    for die in &spec.dice {
        let kind = die
            .kind
            .as_deref()
            .map(DieKind::from_tag_lenient)
            .unwrap_or(DieKind::Normal);
        let previous = board
            .place(
                die.slot,
                Die::new(die.value, kind).with_rounds_held(die.rounds_held),
            )
            .with_context(|| format!("place die at slot {}", die.slot))?;
        if previous.is_some() {
            warn!(slot = die.slot, "slot listed twice, keeping the later die");
        }
    }
    Ok(board)
}

pub fn load_loadout(path: &Path) -> anyhow::Result<Loadout> {
    let spec: LoadoutSpec = load_json(path)?;
    Ok(loadout_from_spec(&spec))
}

/// Unknown upgrade names are skipped with a warning.
pub fn loadout_from_spec(spec: &LoadoutSpec) -> Loadout {
    let mut upgrades = Vec::with_capacity(spec.upgrades.len());
    for (index, entry) in spec.upgrades.iter().enumerate() {
        let Some(kind) = UpgradeKind::from_name(&entry.name) else {
            warn!(name = %entry.name, "unknown upgrade, skipping");
            continue;
        };
        let order = entry.order.unwrap_or(index as u32);
        upgrades.push(if entry.consumable {
            Upgrade::consumable(kind, order)
        } else {
            Upgrade::passive(kind, order)
        });
    }
    Loadout {
        upgrades,
        context: spec.context.clone().unwrap_or_default(),
    }
}

fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let value = serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DieSpec, UpgradeSpec};

    fn die(slot: usize, value: u8, kind: Option<&str>) -> DieSpec {
        DieSpec {
            slot,
            value,
            kind: kind.map(str::to_string),
            rounds_held: 0,
        }
    }

    #[test]
    fn builds_board_with_lenient_tags() {
        let spec = BoardSpec {
            rows: 3,
            columns: 5,
            dice: vec![die(7, 4, Some("Buff Dice")), die(8, 2, Some("??")), die(0, 1, None)],
        };
        let board = board_from_spec(&spec).expect("board");
        assert_eq!(board.die(7).map(|d| d.kind), Some(DieKind::Buff));
        assert_eq!(board.die(8).map(|d| d.kind), Some(DieKind::Normal));
        assert_eq!(board.dice_count(), 3);
    }

    #[test]
    fn rejects_out_of_bounds_slot() {
        let spec = BoardSpec {
            rows: 3,
            columns: 5,
            dice: vec![die(15, 4, None)],
        };
        let err = board_from_spec(&spec).expect_err("slot 15 is outside 3x5");
        assert!(format!("{err:#}").contains("slot 15"));
    }

    #[test]
    fn rejects_unallocatable_dimensions() {
        for (rows, columns) in [(usize::MAX, 4), (100_000, 100_000), (0, 5)] {
            let spec = BoardSpec {
                rows,
                columns,
                dice: vec![],
            };
            let err = board_from_spec(&spec).expect_err("dimensions are out of range");
            assert!(format!("{err:#}").contains("board dimensions"));
        }
    }

    #[test]
    fn loadout_orders_default_to_position() {
        let spec = LoadoutSpec {
            upgrades: vec![
                UpgradeSpec {
                    name: "devil dice".to_string(),
                    order: None,
                    consumable: false,
                },
                UpgradeSpec {
                    name: "Mystery Relic".to_string(),
                    order: None,
                    consumable: false,
                },
                UpgradeSpec {
                    name: "Glitch USB".to_string(),
                    order: Some(9),
                    consumable: true,
                },
            ],
            context: None,
        };
        let loadout = loadout_from_spec(&spec);
        assert_eq!(
            loadout.upgrades,
            vec![
                Upgrade::passive(UpgradeKind::DevilDice, 0),
                Upgrade::consumable(UpgradeKind::GlitchUsb, 9),
            ]
        );
        assert_eq!(loadout.context, ScoringContext::default());
    }
}
