use serde::{Deserialize, Serialize};

pub use glitchdice_core::{ComboConfig, EngineConfig, HandRule, ScoringContext, StraightRule};

/// On-disk board. Dimensions default to the reference 3x5 grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSpec {
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default = "default_columns")]
    pub columns: usize,
    #[serde(default)]
    pub dice: Vec<DieSpec>,
}

fn default_rows() -> usize {
    glitchdice_core::GridShape::REFERENCE.rows
}

fn default_columns() -> usize {
    glitchdice_core::GridShape::REFERENCE.columns
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DieSpec {
    pub slot: usize,
    pub value: u8,
    /// Free-form tag such as "buff" or "Steel Dice"; unknown tags load as normal dice.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub rounds_held: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeSpec {
    pub name: String,
    /// Falls back to the entry's position in the list.
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub consumable: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadoutSpec {
    #[serde(default)]
    pub upgrades: Vec<UpgradeSpec>,
    #[serde(default)]
    pub context: Option<ScoringContext>,
}
