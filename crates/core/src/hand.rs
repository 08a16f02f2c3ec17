use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    FullHouse,
    FourOfAKind,
    FiveOfAKind,
}

impl HandCategory {
    pub const ALL: [HandCategory; 8] = [
        HandCategory::HighCard,
        HandCategory::OnePair,
        HandCategory::TwoPair,
        HandCategory::ThreeOfAKind,
        HandCategory::Straight,
        HandCategory::FullHouse,
        HandCategory::FourOfAKind,
        HandCategory::FiveOfAKind,
    ];

    pub fn id(self) -> &'static str {
        match self {
            HandCategory::HighCard => "high_card",
            HandCategory::OnePair => "one_pair",
            HandCategory::TwoPair => "two_pair",
            HandCategory::ThreeOfAKind => "three_kind",
            HandCategory::Straight => "straight",
            HandCategory::FullHouse => "full_house",
            HandCategory::FourOfAKind => "four_kind",
            HandCategory::FiveOfAKind => "five_kind",
        }
    }

    /// Categories that chain into the combo loop without any upgrade help.
    /// Straight ranks above three of a kind but is not one of them.
    pub fn glitches(self) -> bool {
        matches!(
            self,
            HandCategory::ThreeOfAKind
                | HandCategory::FullHouse
                | HandCategory::FourOfAKind
                | HandCategory::FiveOfAKind
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StraightRule {
    /// At least this many consecutive values among the distinct values.
    Consecutive(usize),
    /// Exactly five dice whose values form a run of five.
    FullRun,
}

impl Default for StraightRule {
    fn default() -> Self {
        StraightRule::Consecutive(4)
    }
}

pub fn classify(values: &[u8]) -> HandCategory {
    classify_with_rule(values, StraightRule::default())
}

pub fn classify_with_rule(values: &[u8], rule: StraightRule) -> HandCategory {
    if values.is_empty() {
        return HandCategory::HighCard;
    }

    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
    }
    let groups_of = |size: usize| counts.values().filter(|c| **c >= size).count();
    let best = counts.values().copied().max().unwrap_or(0);

    if best >= 5 {
        return HandCategory::FiveOfAKind;
    }
    if best >= 4 {
        return HandCategory::FourOfAKind;
    }
    // A trip plus a different pair; with six or more dice two trips also qualify.
    if best >= 3 && groups_of(2) >= 2 {
        return HandCategory::FullHouse;
    }
    if is_straight(values, &counts, rule) {
        return HandCategory::Straight;
    }
    if best >= 3 {
        return HandCategory::ThreeOfAKind;
    }
    match groups_of(2) {
        0 => HandCategory::HighCard,
        1 => HandCategory::OnePair,
        _ => HandCategory::TwoPair,
    }
}

fn is_straight(values: &[u8], counts: &BTreeMap<u8, usize>, rule: StraightRule) -> bool {
    let distinct: BTreeSet<u8> = counts.keys().copied().collect();
    match rule {
        StraightRule::Consecutive(required) => longest_run(&distinct) >= required.max(1),
        StraightRule::FullRun => values.len() == 5 && distinct.len() == 5 && longest_run(&distinct) == 5,
    }
}

fn longest_run(distinct: &BTreeSet<u8>) -> usize {
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<u8> = None;
    for value in distinct {
        run = match previous {
            Some(prev) if prev + 1 == *value => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(*value);
    }
    best
}
