use serde::{Deserialize, Serialize};

use crate::core::day_type::HunterZone;
use crate::core::score::ScoreSnapshot;
use crate::models::Direction;

const PCR_ALIGNMENT_WEIGHT: f64 = 20.0;
const INDEX_SYNC_WEIGHT: f64 = 30.0;
const SCORE_FORCE_WEIGHT: f64 = 30.0;
const VALUE_AREA_WEIGHT: f64 = 20.0;

/// Score strength above which the "score force" weight is granted.
const SCORE_FORCE_THRESHOLD: i32 = 10;

/// The four binary conviction signals blended into a 0-100 confidence value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbabilityInputs {
    pub pcr_alignment: bool,
    pub index_sync: bool,
    pub score_force: bool,
    pub value_area: bool,
}

impl ProbabilityInputs {
    /// Derive the signals for a candidate trade. `index_sync` comes from the
    /// session context (cross-index agreement is resolved outside the
    /// per-instrument engine; single-index runs pass true).
    pub fn for_candidate(
        direction: Direction,
        score: &ScoreSnapshot,
        pcr: f64,
        price: f64,
        zone: &HunterZone,
        index_sync: bool,
    ) -> Self {
        let pcr_alignment = match direction {
            Direction::Long => pcr > 1.0,
            Direction::Short => pcr < 1.0,
        };
        Self {
            pcr_alignment,
            index_sync,
            score_force: score.total.abs() > SCORE_FORCE_THRESHOLD,
            value_area: zone.contains(price),
        }
    }
}

/// Weighted sum of whichever signals are true: 20 + 30 + 30 + 20 = 100 max.
pub fn probability_score(inputs: &ProbabilityInputs) -> f64 {
    let mut score = 0.0;
    if inputs.pcr_alignment {
        score += PCR_ALIGNMENT_WEIGHT;
    }
    if inputs.index_sync {
        score += INDEX_SYNC_WEIGHT;
    }
    if inputs.score_force {
        score += SCORE_FORCE_WEIGHT;
    }
    if inputs.value_area {
        score += VALUE_AREA_WEIGHT;
    }
    score
}
