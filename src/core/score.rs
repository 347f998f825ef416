use serde::{Deserialize, Serialize};

use crate::core::evwma::EvwmaEngine;

const FAST_MAGNITUDE: i32 = 1;
const SLOW_MAGNITUDE: i32 = 5;

/// Microstructure confluence score, recomputed on every closed 1-minute bar.
/// Each component is strictly two-valued: the positive magnitude when price
/// (or slope) is strictly above the reference, the negative magnitude
/// otherwise. Total is therefore always one of the even values in [-12, 12].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    /// Price vs 5-minute average, weight 5.
    pub dyn5: i32,
    /// 5-minute average slope, weight 5.
    pub evm5: i32,
    /// Price vs 1-minute average, weight 1.
    pub dyn1: i32,
    /// 1-minute average slope, weight 1.
    pub evm1: i32,
    pub total: i32,
}

impl ScoreSnapshot {
    pub fn is_bullish(&self) -> bool {
        self.total > 0
    }

    pub fn is_bearish(&self) -> bool {
        self.total < 0
    }
}

fn component(positive: bool, magnitude: i32) -> i32 {
    if positive {
        magnitude
    } else {
        -magnitude
    }
}

/// None until both averages are seeded; an unseeded average is "no signal",
/// never a zero score.
pub fn microstructure_score(
    price: f64,
    evwma_1m: &EvwmaEngine,
    evwma_5m: &EvwmaEngine,
) -> Option<ScoreSnapshot> {
    let avg1 = evwma_1m.average()?;
    let avg5 = evwma_5m.average()?;
    let slope1 = evwma_1m.slope()?;
    let slope5 = evwma_5m.slope()?;

    let dyn5 = component(price > avg5, SLOW_MAGNITUDE);
    let evm5 = component(slope5 > 0.0, SLOW_MAGNITUDE);
    let dyn1 = component(price > avg1, FAST_MAGNITUDE);
    let evm1 = component(slope1 > 0.0, FAST_MAGNITUDE);

    Some(ScoreSnapshot {
        dyn5,
        evm5,
        dyn1,
        evm1,
        total: dyn5 + evm5 + dyn1 + evm1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_candles_with_volume;

    fn seeded_engines(closes_1m: &[f64], closes_5m: &[f64]) -> (EvwmaEngine, EvwmaEngine) {
        let mut e1 = EvwmaEngine::new(20.0);
        let mut e5 = EvwmaEngine::new(20.0);
        let bars1: Vec<(f64, f64, f64, f64, f64)> = closes_1m
            .iter()
            .map(|&c| (c, c + 1.0, c - 1.0, c, 10.0))
            .collect();
        for b in &make_candles_with_volume(&bars1) {
            e1.update(b);
        }
        let bars5: Vec<(f64, f64, f64, f64, f64)> = closes_5m
            .iter()
            .map(|&c| (c, c + 1.0, c - 1.0, c, 10.0))
            .collect();
        for b in &make_candles_with_volume(&bars5) {
            e5.update(b);
        }
        (e1, e5)
    }

    #[test]
    fn all_positive_is_twelve() {
        let (e1, e5) = seeded_engines(&[100.0, 101.0, 102.0], &[99.0, 100.0]);
        let snap = microstructure_score(110.0, &e1, &e5).unwrap();
        assert_eq!(snap.dyn5, 5);
        assert_eq!(snap.evm5, 5);
        assert_eq!(snap.dyn1, 1);
        assert_eq!(snap.evm1, 1);
        assert_eq!(snap.total, 12);
        assert!(snap.is_bullish());
    }

    #[test]
    fn all_negative_is_minus_twelve() {
        let (e1, e5) = seeded_engines(&[102.0, 101.0, 100.0], &[101.0, 100.0]);
        let snap = microstructure_score(90.0, &e1, &e5).unwrap();
        assert_eq!(snap.total, -12);
        assert!(snap.is_bearish());
    }

    #[test]
    fn mixed_components_sum() {
        // Slow slope down while everything else is bullish: 5 - 5 + 1 + 1.
        let (e1, e5) = seeded_engines(&[100.0, 102.0], &[103.0, 102.0]);
        let snap = microstructure_score(102.7, &e1, &e5).unwrap();
        assert_eq!(snap.dyn5, 5);
        assert_eq!(snap.evm5, -5);
        assert_eq!(snap.dyn1, 1);
        assert_eq!(snap.evm1, 1);
        assert_eq!(snap.total, 2);
    }

    #[test]
    fn unseeded_engine_gives_no_score() {
        let e1 = EvwmaEngine::new(20.0);
        let (_, e5) = seeded_engines(&[], &[100.0, 101.0]);
        assert!(microstructure_score(100.0, &e1, &e5).is_none());
    }

    #[test]
    fn component_magnitudes_are_fixed_regardless_of_scale() {
        let (e1, e5) = seeded_engines(&[1.0, 2.0], &[1.0, 2.0]);
        let snap = microstructure_score(1e9, &e1, &e5).unwrap();
        assert_eq!(snap.dyn5.abs(), 5);
        assert_eq!(snap.evm5.abs(), 5);
        assert_eq!(snap.dyn1.abs(), 1);
        assert_eq!(snap.evm1.abs(), 1);
    }
}
