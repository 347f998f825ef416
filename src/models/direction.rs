use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Once-per-session market regime. Set at the open from the prior session's
/// reference range and option sentiment, never revised intraday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    BullishTrend,
    BearishTrend,
    SidewaysBullTrap,
    SidewaysBearTrap,
    Choppy,
}

impl DayType {
    /// Every regime maps to exactly one tactical template.
    pub fn archetype(&self) -> Archetype {
        match self {
            DayType::BullishTrend | DayType::BearishTrend => Archetype::P2PTrend,
            DayType::SidewaysBullTrap | DayType::SidewaysBearTrap => Archetype::Hunter,
            DayType::Choppy => Archetype::MeanReversion,
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::BullishTrend => write!(f, "bullish_trend"),
            DayType::BearishTrend => write!(f, "bearish_trend"),
            DayType::SidewaysBullTrap => write!(f, "sideways_bull_trap"),
            DayType::SidewaysBearTrap => write!(f, "sideways_bear_trap"),
            DayType::Choppy => write!(f, "choppy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Scalp,
    Hunter,
    P2PTrend,
    MeanReversion,
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Archetype::Scalp => write!(f, "scalp"),
            Archetype::Hunter => write!(f, "hunter"),
            Archetype::P2PTrend => write!(f, "p2p_trend"),
            Archetype::MeanReversion => write!(f, "mean_reversion"),
        }
    }
}

/// Volume-price confirmation derived from the trailing bar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpaSignal {
    PocketPivotVolume,
    Accumulation,
    PivotNegativeVolume,
    Distribution,
    None,
}

impl VpaSignal {
    pub fn is_bullish(&self) -> bool {
        matches!(self, VpaSignal::PocketPivotVolume | VpaSignal::Accumulation)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, VpaSignal::PivotNegativeVolume | VpaSignal::Distribution)
    }

    pub fn confirms(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.is_bullish(),
            Direction::Short => self.is_bearish(),
        }
    }
}

impl fmt::Display for VpaSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VpaSignal::PocketPivotVolume => write!(f, "ppv"),
            VpaSignal::Accumulation => write!(f, "accumulation"),
            VpaSignal::PivotNegativeVolume => write!(f, "pnv"),
            VpaSignal::Distribution => write!(f, "distribution"),
            VpaSignal::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeState {
    Idle,
    Armed,
    InPosition,
    Exited,
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeState::Idle => write!(f, "idle"),
            TradeState::Armed => write!(f, "armed"),
            TradeState::InPosition => write!(f, "in_position"),
            TradeState::Exited => write!(f, "exited"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    VolumeSpike,
    ScoreFlip,
    MeanReverted,
    SessionEnd,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::VolumeSpike => write!(f, "volume_spike"),
            ExitReason::ScoreFlip => write!(f, "score_flip"),
            ExitReason::MeanReverted => write!(f, "mean_reverted"),
            ExitReason::SessionEnd => write!(f, "session_end"),
        }
    }
}
