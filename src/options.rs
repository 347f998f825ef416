use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Direction;

/// One quoted option contract in a chain snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub instrument_key: String,
    pub open_interest: f64,
}

/// One strike row of an option-chain snapshot for the underlying index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrikeEntry {
    pub strike_price: f64,
    pub call: Option<OptionQuote>,
    pub put: Option<OptionQuote>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Call => write!(f, "call"),
            OptionKind::Put => write!(f, "put"),
        }
    }
}

/// The contract a directional index trade is actually executed through:
/// the at-the-money call for longs, put for shorts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionLeg {
    pub strike: i64,
    pub kind: OptionKind,
    pub instrument_key: String,
}

/// Aggregate put OI over call OI. An empty chain reads as neutral (1.0);
/// a chain with zero call OI reads as an extreme (100.0) rather than a
/// division blow-up.
pub fn calculate_pcr(chain: &[StrikeEntry]) -> f64 {
    if chain.is_empty() {
        return 1.0;
    }

    let mut put_oi = 0.0;
    let mut call_oi = 0.0;
    for entry in chain {
        if let Some(put) = &entry.put {
            put_oi += put.open_interest;
        }
        if let Some(call) = &entry.call {
            call_oi += call.open_interest;
        }
    }

    if call_oi == 0.0 {
        return 100.0;
    }

    put_oi / call_oi
}

/// Index strikes are listed in steps of 50; round spot to the nearest one.
pub fn find_atm_strike(price: f64) -> i64 {
    ((price / 50.0).round() as i64) * 50
}

/// Resolve the ATM leg for a directional trade from a chain snapshot.
/// Returns None when the chain has no row (or no quote) at that strike.
pub fn atm_option_leg(chain: &[StrikeEntry], price: f64, direction: Direction) -> Option<OptionLeg> {
    let strike = find_atm_strike(price);
    let entry = chain
        .iter()
        .find(|e| (e.strike_price - strike as f64).abs() < f64::EPSILON)?;

    let (quote, kind) = match direction {
        Direction::Long => (entry.call.as_ref()?, OptionKind::Call),
        Direction::Short => (entry.put.as_ref()?, OptionKind::Put),
    };

    Some(OptionLeg {
        strike,
        kind,
        instrument_key: quote.instrument_key.clone(),
    })
}
