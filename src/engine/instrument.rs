use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::aggregator::{BarResampler, CandleAggregator};
use crate::core::day_type::HunterZone;
use crate::core::evwma::EvwmaEngine;
use crate::core::probability::{probability_score, ProbabilityInputs};
use crate::core::score::{microstructure_score, ScoreSnapshot};
use crate::core::session::SessionContext;
use crate::core::stop_loss::StopLossEngine;
use crate::core::vpa::VpaDetector;
use crate::engine::intents::{EntryIntent, ExitIntent};
use crate::engine::state_machine::TradeStateMachine;
use crate::errors::EngineError;
use crate::models::{
    Archetype, Candle, CandleSeries, DayType, Direction, ExitReason, Tick, Timeframe, TradeState,
    VpaSignal,
};
use crate::options::{atm_option_leg, StrikeEntry};

/// Everything a single closed 1-minute bar produced: the bar itself, the
/// 5-minute bar if one completed, the recomputed signals, and any trade
/// decision they triggered.
#[derive(Debug, Clone)]
pub struct BarOutcome {
    pub bar: Candle,
    pub bar_5m: Option<Candle>,
    pub score: Option<ScoreSnapshot>,
    pub vpa: VpaSignal,
    pub entry: Option<EntryIntent>,
    pub exit: Option<ExitIntent>,
}

#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Stop-loss exit fired at tick granularity, before bar aggregation.
    pub exit: Option<ExitIntent>,
    pub bar: Option<BarOutcome>,
}

/// The per-instrument pipeline: ticks in, candles and signals out, at most
/// one open trade at a time. Owns every piece of per-instrument state so a
/// worker task can drive it without locks.
pub struct InstrumentEngine {
    instrument: String,
    config: Config,
    agg_1m: CandleAggregator,
    resampler_5m: BarResampler,
    bars_1m: CandleSeries,
    evwma_1m: EvwmaEngine,
    evwma_5m: EvwmaEngine,
    vpa: VpaDetector,
    stops: StopLossEngine,
    state: TradeStateMachine,
    session: Option<SessionContext>,
    chain: Option<Vec<StrikeEntry>>,
    last_price: Option<f64>,
}

impl InstrumentEngine {
    pub fn new(instrument: &str, config: &Config) -> Self {
        Self {
            instrument: instrument.to_string(),
            config: config.clone(),
            agg_1m: CandleAggregator::new(instrument, Timeframe::M1),
            resampler_5m: BarResampler::new(Timeframe::M5),
            bars_1m: CandleSeries::new(Vec::new()),
            evwma_1m: EvwmaEngine::new(config.evwma_decay_1m),
            evwma_5m: EvwmaEngine::new(config.evwma_decay_5m),
            vpa: VpaDetector::new(config.vpa_lookback),
            stops: StopLossEngine::new(config.swing_lookback, config.atr_lookback),
            state: TradeStateMachine::new(instrument),
            session: None,
            chain: None,
            last_price: None,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn trade_state(&self) -> TradeState {
        self.state.state()
    }

    pub fn bars_1m(&self) -> &CandleSeries {
        &self.bars_1m
    }

    pub fn day_type(&self) -> Result<DayType, EngineError> {
        self.session
            .as_ref()
            .map(|s| s.day_type)
            .ok_or_else(|| EngineError::StaleSessionContext {
                instrument: self.instrument.clone(),
            })
    }

    /// Warm the lookback state from historical 1-minute bars, signals off.
    pub fn seed_history(&mut self, bars: &CandleSeries) {
        for bar in bars.iter() {
            self.evwma_1m.update(bar);
            self.bars_1m
                .push_bounded(bar.clone(), self.config.history_limit);
            if let Some(closed_5m) = self.resampler_5m.ingest(bar) {
                self.evwma_5m.update(&closed_5m);
            }
        }
        debug!(
            instrument = %self.instrument,
            bars_1m = self.bars_1m.len(),
            evwma_5m_seeded = self.evwma_5m.is_seeded(),
            "history seeded"
        );
    }

    /// Resolve the session context at the open and arm the state machine.
    pub fn on_session_start(&mut self, zone: HunterZone, opening_price: f64, pcr: f64) -> DayType {
        let ctx = SessionContext::resolve(zone, opening_price, pcr);
        let day_type = ctx.day_type;
        info!(
            instrument = %self.instrument,
            day_type = %day_type,
            archetype = %day_type.archetype(),
            pcr,
            opening_price,
            "session started"
        );
        self.session = Some(ctx);
        self.state.arm();
        day_type
    }

    /// Latest option-chain snapshot, used only to resolve the ATM leg for
    /// entries. PCR is fixed at session start and not re-derived from it.
    pub fn set_option_chain(&mut self, chain: Vec<StrikeEntry>) {
        self.chain = Some(chain);
    }

    /// Cross-index agreement update from whoever watches the other index.
    pub fn set_index_sync(&mut self, index_sync: bool) {
        if let Some(session) = self.session.as_mut() {
            session.index_sync = index_sync;
        }
    }

    /// Tick path: stop check first at tick granularity, then aggregation.
    pub fn on_tick(&mut self, tick: &Tick) -> Result<TickOutcome, EngineError> {
        let mut outcome = TickOutcome::default();
        self.last_price = Some(tick.price);

        if self.state.in_position() && self.state.stop_breached(tick.price) {
            outcome.exit = Some(self.state.close(
                ExitReason::StopLoss,
                tick.price,
                tick.timestamp,
            )?);
        }

        if let Some(closed) = self.agg_1m.ingest(tick) {
            outcome.bar = Some(self.on_bar_closed(closed)?);
        }
        Ok(outcome)
    }

    /// Timer path: on a quiet tape the next window's first tick may never
    /// come, so a periodic timer closes the in-progress bar once its window
    /// has elapsed and runs the same bar-close pipeline.
    pub fn on_timer(&mut self, now: DateTime<Utc>) -> Result<Option<BarOutcome>, EngineError> {
        match self.agg_1m.close_expired(now) {
            Some(bar) => Ok(Some(self.on_bar_closed(bar)?)),
            None => Ok(None),
        }
    }

    /// Bar-close path: indicators update, signals recompute, then exits
    /// before entries. An exit and an entry never share a bar; Exited
    /// re-arms on the following close.
    pub fn on_bar_closed(&mut self, bar: Candle) -> Result<BarOutcome, EngineError> {
        if let Some(last) = self.bars_1m.last() {
            if bar.timestamp <= last.timestamp {
                return Err(EngineError::DataGap {
                    instrument: self.instrument.clone(),
                    detail: format!(
                        "bar {} arrived after {} was already closed",
                        bar.timestamp, last.timestamp
                    ),
                });
            }
        }

        self.evwma_1m.update(&bar);
        self.bars_1m
            .push_bounded(bar.clone(), self.config.history_limit);

        let bar_5m = self.resampler_5m.ingest(&bar);
        if let Some(closed_5m) = &bar_5m {
            self.evwma_5m.update(closed_5m);
        }

        let score = microstructure_score(bar.close, &self.evwma_1m, &self.evwma_5m);
        let vpa = self.vpa.detect(&self.bars_1m);

        let mut exit = None;
        let mut entry = None;
        if self.state.in_position() {
            exit = self.evaluate_exit(&bar, score.as_ref())?;
        } else {
            if self.state.state() == TradeState::Exited && self.session.is_some() {
                self.state.arm();
            }
            if self.state.is_armed() {
                if let Some(score) = &score {
                    entry = self.evaluate_entry(&bar, score, vpa)?;
                }
            }
        }

        Ok(BarOutcome {
            bar,
            bar_5m,
            score,
            vpa,
            entry,
            exit,
        })
    }

    /// Close out the session: drop any partial bars rather than treating
    /// them as closed, flatten an open position, and go back to Idle.
    pub fn on_session_end(&mut self, now: DateTime<Utc>) -> Result<Option<ExitIntent>, EngineError> {
        self.agg_1m.flush();
        self.resampler_5m.flush();

        let exit = if self.state.in_position() {
            let price = self
                .last_price
                .ok_or_else(|| EngineError::InvariantViolation {
                    instrument: self.instrument.clone(),
                    detail: "open position with no traded price".to_string(),
                })?;
            Some(self.state.close(ExitReason::SessionEnd, price, now)?)
        } else {
            None
        };

        info!(instrument = %self.instrument, "session ended");
        self.session = None;
        Ok(exit)
    }

    fn evaluate_exit(
        &mut self,
        bar: &Candle,
        score: Option<&ScoreSnapshot>,
    ) -> Result<Option<ExitIntent>, EngineError> {
        let position = match self.state.position() {
            Some(p) => p.clone(),
            None => return Ok(None),
        };

        // Relative-volume climax pre-empts every archetype rule.
        if let Some(rvol) = self.relative_volume(bar) {
            if rvol >= self.config.rvol_exit_multiplier {
                info!(instrument = %self.instrument, rvol, "volume climax exit");
                return Ok(Some(self.state.close(
                    ExitReason::VolumeSpike,
                    bar.close,
                    bar.timestamp,
                )?));
            }
        }

        match position.archetype {
            // Hunter rides to the structural stop, nothing else.
            Archetype::Hunter | Archetype::Scalp => Ok(None),
            Archetype::P2PTrend => {
                if let Some(score) = score {
                    let flipped = match position.direction {
                        Direction::Long => score.is_bearish(),
                        Direction::Short => score.is_bullish(),
                    };
                    if flipped {
                        return Ok(Some(self.state.close(
                            ExitReason::ScoreFlip,
                            bar.close,
                            bar.timestamp,
                        )?));
                    }
                }
                // Still in the trend: ratchet the stop, tighten-only.
                match self.stops.trail(&self.bars_1m, &position.stop) {
                    Ok(Some(plan)) => self.state.tighten_stop(plan),
                    Ok(None) => {}
                    Err(EngineError::InsufficientHistory { .. }) => {}
                    Err(e) => return Err(e),
                }
                Ok(None)
            }
            Archetype::MeanReversion => {
                let reverted = match self.evwma_1m.average() {
                    Some(avg) => match position.direction {
                        Direction::Long => bar.close >= avg,
                        Direction::Short => bar.close <= avg,
                    },
                    None => false,
                };
                if reverted {
                    return Ok(Some(self.state.close(
                        ExitReason::MeanReverted,
                        bar.close,
                        bar.timestamp,
                    )?));
                }
                Ok(None)
            }
        }
    }

    fn evaluate_entry(
        &mut self,
        bar: &Candle,
        score: &ScoreSnapshot,
        vpa: VpaSignal,
    ) -> Result<Option<EntryIntent>, EngineError> {
        let session = match &self.session {
            Some(s) => s.clone(),
            None => return Ok(None),
        };
        let archetype = session.day_type.archetype();

        let candidate = match archetype {
            Archetype::P2PTrend => self.trend_candidate(&session, score),
            Archetype::Hunter => self.hunter_candidate(&session, score),
            Archetype::MeanReversion => self.mean_reversion_candidate(bar.close),
            Archetype::Scalp => None,
        };
        let direction = match candidate {
            Some(d) => d,
            None => return Ok(None),
        };

        // VPA confirmation gates conviction entries; fading a stretch away
        // from the mean is exempt.
        if self.config.enable_vpa_filter
            && archetype != Archetype::MeanReversion
            && !vpa.confirms(direction)
        {
            debug!(
                instrument = %self.instrument,
                %direction,
                %vpa,
                "entry vetoed by volume-price analysis"
            );
            return Ok(None);
        }

        let probability = probability_score(&ProbabilityInputs::for_candidate(
            direction,
            score,
            session.pcr,
            bar.close,
            &session.hunter_zone,
            session.index_sync,
        ));
        if archetype == Archetype::Hunter && probability <= self.config.probability_threshold {
            debug!(
                instrument = %self.instrument,
                probability,
                "trap reversal below conviction threshold"
            );
            return Ok(None);
        }

        let multiplier = self.config.stop_multipliers.get(archetype);
        let stop = match self.stops.plan(&self.bars_1m, direction, multiplier) {
            Ok(plan) => plan,
            Err(EngineError::InsufficientHistory { needed, have }) => {
                debug!(
                    instrument = %self.instrument,
                    needed,
                    have,
                    "not enough bars to anchor a stop"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let leg = match &self.chain {
            Some(chain) => match atm_option_leg(chain, bar.close, direction) {
                Some(leg) => Some(leg),
                None => {
                    warn!(
                        instrument = %self.instrument,
                        price = bar.close,
                        "no tradeable strike at the money, entry skipped"
                    );
                    return Ok(None);
                }
            },
            None => None,
        };

        let intent = EntryIntent {
            instrument: self.instrument.clone(),
            direction,
            archetype,
            entry_price: bar.close,
            score_total: score.total,
            probability,
            stop,
            leg,
            timestamp: bar.timestamp,
        };
        self.state.open(&intent)?;
        Ok(Some(intent))
    }

    fn trend_candidate(&self, session: &SessionContext, score: &ScoreSnapshot) -> Option<Direction> {
        let direction = match session.day_type {
            DayType::BullishTrend => Direction::Long,
            DayType::BearishTrend => Direction::Short,
            _ => return None,
        };
        self.score_supports(score, direction).then_some(direction)
    }

    /// Trap days are traded against the trap: a bull trap is shorted once
    /// the tape confirms, a bear trap is bought. Zone membership is not an
    /// entry condition; it only feeds the value-area conviction term.
    fn hunter_candidate(
        &self,
        session: &SessionContext,
        score: &ScoreSnapshot,
    ) -> Option<Direction> {
        let direction = match session.day_type {
            DayType::SidewaysBullTrap => Direction::Short,
            DayType::SidewaysBearTrap => Direction::Long,
            _ => return None,
        };
        self.score_supports(score, direction).then_some(direction)
    }

    fn mean_reversion_candidate(&self, price: f64) -> Option<Direction> {
        let anchor = self.evwma_5m.average()?;
        if anchor == 0.0 {
            return None;
        }
        let deviation = (price - anchor) / anchor;
        if deviation >= self.config.mean_reversion_deviation {
            Some(Direction::Short)
        } else if deviation <= -self.config.mean_reversion_deviation {
            Some(Direction::Long)
        } else {
            None
        }
    }

    fn score_supports(&self, score: &ScoreSnapshot, direction: Direction) -> bool {
        match direction {
            Direction::Long => score.total >= self.config.score_entry_threshold,
            Direction::Short => score.total <= -self.config.score_entry_threshold,
        }
    }

    /// Latest bar volume over the trailing average, None until the window
    /// has filled.
    fn relative_volume(&self, bar: &Candle) -> Option<f64> {
        let lookback = self.config.rvol_lookback;
        let len = self.bars_1m.len();
        // bars_1m already contains `bar`; the window is the bars before it.
        if len < lookback + 1 {
            return None;
        }
        let window = self.bars_1m.slice(len - 1 - lookback, len - 1);
        let avg: f64 = window.iter().map(|b| b.volume).sum::<f64>() / lookback as f64;
        if avg <= 0.0 {
            return None;
        }
        Some(bar.volume / avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{default_test_config, make_chain, make_ticks, ts};

    fn engine_with_session(day_type_pcr: f64, opening: f64) -> InstrumentEngine {
        let config = default_test_config();
        let mut engine = InstrumentEngine::new("NSE_INDEX|Nifty 50", &config);
        engine.on_session_start(
            HunterZone {
                high: opening - 5.0,
                low: opening - 10.0,
            },
            opening,
            day_type_pcr,
        );
        engine
    }

    #[test]
    fn day_type_before_session_is_stale() {
        let config = default_test_config();
        let engine = InstrumentEngine::new("NSE_INDEX|Nifty 50", &config);
        assert!(matches!(
            engine.day_type(),
            Err(EngineError::StaleSessionContext { .. })
        ));
    }

    #[test]
    fn session_start_arms_and_classifies() {
        let engine = engine_with_session(1.3, 100.0);
        assert_eq!(engine.day_type().unwrap(), DayType::BullishTrend);
        assert_eq!(engine.trade_state(), TradeState::Armed);
    }

    #[test]
    fn ticks_build_bars_and_seed_indicators() {
        let mut engine = engine_with_session(1.0, 100.0);
        // Two ticks in minute 0, one in minute 1 closing the first bar.
        let ticks = make_ticks(
            "NSE_INDEX|Nifty 50",
            &[(0, 100.0, 10.0), (30, 100.5, 5.0), (60, 101.0, 8.0)],
        );
        let mut closed = 0;
        for tick in &ticks {
            let outcome = engine.on_tick(tick).unwrap();
            if outcome.bar.is_some() {
                closed += 1;
            }
        }
        assert_eq!(closed, 1);
        assert_eq!(engine.bars_1m().len(), 1);
        let bar = engine.bars_1m().last().unwrap();
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.close, 100.5);
        assert_eq!(bar.volume, 15.0);
    }

    #[test]
    fn seed_history_fills_both_timeframes() {
        let config = default_test_config();
        let mut engine = InstrumentEngine::new("NSE_INDEX|Nifty 50", &config);
        let bars: Vec<Candle> = (0..11)
            .map(|i| Candle {
                timestamp: ts(i * 60),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 10.0,
            })
            .collect();
        engine.seed_history(&CandleSeries::new(bars));
        assert_eq!(engine.bars_1m().len(), 11);
        // Two 5-minute buckets completed out of eleven 1-minute bars, so
        // the slow average is live.
        assert!(engine.evwma_5m.is_seeded());
    }

    #[test]
    fn timer_closes_quiet_bar() {
        let mut engine = engine_with_session(1.0, 100.0);
        let ticks = make_ticks("NSE_INDEX|Nifty 50", &[(0, 100.0, 10.0), (30, 100.5, 5.0)]);
        for tick in &ticks {
            assert!(engine.on_tick(tick).unwrap().bar.is_none());
        }

        let outcome = engine.on_timer(ts(60)).unwrap().unwrap();
        assert_eq!(outcome.bar.close, 100.5);
        assert_eq!(engine.bars_1m().len(), 1);
        // Firing again inside the next, still-empty window is a no-op.
        assert!(engine.on_timer(ts(90)).unwrap().is_none());
    }

    #[test]
    fn regressed_bar_is_a_data_gap() {
        let mut engine = engine_with_session(1.0, 100.0);
        let bar = |secs: i64| Candle {
            timestamp: ts(secs),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 10.0,
        };
        engine.on_bar_closed(bar(60)).unwrap();
        assert!(matches!(
            engine.on_bar_closed(bar(0)),
            Err(EngineError::DataGap { .. })
        ));
        // History is untouched by the rejected bar.
        assert_eq!(engine.bars_1m().len(), 1);
    }

    #[test]
    fn session_end_flattens_open_position() {
        let mut engine = engine_with_session(1.0, 100.0);
        engine.state.arm();
        let intent = crate::test_helpers::sample_entry_intent(
            Direction::Long,
            Archetype::P2PTrend,
            100.0,
            97.0,
        );
        engine.state.open(&intent).unwrap();
        engine.last_price = Some(102.0);

        let exit = engine.on_session_end(ts(0)).unwrap().unwrap();
        assert_eq!(exit.reason, ExitReason::SessionEnd);
        assert_eq!(exit.exit_price, 102.0);
        assert_eq!(engine.trade_state(), TradeState::Exited);
        assert!(matches!(
            engine.day_type(),
            Err(EngineError::StaleSessionContext { .. })
        ));
    }

    #[test]
    fn stop_breach_exits_on_tick() {
        let mut engine = engine_with_session(1.0, 100.0);
        let intent = crate::test_helpers::sample_entry_intent(
            Direction::Long,
            Archetype::Hunter,
            100.0,
            95.6,
        );
        engine.state.open(&intent).unwrap();

        let tick = Tick::new("NSE_INDEX|Nifty 50", 95.5, 1.0, ts(0));
        let outcome = engine.on_tick(&tick).unwrap();
        let exit = outcome.exit.unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_eq!(exit.exit_price, 95.5);
        assert_eq!(engine.trade_state(), TradeState::Exited);
    }

    #[test]
    fn chain_without_atm_strike_skips_entry() {
        let config = default_test_config();
        let mut engine = InstrumentEngine::new("NSE_INDEX|Nifty 50", &config);
        // Chain centered far from the traded price: no ATM match.
        engine.set_option_chain(make_chain(30000.0, 3, 1000.0, 1000.0));
        // Opening above the zone with bullish sentiment: trend day, longs.
        engine.on_session_start(
            HunterZone {
                high: 21950.0,
                low: 21900.0,
            },
            22000.0,
            1.3,
        );

        // Strongly trending tape: rising closes with enough history for
        // swings and ATR. Volume is small relative to the decay period so
        // both averages trail the tape instead of overshooting it.
        let bars: Vec<Candle> = (0..40)
            .map(|i| {
                let base = 21900.0 + i as f64 * 5.0;
                Candle {
                    timestamp: ts(i * 60),
                    open: base,
                    high: base + 6.0,
                    low: base - 2.0,
                    close: base + 5.0,
                    volume: 2.0,
                }
            })
            .collect();
        let mut entries = 0;
        for bar in bars {
            let outcome = engine.on_bar_closed(bar).unwrap();
            if outcome.entry.is_some() {
                entries += 1;
            }
        }
        assert_eq!(entries, 0);
        assert_eq!(engine.trade_state(), TradeState::Armed);
    }

    #[test]
    fn fresh_stretch_fade_keeps_stop_beyond_entry() {
        // Choppy session, a flat tape, then a stretch bar 1.1% above the
        // slow average. The fade is short and the stretch bar itself is
        // the session high, so the stop must anchor above the entry.
        let mut engine = engine_with_session(1.0, 22000.0);
        let mut bars: Vec<Candle> = (0..40)
            .map(|i| Candle {
                timestamp: ts(i * 60),
                open: 22000.0,
                high: 22001.0,
                low: 21999.0,
                close: 22000.0,
                volume: 10.0,
            })
            .collect();
        bars.push(Candle {
            timestamp: ts(40 * 60),
            open: 22000.0,
            high: 22260.0,
            low: 22000.0,
            close: 22250.0,
            volume: 10.0,
        });

        let mut entry = None;
        for bar in bars {
            if let Some(e) = engine.on_bar_closed(bar).unwrap().entry {
                entry = Some(e);
            }
        }
        let entry = entry.expect("stretch bar should trigger the fade");
        assert_eq!(entry.direction, Direction::Short);
        assert_eq!(entry.archetype, Archetype::MeanReversion);
        assert!(entry.stop.level > entry.entry_price);
    }

    #[test]
    fn trap_fade_above_the_zone_clears_conviction() {
        // Bull-trap session where the tape confirms while still above the
        // prior session's zone. Value-area membership only feeds the
        // conviction blend; sentiment, index sync and score force already
        // clear the bar at 80.
        let config = default_test_config();
        let mut engine = InstrumentEngine::new("NSE_INDEX|Nifty 50", &config);
        engine.on_session_start(
            HunterZone {
                high: 21800.0,
                low: 21700.0,
            },
            22000.0,
            0.85,
        );
        assert_eq!(engine.day_type().unwrap(), DayType::SidewaysBullTrap);

        let mut entry = None;
        for i in 0..25 {
            let open = 22000.0 - i as f64 * 5.0;
            let bar = Candle {
                timestamp: ts(i * 60),
                open,
                high: open + 1.0,
                low: open - 6.0,
                close: open - 5.0,
                volume: 2.0,
            };
            if let Some(e) = engine.on_bar_closed(bar).unwrap().entry {
                entry = Some(e);
                break;
            }
        }
        let entry = entry.expect("confirmed trap fade should not wait for the zone");
        assert_eq!(entry.direction, Direction::Short);
        assert_eq!(entry.archetype, Archetype::Hunter);
        assert!(entry.entry_price > 21800.0);
        assert!((entry.probability - 80.0).abs() < 1e-9);
    }
}
