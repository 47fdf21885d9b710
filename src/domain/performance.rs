//! Running signal statistics and win-rate tracking.

use chrono::{DateTime, Utc};

use super::signal::{Signal, SignalType};

/// Result of a trade, reported by the execution side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Pending,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    /// BUY and SELL signals. HOLDs are counted separately.
    pub total_signals: u64,
    pub buy_count: u64,
    pub sell_count: u64,
    pub hold_count: u64,
    pub win_count: u64,
    pub loss_count: u64,
    pub cumulative_strength: f64,
    pub last_signal_at: Option<DateTime<Utc>>,
}

impl PerformanceStats {
    pub fn resolved(&self) -> u64 {
        self.win_count + self.loss_count
    }

    /// wins / (wins + losses), or `neutral` before any outcome is known.
    pub fn win_rate_or(&self, neutral: f64) -> f64 {
        match self.resolved() {
            0 => neutral,
            n => self.win_count as f64 / n as f64,
        }
    }

    pub fn average_strength(&self) -> f64 {
        if self.total_signals == 0 {
            0.0
        } else {
            self.cumulative_strength / self.total_signals as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    stats: PerformanceStats,
    neutral_win_rate: f64,
}

impl PerformanceTracker {
    pub fn new(neutral_win_rate: f64) -> Self {
        PerformanceTracker {
            stats: PerformanceStats::default(),
            neutral_win_rate,
        }
    }

    pub fn record(&mut self, signal: &Signal, outcome: Outcome) {
        match signal.signal_type() {
            SignalType::Buy => self.stats.buy_count += 1,
            SignalType::Sell => self.stats.sell_count += 1,
            SignalType::Hold => self.stats.hold_count += 1,
        }
        if signal.signal_type().is_actionable() {
            self.stats.total_signals += 1;
            self.stats.cumulative_strength += signal.strength();
        }
        self.stats.last_signal_at = Some(signal.created_at());
        self.settle(outcome);
    }

    /// Apply an outcome that arrives after its signal was recorded.
    pub fn settle(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.stats.win_count += 1,
            Outcome::Loss => self.stats.loss_count += 1,
            Outcome::Pending => {}
        }
    }

    pub fn set_neutral_win_rate(&mut self, neutral_win_rate: f64) {
        self.neutral_win_rate = neutral_win_rate;
    }

    pub fn win_rate(&self) -> f64 {
        self.stats.win_rate_or(self.neutral_win_rate)
    }

    pub fn resolved(&self) -> u64 {
        self.stats.resolved()
    }

    pub fn average_strength(&self) -> f64 {
        self.stats.average_strength()
    }

    pub fn stats(&self) -> &PerformanceStats {
        &self.stats
    }
}
