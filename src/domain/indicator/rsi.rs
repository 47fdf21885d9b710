//! RSI (Relative Strength Index) with Wilder's smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)), 100 when avg_loss == 0,
//! 0 when avg_gain == 0 and avg_loss > 0.
//!
//! Warmup: n changes, i.e. n + 1 closes.

#[derive(Debug, Clone, PartialEq)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    gain_sum: f64,
    loss_sum: f64,
    changes: usize,
    averages: Option<(f64, f64)>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            period,
            prev_close: None,
            gain_sum: 0.0,
            loss_sum: 0.0,
            changes: 0,
            averages: None,
        }
    }

    pub fn next(&mut self, close: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        let prev = self.prev_close.replace(close)?;

        let change = close - prev;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        let n = self.period as f64;

        self.averages = match self.averages {
            Some((avg_gain, avg_loss)) => Some((
                (avg_gain * (n - 1.0) + gain) / n,
                (avg_loss * (n - 1.0) + loss) / n,
            )),
            None => {
                self.gain_sum += gain;
                self.loss_sum += loss;
                self.changes += 1;
                (self.changes == self.period).then(|| (self.gain_sum / n, self.loss_sum / n))
            }
        };
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        self.averages
            .map(|(avg_gain, avg_loss)| rsi_from_averages(avg_gain, avg_loss))
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let rsi = if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };
    rsi.clamp(0.0, 100.0)
}
