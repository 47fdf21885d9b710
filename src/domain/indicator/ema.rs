//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k). Undefined for the first (n-1) closes.

#[derive(Debug, Clone, PartialEq)]
pub struct Ema {
    period: usize,
    k: f64,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Ema {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    /// Fold one close into the average. Returns the value once seeded.
    pub fn next(&mut self, close: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        match self.value {
            Some(prev) => {
                self.value = Some(close * self.k + prev * (1.0 - self.k));
            }
            None => {
                self.seed_sum += close;
                self.seen += 1;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// EMA of the last close in `closes`, computed from scratch.
pub fn calculate_ema(closes: &[f64], period: usize) -> Option<f64> {
    let mut ema = Ema::new(period);
    closes.iter().fold(None, |_, &close| ema.next(close))
}
