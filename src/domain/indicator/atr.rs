//! Average True Range with Wilder's smoothing.
//!
//! The first candle has no previous close, so its true range is high - low.
//! Seed: mean of the first n true ranges. Then ATR = (prev * (n-1) + TR) / n.

use crate::domain::candle::Candle;

#[derive(Debug, Clone, PartialEq)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    tr_sum: f64,
    seen: usize,
    value: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Atr {
            period,
            prev_close: None,
            tr_sum: 0.0,
            seen: 0,
            value: None,
        }
    }

    pub fn next(&mut self, candle: &Candle) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        let tr = match self.prev_close.replace(candle.close) {
            Some(prev) => candle.true_range(prev),
            None => candle.high - candle.low,
        }
        .max(0.0);

        let n = self.period as f64;
        match self.value {
            Some(prev_atr) => self.value = Some((prev_atr * (n - 1.0) + tr) / n),
            None => {
                self.tr_sum += tr;
                self.seen += 1;
                if self.seen == self.period {
                    self.value = Some(self.tr_sum / n);
                }
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
