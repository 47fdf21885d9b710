//! Simple moving average of traded volume.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeAverage {
    period: usize,
    recent: VecDeque<f64>,
}

impl VolumeAverage {
    pub fn new(period: usize) -> Self {
        VolumeAverage {
            period,
            recent: VecDeque::with_capacity(period),
        }
    }

    pub fn next(&mut self, volume: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        if self.recent.len() == self.period {
            self.recent.pop_front();
        }
        self.recent.push_back(volume);
        self.value()
    }

    /// Summed fresh each call so the result never drifts with history length.
    pub fn value(&self) -> Option<f64> {
        if self.period == 0 || self.recent.len() < self.period {
            return None;
        }
        Some(self.recent.iter().sum::<f64>() / self.period as f64)
    }
}
