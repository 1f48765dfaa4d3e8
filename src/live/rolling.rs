// Time-bounded sliding window of display points

use std::collections::VecDeque;

/// `(time_seconds, intensity)` pairs. After every push the span between the
/// newest and oldest point is at most `span_seconds`.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    span_seconds: f64,
    points: VecDeque<(f64, f64)>,
}

impl RollingBuffer {
    pub fn new(span_seconds: f64) -> Self {
        Self {
            span_seconds,
            points: VecDeque::new(),
        }
    }

    pub fn push(&mut self, time_seconds: f64, intensity: f64) {
        self.points.push_back((time_seconds, intensity));
        while let (Some(front), Some(back)) = (self.points.front(), self.points.back()) {
            if back.0 - front.0 > self.span_seconds {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn span_seconds(&self) -> f64 {
        self.span_seconds
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(f64, f64)> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
