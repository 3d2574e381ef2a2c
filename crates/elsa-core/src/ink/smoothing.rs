//! Moving-average smoothing of raw pointer samples.

use std::collections::VecDeque;

use kurbo::Point;

/// Fixed-capacity ring buffer of raw samples.
///
/// Each push drops the oldest sample beyond capacity. Nothing is emitted
/// while the buffer fills, odd lengths included; once it is full every new
/// sample emits the arithmetic mean of the buffered samples. Four samples
/// `(0,0) (10,0) (20,0) (30,0)` therefore yield the single point `(15,0)`.
/// Samples taken while the buffer is still filling are only represented by
/// the first/last anchors that [`SampleBuffer::flush`] returns at pointer-up.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    capacity: usize,
    samples: VecDeque<Point>,
    first: Option<Point>,
    last: Option<Point>,
    emitted: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            first: None,
            last: None,
            emitted: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of raw samples currently buffered.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of smoothed points emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Push a raw sample; returns the smoothed point if one is emitted.
    pub fn push(&mut self, sample: Point) -> Option<Point> {
        if self.first.is_none() {
            self.first = Some(sample);
        }
        self.last = Some(sample);

        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }

        if self.samples.len() < self.capacity {
            return None;
        }
        self.emitted += 1;
        Some(self.mean())
    }

    fn mean(&self) -> Point {
        let n = self.samples.len() as f64;
        let (sx, sy) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    /// Points to add when the stroke is finalized.
    ///
    /// Returns the first raw sample when nothing was emitted yet (so the path
    /// has a start), followed by the last raw sample when it differs from
    /// `last_emitted`.
    pub fn flush(&self, last_emitted: Option<Point>) -> Vec<Point> {
        let mut out = Vec::new();
        let mut tail = last_emitted;
        if tail.is_none() {
            if let Some(first) = self.first {
                out.push(first);
                tail = Some(first);
            }
        }
        if let Some(last) = self.last {
            if tail != Some(last) {
                out.push(last);
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.first = None;
        self.last = None;
        self.emitted = 0;
    }
}
