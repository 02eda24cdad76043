use std::collections::VecDeque;

use crate::types::PerformanceMetric;

/// FIFO of metrics that drops the oldest entry when full
#[derive(Debug)]
pub struct MetricsBuffer {
    metrics: VecDeque<PerformanceMetric>,
    capacity: usize,
}

impl MetricsBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            metrics: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, metric: PerformanceMetric) {
        if self.metrics.len() >= self.capacity {
            self.metrics.pop_front();
        }
        self.metrics.push_back(metric);
    }

    /// Up to `n` most recent metrics, oldest first
    pub fn last(&self, n: usize) -> Vec<PerformanceMetric> {
        let skip = self.metrics.len().saturating_sub(n);
        self.metrics.iter().skip(skip).cloned().collect()
    }

    pub fn truncate_to_last(&mut self, n: usize) {
        let excess = self.metrics.len().saturating_sub(n);
        self.metrics.drain(..excess);
    }

    pub fn snapshot(&self) -> Vec<PerformanceMetric> {
        self.metrics.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.metrics.clear();
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricCategory, MetricUnit};

    fn metric(i: usize) -> PerformanceMetric {
        PerformanceMetric::new(format!("m{}", i), i as f64, MetricUnit::Count, MetricCategory::Custom)
    }

    #[test]
    fn test_evicts_oldest() {
        let mut buffer = MetricsBuffer::new(3);
        for i in 0..5 {
            buffer.push(metric(i));
        }
        let names: Vec<String> = buffer.snapshot().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_last_and_truncate() {
        let mut buffer = MetricsBuffer::new(10);
        for i in 0..6 {
            buffer.push(metric(i));
        }
        assert_eq!(buffer.last(2)[0].name, "m4");
        assert_eq!(buffer.last(20).len(), 6);

        buffer.truncate_to_last(4);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.snapshot()[0].name, "m2");

        buffer.truncate_to_last(10);
        assert_eq!(buffer.len(), 4);

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
