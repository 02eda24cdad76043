//! # Bounded History
//!
//! Fixed-capacity, insertion-ordered storage keyed by id. Inserting past
//! capacity evicts the oldest entries first.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::types::{ErrorCategory, ErrorRecord};

/// Items that can live in a [`BoundedMap`]
pub trait Keyed {
    fn key(&self) -> &str;
    fn recorded_at(&self) -> DateTime<Utc>;
}

impl Keyed for ErrorRecord {
    fn key(&self) -> &str {
        &self.id
    }

    fn recorded_at(&self) -> DateTime<Utc> {
        self.timestamp()
    }
}

/// Insertion-ordered map with FIFO eviction
#[derive(Debug, Clone)]
pub struct BoundedMap<T: Keyed> {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, T>,
}

impl<T: Keyed> BoundedMap<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts an item and returns whatever was evicted to make room
    pub fn insert(&mut self, item: T) -> Vec<T> {
        let key = item.key().to_string();
        if self.entries.insert(key.clone(), item).is_some() {
            // replacing in place keeps the original position
            return Vec::new();
        }
        self.order.push_back(key);

        let mut evicted = Vec::new();
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                if let Some(item) = self.entries.remove(&oldest) {
                    evicted.push(item);
                }
            }
        }
        evicted
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(move |key| self.entries.get(key))
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    /// Items recorded within `window` of now
    pub fn recent(&self, window: Duration) -> impl Iterator<Item = &T> {
        let cutoff = Utc::now() - window;
        self.iter().filter(move |item| item.recorded_at() >= cutoff)
    }
}

pub type ErrorHistory = BoundedMap<ErrorRecord>;

impl BoundedMap<ErrorRecord> {
    /// Other records with an identical message inside the window
    pub fn similar_within(&self, message: &str, window: Duration, exclude_id: &str) -> Vec<ErrorRecord> {
        self.recent(window)
            .filter(|r| r.id != exclude_id && r.message == message)
            .cloned()
            .collect()
    }

    pub fn count_recent_in_category(&self, category: ErrorCategory, window: Duration) -> usize {
        self.recent(window).filter(|r| r.category == category).count()
    }
}
