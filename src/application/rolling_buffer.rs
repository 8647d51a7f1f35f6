// Fixed-capacity history, oldest entry evicted first
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T: Clone> RollingBuffer<T> {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Immutable copy handed to readers.
    pub fn snapshot(&self) -> Arc<[T]> {
        self.items.iter().cloned().collect()
    }
}
