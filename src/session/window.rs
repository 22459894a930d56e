//! Bounded, ordered buffer of formatted samples.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How a [`SamplingWindow`] behaves once it holds `capacity` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowMode {
    /// Accumulate until `capacity` items arrived; that is the stop condition.
    StopAtTarget,
    /// Keep only the most recent `capacity` items, evicting the oldest.
    /// Never signals a stop on its own.
    Slide,
}

/// Append-only sequence, oldest first, whose length never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct SamplingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
    mode: WindowMode,
}

impl<T> SamplingWindow<T> {
    pub fn new(capacity: usize, mode: WindowMode) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            mode,
        }
    }

    /// Append an item. Returns `true` when the stop condition is met.
    ///
    /// In `StopAtTarget` mode items offered after the window filled up are
    /// dropped.
    pub fn push(&mut self, item: T) -> bool {
        if self.capacity == 0 {
            return self.mode == WindowMode::StopAtTarget;
        }
        match self.mode {
            WindowMode::StopAtTarget => {
                if self.items.len() < self.capacity {
                    self.items.push_back(item);
                }
                self.items.len() == self.capacity
            }
            WindowMode::Slide => {
                if self.items.len() == self.capacity {
                    self.items.pop_front();
                }
                self.items.push_back(item);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items.into()
    }
}
