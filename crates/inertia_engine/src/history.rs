//! Bounded sample history
//!
//! A FIFO ring over `VecDeque`: pushes evict the oldest entry once the
//! configured capacity is reached, and capacity changes happen in place
//! without dropping anything a smaller buffer would still hold.

use std::collections::VecDeque;

use crate::error::{EngineError, Result};

/// One integration step's output, as forwarded to consumers
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    /// Target value at the moment the sample was emitted
    pub target: f64,
    /// Monotonically increasing step counter, zeroed on reset
    pub step_index: u64,
}

/// Bounded, resizable ring of recent samples
#[derive(Clone, Debug)]
pub struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl History {
    /// Create an empty history holding at most `capacity` samples
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(EngineError::InvalidArgument(
                "history capacity must be >= 1".into(),
            ));
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a sample, evicting the oldest entry if at capacity
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Change the capacity in place
    ///
    /// Shrinking below the current length keeps only the most recent
    /// `new_capacity` samples, in their original relative order. Growing
    /// loses nothing.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity < 1 {
            return Err(EngineError::InvalidArgument(
                "history capacity must be >= 1".into(),
            ));
        }
        while self.samples.len() > new_capacity {
            self.samples.pop_front();
        }
        self.capacity = new_capacity;
        Ok(())
    }

    /// Drop all samples; capacity is unchanged
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Owned copy of the current contents, oldest first
    ///
    /// The copy stays valid no matter what is pushed afterwards.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Most recently pushed sample, if any
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
