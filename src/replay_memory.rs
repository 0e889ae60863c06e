use ndarray::Array1;
use rand::Rng;
use serde::{Serialize, Deserialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{QError, Result};

/// One `(state, action, reward, next_state, done)` tuple.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

/// Bounded FIFO store of transitions.
///
/// Insertion order defines recency. When the memory is full the oldest
/// transition is evicted; eviction is never random. Sampling draws indices
/// uniformly *with replacement*, so a batch may contain the same transition
/// more than once.
///
/// # Example
///
/// ```
/// use qtrainer::replay_memory::{ReplayMemory, Transition};
/// use ndarray::array;
/// use rand::SeedableRng;
///
/// let mut memory = ReplayMemory::new(2);
/// for i in 0..3 {
///     memory.insert(Transition {
///         state: array![i as f32],
///         action: 0,
///         reward: 1.0,
///         next_state: array![i as f32 + 1.0],
///         done: false,
///     });
/// }
/// assert_eq!(memory.len(), 2);
/// assert_eq!(memory.get(0).unwrap().state[0], 1.0);
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// assert!(memory.sample(3, &mut rng).is_err());
/// assert_eq!(memory.sample(2, &mut rng).unwrap().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    /// Create an empty memory holding at most `capacity` transitions.
    ///
    /// A capacity of zero is clamped to one; use [`crate::config::TrainerConfig::validate`]
    /// to reject it up front.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ReplayMemory {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append to the tail, evicting the head when full.
    pub fn insert(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `batch_size` indices uniformly with replacement from `[0, len)`.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Vec<usize>> {
        if batch_size == 0 {
            return Err(QError::invalid_parameter("batch_size", "must be greater than 0"));
        }
        if self.buffer.len() < batch_size {
            return Err(QError::InsufficientMemory {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        let len = self.buffer.len();
        Ok((0..batch_size).map(|_| rng.gen_range(0..len)).collect())
    }

    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.buffer.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Thread-safe handle around a [`ReplayMemory`] for multi-worker rollouts.
///
/// Inserts take the lock for a single append. Sampling copies the chosen
/// transitions out while holding the lock once, so a batch is always built
/// from one consistent snapshot even while other workers keep inserting.
#[derive(Clone, Debug)]
pub struct SharedReplayMemory {
    inner: Arc<Mutex<ReplayMemory>>,
}

impl SharedReplayMemory {
    pub fn new(capacity: usize) -> Self {
        SharedReplayMemory {
            inner: Arc::new(Mutex::new(ReplayMemory::new(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReplayMemory> {
        // A worker panicking mid-insert cannot leave the deque half-updated,
        // so the data behind a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, transition: Transition) {
        self.lock().insert(transition);
    }

    /// Sample a batch and clone the transitions under a single lock.
    pub fn sample_transitions<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<Transition>> {
        let memory = self.lock();
        let indices = memory.sample(batch_size, rng)?;
        indices
            .into_iter()
            .map(|i| {
                memory.get(i).cloned().ok_or_else(|| {
                    QError::dimension_mismatch(format!("index < {}", memory.len()), i.to_string())
                })
            })
            .collect()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> ReplayMemory {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
