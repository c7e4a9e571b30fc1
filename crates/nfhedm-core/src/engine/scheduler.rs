use std::ops::Range;
use thiserror::Error;

/// Partition of the voxel axis into contiguous, disjoint chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    n_coords: usize,
    chunk_size: usize,
}

impl ChunkPlan {
    /// A `chunk_size` of zero is treated as one.
    pub fn new(n_coords: usize, chunk_size: usize) -> Self {
        Self {
            n_coords,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn n_coords(&self) -> usize {
        self.n_coords
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn len(&self) -> usize {
        self.n_coords.div_ceil(self.chunk_size)
    }

    pub fn is_empty(&self) -> bool {
        self.n_coords == 0
    }

    /// Voxel range of chunk `index`; the last chunk may be short.
    pub fn range(&self, index: usize) -> Option<Range<usize>> {
        let start = index.checked_mul(self.chunk_size)?;
        if start >= self.n_coords {
            return None;
        }
        Some(start..(start + self.chunk_size).min(self.n_coords))
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.len()).filter_map(|i| self.range(i))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    InFlight,
    Completed,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SchedulingError {
    #[error("Chunk {0} does not exist")]
    UnknownChunk(usize),
    #[error("Chunk {chunk} cannot move from {from:?} to {to:?}")]
    IllegalTransition {
        chunk: usize,
        from: ChunkState,
        to: ChunkState,
    },
    #[error("{remaining} chunk(s) never completed")]
    Incomplete { remaining: usize },
}

/// Message a worker sends back to the scheduling thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    Started { chunk: usize },
    Completed { chunk: usize, unevaluated: usize },
    Failed { chunk: usize, message: String },
}

/// Tracks every chunk through `Pending -> InFlight -> Completed`.
#[derive(Debug, Clone)]
pub struct GrandLoopScheduler {
    plan: ChunkPlan,
    states: Vec<ChunkState>,
    completed: usize,
}

impl GrandLoopScheduler {
    pub fn new(plan: ChunkPlan) -> Self {
        let states = vec![ChunkState::Pending; plan.len()];
        Self {
            plan,
            states,
            completed: 0,
        }
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }

    pub fn state(&self, chunk: usize) -> Option<ChunkState> {
        self.states.get(chunk).copied()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_finished(&self) -> bool {
        self.completed == self.states.len()
    }

    fn transition(
        &mut self,
        chunk: usize,
        from: ChunkState,
        to: ChunkState,
    ) -> Result<(), SchedulingError> {
        let state = self
            .states
            .get_mut(chunk)
            .ok_or(SchedulingError::UnknownChunk(chunk))?;
        if *state != from {
            return Err(SchedulingError::IllegalTransition {
                chunk,
                from: *state,
                to,
            });
        }
        *state = to;
        Ok(())
    }

    pub fn dispatch(&mut self, chunk: usize) -> Result<Range<usize>, SchedulingError> {
        self.transition(chunk, ChunkState::Pending, ChunkState::InFlight)?;
        self.plan
            .range(chunk)
            .ok_or(SchedulingError::UnknownChunk(chunk))
    }

    /// Marks a chunk completed and returns the number of completed chunks.
    pub fn complete(&mut self, chunk: usize) -> Result<usize, SchedulingError> {
        self.transition(chunk, ChunkState::InFlight, ChunkState::Completed)?;
        self.completed += 1;
        Ok(self.completed)
    }

    pub fn ensure_finished(&self) -> Result<(), SchedulingError> {
        if self.is_finished() {
            Ok(())
        } else {
            Err(SchedulingError::Incomplete {
                remaining: self.states.len() - self.completed,
            })
        }
    }
}
