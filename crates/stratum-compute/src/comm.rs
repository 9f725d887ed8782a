//! Communicator trait and message-passing errors.
//!
//! The [`Communicator`] trait abstracts over the transport that connects the
//! workers of a cluster, so that the numerical kernels in `stratum-core` only
//! ever see a rank, a cluster size and blocking send/receive primitives.
//!
//! Implementations provide the two point-to-point primitives
//! ([`Communicator::send_raw`] and [`Communicator::recv_raw`]); every collective
//! operation (broadcast, reduce, gather, scatter, barrier) is a provided method
//! built on top of them. All operations block the calling worker until its
//! local part of the exchange is complete. There is no timeout.

use thiserror::Error;

/// Index of a worker inside a cluster, `0..size`.
pub type Rank = usize;

/// Message tag used to match sends with receives.
pub type Tag = u32;

/// Tags at or above this value are reserved for collective operations.
pub const RESERVED_TAG_BASE: Tag = u32::MAX - 15;

pub(crate) const TAG_BROADCAST: Tag = RESERVED_TAG_BASE;
pub(crate) const TAG_REDUCE: Tag = RESERVED_TAG_BASE + 1;
pub(crate) const TAG_GATHER: Tag = RESERVED_TAG_BASE + 2;
pub(crate) const TAG_SCATTER: Tag = RESERVED_TAG_BASE + 3;

/// Errors originating from the message-passing layer.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("A cluster needs at least one worker")]
    EmptyCluster,

    #[error("Rank {rank} is outside a cluster of {size} workers")]
    InvalidRank { rank: Rank, size: usize },

    #[error("Tag {0} is reserved for collective operations")]
    ReservedTag(Tag),

    #[error("Peer {peer} disconnected before the exchange on tag {tag} completed")]
    Disconnected { peer: Rank, tag: Tag },

    #[error("Message from rank {from} on tag {tag} is not a `{expected}`")]
    TypeMismatch {
        from: Rank,
        tag: Tag,
        expected: &'static str,
    },

    #[error("Root must supply the value for {0}")]
    MissingRootValue(&'static str),

    #[error("Scatter needs one chunk per worker: expected {expected}, got {got}")]
    ScatterShape { expected: usize, got: usize },

    #[error("Failed to spawn worker {rank}: {source}")]
    Spawn {
        rank: Rank,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {0} panicked")]
    WorkerPanicked(Rank),
}

/// Blocking message passing between the workers of a fixed-size cluster.
///
/// Messages between one pair of workers are delivered in the order they were
/// sent. A receive only matches a message with the requested source and tag;
/// other messages stay queued until a matching receive asks for them.
///
/// Every worker must call the collective operations in the same order with
/// the same root, exactly as with MPI collectives.
pub trait Communicator {
    /// Rank of the calling worker.
    fn rank(&self) -> Rank;

    /// Number of workers in the cluster.
    fn size(&self) -> usize;

    /// Send `value` to `dest` without checking the tag against the reserved
    /// range. Collective operations are built on this primitive.
    fn send_raw<T: Send + 'static>(&self, value: T, dest: Rank, tag: Tag) -> Result<(), CommError>;

    /// Block until a message from `source` with `tag` arrives and return it.
    fn recv_raw<T: Send + 'static>(&self, source: Rank, tag: Tag) -> Result<T, CommError>;

    /// Whether the calling worker is `root`.
    fn is_rank(&self, root: Rank) -> bool {
        self.rank() == root
    }

    /// Point-to-point send on a user tag.
    fn send<T: Send + 'static>(&self, value: T, dest: Rank, tag: Tag) -> Result<(), CommError> {
        check_user_tag(tag)?;
        self.check_rank(dest)?;
        self.send_raw(value, dest, tag)
    }

    /// Point-to-point receive on a user tag.
    fn recv<T: Send + 'static>(&self, source: Rank, tag: Tag) -> Result<T, CommError> {
        check_user_tag(tag)?;
        self.check_rank(source)?;
        self.recv_raw(source, tag)
    }

    /// Fail with [`CommError::InvalidRank`] if `rank` is not part of the cluster.
    fn check_rank(&self, rank: Rank) -> Result<(), CommError> {
        if rank < self.size() {
            Ok(())
        } else {
            Err(CommError::InvalidRank {
                rank,
                size: self.size(),
            })
        }
    }

    /// Broadcast a value from `root` to every worker.
    ///
    /// The root passes `Some(value)`; every other worker passes `None` and
    /// receives the root's value. Returns the broadcast value on all workers.
    fn broadcast<T>(&self, value: Option<T>, root: Rank) -> Result<T, CommError>
    where
        T: Clone + Send + 'static,
    {
        self.check_rank(root)?;
        if self.is_rank(root) {
            let value = value.ok_or(CommError::MissingRootValue("broadcast"))?;
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.send_raw(value.clone(), dest, TAG_BROADCAST)?;
            }
            Ok(value)
        } else {
            self.recv_raw(root, TAG_BROADCAST)
        }
    }

    /// Combine one value per worker at `root` with `op`.
    ///
    /// Values are folded in rank order, so `op` only needs to be associative.
    /// Returns `Some(result)` on the root and `None` elsewhere.
    fn reduce<T, F>(&self, value: T, op: F, root: Rank) -> Result<Option<T>, CommError>
    where
        T: Send + 'static,
        F: Fn(T, T) -> T,
    {
        self.check_rank(root)?;
        if !self.is_rank(root) {
            self.send_raw(value, root, TAG_REDUCE)?;
            return Ok(None);
        }

        let mut own = Some(value);
        let mut acc: Option<T> = None;
        for source in 0..self.size() {
            let next = if source == root {
                own.take().ok_or(CommError::MissingRootValue("reduce"))?
            } else {
                self.recv_raw(source, TAG_REDUCE)?
            };
            acc = Some(match acc {
                Some(prev) => op(prev, next),
                None => next,
            });
        }
        Ok(acc)
    }

    /// [`reduce`](Self::reduce) followed by a broadcast of the result.
    fn all_reduce<T, F>(&self, value: T, op: F, root: Rank) -> Result<T, CommError>
    where
        T: Clone + Send + 'static,
        F: Fn(T, T) -> T,
    {
        let reduced = self.reduce(value, op, root)?;
        self.broadcast(reduced, root)
    }

    /// Collect one value per worker at `root`, ordered by rank.
    fn gather<T>(&self, value: T, root: Rank) -> Result<Option<Vec<T>>, CommError>
    where
        T: Send + 'static,
    {
        self.check_rank(root)?;
        if !self.is_rank(root) {
            self.send_raw(value, root, TAG_GATHER)?;
            return Ok(None);
        }

        let mut own = Some(value);
        let mut gathered = Vec::with_capacity(self.size());
        for source in 0..self.size() {
            if source == root {
                gathered.push(own.take().ok_or(CommError::MissingRootValue("gather"))?);
            } else {
                gathered.push(self.recv_raw(source, TAG_GATHER)?);
            }
        }
        Ok(Some(gathered))
    }

    /// Hand chunk `r` of the root's chunks to worker `r`.
    ///
    /// Chunks may have different lengths (this is MPI's `scatterv`). The root
    /// passes `Some(chunks)` with exactly `size()` entries; every other worker
    /// passes `None`. Returns the calling worker's chunk.
    fn scatterv<T>(&self, chunks: Option<Vec<Vec<T>>>, root: Rank) -> Result<Vec<T>, CommError>
    where
        T: Send + 'static,
    {
        self.check_rank(root)?;
        if !self.is_rank(root) {
            return self.recv_raw(root, TAG_SCATTER);
        }

        let chunks = chunks.ok_or(CommError::MissingRootValue("scatterv"))?;
        if chunks.len() != self.size() {
            return Err(CommError::ScatterShape {
                expected: self.size(),
                got: chunks.len(),
            });
        }

        let mut own = Vec::new();
        for (dest, chunk) in chunks.into_iter().enumerate() {
            if dest == root {
                own = chunk;
            } else {
                self.send_raw(chunk, dest, TAG_SCATTER)?;
            }
        }
        Ok(own)
    }

    /// Block until every worker has reached the barrier.
    fn barrier(&self) -> Result<(), CommError> {
        let arrived = self.gather((), 0)?;
        self.broadcast(arrived.map(|_| ()), 0)
    }
}

fn check_user_tag(tag: Tag) -> Result<(), CommError> {
    if tag >= RESERVED_TAG_BASE {
        Err(CommError::ReservedTag(tag))
    } else {
        Ok(())
    }
}
