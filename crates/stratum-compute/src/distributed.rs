//! In-process distributed backend: one OS thread per worker, connected by
//! channels.
//!
//! Each worker owns a [`ChannelComm`], its cluster context: its rank, the
//! cluster size, a sender to every peer and its own inbox. Contexts are never
//! shared between workers and are passed by reference into every distributed
//! operation. The strategy mirrors an MPI job on a single node:
//!
//! - **Point-to-point**: every worker has one inbox; peers hold senders to it.
//!   Messages that do not match the current receive are parked in a pending
//!   queue, which keeps per-pair FIFO order intact.
//! - **Collectives**: provided by [`Communicator`] on top of point-to-point.
//! - **Launch**: [`launch`] spawns the workers inside a thread scope and joins
//!   them in rank order.
//!
//! A worker that stalls stalls every peer waiting on it. There is no watchdog.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::comm::{CommError, Communicator, Rank, Tag};

struct Envelope {
    source: Rank,
    tag: Tag,
    payload: Box<dyn Any + Send>,
}

/// Cluster context of one worker, backed by `std::sync::mpsc` channels.
pub struct ChannelComm {
    rank: Rank,
    size: usize,
    /// Sender to every peer's inbox; `None` at our own rank.
    peers: Vec<Option<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    pending: RefCell<VecDeque<Envelope>>,
}

impl ChannelComm {
    /// Create the contexts of a `workers`-sized cluster, indexed by rank.
    pub fn cluster(workers: usize) -> Result<Vec<ChannelComm>, CommError> {
        if workers == 0 {
            return Err(CommError::EmptyCluster);
        }

        let (senders, inboxes): (Vec<_>, Vec<_>) =
            (0..workers).map(|_| mpsc::channel::<Envelope>()).unzip();

        let comms = inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelComm {
                rank,
                size: workers,
                peers: senders
                    .iter()
                    .enumerate()
                    .map(|(peer, tx)| (peer != rank).then(|| tx.clone()))
                    .collect(),
                inbox,
                pending: RefCell::new(VecDeque::new()),
            })
            .collect();

        Ok(comms)
    }

    /// A single-worker cluster. Collectives degenerate to local copies.
    pub fn solo() -> ChannelComm {
        let (_, inbox) = mpsc::channel();
        ChannelComm {
            rank: 0,
            size: 1,
            peers: vec![None],
            inbox,
            pending: RefCell::new(VecDeque::new()),
        }
    }

    fn take_pending(&self, source: Rank, tag: Tag) -> Option<Envelope> {
        let mut pending = self.pending.borrow_mut();
        let position = pending
            .iter()
            .position(|env| env.source == source && env.tag == tag)?;
        pending.remove(position)
    }

    fn open<T: 'static>(envelope: Envelope) -> Result<T, CommError> {
        let Envelope {
            source,
            tag,
            payload,
        } = envelope;
        payload
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| CommError::TypeMismatch {
                from: source,
                tag,
                expected: std::any::type_name::<T>(),
            })
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_raw<T: Send + 'static>(&self, value: T, dest: Rank, tag: Tag) -> Result<(), CommError> {
        self.check_rank(dest)?;
        let envelope = Envelope {
            source: self.rank,
            tag,
            payload: Box::new(value),
        };

        match &self.peers[dest] {
            Some(tx) => tx
                .send(envelope)
                .map_err(|_| CommError::Disconnected { peer: dest, tag }),
            // Self-sends never touch the channel.
            None => {
                self.pending.borrow_mut().push_back(envelope);
                Ok(())
            }
        }
    }

    fn recv_raw<T: Send + 'static>(&self, source: Rank, tag: Tag) -> Result<T, CommError> {
        self.check_rank(source)?;
        if let Some(envelope) = self.take_pending(source, tag) {
            return Self::open(envelope);
        }
        if source == self.rank {
            // Nothing queued from ourselves can ever arrive later.
            return Err(CommError::Disconnected { peer: source, tag });
        }

        loop {
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| CommError::Disconnected { peer: source, tag })?;
            if envelope.source == source && envelope.tag == tag {
                return Self::open(envelope);
            }
            self.pending.borrow_mut().push_back(envelope);
        }
    }
}

impl std::fmt::Debug for ChannelComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}

/// Run `worker` on every rank of a fresh `workers`-sized cluster.
///
/// Each worker runs on its own named thread and receives its context by
/// reference. Results are returned in rank order. A panicking worker is
/// reported as [`CommError::WorkerPanicked`]; peers blocked on it are not
/// rescued.
pub fn launch<R, F>(workers: usize, worker: F) -> Result<Vec<R>, CommError>
where
    R: Send,
    F: Fn(&ChannelComm) -> R + Sync,
{
    let comms = ChannelComm::cluster(workers)?;
    log::debug!("launching cluster of {} workers", workers);
    let worker = &worker;

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for comm in comms {
            let rank = comm.rank;
            let handle = std::thread::Builder::new()
                .name(format!("stratum-worker-{rank}"))
                .spawn_scoped(scope, move || worker(&comm))
                .map_err(|source| CommError::Spawn { rank, source })?;
            handles.push(handle);
        }

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| handle.join().map_err(|_| CommError::WorkerPanicked(rank)))
            .collect()
    })
}
