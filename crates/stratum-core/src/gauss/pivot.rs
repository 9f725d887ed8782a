//! Pivot broadcast and the forward-elimination sweep.
//!
//! Step `i` cannot start before every worker holds pivot row `i`, so the
//! sweep is a chain of `rows - 1` broadcasts rooted at alternating owners.

use stratum_compute::{CommError, Communicator};

use super::{LocalBlock, RowCyclic};

/// Broadcast global row `step` from its owner to every worker.
pub fn broadcast_pivot<C: Communicator>(
    comm: &C,
    map: &RowCyclic,
    block: &LocalBlock,
    step: usize,
) -> Result<Vec<f64>, CommError> {
    let owner = map.owner(step);
    let row = comm
        .is_rank(owner)
        .then(|| block.row(map.local_index(step)).to_vec());
    comm.broadcast(row, owner)
}

/// Reduce every worker's block to its share of an upper-triangular system.
pub fn forward_eliminate<C: Communicator>(
    comm: &C,
    map: &RowCyclic,
    block: &mut LocalBlock,
) -> Result<(), CommError> {
    for step in 0..map.rows().saturating_sub(1) {
        let pivot = broadcast_pivot(comm, map, block, step)?;
        log::trace!("rank {}: eliminating column {}", comm.rank(), step);
        block.eliminate(step, &pivot);
    }
    Ok(())
}
