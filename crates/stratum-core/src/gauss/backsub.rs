//! Distributed back-substitution over an upper-triangular strip layout.

use stratum_compute::{CommError, Communicator};

use super::{LocalBlock, RowCyclic};

/// Solve the triangular system left by forward elimination.
///
/// Walks rows from last to first. The owner of row `i` divides its pending
/// accumulator by the diagonal entry and broadcasts `x[i]`; every worker then
/// removes `row[i] * x[i]` from the accumulators of its rows above `i`.
/// Each accumulator starts as the row's right-hand side, so when row `i` is
/// reached it equals `b[i] - sum_{j>i} a[i][j] * x[j]`.
///
/// Every worker returns the full solution.
pub fn back_substitute<C: Communicator>(
    comm: &C,
    map: &RowCyclic,
    block: &LocalBlock,
) -> Result<Vec<f64>, CommError> {
    let rows = map.rows();
    let mut acc = block.rhs();
    let mut solution = vec![0.0; rows];

    for i in (0..rows).rev() {
        let owner = map.owner(i);
        let mine = comm.is_rank(owner).then(|| {
            let local = map.local_index(i);
            acc[local] / block.get(local, i)
        });
        let x = comm.broadcast(mine, owner)?;
        solution[i] = x;

        for local in 0..block.count_below(i) {
            acc[local] -= block.get(local, i) * x;
        }
    }
    Ok(solution)
}
