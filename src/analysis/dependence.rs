//! Memory-based dependence computation.
//!
//! Used when a SCoP description carries no dependence relations. The
//! relations are derived from the access relations and the schedule:
//!
//! - flow: a write followed by a read of the same element
//! - false: a read followed by a write (anti) or a write followed by a
//!   write (output) of the same element
//!
//! Every pair of instances touching the same element is kept, without
//! killing by intermediate writes, so the result over-approximates the
//! value-based dependences.

use crate::analysis::scop::Scop;
use crate::polyhedral::{lex_lt, UnionMap};
use log::{debug, warn};
use std::collections::BTreeSet;

/// Pairs of statement instances where the first runs strictly before the
/// second under `schedule`.
pub fn precedence(schedule: &UnionMap) -> UnionMap {
    let arities: BTreeSet<usize> = schedule.pieces.iter().map(|p| p.n_out()).collect();
    if arities.len() > 1 {
        warn!(
            "schedule dimensions differ between statements ({:?}); instances of different arity are left unordered",
            arities
        );
    }
    let inverse = schedule.reverse();
    let mut before = UnionMap::empty(schedule.params.clone());
    for n in arities {
        let order = lex_lt(&schedule.params, n);
        before = before.union(&schedule.apply_range(&order).apply_range(&inverse));
    }
    before
}

/// Compute `(flow, false)` dependences of a SCoP.
pub fn compute_dependences(scop: &Scop) -> (UnionMap, UnionMap) {
    let params = scop.params().to_vec();
    let mut reads = UnionMap::empty(params.clone());
    let mut writes = UnionMap::empty(params);

    for stmt in &scop.statements {
        for access in stmt.accesses() {
            // Unnamed targets are plain values, not memory.
            if access.target().is_none() {
                continue;
            }
            let relation = access.relation.intersect_domain(&stmt.domain);
            if access.read {
                reads = reads.union(&relation);
            }
            if access.write {
                writes = writes.union(&relation);
            }
        }
    }

    let schedule = scop.schedule.intersect_domain(&scop.domain);
    let before = precedence(&schedule);

    let flow = writes.apply_range(&reads.reverse()).intersect(&before);
    let anti = reads.apply_range(&writes.reverse());
    let output = writes.apply_range(&writes.reverse());
    let false_deps = anti.union(&output).intersect(&before);

    debug!("flow dependences: {}", flow);
    debug!("false dependences: {}", false_deps);
    (flow, false_deps)
}
