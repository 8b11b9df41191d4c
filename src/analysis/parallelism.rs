//! Dependence-based parallelism test for a schedule dimension.

use crate::polyhedral::{BasicMap, UnionMap};
use log::{trace, warn};

/// Check whether the innermost dimension of `prefix` carries no dependence.
///
/// `prefix` maps statement instances to the schedule dimensions built so
/// far, the current one last. The outer dimensions are assumed to carry
/// no dependence any more (they are either parallel or already enclose
/// the loop sequentially), so only dependences whose outer distances are
/// zero are considered.
pub fn is_parallel(prefix: &UnionMap, flow: &UnionMap, false_deps: &UnionMap) -> bool {
    let deps = flow
        .union(false_deps)
        .apply_range(prefix)
        .apply_domain(prefix);
    if deps.is_empty() {
        return true;
    }

    let spaces = deps.spaces();
    let space = match spaces.as_slice() {
        [space] => space.clone(),
        _ => {
            warn!(
                "dependences span {} schedule spaces; treating the loop as sequential",
                spaces.len()
            );
            return false;
        }
    };
    let dimension = space.n_out();
    if dimension == 0 || space.n_in() != dimension {
        warn!("unexpected dependence space {}; treating the loop as sequential", space);
        return false;
    }

    let mut outer_zero = deps;
    for i in 0..dimension - 1 {
        outer_zero = outer_zero.equate(i, i);
    }
    let last_equal = UnionMap::from_basic(
        BasicMap::universe(space).equate(dimension - 1, dimension - 1),
    );
    let parallel = outer_zero.is_subset(&last_equal);
    trace!("dependences at depth {}: {} (parallel: {})", dimension, outer_zero, parallel);
    parallel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parse_union_map;

    fn map(s: &str) -> UnionMap {
        parse_union_map(s).unwrap()
    }

    #[test]
    fn test_no_dependences_is_parallel() {
        let prefix = map("[N] -> { S1[i] -> [i] : 0 <= i < N }");
        assert!(is_parallel(&prefix, &map("{ }"), &map("{ }")));
    }

    #[test]
    fn test_carried_dependence_is_sequential() {
        let prefix = map("[N] -> { S[i] -> [i] : 0 <= i < N }");
        let flow = map("[N] -> { S[i] -> S[i + 1] : 0 <= i < N - 1 }");
        assert!(!is_parallel(&prefix, &flow, &map("{ }")));
        assert!(!is_parallel(&prefix, &map("{ }"), &flow));
    }

    #[test]
    fn test_zero_distance_dependence_is_parallel() {
        let prefix = map("[N] -> { S1[i] -> [i] : 0 <= i < N; S2[i] -> [i] : 0 <= i < N }");
        let flow = map("[N] -> { S1[i] -> S2[i] : 0 <= i < N }");
        assert!(is_parallel(&prefix, &flow, &map("{ }")));
    }

    #[test]
    fn test_inner_dimension_with_outer_carried_dependence() {
        // for i, for j: A[i][j] = A[i - 1][j]
        let flow = map("[N] -> { S[i, j] -> S[i + 1, j] : 0 <= i < N - 1 and 0 <= j < N }");
        let outer = map("[N] -> { S[i, j] -> [i] }");
        let both = map("[N] -> { S[i, j] -> [i, j] }");
        assert!(!is_parallel(&outer, &flow, &map("{ }")));
        assert!(is_parallel(&both, &flow, &map("{ }")));
    }

    #[test]
    fn test_dependence_outside_the_loop_is_ignored() {
        // Two separate loops: the dependence goes from the first to the second.
        let flow = map("[N] -> { S1[i] -> S2[i] : 0 <= i < N }");
        let first = map("[N] -> { S1[i] -> [0, i] }");
        assert!(is_parallel(&first, &flow, &map("{ }")));
    }
}
