//! Exact integer operations on flat constraint rows.
//!
//! Everything in this module works on [`Row`]s: a coefficient vector over an
//! ordered list of variables plus a constant, read as `a·x + c >= 0` or
//! `a·x + c = 0`. Callers decide what the columns mean (parameters, input
//! dimensions, output dimensions, existentials); here every column is just an
//! integer variable.
//!
//! Emptiness is decided with the Omega test: equalities are removed with
//! unimodular substitutions, and inequalities with Fourier-Motzkin elimination
//! whenever that is exact, falling back to the dark shadow and splinters when
//! it is not.

use num_integer::Integer;

/// A single linear constraint over flat variable columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    /// Coefficient per variable column
    pub coeffs: Vec<i64>,
    /// Constant term
    pub constant: i64,
    /// `true` for `= 0`, `false` for `>= 0`
    pub eq: bool,
}

impl Row {
    /// Create an inequality `coeffs·x + constant >= 0`.
    pub fn ge(coeffs: Vec<i64>, constant: i64) -> Self {
        Self { coeffs, constant, eq: false }
    }

    /// Create an equality `coeffs·x + constant = 0`.
    pub fn eq(coeffs: Vec<i64>, constant: i64) -> Self {
        Self { coeffs, constant, eq: true }
    }

    /// The row `-1 >= 0`, which no point satisfies.
    pub fn contradiction(n: usize) -> Self {
        Self::ge(vec![0; n], -1)
    }

    pub fn width(&self) -> usize {
        self.coeffs.len()
    }

    /// Check whether no variable has a non-zero coefficient.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0)
    }

    /// Check whether the row involves variable `k`.
    pub fn involves(&self, k: usize) -> bool {
        self.coeffs.get(k).copied().unwrap_or(0) != 0
    }

    /// The complement of an inequality: `e >= 0` becomes `-e - 1 >= 0`.
    pub fn negated(&self) -> Self {
        Self::ge(
            self.coeffs.iter().map(|&c| -c).collect(),
            -self.constant - 1,
        )
    }

    /// Evaluate `coeffs·x + constant` at a point.
    pub fn evaluate(&self, point: &[i64]) -> i64 {
        self.coeffs
            .iter()
            .zip(point)
            .fold(self.constant, |acc, (&c, &x)| acc + c * x)
    }

    /// Check whether a point satisfies the row.
    pub fn is_satisfied(&self, point: &[i64]) -> bool {
        let v = self.evaluate(point);
        if self.eq { v == 0 } else { v >= 0 }
    }

    /// Split an equality into the two inequalities it stands for.
    pub fn as_inequalities(&self) -> Vec<Row> {
        if self.eq {
            let pos = Row::ge(self.coeffs.clone(), self.constant);
            let neg = Row::ge(self.coeffs.iter().map(|&c| -c).collect(), -self.constant);
            vec![pos, neg]
        } else {
            vec![self.clone()]
        }
    }

    fn scaled(&self, factor: i64) -> Self {
        Self {
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            constant: self.constant * factor,
            eq: self.eq,
        }
    }

    fn add_scaled(&mut self, other: &Row, factor: i64) {
        for (c, &o) in self.coeffs.iter_mut().zip(&other.coeffs) {
            *c += factor * o;
        }
        self.constant += factor * other.constant;
    }

    fn coeff_gcd(&self) -> i64 {
        self.coeffs.iter().fold(0i64, |g, &c| g.gcd(&c))
    }

    /// Flip an equality so that its first non-zero coefficient is positive.
    fn canonical_sign(mut self) -> Self {
        if let Some(&first) = self.coeffs.iter().find(|&&c| c != 0) {
            if first < 0 {
                self = self.scaled(-1);
            }
        }
        self
    }
}

/// A divisibility condition `coeffs·x + constant ≡ 0 (mod modulus)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Congruence {
    /// The expression that must be divisible
    pub row: Row,
    /// The modulus, always greater than one
    pub modulus: i64,
}

/// Integer floor division.
pub fn floor_div(a: i64, b: i64) -> i64 {
    Integer::div_floor(&a, &b)
}

/// Integer ceiling division.
pub fn ceil_div(a: i64, b: i64) -> i64 {
    -Integer::div_floor(&-a, &b)
}

enum Normalized {
    Trivial,
    Infeasible,
    Row(Row),
}

/// Divide a row by the gcd of its coefficients, tightening inequalities.
fn normalize(row: Row) -> Normalized {
    let g = row.coeff_gcd();
    if g == 0 {
        let holds = if row.eq { row.constant == 0 } else { row.constant >= 0 };
        return if holds { Normalized::Trivial } else { Normalized::Infeasible };
    }
    if g == 1 {
        return Normalized::Row(row);
    }
    if row.eq && row.constant % g != 0 {
        return Normalized::Infeasible;
    }
    Normalized::Row(Row {
        coeffs: row.coeffs.iter().map(|&c| c / g).collect(),
        constant: floor_div(row.constant, g),
        eq: row.eq,
    })
}

/// Normalize a system, merge duplicates and detect trivial contradictions.
///
/// Returns `None` when the system is found infeasible. Opposite inequalities
/// whose constants cancel are turned into equalities, and inequalities
/// parallel to an equality are dropped when redundant.
pub fn simplify(rows: Vec<Row>) -> Option<Vec<Row>> {
    let mut eqs: Vec<Row> = Vec::new();
    let mut ineqs: Vec<Row> = Vec::new();

    for row in rows {
        match normalize(row) {
            Normalized::Trivial => {}
            Normalized::Infeasible => return None,
            Normalized::Row(r) if r.eq => push_equality(&mut eqs, r.canonical_sign())?,
            Normalized::Row(r) => {
                match ineqs.iter_mut().find(|e| e.coeffs == r.coeffs) {
                    Some(e) => e.constant = e.constant.min(r.constant),
                    None => ineqs.push(r),
                }
            }
        }
    }

    // Opposite pairs: a·x + c1 >= 0 and -a·x + c2 >= 0.
    let mut removed = vec![false; ineqs.len()];
    for i in 0..ineqs.len() {
        if removed[i] {
            continue;
        }
        for j in (i + 1)..ineqs.len() {
            if removed[j] {
                continue;
            }
            let opposite = ineqs[i]
                .coeffs
                .iter()
                .zip(&ineqs[j].coeffs)
                .all(|(&a, &b)| a == -b);
            if !opposite {
                continue;
            }
            let sum = ineqs[i].constant + ineqs[j].constant;
            if sum < 0 {
                return None;
            }
            if sum == 0 {
                removed[i] = true;
                removed[j] = true;
                let eq = Row::eq(ineqs[i].coeffs.clone(), ineqs[i].constant);
                push_equality(&mut eqs, eq.canonical_sign())?;
            }
            break;
        }
    }

    let mut result = Vec::with_capacity(eqs.len() + ineqs.len());
    for (i, ineq) in ineqs.into_iter().enumerate() {
        if removed[i] {
            continue;
        }
        let mut redundant = false;
        for e in &eqs {
            // On the equality's hyperplane a·x is fixed to -e.constant.
            let sign = if ineq.coeffs == e.coeffs {
                1
            } else if ineq.coeffs.iter().zip(&e.coeffs).all(|(&a, &b)| a == -b) {
                -1
            } else {
                continue;
            };
            if ineq.constant - sign * e.constant < 0 {
                return None;
            }
            redundant = true;
            break;
        }
        if !redundant {
            result.push(ineq);
        }
    }
    let mut all = eqs;
    all.extend(result);
    Some(all)
}

fn push_equality(eqs: &mut Vec<Row>, r: Row) -> Option<()> {
    match eqs.iter().find(|e| e.coeffs == r.coeffs) {
        Some(e) if e.constant != r.constant => None,
        Some(_) => Some(()),
        None => {
            eqs.push(r);
            Some(())
        }
    }
}

/// Find an equality with a unit coefficient on one of the given columns.
fn find_unit_equality(rows: &[Row], cols: impl Fn(usize) -> bool) -> Option<(usize, usize)> {
    rows.iter().enumerate().find_map(|(ri, r)| {
        if !r.eq {
            return None;
        }
        r.coeffs
            .iter()
            .enumerate()
            .find(|&(k, &c)| cols(k) && c.abs() == 1)
            .map(|(k, _)| (ri, k))
    })
}

/// Remove variable `k` from `target` using the equality `eq`, which must
/// have a unit coefficient on `k`.
fn substitute_unit(target: &mut Row, eq: &Row, k: usize) {
    let b = target.coeffs[k];
    if b != 0 {
        let a = eq.coeffs[k];
        target.add_scaled(eq, -b * a);
    }
}

/// Remove variable `k` from `target` using the equality `eq` whose
/// coefficient on `k` may be any non-zero value. The target is scaled by
/// `|a|`, which keeps inequality directions.
fn substitute_scaled(target: &mut Row, eq: &Row, k: usize) -> i64 {
    let a = eq.coeffs[k];
    let b = target.coeffs[k];
    if b == 0 {
        return 1;
    }
    *target = target.scaled(a.abs());
    target.add_scaled(eq, -a.signum() * b);
    a.abs()
}

/// Pair every lower bound on `k` with every upper bound.
///
/// With `dark` set, each combination is tightened by `(a - 1)(b - 1)`,
/// yielding the dark shadow instead of the real one.
fn fourier_motzkin(rows: &[Row], k: usize, dark: bool) -> Vec<Row> {
    let mut out = Vec::new();
    let mut lowers = Vec::new();
    let mut uppers = Vec::new();
    let expanded: Vec<Row> = rows
        .iter()
        .flat_map(|r| if r.involves(k) { r.as_inequalities() } else { vec![r.clone()] })
        .collect();
    for r in &expanded {
        let c = r.coeffs[k];
        if c > 0 {
            lowers.push(r);
        } else if c < 0 {
            uppers.push(r);
        } else {
            out.push(r.clone());
        }
    }
    for l in &lowers {
        let a = l.coeffs[k];
        for u in &uppers {
            let b = -u.coeffs[k];
            let mut combined = l.scaled(b);
            combined.add_scaled(u, a);
            combined.coeffs[k] = 0;
            if dark {
                combined.constant -= (a - 1) * (b - 1);
            }
            out.push(combined);
        }
    }
    out
}

/// Count bound pairs for variable `k` and report whether eliminating it by
/// Fourier-Motzkin is exact over the integers.
fn elimination_cost(rows: &[Row], k: usize) -> (usize, bool) {
    let lowers: Vec<i64> = rows.iter().map(|r| r.coeffs[k]).filter(|&c| c > 0).collect();
    let uppers: Vec<i64> = rows.iter().map(|r| -r.coeffs[k]).filter(|&c| c > 0).collect();
    let exact = lowers
        .iter()
        .all(|&a| a == 1 || uppers.iter().all(|&b| b == 1));
    (lowers.len() * uppers.len(), exact)
}

/// Decide whether a system has no integer solution.
pub fn is_integer_empty(rows: &[Row]) -> bool {
    omega_empty(rows.to_vec())
}

fn omega_empty(mut rows: Vec<Row>) -> bool {
    loop {
        rows = match simplify(rows) {
            Some(r) => r,
            None => return true,
        };

        if let Some(idx) = rows.iter().position(|r| r.eq) {
            if let Some((_, k)) = find_unit_equality(&rows[idx..=idx], |_| true) {
                let eq = rows.remove(idx);
                for r in rows.iter_mut() {
                    substitute_unit(r, &eq, k);
                }
                continue;
            }
            // No unit coefficient: reduce the other columns modulo the
            // smallest one. The change of variables is unimodular, so the
            // integer points are preserved one to one.
            let eq = rows[idx].clone();
            let k = match eq
                .coeffs
                .iter()
                .enumerate()
                .filter(|(_, &c)| c != 0)
                .min_by_key(|(_, &c)| c.abs())
            {
                Some((k, _)) => k,
                None => continue,
            };
            let ak = eq.coeffs[k];
            for j in 0..eq.width() {
                if j == k || eq.coeffs[j] == 0 {
                    continue;
                }
                let q = floor_div(eq.coeffs[j], ak);
                if q == 0 {
                    continue;
                }
                for r in rows.iter_mut() {
                    r.coeffs[j] -= q * r.coeffs[k];
                }
            }
            continue;
        }

        let width = rows.first().map(Row::width).unwrap_or(0);
        let active: Vec<usize> = (0..width).filter(|&k| rows.iter().any(|r| r.involves(k))).collect();
        if active.is_empty() {
            return false;
        }

        // A variable bounded on one side only can always be pushed far
        // enough to satisfy every row that mentions it.
        let one_sided: Vec<usize> = active
            .iter()
            .copied()
            .filter(|&k| {
                rows.iter().all(|r| r.coeffs[k] >= 0) || rows.iter().all(|r| r.coeffs[k] <= 0)
            })
            .collect();
        if !one_sided.is_empty() {
            rows.retain(|r| one_sided.iter().all(|&k| r.coeffs[k] == 0));
            continue;
        }

        let costs: Vec<(usize, usize, bool)> = active
            .iter()
            .map(|&k| {
                let (cost, exact) = elimination_cost(&rows, k);
                (k, cost, exact)
            })
            .collect();

        if let Some(&(k, _, _)) = costs.iter().filter(|c| c.2).min_by_key(|c| c.1) {
            rows = fourier_motzkin(&rows, k, false);
            continue;
        }

        let k = match costs.iter().min_by_key(|c| c.1) {
            Some(&(k, _, _)) => k,
            None => return false,
        };

        if omega_empty(fourier_motzkin(&rows, k, false)) {
            return true;
        }
        if !omega_empty(fourier_motzkin(&rows, k, true)) {
            return false;
        }

        // Splinters: some integer solution, if any, lies close to a lower
        // bound of `k`.
        let m = rows.iter().map(|r| -r.coeffs[k]).max().unwrap_or(1);
        for lower in rows.iter().filter(|r| r.coeffs[k] > 0) {
            let a = lower.coeffs[k];
            let last = floor_div(m * a - a - m, m);
            for i in 0..=last {
                let mut split = rows.clone();
                split.push(Row::eq(lower.coeffs.clone(), lower.constant - i));
                if !omega_empty(split) {
                    return false;
                }
            }
        }
        return true;
    }
}

/// Result of eliminating variables from a system.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Constraints on the remaining variables
    pub rows: Vec<Row>,
    /// Divisibility conditions left over by non-unit equalities
    pub congruences: Vec<Congruence>,
    /// Whether the projection is exact over the integers
    pub exact: bool,
    /// Whether the system was found infeasible on the way
    pub infeasible: bool,
}

impl Projection {
    fn infeasible(width: usize) -> Self {
        Self {
            rows: vec![Row::contradiction(width)],
            congruences: Vec::new(),
            exact: true,
            infeasible: true,
        }
    }
}

fn normalize_congruence(c: Congruence) -> Option<Option<Congruence>> {
    let m = c.modulus;
    let coeffs: Vec<i64> = c.row.coeffs.iter().map(|&x| x.mod_floor(&m)).collect();
    let constant = c.row.constant.mod_floor(&m);
    if coeffs.iter().all(|&x| x == 0) {
        return if constant == 0 { Some(None) } else { None };
    }
    let g = coeffs.iter().fold(m.gcd(&constant), |g, &x| g.gcd(&x));
    let modulus = m / g;
    if modulus == 1 {
        return Some(None);
    }
    Some(Some(Congruence {
        row: Row::ge(coeffs.iter().map(|&x| x / g).collect(), constant / g),
        modulus,
    }))
}

/// Eliminate the variables in `vars`, leaving their columns zero.
///
/// Unit equalities are substituted. Other equalities are substituted after
/// scaling and leave a congruence on the remaining variables, which keeps
/// the result exact. Variables with no equality are removed by
/// Fourier-Motzkin; a pair of non-unit bounds makes the result a rational
/// over-approximation and clears `exact`.
///
/// With `exact_only`, only unit substitutions and exact Fourier-Motzkin
/// steps are taken and no congruence is produced; variables that would need
/// anything else are left in place.
pub fn project_out(rows: Vec<Row>, vars: &[usize], exact_only: bool) -> Projection {
    let width = rows.first().map(Row::width).unwrap_or(0);
    let mut rows = match simplify(rows) {
        Some(r) => r,
        None => return Projection::infeasible(width),
    };
    let mut congruences: Vec<Congruence> = Vec::new();
    let mut exact = true;
    let mut pending: Vec<usize> = vars.to_vec();

    loop {
        // Variables that only appear in congruences can absorb part of the
        // modulus.
        for &k in &pending {
            if rows.iter().any(|r| r.involves(k)) {
                continue;
            }
            for c in congruences.iter_mut() {
                let b = c.row.coeffs[k];
                if b != 0 {
                    c.modulus = c.modulus.gcd(&b);
                    c.row.coeffs[k] = 0;
                }
            }
        }
        let mut next = Vec::with_capacity(congruences.len());
        for c in congruences.drain(..) {
            match normalize_congruence(c) {
                None => return Projection::infeasible(width),
                Some(Some(c)) => next.push(c),
                Some(None) => {}
            }
        }
        congruences = next;
        pending.retain(|&k| rows.iter().any(|r| r.involves(k)));
        if pending.is_empty() {
            break;
        }

        let is_pending = |k: usize| pending.contains(&k);
        if let Some((ri, k)) = find_unit_equality(&rows, is_pending) {
            let eq = rows.remove(ri);
            for r in rows.iter_mut() {
                substitute_unit(r, &eq, k);
            }
            for c in congruences.iter_mut() {
                substitute_unit(&mut c.row, &eq, k);
            }
        } else if let Some((ri, k)) = rows.iter().enumerate().find_map(|(ri, r)| {
            if !r.eq || exact_only {
                return None;
            }
            pending
                .iter()
                .copied()
                .filter(|&k| r.involves(k))
                .min_by_key(|&k| r.coeffs[k].abs())
                .map(|k| (ri, k))
        }) {
            let eq = rows.remove(ri);
            for r in rows.iter_mut() {
                substitute_scaled(r, &eq, k);
            }
            for c in congruences.iter_mut() {
                let scale = substitute_scaled(&mut c.row, &eq, k);
                c.modulus *= scale;
            }
            let mut rest = eq.clone();
            rest.coeffs[k] = 0;
            congruences.push(Congruence { row: Row::ge(rest.coeffs, rest.constant), modulus: eq.coeffs[k].abs() });
        } else {
            let choice = pending
                .iter()
                .map(|&k| {
                    let (cost, pair_exact) = elimination_cost(&rows, k);
                    (k, cost, pair_exact)
                })
                .filter(|c| !exact_only || (c.2 && !rows.iter().any(|r| r.eq && r.involves(c.0))))
                .min_by_key(|c| (!c.2, c.1));
            let (k, _, pair_exact) = match choice {
                Some(c) => c,
                None => break,
            };
            let in_congruence = congruences.iter().any(|c| c.row.involves(k));
            if !pair_exact || in_congruence {
                if exact_only {
                    break;
                }
                exact = false;
                congruences.retain(|c| !c.row.involves(k));
            }
            rows = fourier_motzkin(&rows, k, false);
            pending.retain(|&p| p != k);
        }

        rows = match simplify(rows) {
            Some(r) => r,
            None => return Projection::infeasible(width),
        };
    }

    Projection { rows, congruences, exact, infeasible: false }
}

/// Check whether `rows` imply `row` over the integers.
pub fn implies(rows: &[Row], row: &Row) -> bool {
    row.as_inequalities().iter().all(|ineq| {
        let mut test = rows.to_vec();
        test.push(ineq.negated());
        is_integer_empty(&test)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_ceil_div() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(ceil_div(7, 2), 4);
        assert_eq!(ceil_div(-7, 2), -3);
        assert_eq!(floor_div(-6, 3), -2);
        assert_eq!(ceil_div(-6, 3), -2);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(ceil_div(7, -2), -3);
    }

    #[test]
    fn test_simplify_detects_contradiction() {
        // x >= 3 and x <= 1
        let rows = vec![Row::ge(vec![1], -3), Row::ge(vec![-1], 1)];
        assert!(simplify(rows).is_none());
    }

    #[test]
    fn test_simplify_makes_equality() {
        // x >= 2 and x <= 2
        let rows = vec![Row::ge(vec![1], -2), Row::ge(vec![-1], 2)];
        let simplified = simplify(rows).unwrap();
        assert_eq!(simplified, vec![Row::eq(vec![1], -2)]);
    }

    #[test]
    fn test_rational_but_not_integer() {
        // 1 <= 3x <= 2 has rational solutions only
        let rows = vec![Row::ge(vec![3], -1), Row::ge(vec![-3], 2)];
        assert!(is_integer_empty(&rows));
    }

    #[test]
    fn test_equality_without_unit_coefficient() {
        // 2x + 4y = 3 has no integer solution
        assert!(is_integer_empty(&[Row::eq(vec![2, 4], -3)]));
        // 3x + 5y = 1, 0 <= x <= 10, 0 <= y <= 10 has none either (x=2,y=-1 is out)
        let rows = vec![
            Row::eq(vec![3, 5], -1),
            Row::ge(vec![1, 0], 0),
            Row::ge(vec![-1, 0], 10),
            Row::ge(vec![0, 1], 0),
            Row::ge(vec![0, -1], 10),
        ];
        assert!(is_integer_empty(&rows));
        // 3x + 5y = 8 has x = y = 1
        let mut rows = rows;
        rows[0] = Row::eq(vec![3, 5], -8);
        assert!(!is_integer_empty(&rows));
    }

    #[test]
    fn test_dark_shadow_and_splinters() {
        // 27 <= 11x + 13y <= 45, -10 <= 7x - 9y <= 4: Pugh's example, no integer point
        let rows = vec![
            Row::ge(vec![11, 13], -27),
            Row::ge(vec![-11, -13], 45),
            Row::ge(vec![7, -9], 10),
            Row::ge(vec![-7, 9], 4),
        ];
        assert!(is_integer_empty(&rows));
    }

    #[test]
    fn test_project_out_unit_equality() {
        // exists i: t = i, 0 <= i <= 9  =>  0 <= t <= 9
        let rows = vec![
            Row::eq(vec![1, -1], 0),
            Row::ge(vec![0, 1], 0),
            Row::ge(vec![0, -1], 9),
        ];
        let p = project_out(rows, &[1], false);
        assert!(p.exact);
        assert!(p.congruences.is_empty());
        assert!(implies(&p.rows, &Row::ge(vec![1, 0], 0)));
        assert!(implies(&p.rows, &Row::ge(vec![-1, 0], 9)));
        assert!(!implies(&p.rows, &Row::ge(vec![-1, 0], 8)));
    }

    #[test]
    fn test_project_out_stride_leaves_congruence() {
        // exists i: t = 2i
        let rows = vec![Row::eq(vec![1, -2], 0)];
        let p = project_out(rows, &[1], false);
        assert!(p.exact);
        assert_eq!(p.congruences.len(), 1);
        assert_eq!(p.congruences[0].modulus, 2);
    }

    #[test]
    fn test_implies() {
        let ctx = vec![Row::ge(vec![1], 0), Row::ge(vec![-1], 5)];
        assert!(implies(&ctx, &Row::ge(vec![1], 1)));
        assert!(!implies(&ctx, &Row::ge(vec![1], -1)));
        assert!(implies(&ctx, &Row::ge(vec![-1], 7)));
    }
}
