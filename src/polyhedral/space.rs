//! Polyhedral spaces describe the dimensions of sets and relations.
//!
//! A space records:
//! - Parameter names (symbolic constants, aligned by name)
//! - The input tuple (for maps only)
//! - The output tuple (the set tuple for sets)

use serde::{Serialize, Deserialize};
use std::fmt;

/// A named (or anonymous) tuple of dimensions, as in `S1[i, j]` or `[t0]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tuple {
    /// Tuple name; `None` for anonymous tuples
    pub name: Option<String>,
    /// Dimension names, used for display only
    pub dims: Vec<String>,
}

impl Tuple {
    /// Create a tuple with the given name and dimension names.
    pub fn new(name: Option<String>, dims: Vec<String>) -> Self {
        Self { name, dims }
    }

    /// Create an anonymous tuple of `n` dimensions named with `prefix`.
    pub fn anonymous(n: usize, prefix: &str) -> Self {
        Self {
            name: None,
            dims: (0..n).map(|i| format!("{}{}", prefix, i)).collect(),
        }
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    /// Two tuples describe the same space when name and arity agree.
    pub fn matches(&self, other: &Tuple) -> bool {
        self.name == other.name && self.dims.len() == other.dims.len()
    }

    /// The first `n` dimensions under the same name.
    pub fn truncated(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            dims: self.dims.iter().take(n).cloned().collect(),
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}", name)?;
        }
        write!(f, "[{}]", self.dims.join(", "))
    }
}

/// The space of a set (`domain == None`) or of a map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Space {
    /// Parameter names
    pub params: Vec<String>,
    /// Input tuple for maps
    pub domain: Option<Tuple>,
    /// Output tuple, or the set tuple
    pub range: Tuple,
}

impl Space {
    /// Create a set space.
    pub fn set(params: Vec<String>, tuple: Tuple) -> Self {
        Self { params, domain: None, range: tuple }
    }

    /// Create a map space.
    pub fn map(params: Vec<String>, domain: Tuple, range: Tuple) -> Self {
        Self { params, domain: Some(domain), range }
    }

    /// Check if this is a set space.
    pub fn is_set(&self) -> bool {
        self.domain.is_none()
    }

    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    /// Number of input dimensions (zero for sets).
    pub fn n_in(&self) -> usize {
        self.domain.as_ref().map_or(0, Tuple::len)
    }

    /// Number of output (or set) dimensions.
    pub fn n_out(&self) -> usize {
        self.range.len()
    }

    /// Position of a parameter by name.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }

    /// Check whether two spaces have matching tuples (parameters ignored).
    pub fn matches(&self, other: &Space) -> bool {
        let domains = match (&self.domain, &other.domain) {
            (None, None) => true,
            (Some(a), Some(b)) => a.matches(b),
            _ => false,
        };
        domains && self.range.matches(&other.range)
    }

    /// The space with input and output swapped. Sets are returned unchanged.
    pub fn reversed(&self) -> Self {
        match &self.domain {
            Some(domain) => Self::map(self.params.clone(), self.range.clone(), domain.clone()),
            None => self.clone(),
        }
    }

    /// The set space of the input tuple.
    pub fn domain_space(&self) -> Self {
        let tuple = self.domain.clone().unwrap_or_else(|| Tuple::anonymous(0, "i"));
        Self::set(self.params.clone(), tuple)
    }

    /// The set space of the output tuple.
    pub fn range_space(&self) -> Self {
        Self::set(self.params.clone(), self.range.clone())
    }

    /// Display names for input, then output dimensions.
    pub fn var_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.domain.iter().flat_map(|d| d.dims.iter().cloned()).collect();
        names.extend(self.range.dims.iter().cloned());
        names
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.params.is_empty() {
            write!(f, "[{}] -> ", self.params.join(", "))?;
        }
        match &self.domain {
            Some(domain) => write!(f, "{{ {} -> {} }}", domain, self.range),
            None => write!(f, "{{ {} }}", self.range),
        }
    }
}

/// Merge two parameter lists, keeping the order of the first.
pub fn merge_params(a: &[String], b: &[String]) -> Vec<String> {
    let mut merged = a.to_vec();
    for p in b {
        if !merged.contains(p) {
            merged.push(p.clone());
        }
    }
    merged
}
