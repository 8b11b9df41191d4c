//! JSON description of a SCoP.
//!
//! Relations are written in set/map notation and parsed with
//! [`parse_union_map`]. A description without a region locates it in the
//! source text through its `#pragma scop` and `#pragma endscop` lines.

use crate::analysis::scop::{Array, Expr, Scop, ScopBuilder, Statement};
use crate::frontend::parser::{parse_union_map, parse_union_set};
use crate::utils::errors::{ScopError, ScopErrorKind, ScopgenError};
use crate::utils::location::SourceMap;
use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::Range;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopDescription {
    /// Constraints on the parameters
    #[serde(default = "universe")]
    pub context: String,
    /// Byte offsets of the region in the source text
    #[serde(default)]
    pub region: Option<RegionDescription>,
    #[serde(default)]
    pub arrays: Vec<Array>,
    pub statements: Vec<StatementDescription>,
    /// Dependences to use instead of computing them
    #[serde(default)]
    pub dependences: Option<DependenceDescription>,
}

fn universe() -> String {
    "{ : }".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegionDescription {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementDescription {
    pub domain: String,
    pub schedule: String,
    pub body: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenceDescription {
    pub flow: String,
    #[serde(rename = "false")]
    pub false_deps: String,
}

fn is_pragma(line: &str, name: &str) -> bool {
    line.split_whitespace().eq(["#pragma", name])
}

/// Byte range from the start of the `#pragma scop` line to the end of the
/// `#pragma endscop` line.
pub fn find_region(source: &str) -> Result<Range<usize>, ScopError> {
    let map = SourceMap::new(source);
    let missing = |what: &str| ScopError::new(ScopErrorKind::MissingRegion, format!("no {} line in the input", what));
    let first = map.find_line(1, |l| is_pragma(l, "scop")).ok_or_else(|| missing("#pragma scop"))?;
    let last = map
        .find_line(first + 1, |l| is_pragma(l, "endscop"))
        .ok_or_else(|| missing("#pragma endscop after #pragma scop"))?;
    let start = map.line_range(first).map_or(0, |(s, _)| s);
    let end = map.line_range(last).map_or(source.len(), |(_, e)| e);
    debug!("region found at lines {}..={}", first, last);
    Ok(start..end)
}

/// Build a [`Scop`] from its description, locating the region in
/// `source_text` when the description gives none.
pub fn load_scop(desc: &ScopDescription, source_text: &str) -> Result<Scop, ScopgenError> {
    let mut builder = ScopBuilder::new(parse_union_set(&desc.context)?);
    for stmt in &desc.statements {
        let statement = Statement::new(
            parse_union_set(&stmt.domain)?,
            parse_union_map(&stmt.schedule)?,
            stmt.body.clone(),
        )?;
        builder = builder.statement(statement);
    }
    for array in &desc.arrays {
        builder = builder.array(array.clone());
    }
    let region = match desc.region {
        Some(r) => r.start..r.end,
        None => find_region(source_text)?,
    };
    builder = builder.region(region);
    if let Some(deps) = &desc.dependences {
        builder = builder.dependences(parse_union_map(&deps.flow)?, parse_union_map(&deps.false_deps)?);
    }
    let scop = builder.build()?;
    info!("loaded SCoP with {} statements and {} arrays", scop.statements.len(), scop.arrays.len());
    Ok(scop)
}

/// Read and load the description at `path` for `source_text`.
pub fn load_scop_file(path: &Path, source_text: &str) -> anyhow::Result<Scop> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read SCoP description {:?}", path))?;
    let desc: ScopDescription =
        serde_json::from_str(&text).with_context(|| format!("invalid SCoP description {:?}", path))?;
    load_scop(&desc, source_text).with_context(|| format!("inconsistent SCoP description {:?}", path))
}
