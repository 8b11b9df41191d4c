//! Splicing of the generated code into the input source.

use crate::analysis::scop::Scop;
use crate::codegen::c::declaration;
use crate::codegen::cpu::print_scop;
use crate::codegen::CodegenOptions;
use crate::utils::errors::{CodegenError, CodegenErrorKind};
use crate::utils::pretty::CodeFormatter;
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// First line of every generated region.
pub const MARKER: &str = "/* scopgen generated CPU code */";

const SUFFIX: &str = "scopgen";

/// Name of the generated file for `input`: its final component with
/// `.scopgen` inserted before the extension.
pub fn output_file_name(input: &Path) -> PathBuf {
    let base = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{}{}", &base[..dot], SUFFIX, &base[dot..]),
        _ => format!("{}.{}", base, SUFFIX),
    };
    PathBuf::from(name)
}

/// Render `input_text` with the SCoP region replaced by generated code.
pub fn generate_to_string(scop: Option<&Scop>, options: &CodegenOptions, input_text: &str) -> Result<String> {
    let scop = scop.ok_or_else(|| CodegenError::new(CodegenErrorKind::MissingScop, "no SCoP to generate code for"))?;
    let region = scop.region.clone();
    if region.start > region.end
        || region.end > input_text.len()
        || !input_text.is_char_boundary(region.start)
        || !input_text.is_char_boundary(region.end)
    {
        return Err(CodegenError::new(
            CodegenErrorKind::RegionOutOfBounds,
            format!("region {:?} does not fit an input of {} bytes", region, input_text.len()),
        )
        .into());
    }

    let mut out = CodeFormatter::default_indent();
    out.write(&input_text[..region.start]);
    out.writeln(MARKER);
    out.newline();

    for array in scop.arrays.iter().filter(|a| a.declared && a.exposed) {
        out.writeln(&declaration(array));
    }
    let hidden: Vec<_> = scop.arrays.iter().filter(|a| a.declared && !a.exposed).collect();
    if hidden.is_empty() {
        print_scop(scop, options, &mut out).context("failed to generate the SCoP region")?;
    } else {
        debug!("{} arrays are local to the region", hidden.len());
        out.writeln("{");
        out.indent();
        for array in hidden {
            out.writeln(&declaration(array));
        }
        print_scop(scop, options, &mut out).context("failed to generate the SCoP region")?;
        out.dedent();
        out.writeln("}");
    }

    out.write(&input_text[region.end..]);
    Ok(out.finish())
}

/// Generate the CPU version of `input` and write it to `output`, or to
/// [`output_file_name`] in the working directory. Returns the written path.
///
/// Nothing is written when generation fails.
pub fn generate_cpu(scop: Option<&Scop>, options: &CodegenOptions, input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    if scop.is_none() {
        return Err(CodegenError::new(CodegenErrorKind::MissingScop, "no SCoP to generate code for").into());
    }
    let text = fs::read_to_string(input).with_context(|| format!("failed to read input file {:?}", input))?;
    let rendered = generate_to_string(scop, options, &text)?;

    let path = output
        .map(Path::to_path_buf)
        .or_else(|| options.output.clone())
        .unwrap_or_else(|| output_file_name(input));
    fs::write(&path, rendered).with_context(|| format!("failed to write output file {:?}", path))?;
    info!("wrote {}", path.display());
    Ok(path)
}
