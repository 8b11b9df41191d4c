//! Error types for the code generator.
//!
//! This module defines all error types used throughout the crate,
//! organized by the phase that produces them.

use thiserror::Error;
use crate::utils::location::Span;
use std::fmt;

/// Top-level error type for the code generator.
#[derive(Error, Debug)]
pub enum ScopgenError {
    /// Error while parsing set/map notation
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Inconsistent SCoP description
    #[error("SCoP error: {0}")]
    Scop(#[from] ScopError),

    /// Error during tree construction or printing
    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error while parsing polyhedral set/map notation.
#[derive(Error, Debug, Clone)]
pub struct ParseError {
    /// The error message
    pub message: String,
    /// Location in the notation text
    pub span: Span,
    /// The kind of parse error
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self { message: message.into(), span, kind }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Unexpected character in the input
    UnexpectedChar,
    /// Unexpected token
    UnexpectedToken,
    /// Identifier that is neither a parameter nor a tuple variable
    UnknownIdentifier,
    /// Product of two non-constant terms
    NonAffine,
    /// Integer literal does not fit
    InvalidNumber,
    /// Several spaces where exactly one was expected
    MultipleSpaces,
    /// Unexpected end of input
    UnexpectedEof,
}

/// Inconsistency in a SCoP description.
#[derive(Error, Debug, Clone)]
pub struct ScopError {
    /// The error message
    pub message: String,
    /// The kind of SCoP error
    pub kind: ScopErrorKind,
}

impl ScopError {
    pub fn new(kind: ScopErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

impl fmt::Display for ScopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopErrorKind {
    /// Statement domain without a tuple name
    UnnamedStatement,
    /// Two statements share an identity
    DuplicateStatement,
    /// Schedule or access refers to an unknown statement
    UnknownStatement,
    /// Relation has the wrong shape (set where a map is needed, ...)
    InvalidRelation,
    /// The source region markers are missing or out of order
    MissingRegion,
}

/// Error during tree construction or printing.
#[derive(Error, Debug, Clone)]
pub struct CodegenError {
    /// The error message
    pub message: String,
    /// The kind of codegen error
    pub kind: CodegenErrorKind,
}

impl CodegenError {
    pub fn new(kind: CodegenErrorKind, message: impl Into<String>) -> Self {
        Self { message: message.into(), kind }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// No SCoP was supplied
    MissingScop,
    /// A generated leaf names a statement the SCoP does not contain
    StatementNotFound,
    /// An access could not be expressed as an affine function of the iterators
    AccessTransform,
    /// Annotation and statement body disagree on the number of accesses
    AccessMismatch,
    /// Schedule dimension without a lower or upper bound
    UnboundedLoop,
    /// Schedule spaces of different dimensionality
    ScheduleShape,
    /// Region offsets outside the input text
    RegionOutOfBounds,
    /// Node reached the printer without the annotation it needs
    MissingAnnotation,
}

/// Result type using ScopgenError.
pub type ScopgenResult<T> = Result<T, ScopgenError>;
