use core::fmt::{Debug, Display};

/// Violations of the cluster-tiling wrapper invariants, reported by
/// [`verify`](crate::ClusterTilingOp::verify).
#[derive(Clone, PartialEq, Eq)]
pub enum VerifyError {
    NoOperands,
    NoResults,
    OperandArgMismatch { operands: usize, args: usize },
    ResultCountMismatch { results: usize, outputs: usize },
    /// The hardware compute task only addresses rank-1 and rank-4 buffers.
    UnsupportedRank { rank: usize },
    /// A block argument's type is not the compact form of its operand.
    CompactTypeMismatch { index: usize },
    /// Cast input and output distributions are incompatible.
    IncompatibleDistribution { op: &'static str },
    /// Cast input and output disagree on shape or strides.
    CastChangesLayout { op: &'static str },
}

impl Display for VerifyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for VerifyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            VerifyError::NoOperands => {
                write!(f, "Operation must have at least one operand")
            }
            VerifyError::NoResults => {
                write!(f, "Operation must have at least one result")
            }
            VerifyError::OperandArgMismatch { operands, args } => write!(
                f,
                "Mismatch between the number of operands ({operands}) and body arguments ({args})"
            ),
            VerifyError::ResultCountMismatch { results, outputs } => write!(
                f,
                "Mismatch between the number of results ({results}) and output buffers ({outputs})"
            ),
            VerifyError::UnsupportedRank { rank } => {
                write!(f, "Only 4D/1D operands are supported, got rank {rank}")
            }
            VerifyError::CompactTypeMismatch { index } => write!(
                f,
                "Body argument {index} is not the compact form of operand {index}"
            ),
            VerifyError::IncompatibleDistribution { op } => {
                write!(f, "{op} input and output must have the same distribution mode")
            }
            VerifyError::CastChangesLayout { op } => {
                write!(f, "{op} input and output must have the same shape and strides")
            }
        }
    }
}

impl core::error::Error for VerifyError {}

/// Failure to reparse a printed operation, with the byte offset the parser
/// gave up at.
#[derive(Clone, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Parse error at offset {}: {}", self.offset, self.message)
    }
}

impl core::error::Error for ParseError {}
