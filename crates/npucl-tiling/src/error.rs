use core::fmt::{Debug, Display};

/// Recoverable shape-inference failure: the operation's attributes do not
/// allow the input tile to be derived. The invoking pass reports this at the
/// operation's location and aborts that operation's lowering only.
#[derive(Clone, PartialEq, Eq)]
pub enum ShapeInferError {
    MissingAttr {
        op: &'static str,
        attr: &'static str,
    },
    MalformedAttr {
        op: &'static str,
        attr: &'static str,
    },
}

impl Display for ShapeInferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for ShapeInferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ShapeInferError::MissingAttr { op, attr } => {
                write!(f, "{op} is missing the required '{attr}' attribute")
            }
            ShapeInferError::MalformedAttr { op, attr } => {
                write!(f, "{op} has a malformed '{attr}' attribute")
            }
        }
    }
}

impl core::error::Error for ShapeInferError {}

/// Failure of the tiling policy for one operation.
#[derive(Clone, PartialEq, Eq)]
pub enum TilingError {
    /// The operation kind has no tiling policy (views, terminators).
    NotTileable { op: &'static str },
    /// No splitting of the eligible axes brings the working set under the
    /// budget. No fallback granularity is attempted.
    BudgetExceeded { footprint: usize, budget: usize },
    ShapeInfer(ShapeInferError),
}

impl From<ShapeInferError> for TilingError {
    fn from(err: ShapeInferError) -> Self {
        TilingError::ShapeInfer(err)
    }
}

impl Display for TilingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for TilingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TilingError::NotTileable { op } => {
                write!(f, "Operation {op} does not support tiling")
            }
            TilingError::BudgetExceeded { footprint, budget } => write!(
                f,
                "Cannot fit the working set under the memory budget: {footprint} > {budget} bytes \
                 with every eligible axis exhausted"
            ),
            TilingError::ShapeInfer(err) => write!(f, "{err:?}"),
        }
    }
}

impl core::error::Error for TilingError {}
