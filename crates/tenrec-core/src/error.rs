use crate::device::Device;
use crate::dtype::DType;
use crate::shape::Shape;

/// All errors that can occur within Tenrec.
///
/// Every failure mode is reported synchronously at the call that violates
/// the contract: shape mismatches, device mismatches, unsupported casts,
/// out-of-bounds indexing, autograd misuse, and malformed tensor files.
/// Using a single error type across the library simplifies propagation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shape mismatch between two tensors (e.g., trying to add [2,3] + [3,2]).
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Operation requires a specific rank (number of dimensions).
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// Element count mismatch when creating a tensor from flat data.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Cannot reshape because element counts differ.
    #[error(
        "cannot reshape: source has {src} elements, target shape {dst_shape} has {dst} elements"
    )]
    ReshapeElementMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    /// Matrix multiplication dimension mismatch.
    #[error("matmul shape mismatch: [{m}x{k1}] @ [{k2}x{n}], inner dims must match")]
    MatmulShapeMismatch {
        m: usize,
        k1: usize,
        k2: usize,
        n: usize,
    },

    /// The axis list is not a permutation of [0, rank).
    #[error("invalid permutation {dims:?} for tensor of rank {rank}")]
    InvalidPermutation { dims: Vec<usize>, rank: usize },

    /// Dimension index out of range for the tensor's rank.
    #[error("dimension out of range: dim {dim} for tensor with {rank} dimensions")]
    DimOutOfRange { dim: usize, rank: usize },

    /// Flat element index out of range.
    #[error("index out of bounds: {index} for tensor with {len} elements")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Cross-device operation without an explicit transfer.
    #[error("device mismatch: expected {expected}, got {got}")]
    DeviceMismatch { expected: Device, got: Device },

    /// DType mismatch between tensors in a binary operation.
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    /// Cast between a dtype pair that is not supported.
    #[error("unsupported cast: {from} to {to}")]
    UnsupportedCast { from: DType, to: DType },

    /// `backward()` called on a tensor that does not track gradients.
    #[error("backward() called on a tensor that does not require grad")]
    RequiresGrad,

    /// Gradient accessed on a tensor that has none.
    #[error("gradient accessed on a tensor that does not require grad")]
    NoGradient,

    /// Malformed serialized tensor.
    #[error("corrupt tensor file: {reason}")]
    CorruptFile { reason: String },

    /// Storage allocation failure on a device.
    #[error("allocation of {bytes} bytes failed on device {device}")]
    Allocation { bytes: usize, device: Device },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    /// Create a `CorruptFile` error with the given reason.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptFile {
            reason: reason.into(),
        }
    }
}

/// Convenience Result type used throughout Tenrec.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::Msg(format!($($arg)*)))
    };
}
