// Op — Computational graph node for automatic differentiation
//
// Every tensor that results from a tracked computation records HOW it was
// created via the Op enum. This forms a directed acyclic graph (DAG) that
// backward() traverses to route gradients.
//
// Example: c = a + b
//   a.op = Op::None (leaf)
//   b.op = Op::None (leaf)
//   c.op = Op::Binary { lhs: a, rhs: b, op: Add }
//
// Each variant stores the actual input Tensor handles. Tensors are
// Arc-wrapped, so cloning into the node is cheap, and the node keeps its
// parents alive for as long as the output exists: backward() can be
// called repeatedly over the same history until the caller drops the
// graph. References only ever point child → parent, so the DAG has no
// cycles and plain reference counting reclaims it.
//
// Beyond the parent handles, each variant captures only the metadata its
// gradient rule needs (the source shape for a reshape, the axis order for
// a permute).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::shape::Shape;
use crate::tensor::Tensor;

/// Unique identifier for a tensor. Since every tracked operation creates
/// exactly one output tensor, the output's id also identifies the node in
/// the autograd graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(pub(crate) u64);

impl Default for TensorId {
    fn default() -> Self {
        Self::new()
    }
}

impl TensorId {
    /// Generate a new unique tensor ID (uses a global atomic counter).
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        TensorId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Records the operation that produced a tensor, holding its operands.
#[derive(Clone)]
pub enum Op {
    /// No operation: a leaf tensor (input data or trainable parameter).
    None,

    /// Element-wise binary: result = op(lhs, rhs).
    Binary {
        lhs: Tensor,
        rhs: Tensor,
        op: BinaryOp,
    },

    /// Matrix multiplication: result = lhs @ rhs.
    Matmul { lhs: Tensor, rhs: Tensor },

    /// Reshape (also covers view/squeeze/unsqueeze): same elements in
    /// logical order, different shape. `src_shape` records the original
    /// shape so backward can reshape the gradient back.
    Reshape { input: Tensor, src_shape: Shape },

    /// Axis reordering (also covers transpose). Backward applies the
    /// inverse permutation to the gradient.
    Permute { input: Tensor, dims: Vec<usize> },
}

impl Op {
    /// Whether this is a leaf marker rather than a recorded operation.
    pub fn is_none(&self) -> bool {
        matches!(self, Op::None)
    }

    /// References to all input tensors of this operation.
    /// Used by the backward traversal to walk toward the leaves.
    pub fn inputs(&self) -> Vec<&Tensor> {
        match self {
            Op::None => vec![],
            Op::Binary { lhs, rhs, .. } | Op::Matmul { lhs, rhs } => vec![lhs, rhs],
            Op::Reshape { input, .. } | Op::Permute { input, .. } => vec![input],
        }
    }
}

// Concise Debug: op type and tensor ids only, not full tensor data.
impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::None => write!(f, "None"),
            Op::Binary { lhs, rhs, op } => {
                write!(f, "Binary({:?}, id={:?}, id={:?})", op, lhs.id(), rhs.id())
            }
            Op::Matmul { lhs, rhs } => {
                write!(f, "Matmul(id={:?}, id={:?})", lhs.id(), rhs.id())
            }
            Op::Reshape { input, src_shape } => {
                write!(f, "Reshape({} -> ?, id={:?})", src_shape, input.id())
            }
            Op::Permute { input, dims } => {
                write!(f, "Permute({:?}, id={:?})", dims, input.id())
            }
        }
    }
}
