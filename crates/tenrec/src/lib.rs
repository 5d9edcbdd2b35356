//! # Tenrec
//!
//! A minimal tensor library with reverse-mode automatic differentiation.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use tenrec::prelude::*;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `tenrec-core` | Tensor, Shape, DType, Device, Op, autograd engine, tensor file format |
//! | `tenrec-nn` | Layers (Linear), initializers, loss, SGD, checkpointing |
//!
//! ## How it fits together
//!
//! Forward evaluation is eager: every operation allocates a fresh output
//! tensor and, when an operand requires grad, records an [`Op`] node.
//! Calling [`Tensor::backward`] walks the recorded DAG exactly once per
//! node and deposits gradients into each tracked tensor's accumulator,
//! where [`Tensor::grad`] and the optimizers pick them up.

pub use tenrec_core::{
    backprop, device, dtype, error, layout, op, serialize, shape, storage, tensor, zero_grad,
    BinaryOp, DType, Device, Error, Layout, Op, Result, Shape, Storage, Tensor, TensorId,
    WithDType,
};

/// Neural network layers, initializers, losses, and optimizers.
pub mod nn {
    pub use tenrec_nn::*;
}

/// The most commonly used types and functions, in one import.
pub mod prelude {
    pub use tenrec_core::{zero_grad, DType, Device, Result, Shape, Tensor};
    pub use tenrec_nn::{mean_value, mse, Linear, Module, Optimizer, Sgd};
}
