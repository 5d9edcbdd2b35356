//! # tenrec-core
//!
//! Core tensor primitives and reverse-mode autodiff for Tenrec.
//!
//! This crate provides:
//! - [`Tensor`] — n-dimensional array with optional gradient tracking
//! - [`Shape`] / [`Layout`] — shape, strides, and memory layout
//! - [`DType`] — element types (F32, I32, F64)
//! - [`Device`] — placement (CPU, CUDA ordinals behind an allocation seam)
//! - [`Op`] — the autograd graph node recorded by every tracked operation
//! - [`backprop`] — the backward traversal and `zero_grad`
//! - [`serialize`] — the single-tensor on-disk format
//!
//! Forward evaluation is eager: every operation allocates a fresh output
//! tensor and, when an operand requires grad, records an [`Op`] so that
//! [`Tensor::backward`] can replay the history in reverse and fill in the
//! per-tensor gradient accumulators.

pub mod backprop;
pub mod device;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod op;
pub mod serialize;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use backprop::zero_grad;
pub use device::Device;
pub use dtype::{DType, WithDType};
pub use error::{Error, Result};
pub use layout::Layout;
pub use op::{BinaryOp, Op, TensorId};
pub use shape::Shape;
pub use storage::Storage;
pub use tensor::Tensor;
