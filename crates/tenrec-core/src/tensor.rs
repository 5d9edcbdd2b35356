use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::device::Device;
use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::op::{BinaryOp, Op, TensorId};
use crate::shape::Shape;
use crate::storage::Storage;

// Tensor — The fundamental data structure
//
// A Tensor is an n-dimensional array of numbers:
//
//   1. It holds data on a specific device (CPU today, CUDA via the
//      allocation seam)
//   2. It has a shape, strides, and a dtype
//   3. It optionally tracks the operation that created it (for autograd)
//   4. It optionally carries a gradient accumulator, filled in by
//      backward()
//
// MEMORY MODEL:
//
//   Tensor is a handle: the inner record is behind an Arc, so cloning a
//   Tensor is O(1) and just bumps a refcount. This is what lets an Op
//   node hold its parent tensors and keep the history alive. The payload
//   itself is never shared between two *distinct* tensors: every
//   operation and every shape transform allocates fresh storage, and
//   `copy()` duplicates it. Storage sits behind an RwLock because the
//   two sanctioned mutation paths (gradient accumulation during
//   backward, optimizer updates) go through a shared handle.
//
// AUTOGRAD STATE:
//
//   The requires-grad flag is an AtomicBool so `requires_grad_()` can
//   toggle it in place through a handle. The gradient accumulator is a
//   lazily materialized Tensor of the same shape, owned by this tensor;
//   it receives additive contributions from every operation that
//   consumed this tensor.

/// Inner record of a tensor, shared via Arc.
struct TensorInner {
    /// Unique identifier (doubles as the graph-node id in autograd).
    id: TensorId,
    /// The exclusively-owned payload.
    storage: RwLock<Storage>,
    /// Shape + strides.
    layout: Layout,
    /// Element type.
    dtype: DType,
    /// The device this tensor lives on.
    device: Device,
    /// The operation that created this tensor. `Op::None` for leaves.
    op: Op,
    /// Whether this tensor accumulates gradients during backward().
    requires_grad: AtomicBool,
    /// Lazily materialized gradient accumulator.
    grad: RwLock<Option<Tensor>>,
}

/// An n-dimensional array with optional gradient tracking.
///
/// # Example
/// ```ignore
/// let a = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], (2, 2), Device::Cpu)?;
/// let b = Tensor::ones((2, 2), DType::F32, Device::Cpu)?;
/// let c = a.add(&b)?;
/// ```
pub struct Tensor {
    inner: Arc<TensorInner>,
}

// Manual Clone: Arc::clone is cheap (just increments the refcount).
// This clones the *handle*; use `copy()` for a deep data duplicate.
impl Clone for Tensor {
    fn clone(&self) -> Self {
        Tensor {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(id={:?}, shape={}, dtype={}, device={})",
            self.inner.id,
            self.inner.layout.shape(),
            self.inner.dtype,
            self.inner.device,
        )
    }
}

impl Tensor {
    // Internal constructor

    /// Create a tensor from existing storage and layout.
    pub(crate) fn from_storage(
        storage: Storage,
        layout: Layout,
        dtype: DType,
        device: Device,
        op: Op,
        requires_grad: bool,
    ) -> Self {
        Tensor {
            inner: Arc::new(TensorInner {
                id: TensorId::new(),
                storage: RwLock::new(storage),
                layout,
                dtype,
                device,
                op,
                requires_grad: AtomicBool::new(requires_grad),
                grad: RwLock::new(None),
            }),
        }
    }

    // Accessors

    /// Unique tensor ID.
    pub fn id(&self) -> TensorId {
        self.inner.id
    }

    /// The shape of this tensor.
    pub fn shape(&self) -> &Shape {
        self.inner.layout.shape()
    }

    /// The dimensions as a slice (shortcut for shape().dims()).
    pub fn dims(&self) -> &[usize] {
        self.inner.layout.dims()
    }

    /// Number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.inner.layout.rank()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.inner.layout.elem_count()
    }

    /// Element type.
    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// The device this tensor is on.
    pub fn device(&self) -> Device {
        self.inner.device
    }

    /// The memory layout (shape + strides).
    pub fn layout(&self) -> &Layout {
        &self.inner.layout
    }

    /// Whether this tensor is contiguous in memory.
    pub fn is_contiguous(&self) -> bool {
        self.inner.layout.is_contiguous()
    }

    /// The op that created this tensor (`Op::None` for leaves).
    pub fn op(&self) -> &Op {
        &self.inner.op
    }

    /// Whether this tensor accumulates gradients during backward().
    pub fn requires_grad(&self) -> bool {
        self.inner.requires_grad.load(Ordering::Relaxed)
    }

    /// Toggle gradient tracking in place. Has no effect on already
    /// recorded history: the producing op, if any, stays attached.
    pub fn requires_grad_(&self, flag: bool) {
        self.inner.requires_grad.store(flag, Ordering::Relaxed);
    }

    pub(crate) fn read_storage(&self) -> Result<std::sync::RwLockReadGuard<'_, Storage>> {
        self.inner
            .storage
            .read()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    pub(crate) fn write_storage(&self) -> Result<std::sync::RwLockWriteGuard<'_, Storage>> {
        self.inner
            .storage
            .write()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    fn grad_slot(&self) -> Result<std::sync::RwLockWriteGuard<'_, Option<Tensor>>> {
        self.inner
            .grad
            .write()
            .map_err(|_| Error::msg("grad lock poisoned"))
    }

    // Creation

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: impl Into<Shape>, dtype: DType, device: Device) -> Result<Self> {
        let shape = shape.into();
        let storage = Storage::zeros(&shape, dtype, device)?;
        let layout = Layout::contiguous(shape);
        Ok(Self::from_storage(
            storage,
            layout,
            dtype,
            device,
            Op::None,
            false,
        ))
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: impl Into<Shape>, dtype: DType, device: Device) -> Result<Self> {
        Self::full(shape, 1.0, dtype, device)
    }

    /// Create a tensor filled with a constant value.
    pub fn full(shape: impl Into<Shape>, val: f64, dtype: DType, device: Device) -> Result<Self> {
        let shape = shape.into();
        let storage = Storage::full(&shape, val, dtype, device)?;
        let layout = Layout::contiguous(shape);
        Ok(Self::from_storage(
            storage,
            layout,
            dtype,
            device,
            Op::None,
            false,
        ))
    }

    /// Create a tensor from an already-typed buffer. The dtype is taken
    /// from the element type.
    pub fn from_vec<T: WithDType>(
        data: Vec<T>,
        shape: impl Into<Shape>,
        device: Device,
    ) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        let storage = Storage::from_vec(data, device)?;
        let layout = Layout::contiguous(shape);
        Ok(Self::from_storage(
            storage,
            layout,
            T::DTYPE,
            device,
            Op::None,
            false,
        ))
    }

    /// Create a tensor from a flat slice of f64 values, converting to
    /// the target dtype.
    pub fn from_f64_slice(
        data: &[f64],
        shape: impl Into<Shape>,
        dtype: DType,
        device: Device,
    ) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        let storage = Storage::from_f64_slice(data, dtype, device)?;
        let layout = Layout::contiguous(shape);
        Ok(Self::from_storage(
            storage,
            layout,
            dtype,
            device,
            Op::None,
            false,
        ))
    }

    /// A tensor of zeros with the same shape, dtype, and device as self.
    pub fn zeros_like(&self) -> Result<Self> {
        Self::zeros(self.shape().clone(), self.dtype(), self.device())
    }

    /// A tensor of ones with the same shape, dtype, and device as self.
    pub fn ones_like(&self) -> Result<Self> {
        Self::ones(self.shape().clone(), self.dtype(), self.device())
    }

    // Element access

    /// Read the element at a logical (row-major) flat index.
    pub fn get(&self, index: usize) -> Result<f64> {
        let len = self.numel();
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let storage_index = self.inner.layout.storage_index(index);
        self.read_storage()?.get_f64(storage_index)
    }

    /// Write the element at a logical (row-major) flat index.
    pub fn set(&self, index: usize, value: f64) -> Result<()> {
        let len = self.numel();
        if index >= len {
            return Err(Error::IndexOutOfBounds { index, len });
        }
        let storage_index = self.inner.layout.storage_index(index);
        self.write_storage()?.set_f64(storage_index, value)
    }

    /// Copy out all elements as f64, in logical (row-major) order.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        let storage = self.read_storage()?;
        let contiguous = storage.to_contiguous(&self.inner.layout);
        Ok(contiguous.to_f64_vec())
    }

    // Data duplication

    /// Deep copy: fresh, independently-owned storage with the same
    /// shape, strides, dtype, and device. The producer link is never
    /// copied; the result is a graph root.
    pub fn copy(&self) -> Result<Self> {
        let storage = self.read_storage()?.clone();
        Ok(Self::from_storage(
            storage,
            self.inner.layout.clone(),
            self.inner.dtype,
            self.inner.device,
            Op::None,
            false,
        ))
    }

    /// Detach from the graph: a deep copy with `requires_grad = false`
    /// and no producer.
    pub fn detach(&self) -> Result<Self> {
        self.copy()
    }

    // Shape transforms (all copy-based)

    /// Reshape to a new shape with the same total element count.
    /// The result is a fresh contiguous tensor holding the elements in
    /// logical order.
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        self.reshape_impl(new_shape.into(), true)
    }

    /// Alias for `reshape`.
    pub fn view(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        self.reshape(new_shape)
    }

    /// Repack into contiguous storage. Implemented as a same-shape
    /// reshape, so gradient routing is preserved.
    pub fn contiguous(&self) -> Result<Self> {
        self.reshape(self.shape().clone())
    }

    fn reshape_impl(&self, new_shape: Shape, track_graph: bool) -> Result<Self> {
        if new_shape.elem_count() != self.numel() {
            return Err(Error::ReshapeElementMismatch {
                src: self.numel(),
                dst: new_shape.elem_count(),
                dst_shape: new_shape,
            });
        }
        let storage = self.read_storage()?.to_contiguous(&self.inner.layout);
        let layout = Layout::contiguous(new_shape);
        let track = track_graph && self.requires_grad();
        let op = if track {
            Op::Reshape {
                input: self.clone(),
                src_shape: self.shape().clone(),
            }
        } else {
            Op::None
        };
        Ok(Self::from_storage(
            storage,
            layout,
            self.inner.dtype,
            self.inner.device,
            op,
            track,
        ))
    }

    /// Reorder the axes. `dims` must be a permutation of [0, rank).
    /// The payload is carried over unchanged; only shape and strides are
    /// reordered, so the result is generally non-contiguous.
    pub fn permute(&self, dims: &[usize]) -> Result<Self> {
        self.permute_impl(dims, true)
    }

    fn permute_impl(&self, dims: &[usize], track_graph: bool) -> Result<Self> {
        let layout = self.inner.layout.permute(dims)?;
        let storage = self.read_storage()?.clone();
        let track = track_graph && self.requires_grad();
        let op = if track {
            Op::Permute {
                input: self.clone(),
                dims: dims.to_vec(),
            }
        } else {
            Op::None
        };
        Ok(Self::from_storage(
            storage,
            layout,
            self.inner.dtype,
            self.inner.device,
            op,
            track,
        ))
    }

    /// Swap two dimensions (a two-axis permute).
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let rank = self.rank();
        if dim0 >= rank || dim1 >= rank {
            return Err(Error::DimOutOfRange {
                dim: dim0.max(dim1),
                rank,
            });
        }
        let mut order: Vec<usize> = (0..rank).collect();
        order.swap(dim0, dim1);
        self.permute(&order)
    }

    /// Transpose a 2D matrix (shorthand for transpose(0, 1)).
    pub fn t(&self) -> Result<Self> {
        if self.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: self.rank(),
            });
        }
        self.transpose(0, 1)
    }

    /// Remove a dimension of size 1.
    ///
    /// squeeze(1) on [3, 1, 4] → [3, 4]
    ///
    /// If the target axis does not have extent 1 this is a no-op and
    /// returns a plain (untracked) copy.
    pub fn squeeze(&self, dim: usize) -> Result<Self> {
        let rank = self.rank();
        if dim >= rank {
            return Err(Error::DimOutOfRange { dim, rank });
        }
        if self.dims()[dim] != 1 {
            return self.copy();
        }
        let mut new_dims = self.dims().to_vec();
        new_dims.remove(dim);
        self.reshape(Shape::new(new_dims))
    }

    /// Insert a dimension of size 1 at the given position.
    /// unsqueeze(0) on [3, 4] → [1, 3, 4]
    /// unsqueeze(2) on [3, 4] → [3, 4, 1]
    pub fn unsqueeze(&self, dim: usize) -> Result<Self> {
        let rank = self.rank();
        if dim > rank {
            return Err(Error::DimOutOfRange {
                dim,
                rank: rank + 1,
            });
        }
        let mut new_dims = self.dims().to_vec();
        new_dims.insert(dim, 1);
        self.reshape(Shape::new(new_dims))
    }

    /// Move this tensor to another device. A same-device call is a plain
    /// copy.
    pub fn to(&self, device: Device) -> Result<Self> {
        if device == self.device() {
            return self.copy();
        }
        // A cross-device transfer must first allocate on the target.
        crate::storage::check_alloc(self.numel() * self.dtype().size_in_bytes(), device)?;
        // The source is host-resident (only the CPU allocator exists),
        // so the transfer degenerates to a buffer clone on the target.
        let storage = self.read_storage()?.clone();
        Ok(Self::from_storage(
            storage,
            self.inner.layout.clone(),
            self.inner.dtype,
            device,
            Op::None,
            false,
        ))
    }

    /// Convert to another dtype. A same-dtype call is a plain copy; only
    /// the F32 ↔ F64 pair converts, every other pair fails with
    /// `UnsupportedCast`.
    pub fn astype(&self, dtype: DType) -> Result<Self> {
        if dtype == self.dtype() {
            return self.copy();
        }
        let storage = self.read_storage()?.cast(&self.inner.layout, dtype)?;
        let layout = Layout::contiguous(self.shape().clone());
        Ok(Self::from_storage(
            storage,
            layout,
            dtype,
            self.inner.device,
            Op::None,
            false,
        ))
    }

    // Arithmetic operations

    /// Element-wise addition: self + rhs.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        self.binary_impl(rhs, BinaryOp::Add, true)
    }

    /// Element-wise subtraction: self - rhs.
    pub fn sub(&self, rhs: &Self) -> Result<Self> {
        self.binary_impl(rhs, BinaryOp::Sub, true)
    }

    /// Element-wise multiplication: self * rhs.
    pub fn mul(&self, rhs: &Self) -> Result<Self> {
        self.binary_impl(rhs, BinaryOp::Mul, true)
    }

    /// Element-wise division: self / rhs.
    pub fn div(&self, rhs: &Self) -> Result<Self> {
        self.binary_impl(rhs, BinaryOp::Div, true)
    }

    /// Generic binary dispatch. Operand shapes must match exactly; there
    /// is no broadcasting. All contract checks run before any allocation,
    /// so a failed op leaves no trace.
    fn binary_impl(&self, rhs: &Self, op: BinaryOp, track_graph: bool) -> Result<Self> {
        if self.device() != rhs.device() {
            return Err(Error::DeviceMismatch {
                expected: self.device(),
                got: rhs.device(),
            });
        }
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: rhs.dtype(),
            });
        }
        if self.shape() != rhs.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.shape().clone(),
                got: rhs.shape().clone(),
            });
        }
        // Same-tensor operands (e.g. x.mul(&x)) must share one read
        // guard; the storage lock is not re-entrant.
        let storage = if Arc::ptr_eq(&self.inner, &rhs.inner) {
            let guard = self.read_storage()?;
            Storage::binary_op(op, &guard, &self.inner.layout, &guard, &rhs.inner.layout)?
        } else {
            let lhs_storage = self.read_storage()?;
            let rhs_storage = rhs.read_storage()?;
            Storage::binary_op(
                op,
                &lhs_storage,
                &self.inner.layout,
                &rhs_storage,
                &rhs.inner.layout,
            )?
        };
        let layout = Layout::contiguous(self.shape().clone());
        let track = track_graph && (self.requires_grad() || rhs.requires_grad());
        let op_record = if track {
            Op::Binary {
                lhs: self.clone(),
                rhs: rhs.clone(),
                op,
            }
        } else {
            Op::None
        };
        Ok(Self::from_storage(
            storage,
            layout,
            self.inner.dtype,
            self.inner.device,
            op_record,
            track,
        ))
    }

    /// Matrix multiplication: self @ rhs. Both operands must be rank-2
    /// with a matching inner dimension: [m, k] @ [k, n] → [m, n].
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        self.matmul_impl(rhs, true)
    }

    fn matmul_impl(&self, rhs: &Self, track_graph: bool) -> Result<Self> {
        if self.device() != rhs.device() {
            return Err(Error::DeviceMismatch {
                expected: self.device(),
                got: rhs.device(),
            });
        }
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: rhs.dtype(),
            });
        }
        if self.rank() != 2 || rhs.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                got: self.rank().min(rhs.rank()),
            });
        }
        let (m, k1) = (self.dims()[0], self.dims()[1]);
        let (k2, n) = (rhs.dims()[0], rhs.dims()[1]);
        if k1 != k2 {
            return Err(Error::MatmulShapeMismatch { m, k1, k2, n });
        }
        let storage = if Arc::ptr_eq(&self.inner, &rhs.inner) {
            let guard = self.read_storage()?;
            Storage::matmul(&guard, &self.inner.layout, &guard, &rhs.inner.layout)?
        } else {
            let lhs_storage = self.read_storage()?;
            let rhs_storage = rhs.read_storage()?;
            Storage::matmul(
                &lhs_storage,
                &self.inner.layout,
                &rhs_storage,
                &rhs.inner.layout,
            )?
        };
        let layout = Layout::contiguous(Shape::from((m, n)));
        let track = track_graph && (self.requires_grad() || rhs.requires_grad());
        let op_record = if track {
            Op::Matmul {
                lhs: self.clone(),
                rhs: rhs.clone(),
            }
        } else {
            Op::None
        };
        Ok(Self::from_storage(
            storage,
            layout,
            self.inner.dtype,
            self.inner.device,
            op_record,
            track,
        ))
    }

    // Detached op variants, used by the backward pass. Gradient math must
    // not record new history, otherwise accumulators would grow graphs of
    // their own.

    pub(crate) fn neg_detached(&self) -> Result<Self> {
        let storage = self.read_storage()?.neg(&self.inner.layout);
        let layout = Layout::contiguous(self.shape().clone());
        Ok(Self::from_storage(
            storage,
            layout,
            self.inner.dtype,
            self.inner.device,
            Op::None,
            false,
        ))
    }

    pub(crate) fn mul_detached(&self, rhs: &Self) -> Result<Self> {
        self.binary_impl(rhs, BinaryOp::Mul, false)
    }

    pub(crate) fn div_detached(&self, rhs: &Self) -> Result<Self> {
        self.binary_impl(rhs, BinaryOp::Div, false)
    }

    pub(crate) fn matmul_detached(&self, rhs: &Self) -> Result<Self> {
        self.matmul_impl(rhs, false)
    }

    pub(crate) fn reshape_detached(&self, new_shape: Shape) -> Result<Self> {
        self.reshape_impl(new_shape, false)
    }

    pub(crate) fn permute_detached(&self, dims: &[usize]) -> Result<Self> {
        self.permute_impl(dims, false)
    }

    pub(crate) fn t_detached(&self) -> Result<Self> {
        self.permute_detached(&[1, 0])
    }

    // Autograd surface

    /// The gradient accumulator. On first access for a tensor that
    /// requires grad, a zero-filled accumulator of the same shape is
    /// materialized. Fails with `NoGradient` on a tensor that does not
    /// require grad and has never received a gradient.
    pub fn grad(&self) -> Result<Tensor> {
        let mut slot = self.grad_slot()?;
        if let Some(acc) = slot.as_ref() {
            return Ok(acc.clone());
        }
        if !self.requires_grad() {
            return Err(Error::NoGradient);
        }
        let acc = Tensor::zeros(self.shape().clone(), self.dtype(), self.device())?;
        *slot = Some(acc.clone());
        Ok(acc)
    }

    /// Reset the gradient accumulator to zero. A no-op if the
    /// accumulator was never materialized.
    pub fn zero_grad(&self) -> Result<()> {
        let slot = self.grad_slot()?;
        if let Some(acc) = slot.as_ref() {
            acc.write_storage()?.fill_zero();
        }
        Ok(())
    }

    /// Run reverse-mode differentiation from this tensor.
    ///
    /// Fails with `RequiresGrad` if the tensor does not require grad.
    /// If the accumulator is not yet seeded, it is seeded to all-ones of
    /// this tensor's own shape; for a non-scalar root this computes a
    /// vector-Jacobian product against the all-ones cotangent. Gradients
    /// accumulate additively: a second `backward()` without an
    /// intervening `zero_grad` adds another full pass.
    pub fn backward(&self) -> Result<()> {
        crate::backprop::backward(self)
    }

    /// Gradient-descent update: data -= lr * grad, in place. This is the
    /// optimizer hook; it fails with `NoGradient` if no gradient has
    /// been accumulated.
    pub fn update(&self, lr: f64) -> Result<()> {
        let grad = {
            let slot = self.grad_slot()?;
            match slot.as_ref() {
                Some(acc) => acc.clone(),
                None => return Err(Error::NoGradient),
            }
        };
        let grad_storage = grad.read_storage()?;
        let mut storage = self.write_storage()?;
        storage.sub_scaled(&self.inner.layout, &grad_storage, grad.layout(), lr)
    }

    /// Whether backward rules should deposit a gradient here: either the
    /// tensor asked for one, or it is an interior node gradients must
    /// flow through.
    pub(crate) fn receives_grad(&self) -> bool {
        self.requires_grad() || !self.inner.op.is_none()
    }

    /// Seed the accumulator with ones, unless it is already materialized.
    pub(crate) fn seed_grad_ones(&self) -> Result<()> {
        let mut slot = self.grad_slot()?;
        if slot.is_none() {
            *slot = Some(Tensor::ones(
                self.shape().clone(),
                self.dtype(),
                self.device(),
            )?);
        }
        Ok(())
    }

    /// Add a contribution into the gradient accumulator (`+=`, never
    /// overwrite). Silently skips tensors that do not receive gradients,
    /// so backward rules stay agnostic to which parents are tracked.
    pub(crate) fn accumulate_grad(&self, contribution: &Tensor) -> Result<()> {
        if !self.receives_grad() {
            return Ok(());
        }
        debug_assert_eq!(self.dims(), contribution.dims());
        let acc = {
            let mut slot = self.grad_slot()?;
            // Cloning the slot contents is a cheap handle clone.
            match (*slot).clone() {
                Some(acc) => acc,
                None => {
                    let acc =
                        Tensor::zeros(self.shape().clone(), self.dtype(), self.device())?;
                    *slot = Some(acc.clone());
                    acc
                }
            }
        };
        let contribution_storage = contribution.read_storage()?;
        let mut acc_storage = acc.write_storage()?;
        acc_storage.add_assign(&contribution_storage, contribution.layout())
    }
}
