use crate::device::Device;
use crate::dtype::{DType, WithDType};
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::op::BinaryOp;
use crate::shape::Shape;

// Storage — The owned payload of a tensor
//
// A Storage is a contiguous, typed buffer with exactly one owner: the
// tensor it belongs to. Shape transforms copy rather than alias, so two
// tensors never share a buffer. The gradient accumulation path and
// optimizer updates are the only writers, and they go through the owning
// tensor's lock.
//
// Allocation is dispatched on the device. The CPU path allocates
// directly; any other device must be served by an external allocator, and
// none is registered in this build, so the seam reports an allocation
// failure (see `check_alloc`).

/// Typed, exclusively-owned element buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F32(Vec<f32>),
    I32(Vec<i32>),
    F64(Vec<f64>),
}

/// Allocation seam: every storage constructor funnels device placement
/// through here. Only the CPU allocator exists in this build.
pub(crate) fn check_alloc(bytes: usize, device: Device) -> Result<()> {
    match device {
        Device::Cpu => Ok(()),
        other => Err(Error::Allocation {
            bytes,
            device: other,
        }),
    }
}

impl Storage {
    /// Allocate zero-filled storage for `shape` on `device`.
    pub fn zeros(shape: &Shape, dtype: DType, device: Device) -> Result<Self> {
        let n = shape.elem_count();
        check_alloc(n * dtype.size_in_bytes(), device)?;
        Ok(match dtype {
            DType::F32 => Storage::F32(vec![0.0; n]),
            DType::I32 => Storage::I32(vec![0; n]),
            DType::F64 => Storage::F64(vec![0.0; n]),
        })
    }

    /// Allocate storage filled with a constant value.
    pub fn full(shape: &Shape, val: f64, dtype: DType, device: Device) -> Result<Self> {
        let n = shape.elem_count();
        check_alloc(n * dtype.size_in_bytes(), device)?;
        Ok(match dtype {
            DType::F32 => Storage::F32(vec![val as f32; n]),
            DType::I32 => Storage::I32(vec![val as i32; n]),
            DType::F64 => Storage::F64(vec![val; n]),
        })
    }

    /// Create storage from a flat f64 slice, converting to the target dtype.
    pub fn from_f64_slice(data: &[f64], dtype: DType, device: Device) -> Result<Self> {
        check_alloc(data.len() * dtype.size_in_bytes(), device)?;
        Ok(match dtype {
            DType::F32 => Storage::F32(data.iter().map(|&v| v as f32).collect()),
            DType::I32 => Storage::I32(data.iter().map(|&v| v as i32).collect()),
            DType::F64 => Storage::F64(data.to_vec()),
        })
    }

    /// Wrap an already-typed buffer.
    pub fn from_vec<T: WithDType>(data: Vec<T>, device: Device) -> Result<Self> {
        check_alloc(data.len() * T::DTYPE.size_in_bytes(), device)?;
        Ok(T::into_storage(data))
    }

    /// The element type held in this storage.
    pub fn dtype(&self) -> DType {
        match self {
            Storage::F32(_) => DType::F32,
            Storage::I32(_) => DType::I32,
            Storage::F64(_) => DType::F64,
        }
    }

    /// Number of elements in the buffer.
    pub fn elem_count(&self) -> usize {
        match self {
            Storage::F32(v) => v.len(),
            Storage::I32(v) => v.len(),
            Storage::F64(v) => v.len(),
        }
    }

    /// Read one element (by raw storage index) as f64.
    pub fn get_f64(&self, index: usize) -> Result<f64> {
        let len = self.elem_count();
        match self {
            Storage::F32(v) => v.get(index).map(|&x| x as f64),
            Storage::I32(v) => v.get(index).map(|&x| x as f64),
            Storage::F64(v) => v.get(index).copied(),
        }
        .ok_or(Error::IndexOutOfBounds { index, len })
    }

    /// Write one element (by raw storage index) from f64.
    pub fn set_f64(&mut self, index: usize, value: f64) -> Result<()> {
        let len = self.elem_count();
        let out_of_bounds = Error::IndexOutOfBounds { index, len };
        match self {
            Storage::F32(v) => {
                *v.get_mut(index).ok_or(out_of_bounds)? = value as f32;
            }
            Storage::I32(v) => {
                *v.get_mut(index).ok_or(out_of_bounds)? = value as i32;
            }
            Storage::F64(v) => {
                *v.get_mut(index).ok_or(out_of_bounds)? = value;
            }
        }
        Ok(())
    }

    /// Copy out all elements as f64, in raw storage order.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Storage::F32(v) => v.iter().map(|&x| x as f64).collect(),
            Storage::I32(v) => v.iter().map(|&x| x as f64).collect(),
            Storage::F64(v) => v.to_vec(),
        }
    }

    //  Kernels
    //
    // Every kernel takes (storage, layout) pairs and produces a fresh
    // contiguous storage in logical element order, so non-contiguous
    // operands (permute/transpose results) are read correctly.

    /// Apply a binary op element-wise: out[i] = op(lhs[i], rhs[i]).
    /// Shapes are validated by the caller; dtypes must match.
    pub(crate) fn binary_op(
        op: BinaryOp,
        lhs: &Storage,
        lhs_layout: &Layout,
        rhs: &Storage,
        rhs_layout: &Layout,
    ) -> Result<Storage> {
        match (lhs, rhs) {
            (Storage::F32(a), Storage::F32(b)) => {
                Ok(Storage::F32(binary_map(op, a, lhs_layout, b, rhs_layout)))
            }
            (Storage::I32(a), Storage::I32(b)) => {
                Ok(Storage::I32(binary_map(op, a, lhs_layout, b, rhs_layout)))
            }
            (Storage::F64(a), Storage::F64(b)) => {
                Ok(Storage::F64(binary_map(op, a, lhs_layout, b, rhs_layout)))
            }
            _ => Err(Error::DTypeMismatch {
                expected: lhs.dtype(),
                got: rhs.dtype(),
            }),
        }
    }

    /// Element-wise negation, in logical order.
    pub(crate) fn neg(&self, layout: &Layout) -> Storage {
        match self {
            Storage::F32(v) => Storage::F32(layout.strided_indices().map(|i| -v[i]).collect()),
            Storage::I32(v) => Storage::I32(layout.strided_indices().map(|i| -v[i]).collect()),
            Storage::F64(v) => Storage::F64(layout.strided_indices().map(|i| -v[i]).collect()),
        }
    }

    /// Repack into contiguous storage following the layout's logical order.
    pub(crate) fn to_contiguous(&self, layout: &Layout) -> Storage {
        match self {
            Storage::F32(v) => Storage::F32(layout.strided_indices().map(|i| v[i]).collect()),
            Storage::I32(v) => Storage::I32(layout.strided_indices().map(|i| v[i]).collect()),
            Storage::F64(v) => Storage::F64(layout.strided_indices().map(|i| v[i]).collect()),
        }
    }

    /// 2-D matrix multiply. Layouts must describe rank-2 shapes with a
    /// matching inner dimension (validated by the caller).
    pub(crate) fn matmul(
        lhs: &Storage,
        lhs_layout: &Layout,
        rhs: &Storage,
        rhs_layout: &Layout,
    ) -> Result<Storage> {
        match (lhs, rhs) {
            (Storage::F32(a), Storage::F32(b)) => {
                Ok(Storage::F32(matmul_map(a, lhs_layout, b, rhs_layout)))
            }
            (Storage::I32(a), Storage::I32(b)) => {
                Ok(Storage::I32(matmul_map(a, lhs_layout, b, rhs_layout)))
            }
            (Storage::F64(a), Storage::F64(b)) => {
                Ok(Storage::F64(matmul_map(a, lhs_layout, b, rhs_layout)))
            }
            _ => Err(Error::DTypeMismatch {
                expected: lhs.dtype(),
                got: rhs.dtype(),
            }),
        }
    }

    /// Cast to another dtype, in logical order. Only the enumerated pairs
    /// are supported: F32 ↔ F64. Identity casts are handled by the caller
    /// as plain copies.
    pub(crate) fn cast(&self, layout: &Layout, to: DType) -> Result<Storage> {
        match (self, to) {
            (Storage::F32(v), DType::F64) => Ok(Storage::F64(
                layout.strided_indices().map(|i| v[i] as f64).collect(),
            )),
            (Storage::F64(v), DType::F32) => Ok(Storage::F32(
                layout.strided_indices().map(|i| v[i] as f32).collect(),
            )),
            _ => Err(Error::UnsupportedCast {
                from: self.dtype(),
                to,
            }),
        }
    }

    /// In-place accumulation: self[i] += rhs[i]. `self` must be
    /// contiguous (gradient accumulators always are); `rhs` is read
    /// through its layout.
    pub(crate) fn add_assign(&mut self, rhs: &Storage, rhs_layout: &Layout) -> Result<()> {
        match (self, rhs) {
            (Storage::F32(a), Storage::F32(b)) => {
                for (dst, src) in a.iter_mut().zip(rhs_layout.strided_indices()) {
                    *dst += b[src];
                }
            }
            (Storage::I32(a), Storage::I32(b)) => {
                for (dst, src) in a.iter_mut().zip(rhs_layout.strided_indices()) {
                    *dst += b[src];
                }
            }
            (Storage::F64(a), Storage::F64(b)) => {
                for (dst, src) in a.iter_mut().zip(rhs_layout.strided_indices()) {
                    *dst += b[src];
                }
            }
            (lhs, rhs) => {
                return Err(Error::DTypeMismatch {
                    expected: lhs.dtype(),
                    got: rhs.dtype(),
                })
            }
        }
        Ok(())
    }

    /// In-place scaled subtraction: self[i] -= scale * rhs[i]. Both sides
    /// are walked through their layouts; this is the optimizer update.
    pub(crate) fn sub_scaled(
        &mut self,
        self_layout: &Layout,
        rhs: &Storage,
        rhs_layout: &Layout,
        scale: f64,
    ) -> Result<()> {
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                got: rhs.dtype(),
            });
        }
        let dst_indices: Vec<usize> = self_layout.strided_indices().collect();
        let src_indices: Vec<usize> = rhs_layout.strided_indices().collect();
        for (&di, &si) in dst_indices.iter().zip(src_indices.iter()) {
            let updated = self.get_f64(di)? - scale * rhs.get_f64(si)?;
            self.set_f64(di, updated)?;
        }
        Ok(())
    }

    /// Reset every element to zero.
    pub(crate) fn fill_zero(&mut self) {
        match self {
            Storage::F32(v) => v.fill(0.0),
            Storage::I32(v) => v.fill(0),
            Storage::F64(v) => v.fill(0.0),
        }
    }

    /// Raw bytes of the buffer in native byte order (raw storage order).
    pub(crate) fn to_ne_bytes(&self) -> Vec<u8> {
        match self {
            Storage::F32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
            Storage::I32(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
            Storage::F64(v) => v.iter().flat_map(|x| x.to_ne_bytes()).collect(),
        }
    }

    /// Rebuild a buffer from native-byte-order bytes. The caller has
    /// already verified that the length is a whole number of elements.
    pub(crate) fn from_ne_bytes(bytes: &[u8], dtype: DType) -> Storage {
        match dtype {
            DType::F32 => Storage::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::I32 => Storage::I32(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            DType::F64 => Storage::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| {
                        f64::from_ne_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                    })
                    .collect(),
            ),
        }
    }
}

fn binary_map<T: WithDType>(
    op: BinaryOp,
    a: &[T],
    lhs_layout: &Layout,
    b: &[T],
    rhs_layout: &Layout,
) -> Vec<T> {
    lhs_layout
        .strided_indices()
        .zip(rhs_layout.strided_indices())
        .map(|(i, j)| {
            let (x, y) = (a[i], b[j]);
            match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
            }
        })
        .collect()
}

fn matmul_map<T: WithDType>(a: &[T], lhs_layout: &Layout, b: &[T], rhs_layout: &Layout) -> Vec<T> {
    let (m, k) = (lhs_layout.dims()[0], lhs_layout.dims()[1]);
    let n = rhs_layout.dims()[1];
    let ls = lhs_layout.strides();
    let rs = rhs_layout.strides();
    let mut out = vec![T::zero(); m * n];
    for i in 0..m {
        for j in 0..n {
            let mut acc = T::zero();
            for p in 0..k {
                acc = acc + a[i * ls[0] + p * ls[1]] * b[p * rs[0] + j * rs[1]];
            }
            out[i * n + j] = acc;
        }
    }
    out
}
