// Serialize — Single-tensor on-disk format
//
// Layout (all integers native byte order):
//
//   rank:    i64
//   dims:    rank × i64
//   payload: numel × size_of(dtype) raw bytes, logical (row-major)
//            element order
//
// The header carries geometry only, so the caller supplies the element
// type on load. load() rejects files whose declared extents are
// non-positive or whose payload length does not match the declared
// element count, raising CorruptFile. Truncated and oversized files are
// both rejected.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::device::Device;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::op::Op;
use crate::shape::Shape;
use crate::storage::Storage;
use crate::tensor::Tensor;

/// Ranks above this are rejected as corrupt rather than attempted.
const MAX_RANK: usize = 32;

fn write_i64<W: Write>(w: &mut W, v: i64) -> Result<()> {
    w.write_all(&v.to_ne_bytes())?;
    Ok(())
}

fn read_i64<R: Read>(r: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|_| Error::corrupt("truncated header"))?;
    Ok(i64::from_ne_bytes(buf))
}

/// Write one tensor's header + payload into `w`.
///
/// Shared by the single-tensor format and multi-tensor containers built
/// on top of it.
pub fn write_tensor<W: Write>(w: &mut W, tensor: &Tensor) -> Result<()> {
    let dims = tensor.dims();
    write_i64(w, dims.len() as i64)?;
    for &d in dims {
        write_i64(w, d as i64)?;
    }
    let storage = tensor.read_storage()?;
    let contiguous = storage.to_contiguous(tensor.layout());
    w.write_all(&contiguous.to_ne_bytes())?;
    Ok(())
}

/// Read one tensor's header + payload from `r`. The element type comes
/// from the caller; the payload is read exactly, leaving `r` positioned
/// after it.
pub fn read_tensor<R: Read>(r: &mut R, dtype: DType, device: Device) -> Result<Tensor> {
    let rank = read_i64(r)?;
    if rank < 0 || rank as usize > MAX_RANK {
        return Err(Error::corrupt(format!("invalid rank {}", rank)));
    }
    let mut dims = Vec::with_capacity(rank as usize);
    for axis in 0..rank {
        let extent = read_i64(r)?;
        if extent <= 0 {
            return Err(Error::corrupt(format!(
                "non-positive extent {} for axis {}",
                extent, axis
            )));
        }
        dims.push(extent as usize);
    }
    let numel = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::corrupt("element count overflows"))?;
    let payload_len = numel * dtype.size_in_bytes();
    let mut payload = vec![0u8; payload_len];
    r.read_exact(&mut payload).map_err(|_| {
        Error::corrupt(format!(
            "payload shorter than the {} bytes declared by the header",
            payload_len
        ))
    })?;

    crate::storage::check_alloc(payload_len, device)?;
    let storage = Storage::from_ne_bytes(&payload, dtype);
    let shape = Shape::new(dims);
    Ok(Tensor::from_storage(
        storage,
        Layout::contiguous(shape),
        dtype,
        device,
        Op::None,
        false,
    ))
}

/// Save a tensor to `path` in the single-tensor format.
pub fn save(path: impl AsRef<Path>, tensor: &Tensor) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_tensor(&mut w, tensor)?;
    w.flush()?;
    Ok(())
}

/// Load a tensor from `path`. The file must contain exactly one tensor:
/// trailing bytes are rejected as corrupt.
pub fn load(path: impl AsRef<Path>, dtype: DType, device: Device) -> Result<Tensor> {
    let mut r = BufReader::new(File::open(path)?);
    let tensor = read_tensor(&mut r, dtype, device)?;
    let mut trailing = [0u8; 1];
    match r.read(&mut trailing)? {
        0 => Ok(tensor),
        _ => Err(Error::corrupt(
            "payload longer than the header declares",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.tensor");

        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3), Device::Cpu)?;
        save(&path, &t)?;
        let back = load(&path, DType::F32, Device::Cpu)?;
        assert_eq!(back.dims(), &[2, 3]);
        assert_eq!(back.to_f64_vec()?, t.to_f64_vec()?);
        Ok(())
    }

    #[test]
    fn test_save_load_noncontiguous() -> Result<()> {
        // A transposed tensor serializes in logical order.
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.tensor");

        let t = Tensor::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], (2, 2), Device::Cpu)?;
        let tt = t.t()?;
        save(&path, &tt)?;
        let back = load(&path, DType::F64, Device::Cpu)?;
        assert_eq!(back.to_f64_vec()?, tt.to_f64_vec()?);
        assert!(back.is_contiguous());
        Ok(())
    }

    #[test]
    fn test_load_rejects_negative_extent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.tensor");
        {
            let mut w = BufWriter::new(File::create(&path)?);
            write_i64(&mut w, 2)?;
            write_i64(&mut w, 2)?;
            write_i64(&mut w, -3)?;
            w.flush()?;
        }
        let err = load(&path, DType::F32, Device::Cpu).unwrap_err();
        assert!(matches!(err, Error::CorruptFile { .. }));
        Ok(())
    }

    #[test]
    fn test_load_rejects_truncated_payload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("short.tensor");
        {
            let mut w = BufWriter::new(File::create(&path)?);
            write_i64(&mut w, 1)?;
            write_i64(&mut w, 4)?;
            // 4 f32 elements declared, 3 written
            w.write_all(&[0u8; 12])?;
            w.flush()?;
        }
        let err = load(&path, DType::F32, Device::Cpu).unwrap_err();
        assert!(matches!(err, Error::CorruptFile { .. }));
        Ok(())
    }

    #[test]
    fn test_load_rejects_trailing_bytes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("long.tensor");
        {
            let mut w = BufWriter::new(File::create(&path)?);
            write_i64(&mut w, 1)?;
            write_i64(&mut w, 1)?;
            w.write_all(&[0u8; 4 + 3])?;
            w.flush()?;
        }
        let err = load(&path, DType::F32, Device::Cpu).unwrap_err();
        assert!(matches!(err, Error::CorruptFile { .. }));
        Ok(())
    }

    #[test]
    fn test_scalar_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scalar.tensor");
        let t = Tensor::from_vec(vec![7.0f64], (), Device::Cpu)?;
        save(&path, &t)?;
        let back = load(&path, DType::F64, Device::Cpu)?;
        assert_eq!(back.rank(), 0);
        assert_eq!(back.to_f64_vec()?, vec![7.0]);
        Ok(())
    }
}
