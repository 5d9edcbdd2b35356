// Checkpoint — Save and load named parameter tensors
//
// Binary container format (.tenrec):
//
//   Header:
//     magic:   [u8; 4]  = b"TNRC"
//     version: u32 LE   = 1
//     count:   u32 LE   = number of tensors
//
//   For each tensor:
//     key_len: u32 LE
//     key:     [u8; key_len]   (UTF-8 parameter name)
//     dtype:   u8              (0=F32, 1=I32, 2=F64)
//     body:    the single-tensor format (rank, extents, payload)
//
// Usage:
//   checkpoint::save_tensors("model.tenrec", &model.state_dict())?;
//   let named = checkpoint::load_tensors("model.tenrec", Device::Cpu)?;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;

use tenrec_core::serialize::{read_tensor, write_tensor};
use tenrec_core::{DType, Device, Error, Result, Tensor};

const MAGIC: &[u8; 4] = b"TNRC";
const VERSION: u32 = 1;

fn dtype_to_u8(dtype: DType) -> u8 {
    match dtype {
        DType::F32 => 0,
        DType::I32 => 1,
        DType::F64 => 2,
    }
}

fn u8_to_dtype(v: u8) -> Result<DType> {
    match v {
        0 => Ok(DType::F32),
        1 => Ok(DType::I32),
        2 => Ok(DType::F64),
        _ => Err(Error::corrupt(format!("unknown dtype tag {v}"))),
    }
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|_| Error::corrupt("truncated checkpoint header"))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)
        .map_err(|_| Error::corrupt("truncated checkpoint entry"))?;
    Ok(buf[0])
}

/// Save named tensors (typically a module's `state_dict`) to `path`.
pub fn save_tensors(path: impl AsRef<Path>, tensors: &[(String, Tensor)]) -> Result<()> {
    let path = path.as_ref();
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(MAGIC)?;
    write_u32(&mut w, VERSION)?;
    write_u32(&mut w, tensors.len() as u32)?;
    for (key, tensor) in tensors {
        write_u32(&mut w, key.len() as u32)?;
        w.write_all(key.as_bytes())?;
        w.write_all(&[dtype_to_u8(tensor.dtype())])?;
        write_tensor(&mut w, tensor)?;
    }
    w.flush()?;
    debug!("saved {} tensors to {}", tensors.len(), path.display());
    Ok(())
}

/// Load named tensors from `path` onto `device`, in file order.
pub fn load_tensors(path: impl AsRef<Path>, device: Device) -> Result<Vec<(String, Tensor)>> {
    let path = path.as_ref();
    let mut r = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)
        .map_err(|_| Error::corrupt("truncated checkpoint header"))?;
    if &magic != MAGIC {
        return Err(Error::corrupt(format!(
            "bad magic {:?}, expected {:?}",
            magic, MAGIC
        )));
    }
    let version = read_u32(&mut r)?;
    if version != VERSION {
        return Err(Error::corrupt(format!(
            "unsupported checkpoint version {version}"
        )));
    }
    let count = read_u32(&mut r)?;

    let mut tensors = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let key_len = read_u32(&mut r)? as usize;
        let mut key_bytes = vec![0u8; key_len];
        r.read_exact(&mut key_bytes)
            .map_err(|_| Error::corrupt("truncated checkpoint entry"))?;
        let key = String::from_utf8(key_bytes)
            .map_err(|_| Error::corrupt("parameter name is not valid UTF-8"))?;
        let dtype = u8_to_dtype(read_u8(&mut r)?)?;
        let tensor = read_tensor(&mut r, dtype, device)?;
        tensors.push((key, tensor));
    }
    debug!("loaded {} tensors from {}", tensors.len(), path.display());
    Ok(tensors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.tenrec");

        let w = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], (2, 2), Device::Cpu)?;
        let b = Tensor::from_vec(vec![0.5f64, -0.5], (1, 2), Device::Cpu)?;
        let named = vec![("weight".to_string(), w), ("bias".to_string(), b)];
        save_tensors(&path, &named)?;

        let loaded = load_tensors(&path, Device::Cpu)?;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, "weight");
        assert_eq!(loaded[0].1.dtype(), DType::F32);
        assert_eq!(loaded[0].1.to_f64_vec()?, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(loaded[1].0, "bias");
        assert_eq!(loaded[1].1.dtype(), DType::F64);
        assert_eq!(loaded[1].1.to_f64_vec()?, vec![0.5, -0.5]);
        Ok(())
    }

    #[test]
    fn test_checkpoint_rejects_bad_magic() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.tenrec");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00\x00\x00\x00\x00")?;
        let err = load_tensors(&path, Device::Cpu).unwrap_err();
        assert!(matches!(err, Error::CorruptFile { .. }));
        Ok(())
    }

    #[test]
    fn test_checkpoint_rejects_truncation() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.tenrec");
        let w = Tensor::from_vec(vec![1.0f32, 2.0], 2, Device::Cpu)?;
        save_tensors(&path, &[("weight".to_string(), w)])?;

        let bytes = std::fs::read(&path)?;
        std::fs::write(&path, &bytes[..bytes.len() - 3])?;
        let err = load_tensors(&path, Device::Cpu).unwrap_err();
        assert!(matches!(err, Error::CorruptFile { .. }));
        Ok(())
    }
}
