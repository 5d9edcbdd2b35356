// Integration tests for tensor construction, transforms, and errors.

use tenrec::prelude::*;
use tenrec::Error;

fn assert_vec_approx(got: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(
        got.len(),
        expected.len(),
        "length mismatch: {} vs {}",
        got.len(),
        expected.len()
    );
    for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
        assert!(
            (g - e).abs() < tol,
            "index {}: got {} expected {} (tol {})",
            i,
            g,
            e,
            tol
        );
    }
}

#[test]
fn test_factories_are_contiguous() -> Result<()> {
    for dims in [vec![], vec![4], vec![2, 3], vec![2, 3, 4]] {
        let t = Tensor::zeros(Shape::new(dims.clone()), DType::F32, Device::Cpu)?;
        assert!(t.is_contiguous(), "shape {:?} not contiguous", dims);
        assert_eq!(t.dims(), &dims[..]);
    }
    Ok(())
}

#[test]
fn test_ones_plus_ones() -> Result<()> {
    let a = Tensor::ones((2, 2), DType::F32, Device::Cpu)?;
    let b = Tensor::ones((2, 2), DType::F32, Device::Cpu)?;
    let c = a.add(&b)?;
    assert_eq!(c.dims(), &[2, 2]);
    assert_vec_approx(&c.to_f64_vec()?, &[2.0, 2.0, 2.0, 2.0], 1e-12);
    Ok(())
}

#[test]
fn test_elementwise_values() -> Result<()> {
    let a = Tensor::from_vec(vec![6.0f64, 8.0, 10.0, 12.0], (2, 2), Device::Cpu)?;
    let b = Tensor::from_vec(vec![2.0f64, 4.0, 5.0, 3.0], (2, 2), Device::Cpu)?;
    assert_eq!(a.sub(&b)?.to_f64_vec()?, vec![4.0, 4.0, 5.0, 9.0]);
    assert_eq!(a.mul(&b)?.to_f64_vec()?, vec![12.0, 32.0, 50.0, 36.0]);
    assert_eq!(a.div(&b)?.to_f64_vec()?, vec![3.0, 2.0, 2.0, 4.0]);
    Ok(())
}

#[test]
fn test_shape_mismatch_fails() -> Result<()> {
    let a = Tensor::zeros((2, 3), DType::F32, Device::Cpu)?;
    let b = Tensor::zeros((3, 2), DType::F32, Device::Cpu)?;
    assert!(matches!(
        a.add(&b).unwrap_err(),
        Error::ShapeMismatch { .. }
    ));
    Ok(())
}

#[test]
fn test_reshape_roundtrip_preserves_contents() -> Result<()> {
    let data: Vec<f64> = (0..24).map(|i| i as f64).collect();
    let a = Tensor::from_vec(data.clone(), (2, 3, 4), Device::Cpu)?;
    let b = a.reshape((4, 6))?;
    let c = b.reshape((2, 3, 4))?;
    assert_eq!(c.dims(), a.dims());
    assert_eq!(c.to_f64_vec()?, data);
    Ok(())
}

#[test]
fn test_view_matches_reshape() -> Result<()> {
    let a = Tensor::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], (2, 2), Device::Cpu)?;
    let v = a.view(4)?;
    assert_eq!(v.dims(), &[4]);
    assert_eq!(v.to_f64_vec()?, a.to_f64_vec()?);
    Ok(())
}

#[test]
fn test_permute_reads_in_new_axis_order() -> Result<()> {
    // [2, 3] of 0..6; permute to [3, 2] reads columns first.
    let a = Tensor::from_vec(vec![0.0f64, 1.0, 2.0, 3.0, 4.0, 5.0], (2, 3), Device::Cpu)?;
    let p = a.permute(&[1, 0])?;
    assert_eq!(p.dims(), &[3, 2]);
    assert_eq!(p.to_f64_vec()?, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

    assert!(matches!(
        a.permute(&[0, 0]).unwrap_err(),
        Error::InvalidPermutation { .. }
    ));
    Ok(())
}

#[test]
fn test_transpose_out_of_range() -> Result<()> {
    let a = Tensor::zeros((2, 3), DType::F32, Device::Cpu)?;
    assert!(matches!(
        a.transpose(0, 5).unwrap_err(),
        Error::DimOutOfRange { .. }
    ));
    Ok(())
}

#[test]
fn test_squeeze_unsqueeze_roundtrip() -> Result<()> {
    let a = Tensor::from_vec(vec![1.0f64, 2.0, 3.0], (1, 3), Device::Cpu)?;
    let s = a.squeeze(0)?;
    assert_eq!(s.dims(), &[3]);
    let u = s.unsqueeze(0)?;
    assert_eq!(u.dims(), &[1, 3]);
    assert_eq!(u.to_f64_vec()?, a.to_f64_vec()?);
    Ok(())
}

#[test]
fn test_literal_constructor_count_check() {
    let err = Tensor::from_f64_slice(&[1.0, 2.0, 3.0], (2, 2), DType::F32, Device::Cpu)
        .unwrap_err();
    assert!(matches!(err, Error::ElementCountMismatch { .. }));
}

#[test]
fn test_flat_index_access_is_bounds_checked() -> Result<()> {
    let a = Tensor::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], (2, 2), Device::Cpu)?;
    assert_eq!(a.get(3)?, 4.0);
    assert!(matches!(
        a.get(4).unwrap_err(),
        Error::IndexOutOfBounds { .. }
    ));
    Ok(())
}

#[test]
fn test_cuda_is_an_allocation_seam() -> Result<()> {
    let err = Tensor::zeros((2, 2), DType::F32, Device::Cuda(0)).unwrap_err();
    assert!(matches!(err, Error::Allocation { .. }));
    let a = Tensor::zeros((2, 2), DType::F32, Device::Cpu)?;
    assert!(matches!(
        a.to(Device::Cuda(1)).unwrap_err(),
        Error::Allocation { .. }
    ));
    Ok(())
}

#[test]
fn test_astype_enumerated_pairs_only() -> Result<()> {
    let a = Tensor::from_vec(vec![1.25f64, -2.5], 2, Device::Cpu)?;
    let narrowed = a.astype(DType::F32)?;
    assert_eq!(narrowed.dtype(), DType::F32);
    assert_eq!(narrowed.to_f64_vec()?, vec![1.25, -2.5]);
    assert!(matches!(
        a.astype(DType::I32).unwrap_err(),
        Error::UnsupportedCast { .. }
    ));
    Ok(())
}

#[test]
fn test_copy_never_carries_history() -> Result<()> {
    let a = Tensor::from_vec(vec![2.0f64], 1, Device::Cpu)?;
    a.requires_grad_(true);
    let b = a.mul(&a)?;
    assert!(!b.op().is_none());

    let c = b.copy()?;
    assert!(c.op().is_none());
    assert!(!c.requires_grad());
    // Fresh storage: writing to the copy leaves the source untouched.
    c.set(0, 99.0)?;
    assert_eq!(b.get(0)?, 4.0);
    Ok(())
}
