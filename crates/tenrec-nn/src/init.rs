// nn::init — Parameter initialization
//
// Standalone functions for creating initialized parameter tensors. Every
// initializer takes the random generator explicitly; there is no hidden
// global RNG state, so seeded runs are reproducible by construction.
//
// All functions return tensors with `requires_grad` already set.

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_distr::Normal;

use tenrec_core::{DType, Device, Error, Result, Shape, Tensor};

/// Compute (fan_in, fan_out) from a shape.
///
/// - 1-D: fan_in = fan_out = dims[0]
/// - 2-D: fan_in = dims[1], fan_out = dims[0]
/// - 3-D+: fan_in = dims[1] * product(dims[2..]),
///   fan_out = dims[0] * product(dims[2..])
fn compute_fans(shape: &Shape) -> (f64, f64) {
    let dims = shape.dims();
    match dims.len() {
        0 => (1.0, 1.0),
        1 => (dims[0] as f64, dims[0] as f64),
        2 => (dims[1] as f64, dims[0] as f64),
        _ => {
            let receptive_field: usize = dims[2..].iter().product();
            let fan_in = dims[1] as f64 * receptive_field as f64;
            let fan_out = dims[0] as f64 * receptive_field as f64;
            (fan_in, fan_out)
        }
    }
}

/// Initialize a parameter from a uniform distribution U(low, high).
pub fn uniform<R: Rng>(
    rng: &mut R,
    shape: impl Into<Shape>,
    low: f64,
    high: f64,
    dtype: DType,
    device: Device,
) -> Result<Tensor> {
    let shape = shape.into();
    let dist = Uniform::new(low, high);
    let data: Vec<f64> = (0..shape.elem_count()).map(|_| dist.sample(rng)).collect();
    let t = Tensor::from_f64_slice(&data, shape, dtype, device)?;
    t.requires_grad_(true);
    Ok(t)
}

/// Initialize a parameter from a normal distribution N(mean, std).
pub fn normal<R: Rng>(
    rng: &mut R,
    shape: impl Into<Shape>,
    mean: f64,
    std: f64,
    dtype: DType,
    device: Device,
) -> Result<Tensor> {
    let shape = shape.into();
    let dist = Normal::new(mean, std)
        .map_err(|e| Error::msg(format!("invalid normal distribution: {e}")))?;
    let data: Vec<f64> = (0..shape.elem_count()).map(|_| dist.sample(rng)).collect();
    let t = Tensor::from_f64_slice(&data, shape, dtype, device)?;
    t.requires_grad_(true);
    Ok(t)
}

/// Kaiming (He) uniform initialization: U(-b, b) with b = sqrt(6/fan_in).
/// The standard choice for layers followed by ReLU.
pub fn kaiming_uniform<R: Rng>(
    rng: &mut R,
    shape: impl Into<Shape>,
    dtype: DType,
    device: Device,
) -> Result<Tensor> {
    let shape = shape.into();
    let (fan_in, _) = compute_fans(&shape);
    let bound = (6.0 / fan_in).sqrt();
    uniform(rng, shape, -bound, bound, dtype, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_range_and_tracking() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let t = uniform(&mut rng, (4, 4), -0.5, 0.5, DType::F64, Device::Cpu)?;
        assert!(t.requires_grad());
        for v in t.to_f64_vec()? {
            assert!((-0.5..0.5).contains(&v));
        }
        Ok(())
    }

    #[test]
    fn test_seeded_runs_reproduce() -> Result<()> {
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let a = normal(&mut rng_a, 8, 0.0, 1.0, DType::F64, Device::Cpu)?;
        let b = normal(&mut rng_b, 8, 0.0, 1.0, DType::F64, Device::Cpu)?;
        assert_eq!(a.to_f64_vec()?, b.to_f64_vec()?);
        Ok(())
    }

    #[test]
    fn test_compute_fans() {
        assert_eq!(compute_fans(&Shape::from((8, 3))), (3.0, 8.0));
        assert_eq!(compute_fans(&Shape::from(5)), (5.0, 5.0));
    }

    #[test]
    fn test_kaiming_uniform_bound() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(3);
        // fan_in = 2, bound = sqrt(6/2) = sqrt(3)
        let t = kaiming_uniform(&mut rng, (8, 2), DType::F64, Device::Cpu)?;
        let bound = 3.0f64.sqrt();
        for v in t.to_f64_vec()? {
            assert!(v.abs() < bound);
        }
        Ok(())
    }
}
