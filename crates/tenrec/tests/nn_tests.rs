// Integration tests for the nn layer: forward shapes, gradient flow into
// parameters, optimizer updates, and checkpointing.

use rand::rngs::StdRng;
use rand::SeedableRng;

use tenrec::nn::checkpoint;
use tenrec::prelude::*;

fn assert_vec_approx(got: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(got.len(), expected.len());
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
fn test_linear_forward_shape() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(1);
    let linear = Linear::new(10, 5, true, DType::F64, Device::Cpu, &mut rng)?;
    let x = Tensor::zeros((3, 10), DType::F64, Device::Cpu)?;
    let y = linear.forward(&x)?;
    assert_eq!(y.dims(), &[3, 5]);
    assert_eq!(linear.num_parameters(), 5 * 10 + 5);
    Ok(())
}

#[test]
fn test_linear_identity_map() -> Result<()> {
    let w = Tensor::from_vec(vec![1.0f64, 0.0, 0.0, 1.0], (2, 2), Device::Cpu)?;
    let b = Tensor::from_vec(vec![0.0f64, 0.0], (1, 2), Device::Cpu)?;
    let linear = Linear::from_tensors(w, Some(b))?;
    let x = Tensor::from_vec(vec![3.0f64, -7.0], (1, 2), Device::Cpu)?;
    let y = linear.forward(&x)?;
    assert_vec_approx(&y.to_f64_vec()?, &[3.0, -7.0], 1e-12);
    Ok(())
}

#[test]
fn test_one_sgd_step_reduces_loss() -> Result<()> {
    // One-parameter regression: fit y = 2x from a single example.
    let w = Tensor::from_vec(vec![0.0f64], (1, 1), Device::Cpu)?;
    let linear = Linear::from_tensors(w, None)?;
    let x = Tensor::from_vec(vec![1.0f64], (1, 1), Device::Cpu)?;
    let target = Tensor::from_vec(vec![2.0f64], (1, 1), Device::Cpu)?;

    let opt = Sgd::new(linear.parameters(), 0.1);

    let loss_before = mean_value(&mse(&linear.forward(&x)?, &target)?)?;
    for _ in 0..10 {
        let loss = mse(&linear.forward(&x)?, &target)?;
        opt.zero_grad()?;
        loss.backward()?;
        opt.step()?;
    }
    let loss_after = mean_value(&mse(&linear.forward(&x)?, &target)?)?;
    assert!(
        loss_after < loss_before,
        "loss did not decrease: {} -> {}",
        loss_before,
        loss_after
    );
    assert!(loss_after < 0.1);
    Ok(())
}

#[test]
fn test_gradient_descent_converges_to_known_weights() -> Result<()> {
    // Fit y = 3x exactly with plain tensor ops: w is a [1,1] matrix,
    // data is four samples of (x, 3x).
    let w = Tensor::from_vec(vec![0.5f64], (1, 1), Device::Cpu)?;
    w.requires_grad_(true);
    let x = Tensor::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], (4, 1), Device::Cpu)?;
    let y = Tensor::from_vec(vec![3.0f64, 6.0, 9.0, 12.0], (4, 1), Device::Cpu)?;

    for _ in 0..100 {
        let pred = x.matmul(&w)?;
        let loss = mse(&pred, &y)?;
        zero_grad(&[w.clone()])?;
        loss.backward()?;
        w.update(0.01)?;
    }
    assert_vec_approx(&w.to_f64_vec()?, &[3.0], 1e-3);
    Ok(())
}

#[test]
fn test_checkpoint_roundtrip_through_module() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("linear.tenrec");

    let mut rng = StdRng::seed_from_u64(9);
    let linear = Linear::new(4, 2, true, DType::F64, Device::Cpu, &mut rng)?;
    checkpoint::save_tensors(&path, &linear.state_dict())?;

    let mut loaded = checkpoint::load_tensors(&path, Device::Cpu)?;
    assert_eq!(loaded.len(), 2);
    let (bias_name, bias) = loaded.pop().unwrap();
    let (weight_name, weight) = loaded.pop().unwrap();
    assert_eq!(weight_name, "weight");
    assert_eq!(bias_name, "bias");

    let restored = Linear::from_tensors(weight, Some(bias))?;
    let x = Tensor::from_vec(vec![0.5f64, -1.0, 2.0, 0.25], (1, 4), Device::Cpu)?;
    assert_vec_approx(
        &restored.forward(&x)?.to_f64_vec()?,
        &linear.forward(&x)?.to_f64_vec()?,
        1e-12,
    );
    Ok(())
}

#[test]
fn test_optimizer_update_without_backward_fails() -> Result<()> {
    let p = Tensor::from_vec(vec![1.0f64], 1, Device::Cpu)?;
    p.requires_grad_(true);
    let opt = Sgd::new(vec![p], 0.1);
    assert!(opt.step().is_err());
    Ok(())
}
