// Loss functions
//
// The core applies no reductions, so losses stay elementwise and training
// loops call backward() on the loss tensor directly. The unseeded
// backward() convention (an all-ones cotangent over the loss's own shape)
// makes the resulting leaf gradients the gradient of the *sum* of the
// elementwise losses.

use tenrec_core::{Result, Tensor};

/// Elementwise squared error: (pred - target)².
///
/// No reduction is applied. Calling `backward()` on the result produces
/// the gradients of the summed squared error.
pub fn mse(pred: &Tensor, target: &Tensor) -> Result<Tensor> {
    let diff = pred.sub(target)?;
    diff.mul(&diff)
}

/// Mean of all elements of an (already computed) loss tensor, for
/// reporting. This reads the values out; it is not a graph operation.
pub fn mean_value(loss: &Tensor) -> Result<f64> {
    let values = loss.to_f64_vec()?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}
