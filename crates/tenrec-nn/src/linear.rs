// Linear — Fully-connected (dense) layer
//
// y = x @ Wᵀ + b
//
// PARAMETER SHAPES:
//
//   weight: [out_features, in_features]  — stored transposed for matmul
//   bias:   [1, out_features]
//
// The tensor core has no broadcasting, so the bias cannot be added to a
// [batch, out] activation directly. Instead the forward pass expands it
// with a matmul: ones([batch, 1]) @ bias is [batch, out] and the add
// stays exact-shape. The matmul adjoint then delivers the bias gradient
// as a column sum over the batch, which is exactly the dense-layer bias
// gradient.

use rand::Rng;

use tenrec_core::{bail, DType, Device, Result, Tensor};

use crate::init;
use crate::module::Module;

/// A fully-connected (dense) layer: y = x @ Wᵀ + b.
///
/// # Example
/// ```ignore
/// let mut rng = StdRng::seed_from_u64(0);
/// let linear = Linear::new(784, 128, true, DType::F32, Device::Cpu, &mut rng)?;
/// let y = linear.forward(&x)?; // [batch, 784] → [batch, 128]
/// ```
pub struct Linear {
    /// Weight matrix: [out_features, in_features]
    weight: Tensor,
    /// Optional bias: [1, out_features]
    bias: Option<Tensor>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a new Linear layer with Kaiming uniform initialization,
    /// drawing from the caller's generator.
    pub fn new<R: Rng>(
        in_features: usize,
        out_features: usize,
        use_bias: bool,
        dtype: DType,
        device: Device,
        rng: &mut R,
    ) -> Result<Self> {
        let k = (1.0 / in_features as f64).sqrt();
        let weight = init::uniform(rng, (out_features, in_features), -k, k, dtype, device)?;
        let bias = if use_bias {
            Some(init::uniform(rng, (1, out_features), -k, k, dtype, device)?)
        } else {
            None
        };
        Ok(Linear {
            weight,
            bias,
            in_features,
            out_features,
        })
    }

    /// Build a Linear layer from existing weight and bias tensors, e.g.
    /// after loading a checkpoint. Marks both as requiring grad.
    pub fn from_tensors(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        let dims = weight.dims();
        if dims.len() != 2 {
            bail!("linear weight must be 2D, got shape {:?}", dims);
        }
        let out_features = dims[0];
        let in_features = dims[1];
        if let Some(b) = &bias {
            if b.dims() != [1, out_features] {
                bail!(
                    "linear bias must have shape [1, {}], got {:?}",
                    out_features,
                    b.dims()
                );
            }
            b.requires_grad_(true);
        }
        weight.requires_grad_(true);
        Ok(Linear {
            weight,
            bias,
            in_features,
            out_features,
        })
    }

    /// The input feature dimension.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// The output feature dimension.
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Direct access to the weight tensor.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Direct access to the bias tensor (if any).
    pub fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }
}

impl Module for Linear {
    /// Forward pass: y = x @ Wᵀ + b.
    ///
    /// Input shape:  [batch, in_features]
    /// Output shape: [batch, out_features]
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let wt = self.weight.t()?;
        let y = x.matmul(&wt)?;
        match &self.bias {
            Some(bias) => {
                let batch = x.dims()[0];
                // ones([batch, 1]) @ [1, out] expands the bias to the
                // batch; the add below is exact-shape.
                let expand = Tensor::ones((batch, 1), y.dtype(), y.device())?;
                y.add(&expand.matmul(bias)?)
            }
            None => Ok(y),
        }
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = vec![self.weight.clone()];
        if let Some(b) = &self.bias {
            params.push(b.clone());
        }
        params
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut named = vec![("weight".to_string(), self.weight.clone())];
        if let Some(b) = &self.bias {
            named.push(("bias".to_string(), b.clone()));
        }
        named
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_shapes() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        let linear = Linear::new(10, 5, true, DType::F64, Device::Cpu, &mut rng)?;
        assert_eq!(linear.weight().dims(), &[5, 10]);
        assert_eq!(linear.bias().unwrap().dims(), &[1, 5]);
        assert_eq!(linear.parameters().len(), 2);

        let x = Tensor::zeros((3, 10), DType::F64, Device::Cpu)?;
        let y = linear.forward(&x)?;
        assert_eq!(y.dims(), &[3, 5]);
        Ok(())
    }

    #[test]
    fn test_linear_identity() -> Result<()> {
        let w = Tensor::from_vec(vec![1.0f64, 0.0, 0.0, 1.0], (2, 2), Device::Cpu)?;
        let b = Tensor::from_vec(vec![0.5f64, -0.5], (1, 2), Device::Cpu)?;
        let linear = Linear::from_tensors(w, Some(b))?;

        let x = Tensor::from_vec(vec![3.0f64, 7.0], (1, 2), Device::Cpu)?;
        let y = linear.forward(&x)?;
        // y = x @ I + b = [3.5, 6.5]
        assert_eq!(y.to_f64_vec()?, vec![3.5, 6.5]);
        Ok(())
    }

    #[test]
    fn test_linear_bias_gradient_sums_batch() -> Result<()> {
        let w = Tensor::from_vec(vec![1.0f64], (1, 1), Device::Cpu)?;
        let b = Tensor::from_vec(vec![0.0f64], (1, 1), Device::Cpu)?;
        let linear = Linear::from_tensors(w, Some(b))?;

        let x = Tensor::from_vec(vec![1.0f64, 2.0, 3.0], (3, 1), Device::Cpu)?;
        let y = linear.forward(&x)?;
        y.backward()?;
        // Bias gradient is the column sum of the all-ones cotangent.
        assert_eq!(linear.bias().unwrap().grad()?.to_f64_vec()?, vec![3.0]);
        // Weight gradient is sum(x) under the same cotangent.
        assert_eq!(linear.weight().grad()?.to_f64_vec()?, vec![6.0]);
        Ok(())
    }
}
