// Optimizers
//
// Optimizers hold cheap handles to the parameter tensors; updates go
// through Tensor::update, which mutates the shared storage in place, so
// the owning layers see the new values without any re-assignment.

use tenrec_core::{zero_grad, Result, Tensor};

/// Interface shared by all optimizers.
pub trait Optimizer {
    /// Apply one update step using the gradients accumulated so far.
    fn step(&self) -> Result<()>;

    /// Reset the gradient accumulators of all tracked parameters.
    fn zero_grad(&self) -> Result<()>;
}

/// Plain stochastic gradient descent: p -= lr * grad(p).
pub struct Sgd {
    params: Vec<Tensor>,
    lr: f64,
}

impl Sgd {
    pub fn new(params: Vec<Tensor>, lr: f64) -> Self {
        Sgd { params, lr }
    }

    pub fn learning_rate(&self) -> f64 {
        self.lr
    }
}

impl Optimizer for Sgd {
    fn step(&self) -> Result<()> {
        for p in &self.params {
            p.update(self.lr)?;
        }
        Ok(())
    }

    fn zero_grad(&self) -> Result<()> {
        zero_grad(&self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenrec_core::Device;

    #[test]
    fn test_sgd_step() -> Result<()> {
        let p = Tensor::from_vec(vec![1.0f64, 2.0], 2, Device::Cpu)?;
        p.requires_grad_(true);
        // b = p * p, so grad = 2p = [2, 4]
        let b = p.mul(&p)?;
        b.backward()?;

        let opt = Sgd::new(vec![p.clone()], 0.5);
        opt.step()?;
        assert_eq!(p.to_f64_vec()?, vec![0.0, 0.0]);

        opt.zero_grad()?;
        assert_eq!(p.grad()?.to_f64_vec()?, vec![0.0, 0.0]);
        Ok(())
    }
}
