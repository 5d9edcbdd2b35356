// Module trait — The interface every layer implements
//
// Each layer is a plain struct implementing this trait. The key method is
// forward(); parameters() hands the trainable tensors to an optimizer.
// Parameters are cheap handle clones: the optimizer and the layer see the
// same storage, so in-place updates are visible to both.

use tenrec_core::{Result, Tensor};

/// The fundamental trait for all neural network layers.
pub trait Module {
    /// Compute the output tensor from the input tensor.
    fn forward(&self, x: &Tensor) -> Result<Tensor>;

    /// All trainable parameters of this module.
    /// The optimizer uses these to update weights during training.
    fn parameters(&self) -> Vec<Tensor>;

    /// Trainable parameters with human-readable names.
    ///
    /// Leaf modules override this with meaningful names like `"weight"`
    /// and `"bias"`. The default uses positional indices.
    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        self.parameters()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (format!("param_{i}"), p))
            .collect()
    }

    /// Total number of scalar parameters in this module.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }

    /// `state_dict`-style map of parameter name → tensor, the input to
    /// checkpointing.
    fn state_dict(&self) -> Vec<(String, Tensor)> {
        self.named_parameters()
    }
}
