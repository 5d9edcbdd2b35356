// Backpropagation — Reverse-mode automatic differentiation
//
// The forward pass builds a DAG: every tracked tensor records the Op that
// created it, and the Op holds the operand tensors. backward() replays
// that history in reverse, depositing gradient contributions into each
// operand's accumulator.
//
// TRAVERSAL:
//
//   backward() keeps a work queue of tensors whose producing node still
//   has to run, plus a visited set of node identities (a node is
//   identified by its output tensor's id, since every tracked op creates
//   exactly one output). Each node's rule therefore executes exactly once
//   per backward() call, even when its output is reachable through
//   several downstream paths (diamond dependencies). No cycle detection
//   is needed: ops are created only as an acyclic consequence of forward
//   evaluation, so a tensor can never be its own ancestor.
//
// GRADIENT RULES (chain rule per Op):
//
//   Add:     grad_lhs += g              grad_rhs += g
//   Sub:     grad_lhs += g              grad_rhs += -g
//   Mul:     grad_lhs += g * rhs        grad_rhs += g * lhs
//   Div:     grad_lhs += g / rhs        grad_rhs += -g * lhs / rhs²
//   Matmul:  grad_lhs += g @ rhsᵀ       grad_rhs += lhsᵀ @ g
//   Reshape: grad_in  += reshape(g, src_shape)
//   Permute: grad_in  += permute(g, inverse(dims))
//
// ACCUMULATION: contributions always add (`+=`, never overwrite). A
// tensor consumed by several ops receives the sum of their contributions
// (multivariate chain rule): for c = a * a, grad_a = g*a + g*a = 2ag.
// The same additivity makes repeated backward() calls deliberate
// accumulation: calling backward() twice on the same root without an
// intervening zero_grad doubles the deposited gradients.
//
// All gradient math runs on detached op variants, so accumulators never
// record history of their own.

use std::collections::{HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::op::{BinaryOp, Op, TensorId};
use crate::tensor::Tensor;

/// Compute gradients of `root` with respect to every tensor in its
/// history, depositing them into the tensors' accumulators.
///
/// The root's accumulator is seeded to all-ones of its own shape if it is
/// not yet materialized. For a non-scalar root this computes a
/// vector-Jacobian product against the all-ones cotangent; that is the
/// documented convention, not an error.
pub fn backward(root: &Tensor) -> Result<()> {
    if !root.requires_grad() {
        return Err(Error::RequiresGrad);
    }
    root.seed_grad_ones()?;

    let mut queue: VecDeque<Tensor> = VecDeque::new();
    let mut visited: HashSet<TensorId> = HashSet::new();
    if !root.op().is_none() {
        visited.insert(root.id());
        queue.push_back(root.clone());
    }

    while let Some(output) = queue.pop_front() {
        // The gradient flowing into this node is whatever its output has
        // accumulated by the time the node runs.
        let grad_output = output.grad()?;
        step(&output, &grad_output)?;
        for parent in output.op().inputs() {
            if !parent.op().is_none() && !visited.contains(&parent.id()) {
                visited.insert(parent.id());
                queue.push_back(parent.clone());
            }
        }
    }
    Ok(())
}

/// Apply one node's backward rule: route `grad` into the parents'
/// accumulators. Rules skip work for parents that take no gradient but
/// never fail on them.
fn step(output: &Tensor, grad: &Tensor) -> Result<()> {
    match output.op() {
        Op::None => {}

        Op::Binary { lhs, rhs, op } => match op {
            BinaryOp::Add => {
                lhs.accumulate_grad(grad)?;
                rhs.accumulate_grad(grad)?;
            }
            BinaryOp::Sub => {
                lhs.accumulate_grad(grad)?;
                if rhs.receives_grad() {
                    rhs.accumulate_grad(&grad.neg_detached()?)?;
                }
            }
            BinaryOp::Mul => {
                if lhs.receives_grad() {
                    lhs.accumulate_grad(&grad.mul_detached(rhs)?)?;
                }
                if rhs.receives_grad() {
                    rhs.accumulate_grad(&grad.mul_detached(lhs)?)?;
                }
            }
            BinaryOp::Div => {
                if lhs.receives_grad() {
                    lhs.accumulate_grad(&grad.div_detached(rhs)?)?;
                }
                if rhs.receives_grad() {
                    let grad_rhs = grad
                        .mul_detached(lhs)?
                        .div_detached(rhs)?
                        .div_detached(rhs)?
                        .neg_detached()?;
                    rhs.accumulate_grad(&grad_rhs)?;
                }
            }
        },

        Op::Matmul { lhs, rhs } => {
            if lhs.receives_grad() {
                lhs.accumulate_grad(&grad.matmul_detached(&rhs.t_detached()?)?)?;
            }
            if rhs.receives_grad() {
                rhs.accumulate_grad(&lhs.t_detached()?.matmul_detached(grad)?)?;
            }
        }

        Op::Reshape { input, src_shape } => {
            if input.receives_grad() {
                input.accumulate_grad(&grad.reshape_detached(src_shape.clone())?)?;
            }
        }

        Op::Permute { input, dims } => {
            if input.receives_grad() {
                let inverse = invert_permutation(dims);
                input.accumulate_grad(&grad.permute_detached(&inverse)?)?;
            }
        }
    }
    Ok(())
}

/// The permutation that undoes `dims`: inverse[dims[i]] = i.
fn invert_permutation(dims: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0usize; dims.len()];
    for (i, &d) in dims.iter().enumerate() {
        inverse[d] = i;
    }
    inverse
}

/// Reset the gradient accumulators of the given tensors to zero,
/// independent of any graph traversal.
pub fn zero_grad(tensors: &[Tensor]) -> Result<()> {
    for tensor in tensors {
        tensor.zero_grad()?;
    }
    Ok(())
}
