// Linear regression with a single dense layer.
//
// Fits y = 2x + 3 from synthetic data: forward pass, backward pass, SGD
// update, repeated until the loss flattens out.

use rand::rngs::StdRng;
use rand::SeedableRng;

use tenrec::prelude::*;

fn main() -> Result<()> {
    let device = Device::Cpu;
    let mut rng = StdRng::seed_from_u64(42);

    // Eight samples of y = 2x + 3.
    let xs: Vec<f64> = (0..8).map(|i| i as f64 * 0.5).collect();
    let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 3.0).collect();
    let x = Tensor::from_f64_slice(&xs, (8, 1), DType::F64, device)?;
    let y = Tensor::from_f64_slice(&ys, (8, 1), DType::F64, device)?;

    let model = Linear::new(1, 1, true, DType::F64, device, &mut rng)?;
    let opt = Sgd::new(model.parameters(), 0.01);

    for epoch in 0..500 {
        let pred = model.forward(&x)?;
        let loss = mse(&pred, &y)?;
        opt.zero_grad()?;
        loss.backward()?;
        opt.step()?;

        if epoch % 100 == 0 {
            println!("epoch {:3}  loss {:.6}", epoch, mean_value(&loss)?);
        }
    }

    let w = model.weight().get(0)?;
    let b = model.bias().expect("bias enabled").get(0)?;
    println!("learned: y = {:.3}x + {:.3} (target: y = 2x + 3)", w, b);
    Ok(())
}
