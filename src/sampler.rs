//! Reparameterized sampling of the latent Gaussian.
//!
//! A sample is expressed as `mean + exp(0.5 * log_var) * eps` where `eps` is
//! standard normal noise drawn from a [`NoiseSource`]. Keeping the noise
//! outside of the formula lets gradients flow through `mean` and `log_var`
//! and makes the draw replaceable by a seeded generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tch::{Device, Kind, TchError, Tensor};

pub trait NoiseSource {
    fn standard_normal(&mut self, size: &[i64], options: (Kind, Device)) -> Tensor;
}

/// Noise from libtorch's global generator, seeded with `tch::manual_seed`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalNoise;

impl NoiseSource for GlobalNoise {
    fn standard_normal(&mut self, size: &[i64], options: (Kind, Device)) -> Tensor {
        Tensor::randn(size, options)
    }
}

/// Noise from an owned, explicitly seeded generator.
#[derive(Debug, Clone)]
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        SeededNoise {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn standard_normal(&mut self, size: &[i64], options: (Kind, Device)) -> Tensor {
        let numel: i64 = size.iter().product();
        let values: Vec<f32> = (0..numel)
            .map(|_| self.rng.sample::<f32, _>(StandardNormal))
            .collect();
        Tensor::from_slice(&values)
            .view(size)
            .to_kind(options.0)
            .to_device(options.1)
    }
}

/// Draws `z = mean + exp(0.5 * log_var) * eps`.
///
/// One noise tensor matching the size, kind and device of `mean` is drawn
/// per call. An error is returned if `mean` and `log_var` differ in size.
pub fn f_sample(
    mean: &Tensor,
    log_var: &Tensor,
    noise: &mut dyn NoiseSource,
) -> Result<Tensor, TchError> {
    if mean.size() != log_var.size() {
        return Err(TchError::Shape(format!(
            "mean {:?} and log-variance {:?} must have the same size",
            mean.size(),
            log_var.size()
        )));
    }
    Ok(reparameterize(mean, log_var, noise))
}

pub(crate) fn reparameterize(mean: &Tensor, log_var: &Tensor, noise: &mut dyn NoiseSource) -> Tensor {
    let std = (log_var * 0.5).exp();
    let eps = noise.standard_normal(&mean.size(), (mean.kind(), mean.device()));
    mean + std * eps
}
