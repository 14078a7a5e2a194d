use crate::config::ArchConfig;
use crate::nnutil;
use crate::sampler::{self, GlobalNoise, NoiseSource};
use crate::shape::Volume;
use crate::summary::{LayerSummary, Summarize, Summary};
use tch::{nn, TchError, Tensor};

#[derive(Debug)]
pub struct EncoderOutput {
    pub mean: Tensor,
    pub log_var: Tensor,
    pub z: Tensor,
}

/// Maps `[N, C, H, W]` images to the mean and log-variance of a diagonal
/// Gaussian over the latent space, plus a reparameterized sample.
#[derive(Debug)]
pub struct Encoder {
    convs: Vec<nn::Conv2D>,
    hidden: Vec<nn::Linear>,
    z_mean: nn::Linear,
    z_log_var: nn::Linear,
    input_shape: Volume,
    feature_shape: Volume,
    latent_dim: i64,
    negative_slope: f64,
    layers: Vec<LayerSummary>,
}

impl Encoder {
    /// Builds the encoder's layers under `vs`.
    ///
    /// The spatial size of the last convolution's output is computed here and
    /// kept as [`Encoder::feature_shape`], which the decoder needs to undo the
    /// flattening.
    pub fn new(
        vs: &nn::Path,
        input_shape: Volume,
        latent_dim: i64,
        config: &ArchConfig,
    ) -> Result<Self, TchError> {
        config.validate()?;
        if latent_dim <= 0 {
            return Err(TchError::Shape(format!(
                "latent dimension must be positive, got {latent_dim}"
            )));
        }
        let mut layers = vec![LayerSummary::new(
            "input",
            "InputLayer",
            input_shape.batched(),
            0,
        )];

        let mut shape = input_shape;
        let mut convs = Vec::with_capacity(config.stages);
        for stage in 1..=config.stages {
            let conv = nn::conv2d(
                vs / format!("conv{stage}"),
                shape.channels,
                config.filters,
                config.kernel_size,
                config.conv_config(),
            );
            shape = config.downsample(shape, config.filters)?;
            layers.push(LayerSummary::new(
                format!("conv{stage}"),
                "Conv2D",
                shape.batched(),
                nnutil::parameter_count(&conv.ws, conv.bs.as_ref()),
            ));
            layers.push(LayerSummary::new(
                format!("leaky_relu{stage}"),
                "LeakyReLU",
                shape.batched(),
                0,
            ));
            convs.push(conv);
        }
        let feature_shape = shape;
        log::debug!("encoder features: {input_shape} -> {feature_shape}");
        layers.push(LayerSummary::new(
            "flatten",
            "Flatten",
            vec![-1, feature_shape.volume()],
            0,
        ));

        let mut in_dim = feature_shape.volume();
        let mut hidden = Vec::with_capacity(config.hidden_layers);
        for index in 1..=config.hidden_layers {
            let linear = nn::linear(
                vs / format!("dense{index}"),
                in_dim,
                config.hidden_units,
                Default::default(),
            );
            layers.push(LayerSummary::new(
                format!("dense{index}"),
                "Dense",
                vec![-1, config.hidden_units],
                nnutil::parameter_count(&linear.ws, linear.bs.as_ref()),
            ));
            hidden.push(linear);
            in_dim = config.hidden_units;
        }

        let z_mean = nn::linear(vs / "z_mean", in_dim, latent_dim, Default::default());
        let z_log_var = nn::linear(vs / "z_log_var", in_dim, latent_dim, Default::default());
        for (name, linear) in [("z_mean", &z_mean), ("z_log_var", &z_log_var)] {
            layers.push(LayerSummary::new(
                name,
                "Dense",
                vec![-1, latent_dim],
                nnutil::parameter_count(&linear.ws, linear.bs.as_ref()),
            ));
        }
        layers.push(LayerSummary::new("z", "Sampling", vec![-1, latent_dim], 0));

        log::info!(
            "Built encoder: input {input_shape}, {} conv stages, latent dim {latent_dim}",
            config.stages
        );
        Ok(Encoder {
            convs,
            hidden,
            z_mean,
            z_log_var,
            input_shape,
            feature_shape,
            latent_dim,
            negative_slope: config.negative_slope,
            layers,
        })
    }

    pub fn input_shape(&self) -> Volume {
        self.input_shape
    }

    /// Shape of the last convolution's output, before flattening.
    pub fn feature_shape(&self) -> Volume {
        self.feature_shape
    }

    pub fn latent_dim(&self) -> i64 {
        self.latent_dim
    }

    /// Convolutional features of `xs`, sized `[N, C', H', W']`.
    pub fn features(&self, xs: &Tensor) -> Tensor {
        self.convs.iter().fold(xs.shallow_clone(), |ys, conv| {
            nnutil::leaky_relu(&ys.apply(conv), self.negative_slope)
        })
    }

    /// Returns `(mean, log_var)`, both sized `[N, Z]`.
    pub fn encode(&self, xs: &Tensor) -> (Tensor, Tensor) {
        let h = self
            .hidden
            .iter()
            .fold(self.features(xs).flatten(1, -1), |ys, linear| {
                ys.apply(linear).relu()
            });
        (h.apply(&self.z_mean), h.apply(&self.z_log_var))
    }

    pub fn forward_with(&self, xs: &Tensor, noise: &mut dyn NoiseSource) -> EncoderOutput {
        let (mean, log_var) = self.encode(xs);
        let z = sampler::reparameterize(&mean, &log_var, noise);
        EncoderOutput { mean, log_var, z }
    }

    pub fn forward(&self, xs: &Tensor) -> EncoderOutput {
        self.forward_with(xs, &mut GlobalNoise)
    }

    pub(crate) fn parameters(&self) -> Vec<&Tensor> {
        let convs = self.convs.iter().flat_map(|c| std::iter::once(&c.ws).chain(c.bs.as_ref()));
        let linears = self
            .hidden
            .iter()
            .chain([&self.z_mean, &self.z_log_var])
            .flat_map(|l| std::iter::once(&l.ws).chain(l.bs.as_ref()));
        convs.chain(linears).collect()
    }
}

impl Summarize for Encoder {
    fn summary(&self) -> Summary {
        let (trainable, non_trainable) = nnutil::split_trainable(self.parameters());
        Summary {
            name: "encoder".to_string(),
            layers: self.layers.clone(),
            trainable,
            non_trainable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SeededNoise;
    use tch::{Device, Kind};

    fn build(size: i64, latent_dim: i64) -> (nn::VarStore, Encoder) {
        let vs = nn::VarStore::new(Device::Cpu);
        let image = Volume::square(size, 3).unwrap();
        let encoder = Encoder::new(&vs.root(), image, latent_dim, &ArchConfig::default()).unwrap();
        (vs, encoder)
    }

    #[test]
    fn outputs_have_latent_size() {
        let (_vs, encoder) = build(64, 100);
        let xs = Tensor::rand([2, 3, 64, 64], (Kind::Float, Device::Cpu));
        let out = encoder.forward_with(&xs, &mut SeededNoise::new(1));
        assert_eq!(out.mean.size(), vec![2, 100]);
        assert_eq!(out.log_var.size(), vec![2, 100]);
        assert_eq!(out.z.size(), vec![2, 100]);
    }

    #[test]
    fn captured_feature_shape_matches_activations() {
        let (_vs, encoder) = build(64, 100);
        assert_eq!(encoder.feature_shape(), Volume::new(32, 4, 4).unwrap());
        let xs = Tensor::rand([1, 3, 64, 64], (Kind::Float, Device::Cpu));
        assert_eq!(encoder.features(&xs).size(), vec![1, 32, 4, 4]);

        let (_vs, odd) = build(20, 8);
        assert_eq!(odd.feature_shape(), Volume::new(32, 2, 2).unwrap());
        let xs = Tensor::rand([1, 3, 20, 20], (Kind::Float, Device::Cpu));
        assert_eq!(odd.features(&xs).size(), vec![1, 32, 2, 2]);
    }

    #[test]
    fn sample_is_mean_plus_scaled_noise() {
        let (_vs, encoder) = build(32, 16);
        let xs = Tensor::rand([3, 3, 32, 32], (Kind::Float, Device::Cpu));
        let out = encoder.forward_with(&xs, &mut SeededNoise::new(9));
        let eps = SeededNoise::new(9).standard_normal(&[3, 16], (Kind::Float, Device::Cpu));
        let expected = &out.mean + (&out.log_var * 0.5).exp() * eps;
        assert!(out.z.allclose(&expected, 1e-5, 1e-5, false));
    }

    #[test]
    fn rejects_non_positive_latent_dim() {
        let vs = nn::VarStore::new(Device::Cpu);
        let image = Volume::square(32, 3).unwrap();
        assert!(Encoder::new(&vs.root(), image, 0, &ArchConfig::default()).is_err());
    }

    #[test]
    fn summary_lists_layers_and_counts() {
        let (vs, encoder) = build(64, 100);
        let summary = encoder.summary();
        assert_eq!(summary.name, "encoder");
        assert_eq!(summary.layer("conv1").map(|l| l.params), Some(896));
        assert_eq!(
            summary.layer("flatten").map(|l| l.output_shapes.clone()),
            Some(vec![vec![-1, 512]])
        );
        assert_eq!(summary.output_shapes(), &[vec![-1, 100]]);
        let stored: i64 = vs
            .trainable_variables()
            .iter()
            .map(|t| t.numel() as i64)
            .sum();
        assert_eq!(summary.trainable, stored);
        assert_eq!(summary.non_trainable, 0);
    }
}
