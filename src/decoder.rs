use crate::config::ArchConfig;
use crate::nnutil;
use crate::shape::Volume;
use crate::summary::{LayerSummary, Summarize, Summary};
use tch::{nn, nn::Module, TchError, Tensor};

/// Maps `[N, Z]` latent vectors back to `[N, C, H, W]` images in `[0, 1]`.
#[derive(Debug)]
pub struct Decoder {
    hidden: Vec<nn::Linear>,
    bridge: nn::Linear,
    deconvs: Vec<nn::ConvTranspose2D>,
    latent_dim: i64,
    feature_shape: Volume,
    output_shape: Volume,
    negative_slope: f64,
    layers: Vec<LayerSummary>,
}

impl Decoder {
    /// Builds a decoder that mirrors an encoder whose last convolution
    /// produced `feature_shape`, ending in `out_channels` channels.
    pub fn new(
        vs: &nn::Path,
        latent_dim: i64,
        feature_shape: Volume,
        out_channels: i64,
        config: &ArchConfig,
    ) -> Result<Self, TchError> {
        config.validate()?;
        if latent_dim <= 0 || out_channels <= 0 {
            return Err(TchError::Shape(format!(
                "latent dimension and output channels must be positive, got {latent_dim} and {out_channels}"
            )));
        }
        let mut layers = vec![LayerSummary::new("input", "InputLayer", vec![-1, latent_dim], 0)];

        let mut in_dim = latent_dim;
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

        let bridge_units = feature_shape.volume();
        let bridge = nn::linear(vs / "bridge", in_dim, bridge_units, Default::default());
        layers.push(LayerSummary::new(
            "bridge",
            "Dense",
            vec![-1, bridge_units],
            nnutil::parameter_count(&bridge.ws, bridge.bs.as_ref()),
        ));
        layers.push(LayerSummary::new(
            "reshape",
            "Reshape",
            feature_shape.batched(),
            0,
        ));

        let mut shape = feature_shape;
        let mut deconvs = Vec::with_capacity(config.stages);
        for stage in 1..=config.stages {
            let last = stage == config.stages;
            let filters = if last { out_channels } else { config.filters };
            let deconv = nn::conv_transpose2d(
                vs / format!("deconv{stage}"),
                shape.channels,
                filters,
                config.kernel_size,
                config.conv_transpose_config(),
            );
            shape = config.upsample(shape, filters)?;
            layers.push(LayerSummary::new(
                format!("deconv{stage}"),
                "Conv2DTranspose",
                shape.batched(),
                nnutil::parameter_count(&deconv.ws, deconv.bs.as_ref()),
            ));
            let (name, kind) = if last {
                ("sigmoid".to_string(), "Activation")
            } else {
                (format!("leaky_relu{stage}"), "LeakyReLU")
            };
            layers.push(LayerSummary::new(name, kind, shape.batched(), 0));
            deconvs.push(deconv);
        }

        log::info!(
            "Built decoder: latent dim {latent_dim}, reshape to {feature_shape}, output {shape}"
        );
        Ok(Decoder {
            hidden,
            bridge,
            deconvs,
            latent_dim,
            feature_shape,
            output_shape: shape,
            negative_slope: config.negative_slope,
            layers,
        })
    }

    pub fn latent_dim(&self) -> i64 {
        self.latent_dim
    }

    pub fn feature_shape(&self) -> Volume {
        self.feature_shape
    }

    pub fn output_shape(&self) -> Volume {
        self.output_shape
    }

    /// Width of the dense layer feeding the reshape.
    pub fn bridge_units(&self) -> i64 {
        self.bridge.ws.size()[0]
    }

    pub(crate) fn parameters(&self) -> Vec<&Tensor> {
        let linears = self
            .hidden
            .iter()
            .chain(std::iter::once(&self.bridge))
            .flat_map(|l| std::iter::once(&l.ws).chain(l.bs.as_ref()));
        let deconvs = self
            .deconvs
            .iter()
            .flat_map(|d| std::iter::once(&d.ws).chain(d.bs.as_ref()));
        linears.chain(deconvs).collect()
    }
}

impl Module for Decoder {
    fn forward(&self, zs: &Tensor) -> Tensor {
        let h = self
            .hidden
            .iter()
            .fold(zs.shallow_clone(), |ys, linear| ys.apply(linear).relu());
        let mut ys = h
            .apply(&self.bridge)
            .relu()
            .view([-1, self.feature_shape.channels, self.feature_shape.height, self.feature_shape.width]);
        let last = self.deconvs.len() - 1;
        for (index, deconv) in self.deconvs.iter().enumerate() {
            ys = ys.apply(deconv);
            ys = if index == last {
                ys.sigmoid()
            } else {
                nnutil::leaky_relu(&ys, self.negative_slope)
            };
        }
        ys
    }
}

impl Summarize for Decoder {
    fn summary(&self) -> Summary {
        let (trainable, non_trainable) = nnutil::split_trainable(self.parameters());
        Summary {
            name: "decoder".to_string(),
            layers: self.layers.clone(),
            trainable,
            non_trainable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{Device, Kind};

    fn build(feature_shape: Volume, latent_dim: i64) -> (nn::VarStore, Decoder) {
        let vs = nn::VarStore::new(Device::Cpu);
        let decoder =
            Decoder::new(&vs.root(), latent_dim, feature_shape, 3, &ArchConfig::default()).unwrap();
        (vs, decoder)
    }

    #[test]
    fn bridge_matches_feature_volume() {
        for (c, h, w) in [(32, 4, 4), (32, 2, 2), (8, 3, 5)] {
            let feature_shape = Volume::new(c, h, w).unwrap();
            let (_vs, decoder) = build(feature_shape, 10);
            assert_eq!(decoder.bridge_units(), feature_shape.volume());
            assert_eq!(decoder.feature_shape(), feature_shape);
        }
    }

    #[test]
    fn restores_spatial_resolution_in_unit_range() {
        let (_vs, decoder) = build(Volume::new(32, 4, 4).unwrap(), 100);
        assert_eq!(decoder.output_shape(), Volume::square(64, 3).unwrap());
        let zs = Tensor::randn([2, 100], (Kind::Float, Device::Cpu));
        let image = decoder.forward(&zs);
        assert_eq!(image.size(), vec![2, 3, 64, 64]);
        assert!(image.min().double_value(&[]) >= 0.0);
        assert!(image.max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn single_stage_projects_straight_to_channels() {
        let vs = nn::VarStore::new(Device::Cpu);
        let config = ArchConfig::default().with_stages(1).with_hidden(16, 1);
        let decoder = Decoder::new(&vs.root(), 4, Volume::new(32, 5, 5).unwrap(), 1, &config).unwrap();
        assert_eq!(decoder.output_shape(), Volume::new(1, 10, 10).unwrap());
        let image = decoder.forward(&Tensor::zeros([3, 4], (Kind::Float, Device::Cpu)));
        assert_eq!(image.size(), vec![3, 1, 10, 10]);
    }

    #[test]
    fn summary_ends_with_sigmoid() {
        let (vs, decoder) = build(Volume::new(32, 2, 2).unwrap(), 16);
        let summary = decoder.summary();
        assert_eq!(summary.name, "decoder");
        let last = summary.layers.last().unwrap();
        assert_eq!(last.kind, "Activation");
        assert_eq!(last.output_shapes, vec![vec![-1, 3, 32, 32]]);
        assert_eq!(
            summary.layer("reshape").map(|l| l.output_shapes.clone()),
            Some(vec![vec![-1, 32, 2, 2]])
        );
        // 32 * 3 * 3 * 3 weights plus 3 biases.
        assert_eq!(summary.layer("deconv4").map(|l| l.params), Some(867));
        let stored: i64 = vs
            .trainable_variables()
            .iter()
            .map(|t| t.numel() as i64)
            .sum();
        assert_eq!(summary.total_params(), stored);
    }
}
