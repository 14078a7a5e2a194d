use crate::config::ArchConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::sampler::{GlobalNoise, NoiseSource};
use crate::shape::Volume;
use crate::summary::{LayerSummary, Summarize, Summary};
use tch::{nn, nn::Module, TchError, Tensor};

#[derive(Debug)]
pub struct VaeOutput {
    pub reconstruction: Tensor,
    pub mean: Tensor,
    pub log_var: Tensor,
    pub z: Tensor,
}

#[derive(Debug)]
pub struct Vae {
    encoder: Encoder,
    decoder: Decoder,
}

impl Vae {
    /// Fails if the latent sizes differ, if the decoder does not reshape to
    /// the encoder's feature shape, or if it reconstructs a different number
    /// of channels. A reconstruction whose spatial size differs from the
    /// input (inputs that are not a multiple of `stride^stages`) is allowed.
    pub fn assemble(encoder: Encoder, decoder: Decoder) -> Result<Self, TchError> {
        if encoder.latent_dim() != decoder.latent_dim() {
            return Err(TchError::Shape(format!(
                "encoder latent dim {} does not match decoder latent dim {}",
                encoder.latent_dim(),
                decoder.latent_dim()
            )));
        }
        if encoder.feature_shape() != decoder.feature_shape() {
            return Err(TchError::Shape(format!(
                "decoder reshapes to {} but the encoder produces {}",
                decoder.feature_shape(),
                encoder.feature_shape()
            )));
        }
        let (input, output) = (encoder.input_shape(), decoder.output_shape());
        if input.channels != output.channels {
            return Err(TchError::Shape(format!(
                "decoder output {output} does not have the {} channels of encoder input {input}",
                input.channels
            )));
        }
        if input != output {
            log::warn!("decoder output {output} differs in size from encoder input {input}");
        }
        Ok(Vae { encoder, decoder })
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn forward_with(&self, xs: &Tensor, noise: &mut dyn NoiseSource) -> VaeOutput {
        let encoded = self.encoder.forward_with(xs, noise);
        VaeOutput {
            reconstruction: self.decoder.forward(&encoded.z),
            mean: encoded.mean,
            log_var: encoded.log_var,
            z: encoded.z,
        }
    }
}

impl Module for Vae {
    fn forward(&self, xs: &Tensor) -> Tensor {
        self.forward_with(xs, &mut GlobalNoise).reconstruction
    }
}

impl Summarize for Vae {
    fn summary(&self) -> Summary {
        let encoder = self.encoder.summary();
        let decoder = self.decoder.summary();
        let latent = vec![-1, self.encoder.latent_dim()];
        Summary {
            name: "vae".to_string(),
            layers: vec![
                LayerSummary::new("input", "InputLayer", self.encoder.input_shape().batched(), 0),
                LayerSummary::with_outputs(
                    "encoder",
                    "Functional",
                    vec![latent.clone(), latent.clone(), latent],
                    encoder.total_params(),
                ),
                LayerSummary::new(
                    "decoder",
                    "Functional",
                    self.decoder.output_shape().batched(),
                    decoder.total_params(),
                ),
            ],
            trainable: encoder.trainable + decoder.trainable,
            non_trainable: encoder.non_trainable + decoder.non_trainable,
        }
    }
}

/// Builds an encoder under `vs / "encoder"`, a matching decoder under
/// `vs / "decoder"` and chains them.
pub fn build_vae(
    vs: &nn::Path,
    image: Volume,
    latent_dim: i64,
    config: &ArchConfig,
) -> Result<Vae, TchError> {
    let encoder = Encoder::new(&(vs / "encoder"), image, latent_dim, config)?;
    let decoder = Decoder::new(
        &(vs / "decoder"),
        latent_dim,
        encoder.feature_shape(),
        image.channels,
        config,
    )?;
    Vae::assemble(encoder, decoder)
}
