//! A convolutional variational autoencoder built on tch.
//!
//! [`encoder::Encoder`] maps images to the mean and log-variance of a latent
//! Gaussian and samples from it, [`decoder::Decoder`] maps latent vectors back
//! to images, and [`vae::Vae`] chains the two for end-to-end use.
//!
//! ```ignore
//! let vs = tch::nn::VarStore::new(tch::Device::Cpu);
//! let image = Volume::square(64, 3)?;
//! let vae = build_vae(&vs.root(), image, 100, &ArchConfig::default())?;
//! println!("{}", vae.encoder().summary());
//! ```

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod nnutil;
pub mod sampler;
pub mod shape;
pub mod summary;
pub mod vae;

pub use config::ArchConfig;
pub use decoder::Decoder;
pub use encoder::{Encoder, EncoderOutput};
pub use sampler::{f_sample, GlobalNoise, NoiseSource, SeededNoise};
pub use shape::Volume;
pub use summary::{Summarize, Summary};
pub use vae::{build_vae, Vae, VaeOutput};
