use clap::Parser;
use convvae::nnutil;
use convvae::{build_vae, ArchConfig, Summarize, Summary, Vae, Volume};
use tch::{self, nn, nn::Module, Device, Kind, TchError, Tensor};

#[derive(Parser)]
#[clap(author, version, about)]
struct Settings {
    /// Input data shape. ex) 64
    #[clap(long = "x")]
    #[clap(default_value = "64")]
    pub x_size: i64,

    /// Latent space dimension. ex) 100
    #[clap(long = "z")]
    #[clap(default_value = "100")]
    pub z_dim: i64,

    #[clap(long, short)]
    #[clap(default_value = "3")]
    pub channels: i64,

    #[clap(long)]
    #[clap(default_value = "4")]
    pub stages: usize,

    #[clap(long)]
    #[clap(default_value = "13")]
    pub seed: i64,

    #[clap(long)]
    pub cpu: bool,

    /// Push a random batch of this size through the vae.
    #[clap(long)]
    pub probe_batch: Option<i64>,
}

fn probe(vae: &Vae, batch_size: i64, device: Device) {
    let image = vae.encoder().input_shape();
    let xs = Tensor::rand(image.with_batch(batch_size), (Kind::Float, device));
    let encoded = vae.encoder().forward(&xs);
    let reconstruction = vae.forward(&xs);
    log::info!(
        "probe: input {:?} -> z {:?} -> reconstruction {:?}",
        xs.size(),
        encoded.z.size(),
        reconstruction.size()
    );
}

fn summarize(settings: &Settings) -> Result<Vec<Summary>, TchError> {
    let device = if settings.cpu {
        Device::Cpu
    } else {
        nnutil::best_device_available()
    };
    tch::manual_seed(settings.seed);
    let vs = nn::VarStore::new(device);
    log::info!("Device: {:?}", vs.device());
    let image = Volume::square(settings.x_size, settings.channels)?;
    let config = ArchConfig::default().with_stages(settings.stages);
    let vae = build_vae(&vs.root(), image, settings.z_dim, &config)?;
    if let Some(batch_size) = settings.probe_batch {
        if batch_size <= 0 {
            return Err(TchError::Shape(format!(
                "probe batch size must be positive, got {batch_size}"
            )));
        }
        tch::no_grad(|| probe(&vae, batch_size, device));
    }
    Ok(vec![
        vae.encoder().summary(),
        vae.decoder().summary(),
        vae.summary(),
    ])
}

fn main() -> Result<(), TchError> {
    let settings = Settings::parse();
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    for summary in summarize(&settings)? {
        println!("{summary}");
    }
    Ok(())
}
