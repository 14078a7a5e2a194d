use crate::shape::{conv_output_size, conv_transpose_output_size, Volume};
use tch::{nn, TchError};

/// Hyper-parameters shared by the encoder and the decoder.
///
/// The defaults describe the reference architecture: four stride-2 stages of
/// 32 3x3 filters and two hidden dense layers of 1024 units.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchConfig {
    /// Filters of every convolution but the decoder's last one.
    pub filters: i64,
    pub kernel_size: i64,
    pub stride: i64,
    /// Number of down-sampling convolutions, mirrored by as many transposed ones.
    pub stages: usize,
    pub hidden_units: i64,
    pub hidden_layers: usize,
    pub negative_slope: f64,
}

impl Default for ArchConfig {
    fn default() -> Self {
        ArchConfig {
            filters: 32,
            kernel_size: 3,
            stride: 2,
            stages: 4,
            hidden_units: 1024,
            hidden_layers: 2,
            negative_slope: 0.3,
        }
    }
}

impl ArchConfig {
    pub fn with_filters(mut self, filters: i64) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_kernel_size(mut self, kernel_size: i64) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    pub fn with_stride(mut self, stride: i64) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_stages(mut self, stages: usize) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_hidden(mut self, hidden_units: i64, hidden_layers: usize) -> Self {
        self.hidden_units = hidden_units;
        self.hidden_layers = hidden_layers;
        self
    }

    pub fn with_negative_slope(mut self, negative_slope: f64) -> Self {
        self.negative_slope = negative_slope;
        self
    }

    pub fn validate(&self) -> Result<(), TchError> {
        let positive = [
            ("filters", self.filters),
            ("kernel_size", self.kernel_size),
            ("stride", self.stride),
            ("hidden_units", self.hidden_units),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| *v <= 0) {
            return Err(TchError::Shape(format!("{name} must be positive, got {value}")));
        }
        if self.stages == 0 {
            return Err(TchError::Shape("at least one convolution stage is required".into()));
        }
        if self.kernel_size % 2 == 0 {
            // "same" padding needs a centered kernel.
            return Err(TchError::Shape(format!(
                "kernel_size must be odd, got {}",
                self.kernel_size
            )));
        }
        if !(0.0..1.0).contains(&self.negative_slope) {
            return Err(TchError::Shape(format!(
                "negative_slope must be in [0, 1), got {}",
                self.negative_slope
            )));
        }
        self.spatial_multiple()?;
        Ok(())
    }

    pub fn padding(&self) -> i64 {
        self.kernel_size / 2
    }

    pub fn output_padding(&self) -> i64 {
        self.stride - 1
    }

    pub fn conv_config(&self) -> nn::ConvConfig {
        nn::ConvConfig {
            stride: self.stride,
            padding: self.padding(),
            ..Default::default()
        }
    }

    pub fn conv_transpose_config(&self) -> nn::ConvTransposeConfig {
        nn::ConvTransposeConfig {
            stride: self.stride,
            padding: self.padding(),
            output_padding: self.output_padding(),
            ..Default::default()
        }
    }

    pub fn downsample(&self, input: Volume, out_channels: i64) -> Result<Volume, TchError> {
        let k = self.kernel_size;
        Volume::new(
            out_channels,
            conv_output_size(input.height, k, self.stride, self.padding()),
            conv_output_size(input.width, k, self.stride, self.padding()),
        )
    }

    pub fn upsample(&self, input: Volume, out_channels: i64) -> Result<Volume, TchError> {
        let (k, s, p, op) = (
            self.kernel_size,
            self.stride,
            self.padding(),
            self.output_padding(),
        );
        Volume::new(
            out_channels,
            conv_transpose_output_size(input.height, k, s, p, op),
            conv_transpose_output_size(input.width, k, s, p, op),
        )
    }

    /// Input sizes that are multiples of this are restored exactly by the
    /// decoder; other sizes come back rounded up to the next multiple.
    pub fn spatial_multiple(&self) -> Result<i64, TchError> {
        u32::try_from(self.stages)
            .ok()
            .and_then(|stages| self.stride.checked_pow(stages))
            .ok_or_else(|| {
                TchError::Shape(format!(
                    "{} stages of stride {} overflow the spatial size",
                    self.stages, self.stride
                ))
            })
    }
}
