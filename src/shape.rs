use std::fmt;
use tch::TchError;

/// A channels-first 3D activation volume, i.e. one item of an NCHW batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Volume {
    pub channels: i64,
    pub height: i64,
    pub width: i64,
}

impl Volume {
    pub fn new(channels: i64, height: i64, width: i64) -> Result<Volume, TchError> {
        if channels <= 0 || height <= 0 || width <= 0 {
            return Err(TchError::Shape(format!(
                "volume dimensions must be positive, got channels={channels} height={height} width={width}"
            )));
        }
        Ok(Volume {
            channels,
            height,
            width,
        })
    }

    pub fn square(size: i64, channels: i64) -> Result<Volume, TchError> {
        Volume::new(channels, size, size)
    }

    pub fn volume(&self) -> i64 {
        self.channels * self.height * self.width
    }

    pub fn batched(&self) -> Vec<i64> {
        vec![-1, self.channels, self.height, self.width]
    }

    pub fn with_batch(&self, batch_size: i64) -> [i64; 4] {
        [batch_size, self.channels, self.height, self.width]
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.channels, self.height, self.width)
    }
}

/// Spatial output size of a convolution, following libtorch.
pub fn conv_output_size(size: i64, kernel: i64, stride: i64, padding: i64) -> i64 {
    (size + 2 * padding - kernel).div_euclid(stride) + 1
}

/// Spatial output size of a transposed convolution, following libtorch.
pub fn conv_transpose_output_size(
    size: i64,
    kernel: i64,
    stride: i64,
    padding: i64,
    output_padding: i64,
) -> i64 {
    (size - 1) * stride - 2 * padding + kernel + output_padding
}
