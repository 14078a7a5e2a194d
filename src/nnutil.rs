use tch::{Device, Tensor};

pub fn best_device_available() -> Device {
    Device::cuda_if_available()
}

/// `max(x, slope * x)`, which is the leaky ReLU for slopes in `[0, 1)`.
pub fn leaky_relu(xs: &Tensor, negative_slope: f64) -> Tensor {
    xs.maximum(&(xs * negative_slope))
}

pub fn parameter_count(ws: &Tensor, bs: Option<&Tensor>) -> i64 {
    (ws.numel() + bs.map_or(0, |b| b.numel())) as i64
}

pub fn split_trainable<'a>(params: impl IntoIterator<Item = &'a Tensor>) -> (i64, i64) {
    params.into_iter().fold((0, 0), |(trainable, frozen), p| {
        let n = p.numel() as i64;
        if p.requires_grad() {
            (trainable + n, frozen)
        } else {
            (trainable, frozen + n)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    #[test]
    fn leaky_relu_scales_negatives_only() {
        let xs = Tensor::from_slice(&[-2.0f32, -0.5, 0.0, 1.5]);
        let ys = leaky_relu(&xs, 0.3);
        let expected = Tensor::from_slice(&[-0.6f32, -0.15, 0.0, 1.5]);
        assert!(ys.allclose(&expected, 1e-5, 1e-6, false));
    }

    #[test]
    fn counts_weights_and_bias() {
        let ws = Tensor::zeros([32, 3, 3, 3], (Kind::Float, Device::Cpu));
        let bs = Tensor::zeros([32], (Kind::Float, Device::Cpu));
        assert_eq!(parameter_count(&ws, Some(&bs)), 896);
        assert_eq!(parameter_count(&ws, None), 864);
        let trainable = ws.set_requires_grad(true);
        assert_eq!(split_trainable([&trainable, &bs]), (864, 32));
    }
}
