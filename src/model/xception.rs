//! Xception-style binary classifier
//!
//! A standard 5×5 stem convolution followed by residual blocks built from
//! depthwise-separable convolutions. Each block halves the spatial size with
//! a strided max-pool and adds a 1×1 strided projection of its input, so the
//! shortcut always matches the main path in channels and size.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d,
        Relu,
    },
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use crate::config::ModelConfig;
use crate::utils::error::Error;

/// BatchNorm epsilon and running-average momentum (fraction of the new value)
const BN_EPSILON: f64 = 1e-3;
const BN_MOMENTUM: f64 = 0.01;

const POOL_KERNEL: usize = 3;
const POOL_STRIDE: usize = 2;

/// Padding `(before, after)` along one axis for a "same" pooling window.
///
/// The output has `ceil(n / stride)` positions. Any odd pixel of padding goes
/// after the input, so windows start at the top-left corner of the input.
pub fn same_padding(n: usize, kernel: usize, stride: usize) -> (usize, usize) {
    let out = n.div_ceil(stride);
    let needed = (out.saturating_sub(1) * stride + kernel).saturating_sub(n);
    (needed / 2, needed - needed / 2)
}

/// Configuration for the XceptionLike model
#[derive(Config, Debug)]
pub struct XceptionLikeConfig {
    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters of the stem convolution
    #[config(default = "32")]
    pub stem_filters: usize,

    /// Kernel size of the stem convolution (valid padding)
    #[config(default = "5")]
    pub stem_kernel: usize,

    /// Output width of each residual block
    #[config(default = "vec![32, 64, 128, 256, 512]")]
    pub block_filters: Vec<usize>,

    /// Dropout before the classifier
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl XceptionLikeConfig {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self::new()
            .with_stem_filters(config.stem_filters)
            .with_stem_kernel(config.stem_kernel)
            .with_block_filters(config.block_filters.clone())
            .with_dropout(config.dropout)
    }

    /// Spatial side after the stem and after every block, for a square input
    pub fn spatial_sizes(&self, image_size: usize) -> crate::Result<Vec<usize>> {
        if image_size < self.stem_kernel || self.stem_kernel == 0 {
            return Err(Error::Model(format!(
                "input of size {image_size} is smaller than the {0}x{0} stem kernel",
                self.stem_kernel
            )));
        }
        let mut sizes = vec![image_size - self.stem_kernel + 1];
        for _ in &self.block_filters {
            let last = sizes[sizes.len() - 1];
            sizes.push(last.div_ceil(2));
        }
        Ok(sizes)
    }

    /// Build the model with freshly initialized parameters
    pub fn init<B: Backend>(&self, device: &B::Device) -> XceptionLike<B> {
        let stem = Conv2dConfig::new(
            [self.in_channels, self.stem_filters],
            [self.stem_kernel, self.stem_kernel],
        )
        .with_padding(PaddingConfig2d::Valid)
        .with_bias(false)
        .init(device);

        let mut blocks = Vec::with_capacity(self.block_filters.len());
        let mut channels = self.stem_filters;
        for &filters in &self.block_filters {
            blocks.push(ResidualBlock::new(channels, filters, device));
            channels = filters;
        }

        XceptionLike {
            stem,
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(self.dropout).init(),
            classifier: LinearConfig::new(channels, 1).init(device),
        }
    }
}

fn batch_norm<B: Backend>(channels: usize, device: &B::Device) -> BatchNorm<B, 2> {
    BatchNormConfig::new(channels)
        .with_epsilon(BN_EPSILON)
        .with_momentum(BN_MOMENTUM)
        .init(device)
}

/// Depthwise 3×3 convolution (one filter per input channel) followed by a
/// pointwise 1×1 convolution to `out_channels`. No bias, same padding.
#[derive(Module, Debug)]
pub struct SeparableConv2d<B: Backend> {
    pub depthwise: Conv2d<B>,
    pub pointwise: Conv2d<B>,
}

impl<B: Backend> SeparableConv2d<B> {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let depthwise = Conv2dConfig::new([in_channels, in_channels], [kernel_size, kernel_size])
            .with_groups(in_channels)
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init(device);
        let pointwise = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_bias(false)
            .init(device);

        Self {
            depthwise,
            pointwise,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.pointwise.forward(self.depthwise.forward(x))
    }
}

/// BN → ReLU → SepConv → BN → ReLU → SepConv → MaxPool, plus a projected
/// shortcut of the block input
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub bn1: BatchNorm<B, 2>,
    pub sep1: SeparableConv2d<B>,
    pub bn2: BatchNorm<B, 2>,
    pub sep2: SeparableConv2d<B>,
    pub pool: MaxPool2d,
    /// 1×1 stride-2 projection of the block input
    pub shortcut: Conv2d<B>,
    pub relu: Relu,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        // Padding is applied in `pool_same`, which depends on the input size
        let pool = MaxPool2dConfig::new([POOL_KERNEL, POOL_KERNEL])
            .with_strides([POOL_STRIDE, POOL_STRIDE])
            .with_padding(PaddingConfig2d::Valid)
            .init();

        let shortcut = Conv2dConfig::new([in_channels, out_channels], [1, 1])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Valid)
            .with_bias(false)
            .init(device);

        Self {
            bn1: batch_norm(in_channels, device),
            sep1: SeparableConv2d::new(in_channels, out_channels, 3, device),
            bn2: batch_norm(out_channels, device),
            sep2: SeparableConv2d::new(out_channels, out_channels, 3, device),
            pool,
            shortcut,
            relu: Relu::new(),
        }
    }

    /// Main path and shortcut outputs, before they are summed
    pub fn paths(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let residual = self.shortcut.forward(x.clone());

        let x = self.relu.forward(self.bn1.forward(x));
        let x = self.sep1.forward(x);
        let x = self.relu.forward(self.bn2.forward(x));
        let x = self.sep2.forward(x);
        let x = self.pool_same(x);

        (x, residual)
    }

    /// Strided max-pool over a `-inf` border, giving `ceil(n / 2)` per axis
    pub fn pool_same(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let (top, bottom) = same_padding(height, POOL_KERNEL, POOL_STRIDE);
        let (left, right) = same_padding(width, POOL_KERNEL, POOL_STRIDE);
        let x = x.pad((left, right, top, bottom), f32::NEG_INFINITY);
        self.pool.forward(x)
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let (main, residual) = self.paths(x);
        main + residual
    }
}

/// Xception-style cats vs. dogs classifier
///
/// Input `[N, 3, H, W]`; output `[N, 1]`, the probability of label 1.
#[derive(Module, Debug)]
pub struct XceptionLike<B: Backend> {
    pub stem: Conv2d<B>,
    pub blocks: Vec<ResidualBlock<B>>,
    pub global_pool: AdaptiveAvgPool2d,
    pub dropout: Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> XceptionLike<B> {
    /// Feature maps after the stem and all residual blocks
    pub fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.stem.forward(x);
        for block in &self.blocks {
            x = block.forward(x);
        }
        x
    }

    /// Pre-sigmoid scores, shape `[N, 1]`
    pub fn forward_logits(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.features(x);

        // [N, C, H, W] -> [N, C, 1, 1] -> [N, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.dropout.forward(x);
        self.classifier.forward(x)
    }

    /// Probabilities in `[0, 1]`, shape `[N, 1]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        sigmoid(self.forward_logits(x))
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
}
