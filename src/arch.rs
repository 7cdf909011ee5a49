//! Convolutional Architectures
//!
//! Declarative definitions of three classic image classifiers. Nothing here
//! runs a forward pass: a [`Network`] is a list of [`LayerSpec`]s that can be
//! shape-checked, summarised and have its parameters counted.
//!
//! ## Networks
//!
//! ```text
//! LeNet-5    1×28×28   conv5 → pool → conv5 → pool → conv4 → fc → fc          44,426 params
//! VGG-16     3×224×224 13 conv3 in 5 stages → 3 fc                       138,357,544 params
//! ResNet-50  3×224×224 conv7 → pool → 16 bottleneck blocks → gap → fc     25,557,032 params
//! ```
//!
//! ## Residual Blocks
//!
//! A bottleneck block computes `relu(body(x) + shortcut(x))` where the body is
//! 1×1 → 3×3 → 1×1 convolutions. The shortcut is decided when the block is
//! built: an identity when channels and resolution are unchanged, otherwise a
//! strided 1×1 projection followed by batch normalisation.
//!
//! Convolutions followed by batch normalisation carry no bias. Batch
//! normalisation contributes a scale and shift per channel.

use crate::error::{Error, Result};
use std::fmt;

/// Activation shape between layers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Image {
        channels: usize,
        height: usize,
        width: usize,
    },
    Flat(usize),
}

impl Shape {
    pub fn image(channels: usize, height: usize, width: usize) -> Self {
        Shape::Image {
            channels,
            height,
            width,
        }
    }

    pub fn numel(&self) -> usize {
        match *self {
            Shape::Image {
                channels,
                height,
                width,
            } => channels * height * width,
            Shape::Flat(n) => n,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Image {
                channels,
                height,
                width,
            } => write!(f, "{}×{}×{}", channels, height, width),
            Shape::Flat(n) => write!(f, "{}", n),
        }
    }
}

/// How a residual block carries its input to the addition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shortcut {
    Identity,
    /// Strided 1×1 convolution (no bias) followed by batch normalisation
    Projection { out_channels: usize, stride: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResidualBlock {
    pub in_channels: usize,
    pub body: Vec<LayerSpec>,
    pub shortcut: Shortcut,
}

impl ResidualBlock {
    /// 1×1 reduce, 3×3 (carrying the stride), 1×1 expand
    ///
    /// Uses a projection shortcut iff the channel count or resolution changes.
    pub fn bottleneck(in_channels: usize, mid_channels: usize, out_channels: usize, stride: usize) -> Self {
        let body = vec![
            LayerSpec::conv(in_channels, mid_channels, 1, 1, 0, false),
            LayerSpec::BatchNorm {
                channels: mid_channels,
            },
            LayerSpec::Relu,
            LayerSpec::conv(mid_channels, mid_channels, 3, stride, 1, false),
            LayerSpec::BatchNorm {
                channels: mid_channels,
            },
            LayerSpec::Relu,
            LayerSpec::conv(mid_channels, out_channels, 1, 1, 0, false),
            LayerSpec::BatchNorm {
                channels: out_channels,
            },
        ];
        let shortcut = if in_channels != out_channels || stride != 1 {
            Shortcut::Projection {
                out_channels,
                stride,
            }
        } else {
            Shortcut::Identity
        };
        Self {
            in_channels,
            body,
            shortcut,
        }
    }

    fn shortcut_layers(&self) -> Vec<LayerSpec> {
        match self.shortcut {
            Shortcut::Identity => Vec::new(),
            Shortcut::Projection {
                out_channels,
                stride,
            } => vec![
                LayerSpec::conv(self.in_channels, out_channels, 1, stride, 0, false),
                LayerSpec::BatchNorm {
                    channels: out_channels,
                },
            ],
        }
    }

    fn output_shape(&self, input: Shape) -> Result<Shape> {
        let body = propagate(&self.body, input)?;
        let skip = propagate(&self.shortcut_layers(), input)?;
        if body != skip {
            return Err(Error::ShapeMismatch {
                layer: "residual".into(),
                expected: body.to_string(),
                got: skip.to_string(),
            });
        }
        Ok(body)
    }

    fn count_parameters(&self) -> usize {
        let body: usize = self.body.iter().map(LayerSpec::count_parameters).sum();
        let skip: usize = self.shortcut_layers().iter().map(LayerSpec::count_parameters).sum();
        body + skip
    }
}

/// One layer of a network definition
#[derive(Clone, Debug, PartialEq)]
pub enum LayerSpec {
    Conv2d {
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        bias: bool,
    },
    MaxPool2d {
        kernel: usize,
        stride: usize,
        padding: usize,
    },
    AvgPool2d {
        kernel: usize,
        stride: usize,
        padding: usize,
    },
    GlobalAvgPool,
    BatchNorm {
        channels: usize,
    },
    Relu,
    Dropout {
        ratio: f32,
    },
    /// Fully connected; image inputs are flattened first
    Linear {
        in_features: usize,
        out_features: usize,
        bias: bool,
    },
    Residual(ResidualBlock),
}

impl LayerSpec {
    pub fn conv(in_channels: usize, out_channels: usize, kernel: usize, stride: usize, padding: usize, bias: bool) -> Self {
        LayerSpec::Conv2d {
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
            bias,
        }
    }

    pub fn max_pool(kernel: usize, stride: usize) -> Self {
        LayerSpec::MaxPool2d {
            kernel,
            stride,
            padding: 0,
        }
    }

    pub fn linear(in_features: usize, out_features: usize) -> Self {
        LayerSpec::Linear {
            in_features,
            out_features,
            bias: true,
        }
    }

    /// Short description used in summaries
    pub fn name(&self) -> String {
        match self {
            LayerSpec::Conv2d {
                in_channels,
                out_channels,
                kernel,
                stride,
                ..
            } => format!("Conv2d {}→{} k{} s{}", in_channels, out_channels, kernel, stride),
            LayerSpec::MaxPool2d { kernel, stride, .. } => format!("MaxPool2d k{} s{}", kernel, stride),
            LayerSpec::AvgPool2d { kernel, stride, .. } => format!("AvgPool2d k{} s{}", kernel, stride),
            LayerSpec::GlobalAvgPool => "GlobalAvgPool".to_string(),
            LayerSpec::BatchNorm { channels } => format!("BatchNorm {}", channels),
            LayerSpec::Relu => "ReLU".to_string(),
            LayerSpec::Dropout { ratio } => format!("Dropout {}", ratio),
            LayerSpec::Linear {
                in_features,
                out_features,
                ..
            } => format!("Linear {}→{}", in_features, out_features),
            LayerSpec::Residual(block) => match block.shortcut {
                Shortcut::Identity => "Bottleneck (identity)".to_string(),
                Shortcut::Projection { .. } => "Bottleneck (projection)".to_string(),
            },
        }
    }

    pub fn count_parameters(&self) -> usize {
        match self {
            LayerSpec::Conv2d {
                in_channels,
                out_channels,
                kernel,
                bias,
                ..
            } => out_channels * in_channels * kernel * kernel + if *bias { *out_channels } else { 0 },
            LayerSpec::BatchNorm { channels } => 2 * channels,
            LayerSpec::Linear {
                in_features,
                out_features,
                bias,
            } => in_features * out_features + if *bias { *out_features } else { 0 },
            LayerSpec::Residual(block) => block.count_parameters(),
            LayerSpec::MaxPool2d { .. }
            | LayerSpec::AvgPool2d { .. }
            | LayerSpec::GlobalAvgPool
            | LayerSpec::Relu
            | LayerSpec::Dropout { .. } => 0,
        }
    }

    /// Shape produced from `input`, or an error if the layer cannot accept it
    pub fn output_shape(&self, input: Shape) -> Result<Shape> {
        match self {
            LayerSpec::Conv2d {
                in_channels,
                out_channels,
                kernel,
                stride,
                padding,
                ..
            } => {
                let (channels, height, width) = expect_image(input, &self.name())?;
                if channels != *in_channels {
                    return Err(mismatch(&self.name(), *in_channels, channels));
                }
                let height = sliding(height, *kernel, *stride, *padding, &self.name())?;
                let width = sliding(width, *kernel, *stride, *padding, &self.name())?;
                Ok(Shape::image(*out_channels, height, width))
            }
            LayerSpec::MaxPool2d {
                kernel,
                stride,
                padding,
            }
            | LayerSpec::AvgPool2d {
                kernel,
                stride,
                padding,
            } => {
                let (channels, height, width) = expect_image(input, &self.name())?;
                let height = sliding(height, *kernel, *stride, *padding, &self.name())?;
                let width = sliding(width, *kernel, *stride, *padding, &self.name())?;
                Ok(Shape::image(channels, height, width))
            }
            LayerSpec::GlobalAvgPool => {
                let (channels, _, _) = expect_image(input, &self.name())?;
                Ok(Shape::Flat(channels))
            }
            LayerSpec::BatchNorm { channels } => {
                let got = match input {
                    Shape::Image { channels, .. } => channels,
                    Shape::Flat(n) => n,
                };
                if got != *channels {
                    return Err(mismatch(&self.name(), *channels, got));
                }
                Ok(input)
            }
            LayerSpec::Relu | LayerSpec::Dropout { .. } => Ok(input),
            LayerSpec::Linear {
                in_features,
                out_features,
                ..
            } => {
                if input.numel() != *in_features {
                    return Err(mismatch(&self.name(), *in_features, input.numel()));
                }
                Ok(Shape::Flat(*out_features))
            }
            LayerSpec::Residual(block) => block.output_shape(input),
        }
    }
}

/// A named stack of layers with a fixed input shape
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    pub name: String,
    pub input: Shape,
    pub layers: Vec<LayerSpec>,
}

impl Network {
    /// LeNet-5 for 28×28 grayscale digits
    pub fn lenet5() -> Self {
        Self {
            name: "LeNet-5".into(),
            input: Shape::image(1, 28, 28),
            layers: vec![
                LayerSpec::conv(1, 6, 5, 1, 0, true),
                LayerSpec::Relu,
                LayerSpec::max_pool(2, 2),
                LayerSpec::conv(6, 16, 5, 1, 0, true),
                LayerSpec::Relu,
                LayerSpec::max_pool(2, 2),
                LayerSpec::conv(16, 120, 4, 1, 0, true),
                LayerSpec::Relu,
                LayerSpec::linear(120, 84),
                LayerSpec::Relu,
                LayerSpec::linear(84, 10),
            ],
        }
    }

    /// VGG-16 for 224×224 RGB images
    pub fn vgg16(classes: usize) -> Self {
        let stages: [(usize, usize); 5] = [(64, 2), (128, 2), (256, 3), (512, 3), (512, 3)];
        let mut layers = Vec::new();
        let mut channels = 3;
        for (width, convs) in stages {
            for _ in 0..convs {
                layers.push(LayerSpec::conv(channels, width, 3, 1, 1, true));
                layers.push(LayerSpec::Relu);
                channels = width;
            }
            layers.push(LayerSpec::max_pool(2, 2));
        }
        layers.extend([
            LayerSpec::linear(512 * 7 * 7, 4096),
            LayerSpec::Relu,
            LayerSpec::Dropout { ratio: 0.5 },
            LayerSpec::linear(4096, 4096),
            LayerSpec::Relu,
            LayerSpec::Dropout { ratio: 0.5 },
            LayerSpec::linear(4096, classes),
        ]);

        Self {
            name: "VGG-16".into(),
            input: Shape::image(3, 224, 224),
            layers,
        }
    }

    /// ResNet-50 for 224×224 RGB images
    pub fn resnet50(classes: usize) -> Self {
        let mut layers = vec![
            LayerSpec::conv(3, 64, 7, 2, 3, false),
            LayerSpec::BatchNorm { channels: 64 },
            LayerSpec::Relu,
            LayerSpec::MaxPool2d {
                kernel: 3,
                stride: 2,
                padding: 1,
            },
        ];

        let stages: [(usize, usize, usize); 4] = [(64, 3, 1), (128, 4, 2), (256, 6, 2), (512, 3, 2)];
        let mut channels = 64;
        for (mid, blocks, stride) in stages {
            let out = mid * 4;
            for i in 0..blocks {
                let stride = if i == 0 { stride } else { 1 };
                layers.push(LayerSpec::Residual(ResidualBlock::bottleneck(channels, mid, out, stride)));
                layers.push(LayerSpec::Relu);
                channels = out;
            }
        }
        layers.push(LayerSpec::GlobalAvgPool);
        layers.push(LayerSpec::linear(channels, classes));

        Self {
            name: "ResNet-50".into(),
            input: Shape::image(3, 224, 224),
            layers,
        }
    }

    /// Shape of the final layer's output
    pub fn output_shape(&self) -> Result<Shape> {
        propagate(&self.layers, self.input)
    }

    pub fn count_parameters(&self) -> usize {
        self.layers.iter().map(LayerSpec::count_parameters).sum()
    }

    /// Per-layer table of output shapes and parameter counts
    pub fn summary(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str(&format!("{} (input {})\n", self.name, self.input));
        out.push_str(&format!("{:<4} {:<28} {:>14} {:>14}\n", "#", "layer", "output", "params"));

        let mut shape = self.input;
        for (i, layer) in self.layers.iter().enumerate() {
            shape = layer.output_shape(shape)?;
            out.push_str(&format!(
                "{:<4} {:<28} {:>14} {:>14}\n",
                i,
                layer.name(),
                shape.to_string(),
                layer.count_parameters()
            ));
        }
        out.push_str(&format!("Total parameters: {}\n", self.count_parameters()));
        Ok(out)
    }
}

fn propagate(layers: &[LayerSpec], input: Shape) -> Result<Shape> {
    layers.iter().try_fold(input, |shape, layer| layer.output_shape(shape))
}

fn expect_image(input: Shape, layer: &str) -> Result<(usize, usize, usize)> {
    match input {
        Shape::Image {
            channels,
            height,
            width,
        } => Ok((channels, height, width)),
        Shape::Flat(n) => Err(Error::ShapeMismatch {
            layer: layer.to_string(),
            expected: "an image".into(),
            got: format!("{} flat features", n),
        }),
    }
}

/// Output length of a kernel sliding over `size` positions
fn sliding(size: usize, kernel: usize, stride: usize, padding: usize, layer: &str) -> Result<usize> {
    if stride == 0 {
        return Err(Error::InvalidParameter(format!("{}: stride must be at least 1", layer)));
    }
    let padded = size + 2 * padding;
    if kernel == 0 || kernel > padded {
        return Err(Error::InvalidParameter(format!(
            "{}: kernel {} does not fit input of size {}",
            layer, kernel, padded
        )));
    }
    Ok((padded - kernel) / stride + 1)
}

fn mismatch(layer: &str, expected: usize, got: usize) -> Error {
    Error::ShapeMismatch {
        layer: layer.to_string(),
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenet5() {
        let net = Network::lenet5();
        assert_eq!(net.output_shape().unwrap(), Shape::Flat(10));
        assert_eq!(net.count_parameters(), 44_426);
    }

    #[test]
    fn test_vgg16() {
        let net = Network::vgg16(1000);
        assert_eq!(net.output_shape().unwrap(), Shape::Flat(1000));
        assert_eq!(net.count_parameters(), 138_357_544);
    }

    #[test]
    fn test_resnet50() {
        let net = Network::resnet50(1000);
        assert_eq!(net.output_shape().unwrap(), Shape::Flat(1000));
        assert_eq!(net.count_parameters(), 25_557_032);
    }

    #[test]
    fn test_bottleneck_shortcut_choice() {
        let same = ResidualBlock::bottleneck(256, 64, 256, 1);
        assert_eq!(same.shortcut, Shortcut::Identity);

        let wider = ResidualBlock::bottleneck(64, 64, 256, 1);
        assert_eq!(
            wider.shortcut,
            Shortcut::Projection {
                out_channels: 256,
                stride: 1
            }
        );

        let strided = ResidualBlock::bottleneck(256, 128, 256, 2);
        assert!(matches!(strided.shortcut, Shortcut::Projection { stride: 2, .. }));
        assert_eq!(
            strided.output_shape(Shape::image(256, 56, 56)).unwrap(),
            Shape::image(256, 28, 28)
        );
    }

    #[test]
    fn test_projection_parameters() {
        // body: 64*64 + 128 + 64*64*9 + 128 + 64*256 + 512; shortcut: 64*256 + 512
        let block = ResidualBlock::bottleneck(64, 64, 256, 1);
        assert_eq!(block.count_parameters(), 75_008);
    }

    #[test]
    fn test_channel_mismatch() {
        let net = Network {
            name: "broken".into(),
            input: Shape::image(3, 32, 32),
            layers: vec![LayerSpec::conv(1, 8, 3, 1, 1, true)],
        };
        assert!(matches!(net.output_shape(), Err(Error::ShapeMismatch { .. })));
        assert!(net.summary().is_err());
    }

    #[test]
    fn test_kernel_too_large() {
        let layer = LayerSpec::conv(1, 1, 7, 1, 0, true);
        assert!(matches!(
            layer.output_shape(Shape::image(1, 5, 5)),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_summary_lists_every_layer() {
        let net = Network::lenet5();
        let summary = net.summary().unwrap();
        assert_eq!(summary.lines().count(), net.layers.len() + 3);
        assert!(summary.ends_with("Total parameters: 44426\n"));
    }
}
