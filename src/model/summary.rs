//! Layer-by-layer model summary
//!
//! Output shapes (channels-first, batch dimension omitted) and parameter
//! counts computed from the configuration, without building tensors.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::xception::XceptionLikeConfig;
use crate::utils::error::Result;
use crate::utils::format_number;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub name: String,
    /// `[channels, height, width]`, or `[features]` after pooling
    pub output_shape: Vec<usize>,
    pub trainable: usize,
    /// BatchNorm running mean and variance
    pub non_trainable: usize,
}

impl LayerSummary {
    fn new(name: impl Into<String>, output_shape: Vec<usize>, trainable: usize) -> Self {
        Self {
            name: name.into(),
            output_shape,
            trainable,
            non_trainable: 0,
        }
    }

    fn batch_norm(name: impl Into<String>, output_shape: Vec<usize>) -> Self {
        let channels = output_shape[0];
        Self {
            name: name.into(),
            output_shape,
            trainable: 2 * channels,
            non_trainable: 2 * channels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub input_shape: Vec<usize>,
    pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn from_config(config: &XceptionLikeConfig, image_size: usize) -> Result<Self> {
        let sizes = config.spatial_sizes(image_size)?;
        let k = config.stem_kernel;
        let mut layers = Vec::new();

        let mut channels = config.stem_filters;
        layers.push(LayerSummary::new(
            "stem_conv",
            vec![channels, sizes[0], sizes[0]],
            config.in_channels * channels * k * k,
        ));

        for (i, &filters) in config.block_filters.iter().enumerate() {
            let n = sizes[i];
            let half = sizes[i + 1];
            let prefix = format!("block{}", i + 1);
            let c_in = channels;

            layers.push(LayerSummary::batch_norm(format!("{prefix}_bn1"), vec![c_in, n, n]));
            layers.push(LayerSummary::new(
                format!("{prefix}_sepconv1"),
                vec![filters, n, n],
                c_in * 9 + c_in * filters,
            ));
            layers.push(LayerSummary::batch_norm(format!("{prefix}_bn2"), vec![filters, n, n]));
            layers.push(LayerSummary::new(
                format!("{prefix}_sepconv2"),
                vec![filters, n, n],
                filters * 9 + filters * filters,
            ));
            layers.push(LayerSummary::new(format!("{prefix}_maxpool"), vec![filters, half, half], 0));
            layers.push(LayerSummary::new(
                format!("{prefix}_shortcut"),
                vec![filters, half, half],
                c_in * filters,
            ));
            layers.push(LayerSummary::new(format!("{prefix}_add"), vec![filters, half, half], 0));

            channels = filters;
        }

        layers.push(LayerSummary::new("global_avg_pool", vec![channels], 0));
        layers.push(LayerSummary::new("dropout", vec![channels], 0));
        layers.push(LayerSummary::new("dense_sigmoid", vec![1], channels + 1));

        Ok(Self {
            input_shape: vec![config.in_channels, image_size, image_size],
            layers,
        })
    }

    pub fn trainable_params(&self) -> usize {
        self.layers.iter().map(|l| l.trainable).sum()
    }

    pub fn non_trainable_params(&self) -> usize {
        self.layers.iter().map(|l| l.non_trainable).sum()
    }

    pub fn total_params(&self) -> usize {
        self.trainable_params() + self.non_trainable_params()
    }
}

fn shape_string(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("(None, {})", dims.join(", "))
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "─".repeat(64);
        writeln!(f, "{:<24} {:<26} {:>12}", "Layer", "Output Shape", "Params")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "{:<24} {:<26} {:>12}", "input", shape_string(&self.input_shape), 0)?;
        for layer in &self.layers {
            writeln!(
                f,
                "{:<24} {:<26} {:>12}",
                layer.name,
                shape_string(&layer.output_shape),
                format_number(layer.trainable + layer.non_trainable)
            )?;
        }
        writeln!(f, "{rule}")?;
        writeln!(f, "Total params: {}", format_number(self.total_params()))?;
        writeln!(f, "Trainable params: {}", format_number(self.trainable_params()))?;
        write!(
            f,
            "Non-trainable params: {}",
            format_number(self.non_trainable_params())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_parameter_counts() {
        let summary = ModelSummary::from_config(&XceptionLikeConfig::new(), 180).unwrap();
        assert_eq!(summary.total_params(), 721_857);
        assert_eq!(summary.non_trainable_params(), 3_008);
        assert_eq!(summary.trainable_params(), 718_849);
    }

    #[test]
    fn test_shapes_halve_per_block() {
        let summary = ModelSummary::from_config(&XceptionLikeConfig::new(), 180).unwrap();
        let adds: Vec<&LayerSummary> = summary
            .layers
            .iter()
            .filter(|l| l.name.ends_with("_add"))
            .collect();
        let shapes: Vec<Vec<usize>> = adds.iter().map(|l| l.output_shape.clone()).collect();
        assert_eq!(
            shapes,
            vec![
                vec![32, 88, 88],
                vec![64, 44, 44],
                vec![128, 22, 22],
                vec![256, 11, 11],
                vec![512, 6, 6],
            ]
        );
        assert_eq!(summary.layers.last().map(|l| l.output_shape.clone()), Some(vec![1]));
    }

    #[test]
    fn test_display_lists_totals() {
        let summary = ModelSummary::from_config(&XceptionLikeConfig::new(), 180).unwrap();
        let text = summary.to_string();
        assert!(text.contains("block5_shortcut"));
        assert!(text.contains("Total params: 721,857"));
    }
}
