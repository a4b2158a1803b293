//! Model module using the Burn framework
//!
//! - `xception`: the separable-convolution residual network
//! - `summary`: layer shapes and parameter counts

pub mod summary;
pub mod xception;

pub use summary::{LayerSummary, ModelSummary};
pub use xception::{ResidualBlock, SeparableConv2d, XceptionLike, XceptionLikeConfig};
