//! Bayesian neural network layers whose mean and covariance parameters are drawn by a
//! pluggable parametrization.

pub mod error;
pub mod initialization;
pub mod layers;
pub mod module;
pub mod params;
pub mod specs;

pub use error::{BnnErr, ConfigErr, Result, ShapeErr};
pub use layers::{Conv, Conv1d, Conv2d, Conv3d, ConvGeometry, Layer, LayerOptions, Linear};
pub use module::{Container, Module};
pub use params::{Covariance, LayerType, Parameterized, Parametrization};
pub use specs::{ModelBuilder, ModelSpec};
