//! Serializable descriptions of models, resolved into containers by [`ModelBuilder`].

mod builder;

use serde::{Deserialize, Serialize};

pub use builder::ModelBuilder;

use crate::error::Result;

/// The specification for the `Covariance` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceSpec {
    Factorized,
    LowRank { rank: usize },
}

/// The specification for the `Parametrization` enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParametrizationSpec {
    #[default]
    Standard,
}

/// The specification for the `LayerType` enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerTypeSpec {
    Input,
    #[default]
    Hidden,
    Output,
}

fn default_bias() -> bool {
    true
}

fn default_groups() -> usize {
    1
}

/// The specification for the `Layer` enum.
///
/// The dimensionality of a convolution is the length of its `kernel_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Linear {
        in_features: usize,
        out_features: usize,
        #[serde(default = "default_bias")]
        bias: bool,
        #[serde(default)]
        layer_type: LayerTypeSpec,
        #[serde(default)]
        cov: Option<CovarianceSpec>,
    },
    Conv {
        in_channels: usize,
        out_channels: usize,
        kernel_size: Vec<usize>,
        #[serde(default)]
        stride: Option<Vec<usize>>,
        #[serde(default)]
        padding: Option<Vec<usize>>,
        #[serde(default)]
        dilation: Option<Vec<usize>>,
        #[serde(default = "default_groups")]
        groups: usize,
        #[serde(default = "default_bias")]
        bias: bool,
        #[serde(default)]
        layer_type: LayerTypeSpec,
        #[serde(default)]
        cov: Option<CovarianceSpec>,
    },
}

/// The specification of a module tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleSpec {
    Layer(LayerSpec),
    Container { children: Vec<NamedModuleSpec> },
}

/// A module specification and the name it's registered with in its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedModuleSpec {
    pub name: String,
    pub module: ModuleSpec,
}

/// The specification of a whole model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default)]
    pub parametrization: ParametrizationSpec,
    pub modules: Vec<NamedModuleSpec>,
    /// The seed of the generator used by `ModelBuilder::build_initialized`, drawn from the
    /// OS when missing.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ModelSpec {
    /// Parses a JSON model specification.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
