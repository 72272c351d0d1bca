use std::{fmt, str::FromStr};

use log::debug;
use rand::Rng;

use super::{layer_params::LayerParams, parameterized::Parameterized};
use crate::{
    error::{BnnErr, ConfigErr, Result},
    initialization::NormalGen,
};

/// The position of a layer in the network.
///
/// Some parametrizations scale the initialization of input and output layers differently
/// from the hidden ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LayerType {
    Input,
    #[default]
    Hidden,
    Output,
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerType::Input => "input",
            LayerType::Hidden => "hidden",
            LayerType::Output => "output",
        };

        f.write_str(s)
    }
}

impl FromStr for LayerType {
    type Err = BnnErr;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "input" => Ok(LayerType::Input),
            "hidden" => Ok(LayerType::Hidden),
            "output" => Ok(LayerType::Output),
            other => Err(ConfigErr::UnknownLayerType(other.to_string()).into()),
        }
    }
}

/// The standard deviations a layer's parameters are drawn with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitScales {
    pub weight: f32,
    pub bias: f32,
    /// `None` when the layer has no covariance parameters.
    pub cov: Option<f32>,
}

/// The rule mapping a layer's shape, role and covariance structure to the scales its
/// parameters are initialized with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parametrization {
    /// Weights scale with `1 / sqrt(fan_in)`, biases with `1` and covariance parameters with
    /// the weight scale over the square root of the amount of mean parameters.
    #[default]
    Standard,
}

impl Parametrization {
    /// Computes the initialization scales of a layer.
    ///
    /// # Arguments
    /// * `fan_in` - The fan-in of the layer's weight.
    /// * `fan_out` - The fan-out of the layer's weight.
    /// * `layer_type` - The position of the layer in the network.
    /// * `num_mean_params` - The amount of weight and bias entries, covariance excluded.
    /// * `num_cov_params` - The amount of covariance entries, `None` for deterministic layers.
    ///
    /// # Returns
    /// The scales, or an error if a layer with covariance parameters has no mean parameters or
    /// the weight has a fan-in of zero.
    pub fn init_scales(
        &self,
        fan_in: usize,
        fan_out: usize,
        layer_type: LayerType,
        num_mean_params: usize,
        num_cov_params: Option<usize>,
    ) -> Result<InitScales> {
        if let Some(cov_params) = num_cov_params {
            if num_mean_params == 0 {
                return Err(ConfigErr::NoMeanParameters { cov_params }.into());
            }
        }

        if fan_in == 0 {
            return Err(ConfigErr::ZeroFanIn { fan_out }.into());
        }

        let weight = self.weight_scale(fan_in, layer_type);
        let bias = self.bias_scale(layer_type);
        let cov = num_cov_params.map(|_| weight / (num_mean_params as f32).sqrt());

        Ok(InitScales { weight, bias, cov })
    }

    fn weight_scale(&self, fan_in: usize, layer_type: LayerType) -> f32 {
        match (self, layer_type) {
            (
                Parametrization::Standard,
                LayerType::Input | LayerType::Hidden | LayerType::Output,
            ) => 1. / (fan_in as f32).sqrt(),
        }
    }

    fn bias_scale(&self, layer_type: LayerType) -> f32 {
        match (self, layer_type) {
            (
                Parametrization::Standard,
                LayerType::Input | LayerType::Hidden | LayerType::Output,
            ) => 1.,
        }
    }

    /// Draws every parameter of a layer according to this parametrization.
    ///
    /// All the scales are resolved before any tensor is written, so a failure leaves the
    /// parameters as they were.
    ///
    /// # Arguments
    /// * `params` - The layer's parameters.
    /// * `layer_type` - The position of the layer in the network.
    /// * `rng` - The random number generator the draws are taken from.
    ///
    /// # Returns
    /// The scales used, or an error if the layer's configuration can't be initialized.
    pub fn initialize<R: Rng + ?Sized>(
        &self,
        params: &mut LayerParams,
        layer_type: LayerType,
        rng: &mut R,
    ) -> Result<InitScales> {
        let (fan_in, fan_out) = params.fan_in_and_fan_out()?;
        let num_mean_params = params.num_mean_parameters();
        let num_cov_params = params.cov().map(|cov| cov.num_cov_parameters());

        let scales =
            self.init_scales(fan_in, fan_out, layer_type, num_mean_params, num_cov_params)?;
        let weight_gen = NormalGen::centered(scales.weight)?;
        let bias_gen = NormalGen::centered(scales.bias)?;
        let cov_gen = scales.cov.map(NormalGen::centered).transpose()?;

        weight_gen.fill(params.weight_mut(), rng);
        if let Some(bias) = params.bias_mut() {
            bias_gen.fill(bias, rng);
        }

        if let (Some(cov), Some(cov_gen)) = (params.cov_mut(), cov_gen) {
            for tensor in cov.tensors_mut() {
                cov_gen.fill(tensor, rng);
            }
        }

        debug!(
            fan_in = fan_in,
            num_mean_params = num_mean_params,
            weight_std = scales.weight,
            bias_std = scales.bias;
            "initialized {layer_type} layer"
        );
        if let (Some(cov_std), Some(num_cov_params)) = (scales.cov, num_cov_params) {
            debug!(cov_std = cov_std, num_cov_params = num_cov_params; "initialized covariance");
        }

        Ok(scales)
    }
}
