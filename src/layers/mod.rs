mod conv;
mod linear;

use ndarray::ArrayViewD;
use rand::Rng;

pub use conv::{Conv, Conv1d, Conv2d, Conv3d, ConvGeometry};
pub use linear::Linear;

use crate::{
    error::Result,
    params::{
        Covariance, InitScales, LayerParams, LayerType, NamedParam, ParamSample, Parameterized,
        Parametrization,
    },
};

/// The construction options shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerOptions {
    pub bias: bool,
    pub layer_type: LayerType,
    /// The covariance structure, `None` for a deterministic layer.
    pub cov: Option<Covariance>,
    pub parametrization: Parametrization,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            bias: true,
            layer_type: LayerType::Hidden,
            cov: None,
            parametrization: Parametrization::Standard,
        }
    }
}

impl LayerOptions {
    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_layer_type(mut self, layer_type: LayerType) -> Self {
        self.layer_type = layer_type;
        self
    }

    pub fn with_cov(mut self, cov: Covariance) -> Self {
        self.cov = Some(cov);
        self
    }

    pub fn with_parametrization(mut self, parametrization: Parametrization) -> Self {
        self.parametrization = parametrization;
        self
    }
}

/// Any of the layers the crate provides.
#[derive(Debug, Clone)]
pub enum Layer {
    Linear(Linear),
    Conv1d(Conv1d),
    Conv2d(Conv2d),
    Conv3d(Conv3d),
}

macro_rules! dispatch {
    ($layer:expr, $l:ident => $body:expr) => {
        match $layer {
            Layer::Linear($l) => $body,
            Layer::Conv1d($l) => $body,
            Layer::Conv2d($l) => $body,
            Layer::Conv3d($l) => $body,
        }
    };
}

impl Layer {
    /// Returns a short name of the layer's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Linear(_) => "linear",
            Layer::Conv1d(_) => "conv1d",
            Layer::Conv2d(_) => "conv2d",
            Layer::Conv3d(_) => "conv3d",
        }
    }

    pub fn layer_type(&self) -> LayerType {
        dispatch!(self, l => l.layer_type())
    }

    pub fn parametrization(&self) -> Parametrization {
        dispatch!(self, l => l.parametrization())
    }

    pub fn set_parametrization(&mut self, parametrization: Parametrization) {
        dispatch!(self, l => l.set_parametrization(parametrization))
    }

    pub fn params(&self) -> &LayerParams {
        dispatch!(self, l => l.params())
    }

    pub fn weight(&self) -> ArrayViewD<'_, f32> {
        self.params().weight()
    }

    pub fn bias(&self) -> Option<ArrayViewD<'_, f32>> {
        self.params().bias()
    }

    pub fn fan_in_and_fan_out(&self) -> Result<(usize, usize)> {
        self.params().fan_in_and_fan_out()
    }

    /// Draws all the parameters of the layer with its parametrization.
    pub fn reset_parameters<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<InitScales> {
        dispatch!(self, l => l.reset_parameters(rng))
    }

    /// Draws a weight and bias from the layer's variational distribution.
    pub fn sample_parameters<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ParamSample> {
        self.params().sample(rng)
    }
}

impl Parameterized for Layer {
    fn mean_parameters(&self) -> Vec<NamedParam<'_>> {
        self.params().mean_parameters()
    }

    fn cov_parameters(&self) -> Vec<NamedParam<'_>> {
        self.params().cov_parameters()
    }

    fn num_mean_parameters(&self) -> usize {
        self.params().num_mean_parameters()
    }
}

impl From<Linear> for Layer {
    fn from(value: Linear) -> Self {
        Self::Linear(value)
    }
}

impl From<Conv1d> for Layer {
    fn from(value: Conv1d) -> Self {
        Self::Conv1d(value)
    }
}

impl From<Conv2d> for Layer {
    fn from(value: Conv2d) -> Self {
        Self::Conv2d(value)
    }
}

impl From<Conv3d> for Layer {
    fn from(value: Conv3d) -> Self {
        Self::Conv3d(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_builder() {
        let options = LayerOptions::default()
            .with_bias(false)
            .with_layer_type(LayerType::Output)
            .with_cov(Covariance::factorized());

        assert!(!options.bias);
        assert_eq!(options.layer_type, LayerType::Output);
        assert_eq!(options.cov, Some(Covariance::Factorized));
        assert_eq!(options.parametrization, Parametrization::Standard);
    }

    #[test]
    fn layer_delegates_to_variant() {
        let options = LayerOptions::default().with_layer_type(LayerType::Input);
        let layer: Layer = Conv2d::new(3, 4, ConvGeometry::uniform(3), options)
            .unwrap()
            .into();

        assert_eq!(layer.kind(), "conv2d");
        assert_eq!(layer.layer_type(), LayerType::Input);
        assert_eq!(layer.fan_in_and_fan_out().unwrap(), (27, 36));
        assert_eq!(layer.num_mean_parameters(), 4 * 3 * 9 + 4);
        assert!(layer.cov_parameters().is_empty());
    }
}
