use ndarray::{ArrayD, ArrayViewD, IxDyn};
use rand::Rng;

use super::{
    covariance::{Covariance, CovarianceParams},
    fan::{self, numel},
    parameterized::{NamedParam, Parameterized, prefixed},
};
use crate::error::{Result, ShapeErr};

/// The parameters of a single layer: the mean weight, an optional mean bias and, for
/// Bayesian layers, the covariance parameters.
#[derive(Debug, Clone)]
pub struct LayerParams {
    weight: ArrayD<f32>,
    bias: Option<ArrayD<f32>>,
    cov: Option<CovarianceParams>,
}

/// A draw of a layer's weight and bias from its variational distribution.
#[derive(Debug, Clone)]
pub struct ParamSample {
    pub weight: ArrayD<f32>,
    pub bias: Option<ArrayD<f32>>,
}

impl LayerParams {
    /// Allocates zero filled parameters.
    ///
    /// # Arguments
    /// * `weight_shape` - The shape of the weight, `(out_features, in_features, *kernel_dims)`.
    /// * `bias` - Whether the layer has a bias of shape `(out_features,)`.
    /// * `cov` - The covariance structure, `None` for a deterministic layer.
    ///
    /// # Returns
    /// An error if the weight has fewer than 2 dimensions.
    pub fn new(weight_shape: &[usize], bias: bool, cov: Option<Covariance>) -> Result<Self> {
        if weight_shape.len() < 2 {
            return Err(ShapeErr::TooFewDims {
                got: weight_shape.len(),
            }
            .into());
        }

        let bias_shape = [weight_shape[0]];
        let bias_shape = bias.then_some(&bias_shape[..]);

        Ok(Self {
            weight: ArrayD::zeros(IxDyn(weight_shape)),
            bias: bias_shape.map(|shape| ArrayD::zeros(IxDyn(shape))),
            cov: cov.map(|cov| cov.instantiate(weight_shape, bias_shape)),
        })
    }

    pub fn weight(&self) -> ArrayViewD<'_, f32> {
        self.weight.view()
    }

    pub fn bias(&self) -> Option<ArrayViewD<'_, f32>> {
        self.bias.as_ref().map(|b| b.view())
    }

    /// The covariance sub-module, `None` for deterministic layers.
    pub fn cov(&self) -> Option<&CovarianceParams> {
        self.cov.as_ref()
    }

    pub fn weight_shape(&self) -> &[usize] {
        self.weight.shape()
    }

    /// Returns the `(fan_in, fan_out)` of the weight.
    pub fn fan_in_and_fan_out(&self) -> Result<(usize, usize)> {
        fan::fan_in_and_fan_out(self.weight.shape())
    }

    pub(crate) fn weight_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.weight
    }

    pub(crate) fn bias_mut(&mut self) -> Option<&mut ArrayD<f32>> {
        self.bias.as_mut()
    }

    pub(crate) fn cov_mut(&mut self) -> Option<&mut CovarianceParams> {
        self.cov.as_mut()
    }

    /// Draws a weight and bias from the variational distribution, that is, the mean plus a
    /// perturbation following the covariance. Deterministic layers return their mean.
    ///
    /// # Arguments
    /// * `rng` - The random number generator the noise is taken from.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ParamSample> {
        let Some(cov) = &self.cov else {
            return Ok(ParamSample {
                weight: self.weight.clone(),
                bias: self.bias.clone(),
            });
        };

        let (weight_perturb, bias_perturb) = cov.sample_perturbation(rng)?;
        let weight = &self.weight + &weight_perturb;
        let bias = match (&self.bias, bias_perturb) {
            (Some(bias), Some(perturb)) => Some(bias + &perturb),
            (bias, _) => bias.clone(),
        };

        Ok(ParamSample { weight, bias })
    }
}

impl Parameterized for LayerParams {
    fn mean_parameters(&self) -> Vec<NamedParam<'_>> {
        let mut params = vec![("weight".to_string(), self.weight.view())];
        if let Some(bias) = &self.bias {
            params.push(("bias".to_string(), bias.view()));
        }

        params
    }

    fn cov_parameters(&self) -> Vec<NamedParam<'_>> {
        match &self.cov {
            Some(cov) => prefixed("cov", cov.cov_parameters()),
            None => Vec::new(),
        }
    }

    fn num_mean_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |b| numel(b.shape()))
    }
}
