use std::num::NonZeroUsize;

use ndarray::{Array1, ArrayD, ArrayViewD, IxDyn};
use rand::Rng;
use rand_distr::StandardNormal;

use super::{
    fan::numel,
    parameterized::{NamedParam, Parameterized},
};
use crate::error::{ConfigErr, Result, ShapeErr};

/// The structure of the covariance of a layer's variational weight distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Covariance {
    /// A single scale per mean parameter, i.e. a diagonal covariance.
    Factorized,
    /// A `rank` columns factor per mean parameter tensor, shared noise across the layer.
    LowRank { rank: NonZeroUsize },
}

impl Covariance {
    pub fn factorized() -> Self {
        Self::Factorized
    }

    /// Creates a low rank covariance.
    ///
    /// # Arguments
    /// * `rank` - The amount of columns of the covariance factor.
    ///
    /// # Returns
    /// An error if `rank` is zero.
    pub fn low_rank(rank: usize) -> Result<Self> {
        let rank = NonZeroUsize::new(rank).ok_or(ConfigErr::ZeroRank)?;
        Ok(Self::LowRank { rank })
    }

    /// Returns the amount of covariance parameters per mean parameter.
    pub fn rank(&self) -> usize {
        match self {
            Covariance::Factorized => 1,
            Covariance::LowRank { rank } => rank.get(),
        }
    }

    /// Returns the amount of scalar parameters needed to parametrize the covariance of a
    /// layer with the given mean tensors.
    ///
    /// # Arguments
    /// * `weight_shape` - The shape of the mean weight tensor.
    /// * `bias_shape` - The shape of the mean bias tensor, if any.
    pub fn parameter_count(&self, weight_shape: &[usize], bias_shape: Option<&[usize]>) -> usize {
        let num_mean = numel(weight_shape) + bias_shape.map_or(0, numel);
        self.rank() * num_mean
    }

    /// Allocates the (zero filled) covariance parameters of a layer with the given mean
    /// tensors.
    ///
    /// # Arguments
    /// * `weight_shape` - The shape of the mean weight tensor.
    /// * `bias_shape` - The shape of the mean bias tensor, if any.
    pub fn instantiate(
        &self,
        weight_shape: &[usize],
        bias_shape: Option<&[usize]>,
    ) -> CovarianceParams {
        let factor = |shape: &[usize]| ArrayD::zeros(IxDyn(&self.factor_shape(shape)));

        CovarianceParams {
            covariance: *self,
            weight: factor(weight_shape),
            bias: bias_shape.map(factor),
        }
    }

    fn factor_shape(&self, mean_shape: &[usize]) -> Vec<usize> {
        let mut shape = mean_shape.to_vec();
        if let Covariance::LowRank { rank } = self {
            shape.push(rank.get());
        }

        shape
    }
}

/// The covariance parameters owned by a layer.
#[derive(Debug, Clone)]
pub struct CovarianceParams {
    covariance: Covariance,
    weight: ArrayD<f32>,
    bias: Option<ArrayD<f32>>,
}

impl CovarianceParams {
    pub fn covariance(&self) -> Covariance {
        self.covariance
    }

    /// The covariance factor of the mean weight tensor.
    pub fn weight(&self) -> ArrayViewD<'_, f32> {
        self.weight.view()
    }

    /// The covariance factor of the mean bias tensor.
    pub fn bias(&self) -> Option<ArrayViewD<'_, f32>> {
        self.bias.as_ref().map(|b| b.view())
    }

    pub(crate) fn tensors_mut(&mut self) -> impl Iterator<Item = &mut ArrayD<f32>> {
        std::iter::once(&mut self.weight).chain(self.bias.as_mut())
    }

    /// Draws a zero-mean perturbation of the mean parameters following this covariance.
    ///
    /// # Arguments
    /// * `rng` - The random number generator the noise is taken from.
    ///
    /// # Returns
    /// The weight and bias perturbations, shaped like the mean tensors, or an error if the
    /// factors' layout is not contiguous.
    pub fn sample_perturbation<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<(ArrayD<f32>, Option<ArrayD<f32>>)> {
        match self.covariance {
            Covariance::Factorized => {
                let mut perturb = |scale: &ArrayD<f32>| {
                    scale.mapv(|s| s * rng.sample::<f32, _>(StandardNormal))
                };

                let weight = perturb(&self.weight);
                let bias = self.bias.as_ref().map(perturb);
                Ok((weight, bias))
            }
            Covariance::LowRank { rank } => {
                let noise = Array1::from_shape_simple_fn(rank.get(), || {
                    rng.sample::<f32, _>(StandardNormal)
                });

                let weight = low_rank_product(&self.weight, &noise)?;
                let bias = self
                    .bias
                    .as_ref()
                    .map(|factor| low_rank_product(factor, &noise))
                    .transpose()?;
                Ok((weight, bias))
            }
        }
    }
}

impl Parameterized for CovarianceParams {
    fn mean_parameters(&self) -> Vec<NamedParam<'_>> {
        Vec::new()
    }

    fn cov_parameters(&self) -> Vec<NamedParam<'_>> {
        let mut params = vec![("weight".to_string(), self.weight.view())];
        if let Some(bias) = &self.bias {
            params.push(("bias".to_string(), bias.view()));
        }

        params
    }
}

/// Multiplies a `(*mean_shape, rank)` factor with a `rank` long noise vector.
fn low_rank_product(factor: &ArrayD<f32>, noise: &Array1<f32>) -> Result<ArrayD<f32>> {
    let (&rank, mean_shape) = factor
        .shape()
        .split_last()
        .ok_or(ShapeErr::TooFewDims { got: 0 })?;
    let rows = numel(mean_shape);

    let factor = factor.view().into_shape_with_order((rows, rank))?;
    let product = factor.dot(noise).into_shape_with_order(IxDyn(mean_shape))?;
    Ok(product)
}
