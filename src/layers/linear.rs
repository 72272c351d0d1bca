use ndarray::{Array2, ArrayView2, ArrayViewD, Ix1, Ix2};
use rand::Rng;

use super::LayerOptions;
use crate::{
    error::{Result, ShapeErr},
    params::{
        InitScales, LayerParams, LayerType, NamedParam, ParamSample, Parameterized,
        Parametrization,
    },
};

/// A fully connected layer whose weight has shape `(out_features, in_features)`.
#[derive(Debug, Clone)]
pub struct Linear {
    in_features: usize,
    out_features: usize,
    layer_type: LayerType,
    parametrization: Parametrization,
    params: LayerParams,
}

impl Linear {
    /// Creates a new `Linear` layer with zero filled parameters.
    ///
    /// # Arguments
    /// * `in_features` - The size of each input sample.
    /// * `out_features` - The size of each output sample.
    /// * `options` - The bias, role, covariance and parametrization of the layer.
    ///
    /// # Returns
    /// A new `Linear` instance, its parameters must be drawn with `reset_parameters`.
    pub fn new(in_features: usize, out_features: usize, options: LayerOptions) -> Result<Self> {
        let params = LayerParams::new(&[out_features, in_features], options.bias, options.cov)?;

        Ok(Self {
            in_features,
            out_features,
            layer_type: options.layer_type,
            parametrization: options.parametrization,
            params,
        })
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    pub fn parametrization(&self) -> Parametrization {
        self.parametrization
    }

    pub fn set_parametrization(&mut self, parametrization: Parametrization) {
        self.parametrization = parametrization;
    }

    pub fn params(&self) -> &LayerParams {
        &self.params
    }

    pub fn weight(&self) -> ArrayViewD<'_, f32> {
        self.params.weight()
    }

    pub fn bias(&self) -> Option<ArrayViewD<'_, f32>> {
        self.params.bias()
    }

    pub fn fan_in_and_fan_out(&self) -> Result<(usize, usize)> {
        self.params.fan_in_and_fan_out()
    }

    /// Draws all the parameters of the layer with its parametrization.
    pub fn reset_parameters<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<InitScales> {
        self.parametrization
            .initialize(&mut self.params, self.layer_type, rng)
    }

    /// Draws a weight and bias from the layer's variational distribution.
    pub fn sample_parameters<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<ParamSample> {
        self.params.sample(rng)
    }

    /// Applies `x · Wᵀ + b` with the given parameters.
    ///
    /// # Arguments
    /// * `x` - The input, one sample per row.
    /// * `sample` - The weight and bias to use, e.g. a draw from `sample_parameters`.
    ///
    /// # Returns
    /// The output, one sample per row, or an error if the shapes don't line up, including a
    /// bias that is missing, unexpected or not `out_features` long.
    pub fn forward(&self, x: ArrayView2<f32>, sample: &ParamSample) -> Result<Array2<f32>> {
        if x.ncols() != self.in_features {
            return Err(ShapeErr::SizeMismatch {
                what: "input features",
                got: x.ncols(),
                expected: self.in_features,
            }
            .into());
        }

        let w = sample.weight.view().into_dimensionality::<Ix2>()?;
        if w.dim() != (self.out_features, self.in_features) {
            return Err(ShapeErr::SizeMismatch {
                what: "weight entries",
                got: w.len(),
                expected: self.out_features * self.in_features,
            }
            .into());
        }

        let expected_bias = if self.params.bias().is_some() {
            self.out_features
        } else {
            0
        };
        let got_bias = sample.bias.as_ref().map_or(0, |b| b.len());
        if got_bias != expected_bias {
            return Err(ShapeErr::SizeMismatch {
                what: "bias entries",
                got: got_bias,
                expected: expected_bias,
            }
            .into());
        }

        let mut z = x.dot(&w.t());
        if let Some(b) = &sample.bias {
            z += &b.view().into_dimensionality::<Ix1>()?;
        }

        Ok(z)
    }
}

impl Parameterized for Linear {
    fn mean_parameters(&self) -> Vec<NamedParam<'_>> {
        self.params.mean_parameters()
    }

    fn cov_parameters(&self) -> Vec<NamedParam<'_>> {
        self.params.cov_parameters()
    }

    fn num_mean_parameters(&self) -> usize {
        self.params.num_mean_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::BnnErr, params::Covariance};
    use ndarray::{arr1, arr2};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn shapes() {
        let layer = Linear::new(50, 20, LayerOptions::default()).unwrap();

        assert_eq!(layer.weight().shape(), &[20, 50]);
        assert_eq!(layer.bias().unwrap().shape(), &[20]);
        assert_eq!(layer.fan_in_and_fan_out().unwrap(), (50, 20));
        assert!(layer.params().cov().is_none());
    }

    #[test]
    fn mean_parameter_count_excludes_covariance() {
        let options = LayerOptions::default().with_cov(Covariance::low_rank(10).unwrap());
        let layer = Linear::new(50, 20, options).unwrap();

        assert_eq!(layer.num_mean_parameters(), 50 * 20 + 20);
        assert_eq!(layer.num_cov_parameters(), 10 * 1020);
    }

    #[test]
    fn reset_parameters_draws_weight() {
        let mut rng = StdRng::seed_from_u64(4678);
        let mut layer = Linear::new(50, 20, LayerOptions::default()).unwrap();

        let scales = layer.reset_parameters(&mut rng).unwrap();

        assert!((scales.weight - 1. / 50f32.sqrt()).abs() < 1e-6);
        assert!((layer.weight().std(0.) - scales.weight).abs() < 0.02);
    }

    #[test]
    fn no_mean_parameters_with_covariance() {
        let mut rng = StdRng::seed_from_u64(0);
        let options = LayerOptions::default()
            .with_bias(false)
            .with_cov(Covariance::factorized());
        let mut layer = Linear::new(50, 0, options).unwrap();

        let err = layer.reset_parameters(&mut rng).unwrap_err();
        assert!(matches!(
            err,
            BnnErr::Config(crate::error::ConfigErr::NoMeanParameters { .. })
        ));
    }

    #[test]
    fn forward() {
        let layer = Linear::new(2, 3, LayerOptions::default()).unwrap();
        let sample = ParamSample {
            weight: arr2(&[[1., 0.], [0., 1.], [1., 1.]]).into_dyn(),
            bias: Some(arr1(&[0., 0., 1.]).into_dyn()),
        };
        let x = arr2(&[[1., 2.], [3., 4.]]);

        let y = layer.forward(x.view(), &sample).unwrap();

        assert_eq!(y, arr2(&[[1., 2., 4.], [3., 4., 8.]]));
    }

    #[test]
    fn forward_rejects_wrong_input_width() {
        let layer = Linear::new(2, 3, LayerOptions::default()).unwrap();
        let sample = layer.params().sample(&mut StdRng::seed_from_u64(0)).unwrap();
        let x = Array2::zeros((4, 5));

        let err = layer.forward(x.view(), &sample).unwrap_err();
        assert!(matches!(
            err,
            BnnErr::Shape(ShapeErr::SizeMismatch { got: 5, expected: 2, .. })
        ));
    }

    #[test]
    fn forward_rejects_wrong_bias_length() {
        let layer = Linear::new(2, 3, LayerOptions::default()).unwrap();
        let x = arr2(&[[1., 2.]]);

        for bias in [arr1(&[1., 2.]), arr1(&[1.])] {
            let sample = ParamSample {
                weight: Array2::zeros((3, 2)).into_dyn(),
                bias: Some(bias.into_dyn()),
            };

            let err = layer.forward(x.view(), &sample).unwrap_err();
            assert!(matches!(
                err,
                BnnErr::Shape(ShapeErr::SizeMismatch {
                    what: "bias entries",
                    expected: 3,
                    ..
                })
            ));
        }
    }

    #[test]
    fn forward_rejects_unowned_bias() {
        let options = LayerOptions::default().with_bias(false);
        let layer = Linear::new(2, 3, options).unwrap();
        let sample = ParamSample {
            weight: Array2::zeros((3, 2)).into_dyn(),
            bias: Some(arr1(&[5.]).into_dyn()),
        };

        let err = layer.forward(arr2(&[[1., 2.]]).view(), &sample).unwrap_err();
        assert!(matches!(
            err,
            BnnErr::Shape(ShapeErr::SizeMismatch { got: 1, expected: 0, .. })
        ));
    }

    #[test]
    fn forward_rejects_missing_bias() {
        let layer = Linear::new(2, 3, LayerOptions::default()).unwrap();
        let sample = ParamSample {
            weight: Array2::zeros((3, 2)).into_dyn(),
            bias: None,
        };

        let err = layer.forward(arr2(&[[1., 2.]]).view(), &sample).unwrap_err();
        assert!(matches!(
            err,
            BnnErr::Shape(ShapeErr::SizeMismatch { got: 0, expected: 3, .. })
        ));
    }
}
