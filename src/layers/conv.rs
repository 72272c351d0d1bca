use ndarray::ArrayViewD;
use rand::Rng;

use super::LayerOptions;
use crate::{
    error::{ConfigErr, Result},
    params::{
        InitScales, LayerParams, LayerType, NamedParam, ParamSample, Parameterized,
        Parametrization,
    },
};

/// The kernel geometry of a `D` dimensional convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry<const D: usize> {
    pub kernel_size: [usize; D],
    pub stride: [usize; D],
    pub padding: [usize; D],
    pub dilation: [usize; D],
    pub groups: usize,
}

impl<const D: usize> ConvGeometry<D> {
    /// Creates a geometry with unit stride and dilation, no padding and a single group.
    pub fn new(kernel_size: [usize; D]) -> Self {
        Self {
            kernel_size,
            stride: [1; D],
            padding: [0; D],
            dilation: [1; D],
            groups: 1,
        }
    }

    /// Creates a geometry whose kernel spans `size` entries along every dimension.
    pub fn uniform(size: usize) -> Self {
        Self::new([size; D])
    }

    pub fn with_stride(mut self, stride: [usize; D]) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: [usize; D]) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_dilation(mut self, dilation: [usize; D]) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    fn validate(&self, in_channels: usize, out_channels: usize) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(ConfigErr::InvalidGeometry(msg).into()) };

        if self.kernel_size.contains(&0) {
            return invalid(format!("kernel size {:?} has a zero entry", self.kernel_size));
        }
        if self.stride.contains(&0) {
            return invalid(format!("stride {:?} has a zero entry", self.stride));
        }
        if self.dilation.contains(&0) {
            return invalid(format!("dilation {:?} has a zero entry", self.dilation));
        }
        if self.groups == 0 {
            return invalid("groups must be at least 1".to_string());
        }
        if in_channels % self.groups != 0 || out_channels % self.groups != 0 {
            let groups = self.groups;
            return invalid(format!(
                "{in_channels} in and {out_channels} out channels don't split into {groups} groups"
            ));
        }

        Ok(())
    }

    /// The weight shape `(out_channels, in_channels / groups, *kernel_size)`.
    fn weight_shape(&self, in_channels: usize, out_channels: usize) -> Vec<usize> {
        let mut shape = vec![out_channels, in_channels / self.groups];
        shape.extend_from_slice(&self.kernel_size);
        shape
    }
}

/// A `D` dimensional convolution layer.
#[derive(Debug, Clone)]
pub struct Conv<const D: usize> {
    in_channels: usize,
    out_channels: usize,
    geometry: ConvGeometry<D>,
    layer_type: LayerType,
    parametrization: Parametrization,
    params: LayerParams,
}

pub type Conv1d = Conv<1>;
pub type Conv2d = Conv<2>;
pub type Conv3d = Conv<3>;

impl<const D: usize> Conv<D> {
    /// Creates a new convolution layer with zero filled parameters.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of channels of the input.
    /// * `out_channels` - The amount of channels produced by the convolution.
    /// * `geometry` - The kernel size, stride, padding, dilation and groups.
    /// * `options` - The bias, role, covariance and parametrization of the layer.
    ///
    /// # Returns
    /// A new `Conv` instance or an error if the geometry is invalid.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        geometry: ConvGeometry<D>,
        options: LayerOptions,
    ) -> Result<Self> {
        geometry.validate(in_channels, out_channels)?;

        let weight_shape = geometry.weight_shape(in_channels, out_channels);
        let params = LayerParams::new(&weight_shape, options.bias, options.cov)?;

        Ok(Self {
            in_channels,
            out_channels,
            geometry,
            layer_type: options.layer_type,
            parametrization: options.parametrization,
            params,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn geometry(&self) -> &ConvGeometry<D> {
        &self.geometry
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
}

impl<const D: usize> Parameterized for Conv<D> {
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

    #[test]
    fn weight_shapes() {
        let options = LayerOptions::default();

        let conv = Conv1d::new(50, 20, ConvGeometry::uniform(1), options).unwrap();
        assert_eq!(conv.weight().shape(), &[20, 50, 1]);

        let conv = Conv2d::new(50, 20, ConvGeometry::new([3, 5]), options).unwrap();
        assert_eq!(conv.weight().shape(), &[20, 50, 3, 5]);

        let conv = Conv3d::new(50, 20, ConvGeometry::uniform(2), options).unwrap();
        assert_eq!(conv.weight().shape(), &[20, 50, 2, 2, 2]);
        assert_eq!(conv.bias().unwrap().shape(), &[20]);
    }

    #[test]
    fn fan_in_counts_the_receptive_field() {
        let options = LayerOptions::default();

        let conv = Conv2d::new(50, 20, ConvGeometry::uniform(1), options).unwrap();
        assert_eq!(conv.fan_in_and_fan_out().unwrap(), (50, 20));

        let conv = Conv2d::new(50, 20, ConvGeometry::uniform(3), options).unwrap();
        assert_eq!(conv.fan_in_and_fan_out().unwrap(), (50 * 9, 20 * 9));
    }

    #[test]
    fn groups_split_the_input_channels() {
        let geometry = ConvGeometry::uniform(3).with_groups(5);
        let conv = Conv2d::new(50, 20, geometry, LayerOptions::default()).unwrap();

        assert_eq!(conv.weight().shape(), &[20, 10, 3, 3]);
        assert_eq!(conv.fan_in_and_fan_out().unwrap(), (10 * 9, 20 * 9));
    }

    #[test]
    fn stride_and_padding_keep_the_weight_shape() {
        let geometry = ConvGeometry::uniform(3)
            .with_stride([2, 2])
            .with_padding([1, 1])
            .with_dilation([2, 1]);
        let conv = Conv2d::new(4, 8, geometry, LayerOptions::default()).unwrap();

        assert_eq!(conv.weight().shape(), &[8, 4, 3, 3]);
        assert_eq!(conv.geometry().stride, [2, 2]);
    }

    #[test]
    fn invalid_geometry() {
        let options = LayerOptions::default();
        let cases = [
            ConvGeometry::new([0, 1]),
            ConvGeometry::uniform(1).with_stride([1, 0]),
            ConvGeometry::uniform(1).with_dilation([0, 1]),
            ConvGeometry::uniform(1).with_groups(0),
            ConvGeometry::uniform(1).with_groups(3),
        ];

        for geometry in cases {
            let err = Conv2d::new(50, 20, geometry, options).unwrap_err();
            assert!(matches!(err, BnnErr::Config(ConfigErr::InvalidGeometry(_))));
        }
    }

    #[test]
    fn covariance_factor_follows_the_kernel() {
        let options = LayerOptions::default().with_cov(Covariance::low_rank(4).unwrap());
        let conv = Conv3d::new(6, 2, ConvGeometry::uniform(1), options).unwrap();

        let cov = conv.params().cov().unwrap();
        assert_eq!(cov.weight().shape(), &[2, 6, 1, 1, 1, 4]);
        assert_eq!(cov.bias().unwrap().shape(), &[2, 4]);
        assert_eq!(conv.num_mean_parameters(), 12 + 2);
    }
}
