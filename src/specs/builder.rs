use log::info;
use rand::{SeedableRng, rngs::StdRng};

use super::{
    CovarianceSpec, LayerSpec, LayerTypeSpec, ModelSpec, ModuleSpec, NamedModuleSpec,
    ParametrizationSpec,
};
use crate::{
    error::{ConfigErr, Result, ShapeErr},
    layers::{Conv, ConvGeometry, Layer, LayerOptions, Linear},
    module::{Container, Module},
    params::{Covariance, LayerType, Parametrization},
};

/// Builds containers given a specification.
#[derive(Debug, Default)]
pub struct ModelBuilder;

impl ModelBuilder {
    /// Creates a new `ModelBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds the container described by `spec`, with zero filled parameters.
    ///
    /// # Arguments
    /// * `spec` - The specification of the model.
    ///
    /// # Returns
    /// A new container or an error if any layer is invalid.
    pub fn build(&self, spec: &ModelSpec) -> Result<Container> {
        let parametrization = self.resolve_parametrization(spec.parametrization);
        let container = self.resolve_container(parametrization, &spec.modules)?;
        info!(layers = container.layers().len(); "built model");
        Ok(container)
    }

    /// Builds the container described by `spec` and draws its parameters with a generator
    /// seeded by `spec.seed`.
    ///
    /// # Arguments
    /// * `spec` - The specification of the model.
    ///
    /// # Returns
    /// A new initialized container or an error if encountered.
    pub fn build_initialized(&self, spec: &ModelSpec) -> Result<Container> {
        let mut container = self.build(spec)?;
        let mut rng = self.generate_rng(spec.seed);
        container.reset_parameters(&mut rng)?;
        Ok(container)
    }

    /// Generates a random number generator given (or not) a seed.
    ///
    /// # Arguments
    /// * `seed` - An optional seed for the rng.
    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    fn resolve_parametrization(&self, spec: ParametrizationSpec) -> Parametrization {
        match spec {
            ParametrizationSpec::Standard => Parametrization::Standard,
        }
    }

    fn resolve_container(
        &self,
        parametrization: Parametrization,
        specs: &[NamedModuleSpec],
    ) -> Result<Container> {
        let mut container = Container::new(parametrization);

        for NamedModuleSpec { name, module } in specs {
            let module = match module {
                ModuleSpec::Layer(layer) => Module::Layer(self.resolve_layer(layer)?),
                ModuleSpec::Container { children } => {
                    Module::Container(self.resolve_container(parametrization, children)?)
                }
            };

            container.push(name.as_str(), module)?;
        }

        Ok(container)
    }

    fn resolve_layer(&self, spec: &LayerSpec) -> Result<Layer> {
        match spec {
            LayerSpec::Linear {
                in_features,
                out_features,
                bias,
                layer_type,
                cov,
            } => {
                let options = self.resolve_options(*bias, *layer_type, *cov)?;
                Ok(Linear::new(*in_features, *out_features, options)?.into())
            }
            LayerSpec::Conv {
                in_channels,
                out_channels,
                kernel_size,
                stride,
                padding,
                dilation,
                groups,
                bias,
                layer_type,
                cov,
            } => {
                let options = self.resolve_options(*bias, *layer_type, *cov)?;
                let geometry = GeometrySpec {
                    kernel_size,
                    stride: stride.as_deref(),
                    padding: padding.as_deref(),
                    dilation: dilation.as_deref(),
                    groups: *groups,
                };

                match kernel_size.len() {
                    1 => Ok(Conv::<1>::new(
                        *in_channels,
                        *out_channels,
                        geometry.resolve()?,
                        options,
                    )?
                    .into()),
                    2 => Ok(Conv::<2>::new(
                        *in_channels,
                        *out_channels,
                        geometry.resolve()?,
                        options,
                    )?
                    .into()),
                    3 => Ok(Conv::<3>::new(
                        *in_channels,
                        *out_channels,
                        geometry.resolve()?,
                        options,
                    )?
                    .into()),
                    n => Err(ConfigErr::InvalidGeometry(format!(
                        "only 1, 2 and 3 dimensional convolutions are supported, got {n}"
                    ))
                    .into()),
                }
            }
        }
    }

    fn resolve_options(
        &self,
        bias: bool,
        layer_type: LayerTypeSpec,
        cov: Option<CovarianceSpec>,
    ) -> Result<LayerOptions> {
        let layer_type = match layer_type {
            LayerTypeSpec::Input => LayerType::Input,
            LayerTypeSpec::Hidden => LayerType::Hidden,
            LayerTypeSpec::Output => LayerType::Output,
        };

        let mut options = LayerOptions::default()
            .with_bias(bias)
            .with_layer_type(layer_type);

        if let Some(cov) = cov {
            let cov = match cov {
                CovarianceSpec::Factorized => Covariance::factorized(),
                CovarianceSpec::LowRank { rank } => Covariance::low_rank(rank)?,
            };
            options = options.with_cov(cov);
        }

        Ok(options)
    }
}

/// The borrowed, dimension agnostic geometry of a convolution spec.
struct GeometrySpec<'a> {
    kernel_size: &'a [usize],
    stride: Option<&'a [usize]>,
    padding: Option<&'a [usize]>,
    dilation: Option<&'a [usize]>,
    groups: usize,
}

impl GeometrySpec<'_> {
    fn resolve<const D: usize>(&self) -> Result<ConvGeometry<D>> {
        let mut geometry = ConvGeometry::new(to_array("kernel_size", self.kernel_size)?)
            .with_groups(self.groups);

        if let Some(stride) = self.stride {
            geometry = geometry.with_stride(to_array("stride", stride)?);
        }
        if let Some(padding) = self.padding {
            geometry = geometry.with_padding(to_array("padding", padding)?);
        }
        if let Some(dilation) = self.dilation {
            geometry = geometry.with_dilation(to_array("dilation", dilation)?);
        }

        Ok(geometry)
    }
}

fn to_array<const D: usize>(what: &'static str, values: &[usize]) -> Result<[usize; D]> {
    values.try_into().map_err(|_| {
        ShapeErr::SizeMismatch {
            what,
            got: values.len(),
            expected: D,
        }
        .into()
    })
}
