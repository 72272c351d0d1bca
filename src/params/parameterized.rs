use ndarray::ArrayViewD;

/// A named, read-only view of a parameter tensor.
pub type NamedParam<'a> = (String, ArrayViewD<'a, f32>);

/// Anything that owns parameter tensors.
///
/// Mean parameters (the weights and biases describing the mean of the variational
/// distribution) and covariance parameters are exposed as two separate collections, so
/// consumers never need to tell them apart by name.
pub trait Parameterized {
    /// Returns the mean parameters, in a fixed order.
    fn mean_parameters(&self) -> Vec<NamedParam<'_>>;

    /// Returns the covariance parameters, in a fixed order.
    fn cov_parameters(&self) -> Vec<NamedParam<'_>>;

    /// Returns the amount of scalar mean parameters.
    fn num_mean_parameters(&self) -> usize {
        self.mean_parameters().iter().map(|(_, p)| p.len()).sum()
    }

    /// Returns the amount of scalar covariance parameters.
    fn num_cov_parameters(&self) -> usize {
        self.cov_parameters().iter().map(|(_, p)| p.len()).sum()
    }
}

/// Prepends `prefix.` to every name of `params`.
pub(crate) fn prefixed<'a>(prefix: &str, params: Vec<NamedParam<'a>>) -> Vec<NamedParam<'a>> {
    params
        .into_iter()
        .map(|(name, p)| (format!("{prefix}.{name}"), p))
        .collect()
}
