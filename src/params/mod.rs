mod covariance;
pub mod fan;
mod layer_params;
mod parameterized;
mod parametrization;

pub use covariance::{Covariance, CovarianceParams};
pub use fan::fan_in_and_fan_out;
pub use layer_params::{LayerParams, ParamSample};
pub use parameterized::{NamedParam, Parameterized};
pub(crate) use parameterized::prefixed;
pub use parametrization::{InitScales, LayerType, Parametrization};
