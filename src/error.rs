use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::NormalError;

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, BnnErr>;

/// The crate's error type.
#[derive(Debug)]
pub enum BnnErr {
    Shape(ShapeErr),
    Config(ConfigErr),
    Spec(serde_json::Error),
}

/// A tensor shape that can't be used for the requested operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeErr {
    /// Fan-in and fan-out need at least an output and an input dimension.
    TooFewDims { got: usize },
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Layout(String),
}

/// An invalid combination of layer shape, covariance and parametrization.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErr {
    /// The layer owns covariance parameters but no mean parameters to scale them by.
    NoMeanParameters { cov_params: usize },
    ZeroFanIn { fan_out: usize },
    ZeroRank,
    InvalidGeometry(String),
    UnknownLayerType(String),
    DuplicateName(String),
    /// Child and buffer names must be non-empty and free of the `.` path separator.
    InvalidName(String),
    InvalidScale { what: &'static str, msg: String },
}

impl Display for ShapeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeErr::TooFewDims { got } => write!(
                f,
                "fan-in and fan-out need a tensor with at least 2 dimensions, got {got}"
            ),
            ShapeErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch for {what}: got {got}, expected {expected}"),
            ShapeErr::Layout(msg) => write!(f, "incompatible tensor layout: {msg}"),
        }
    }
}

impl Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::NoMeanParameters { cov_params } => write!(
                f,
                "the layer has {cov_params} covariance parameters but no mean parameters"
            ),
            ConfigErr::ZeroFanIn { fan_out } => {
                write!(f, "the weight has a fan-in of zero and a fan-out of {fan_out}")
            }
            ConfigErr::ZeroRank => write!(f, "a low rank covariance needs a rank of at least 1"),
            ConfigErr::InvalidGeometry(msg) => write!(f, "invalid layer geometry: {msg}"),
            ConfigErr::UnknownLayerType(s) => {
                write!(f, "unknown layer type '{s}', expected input, hidden or output")
            }
            ConfigErr::DuplicateName(name) => write!(f, "the name '{name}' is already taken"),
            ConfigErr::InvalidName(name) => {
                write!(f, "the name '{name}' is empty or contains a '.'")
            }
            ConfigErr::InvalidScale { what, msg } => {
                write!(f, "invalid initialization scale for {what}: {msg}")
            }
        }
    }
}

impl Display for BnnErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BnnErr::Shape(e) => write!(f, "shape error: {e}"),
            BnnErr::Config(e) => write!(f, "configuration error: {e}"),
            BnnErr::Spec(e) => write!(f, "invalid spec: {e}"),
        }
    }
}

impl Error for ShapeErr {}

impl Error for ConfigErr {}

impl Error for BnnErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BnnErr::Shape(e) => Some(e),
            BnnErr::Config(e) => Some(e),
            BnnErr::Spec(e) => Some(e),
        }
    }
}

impl From<ShapeErr> for BnnErr {
    fn from(value: ShapeErr) -> Self {
        Self::Shape(value)
    }
}

impl From<ConfigErr> for BnnErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<serde_json::Error> for BnnErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Spec(value)
    }
}

impl From<ndarray::ShapeError> for BnnErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(ShapeErr::Layout(value.to_string()))
    }
}

impl From<NormalError> for BnnErr {
    fn from(value: NormalError) -> Self {
        Self::Config(ConfigErr::InvalidScale {
            what: "normal distribution",
            msg: value.to_string(),
        })
    }
}
