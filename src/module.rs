//! Trees of layers that are initialized together.

use log::{debug, info};
use ndarray::{ArrayD, ArrayViewD};
use rand::Rng;

use crate::{
    error::{ConfigErr, Result},
    layers::{Conv1d, Conv2d, Conv3d, Layer, Linear},
    params::{NamedParam, Parameterized, Parametrization, prefixed},
};

/// A node of a module tree.
#[derive(Debug, Clone)]
pub enum Module {
    Layer(Layer),
    Container(Container),
}

impl Module {
    pub fn set_parametrization(&mut self, parametrization: Parametrization) {
        match self {
            Module::Layer(l) => l.set_parametrization(parametrization),
            Module::Container(c) => c.set_parametrization(parametrization),
        }
    }

    /// Draws the parameters of every layer in this subtree.
    ///
    /// # Returns
    /// The amount of initialized layers.
    pub fn reset_parameters<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize> {
        match self {
            Module::Layer(l) => l.reset_parameters(rng).map(|_| 1),
            Module::Container(c) => c.reset_layers(rng),
        }
    }

    pub fn as_layer(&self) -> Option<&Layer> {
        match self {
            Module::Layer(l) => Some(l),
            Module::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Module::Layer(_) => None,
            Module::Container(c) => Some(c),
        }
    }
}

impl Parameterized for Module {
    fn mean_parameters(&self) -> Vec<NamedParam<'_>> {
        match self {
            Module::Layer(l) => l.mean_parameters(),
            Module::Container(c) => c.mean_parameters(),
        }
    }

    fn cov_parameters(&self) -> Vec<NamedParam<'_>> {
        match self {
            Module::Layer(l) => l.cov_parameters(),
            Module::Container(c) => c.cov_parameters(),
        }
    }
}

/// An ordered collection of named modules and tensors sharing a parametrization.
///
/// Every module pushed into the container takes over its parametrization, and
/// `reset_parameters` initializes all the layers of the tree depth first, in insertion order.
/// Buffers are owned tensors that are never initialized.
#[derive(Debug, Clone, Default)]
pub struct Container {
    parametrization: Parametrization,
    children: Vec<(String, Module)>,
    buffers: Vec<(String, ArrayD<f32>)>,
}

impl Container {
    /// Creates a new empty `Container`.
    ///
    /// # Arguments
    /// * `parametrization` - The parametrization imposed on every pushed module.
    pub fn new(parametrization: Parametrization) -> Self {
        Self {
            parametrization,
            ..Default::default()
        }
    }

    /// Appends a module, imposing this container's parametrization on it.
    ///
    /// # Arguments
    /// * `name` - A name unique among this container's children and buffers.
    /// * `module` - The module to own.
    ///
    /// # Returns
    /// An error if the name is already taken, empty or contains a `.`.
    pub fn push<S, M>(&mut self, name: S, module: M) -> Result<()>
    where
        S: Into<String>,
        M: Into<Module>,
    {
        let name = name.into();
        self.check_name(&name)?;

        let mut module = module.into();
        module.set_parametrization(self.parametrization);
        self.children.push((name, module));
        Ok(())
    }

    /// Builder flavoured `push`.
    pub fn with<S, M>(mut self, name: S, module: M) -> Result<Self>
    where
        S: Into<String>,
        M: Into<Module>,
    {
        self.push(name, module)?;
        Ok(self)
    }

    /// Appends a tensor that is owned but never initialized.
    ///
    /// # Returns
    /// An error if the name is already taken, empty or contains a `.`.
    pub fn push_buffer<S: Into<String>>(&mut self, name: S, tensor: ArrayD<f32>) -> Result<()> {
        let name = name.into();
        self.check_name(&name)?;
        self.buffers.push((name, tensor));
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.contains('.') {
            return Err(ConfigErr::InvalidName(name.to_string()).into());
        }

        let taken = self.children.iter().any(|(n, _)| n == name)
            || self.buffers.iter().any(|(n, _)| n == name);

        if taken {
            return Err(ConfigErr::DuplicateName(name.to_string()).into());
        }

        Ok(())
    }

    pub fn parametrization(&self) -> Parametrization {
        self.parametrization
    }

    /// Replaces the parametrization of this container and of every module below it.
    pub fn set_parametrization(&mut self, parametrization: Parametrization) {
        self.parametrization = parametrization;
        for (_, child) in &mut self.children {
            child.set_parametrization(parametrization);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.children
            .iter()
            .find_map(|(n, m)| (n == name).then_some(m))
    }

    /// Returns the layer reached by a dotted path such as `encoder.fc1`.
    pub fn layer(&self, path: &str) -> Option<&Layer> {
        match path.split_once('.') {
            Some((head, rest)) => self.get(head)?.as_container()?.layer(rest),
            None => self.get(path)?.as_layer(),
        }
    }

    pub fn buffer(&self, name: &str) -> Option<ArrayViewD<'_, f32>> {
        self.buffers
            .iter()
            .find_map(|(n, b)| (n == name).then(|| b.view()))
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Module)> {
        self.children.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns every layer of the tree with its dotted path, in initialization order.
    pub fn layers(&self) -> Vec<(String, &Layer)> {
        let mut layers = Vec::new();
        for (name, child) in &self.children {
            match child {
                Module::Layer(l) => layers.push((name.clone(), l)),
                Module::Container(c) => layers.extend(
                    c.layers()
                        .into_iter()
                        .map(|(path, l)| (format!("{name}.{path}"), l)),
                ),
            }
        }

        layers
    }

    /// Draws the parameters of every layer in the tree.
    ///
    /// Layers are initialized independently of each other, depth first and in insertion order,
    /// so a fixed generator state always yields the same parameters. The first failing layer
    /// aborts the traversal.
    ///
    /// # Arguments
    /// * `rng` - The random number generator shared by all the layers.
    pub fn reset_parameters<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let count = self.reset_layers(rng)?;
        info!(
            layers = count,
            mean_params = self.num_mean_parameters(),
            cov_params = self.num_cov_parameters();
            "reset parameters"
        );
        Ok(())
    }

    fn reset_layers<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize> {
        let mut count = 0;
        for (name, child) in &mut self.children {
            debug!("resetting {name}");
            count += child.reset_parameters(rng)?;
        }

        Ok(count)
    }
}

impl Parameterized for Container {
    fn mean_parameters(&self) -> Vec<NamedParam<'_>> {
        self.children
            .iter()
            .flat_map(|(name, child)| prefixed(name, child.mean_parameters()))
            .collect()
    }

    fn cov_parameters(&self) -> Vec<NamedParam<'_>> {
        self.children
            .iter()
            .flat_map(|(name, child)| prefixed(name, child.cov_parameters()))
            .collect()
    }
}

impl From<Layer> for Module {
    fn from(value: Layer) -> Self {
        Self::Layer(value)
    }
}

impl From<Container> for Module {
    fn from(value: Container) -> Self {
        Self::Container(value)
    }
}

impl From<Linear> for Module {
    fn from(value: Linear) -> Self {
        Self::Layer(value.into())
    }
}

impl From<Conv1d> for Module {
    fn from(value: Conv1d) -> Self {
        Self::Layer(value.into())
    }
}

impl From<Conv2d> for Module {
    fn from(value: Conv2d) -> Self {
        Self::Layer(value.into())
    }
}

impl From<Conv3d> for Module {
    fn from(value: Conv3d) -> Self {
        Self::Layer(value.into())
    }
}
