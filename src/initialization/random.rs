use log::trace;
use ndarray::ArrayD;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ConfigErr, Result};

/// A parameter generator that draws i.i.d. values from a normal distribution.
#[derive(Debug, Clone, Copy)]
pub struct NormalGen {
    distribution: Normal<f32>,
    std_dev: f32,
}

impl NormalGen {
    /// Creates a new `NormalGen` parameter generator.
    ///
    /// # Arguments
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `mean` or `std_dev` is not finite (NaN or infinite) or `std_dev` is negative.
    pub fn normal(mean: f32, std_dev: f32) -> Result<Self> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0. {
            return Err(ConfigErr::InvalidScale {
                what: "normal distribution",
                msg: format!("mean {mean} and standard deviation {std_dev} must be finite"),
            }
            .into());
        }

        Ok(Self {
            distribution: Normal::new(mean, std_dev)?,
            std_dev,
        })
    }

    /// Creates a new zero-mean `NormalGen` parameter generator.
    ///
    /// # Arguments
    /// * `std_dev` - The standard deviation of the distribution.
    pub fn centered(std_dev: f32) -> Result<Self> {
        Self::normal(0., std_dev)
    }

    /// Overwrites every entry of `tensor` with a fresh draw, keeping its shape.
    ///
    /// # Arguments
    /// * `tensor` - The tensor to fill.
    /// * `rng` - The random number generator the draws are taken from.
    pub fn fill<R: Rng + ?Sized>(&self, tensor: &mut ArrayD<f32>, rng: &mut R) {
        trace!(len = tensor.len(), std_dev = self.std_dev; "filling tensor");
        tensor.map_inplace(|x| *x = self.distribution.sample(rng));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn seeded_rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn empty() {
        let mut rng = seeded_rng();
        let param_gen = NormalGen::centered(1.).unwrap();
        let mut tensor = ArrayD::zeros(IxDyn(&[0, 3]));

        param_gen.fill(&mut tensor, &mut rng);

        assert_eq!(tensor.shape(), &[0, 3]);
    }

    #[test]
    fn fill_keeps_shape() {
        let mut rng = seeded_rng();
        let param_gen = NormalGen::centered(1.).unwrap();
        let mut tensor = ArrayD::zeros(IxDyn(&[4, 5, 2]));

        param_gen.fill(&mut tensor, &mut rng);

        assert_eq!(tensor.shape(), &[4, 5, 2]);
        assert!(tensor.iter().any(|&x| x != 0.));
    }

    #[test]
    fn fill_matches_the_distribution() {
        let mut rng = seeded_rng();
        let param_gen = NormalGen::normal(2., 0.1).unwrap();
        let mut tensor = ArrayD::zeros(IxDyn(&[100, 100]));

        param_gen.fill(&mut tensor, &mut rng);

        assert!((tensor.mean().unwrap() - 2.).abs() < 0.01);
        assert!((tensor.std(0.) - 0.1).abs() < 0.01);
    }

    #[test]
    fn invalid_scales_are_rejected() {
        assert!(NormalGen::centered(-1.).is_err());
        assert!(NormalGen::centered(f32::INFINITY).is_err());
        assert!(NormalGen::normal(f32::NAN, 1.).is_err());
    }
}
