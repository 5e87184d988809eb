//! Templates deriving the synaptic parameters of interface devices from the connectivity.
//!
//! Each input device is wired to its target populations with a weight, a delay and a receptor
//! type. The rules below compute these parameters for a pair of source and target regions.
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::connectivity::Connectivity;
use crate::error::{CosimError, Result};

/// Returns the weight of the connection from the source to the target region.
pub fn tvb_weight(source: usize, target: usize, connectivity: &Connectivity) -> Result<f64> {
    connectivity.weight(source, target).ok_or_else(|| {
        CosimError::InvalidParameters(format!("no weight from region {} to region {}", source, target))
    })
}

/// Returns the delay of the connection from the source to the target region.
pub fn tvb_delay(source: usize, target: usize, connectivity: &Connectivity) -> Result<f64> {
    connectivity.delay(source, target).ok_or_else(|| {
        CosimError::InvalidParameters(format!("no delay from region {} to region {}", source, target))
    })
}

/// Draw a weight from a normal distribution centered on the scaled weight, with a standard
/// deviation proportional to it. A zero weight stays zero.
pub fn random_normal_weight<R: Rng>(weight: f64, scale: f64, sigma: f64, rng: &mut R) -> Result<f64> {
    if weight == 0.0 {
        return Ok(0.0);
    }
    let weight = weight * scale;
    let normal = Normal::new(weight, sigma * weight.abs())
        .map_err(|e| CosimError::InvalidParameters(format!("invalid normal weight distribution: {}", e)))?;
    Ok(normal.sample(rng))
}

/// Draw a weight from a normal distribution with the given mean and standard deviation.
pub fn random_normal<R: Rng>(mean: f64, sigma: f64, rng: &mut R) -> Result<f64> {
    let normal = Normal::new(mean, sigma)
        .map_err(|e| CosimError::InvalidParameters(format!("invalid normal weight distribution: {}", e)))?;
    Ok(normal.sample(rng))
}

/// Draw a delay uniformly at random in `[low, high)`. A zero delay stays zero.
/// If `sigma` is positive, the bounds are widened to at least `(1 - sigma) * delay` and
/// `(1 + sigma) * delay` respectively.
/// The function returns an error if the upper bound is not larger than the lower bound.
pub fn random_uniform_delay<R: Rng>(
    delay: f64,
    low: f64,
    high: f64,
    sigma: Option<f64>,
    rng: &mut R,
) -> Result<f64> {
    if delay == 0.0 {
        return Ok(0.0);
    }
    let (low, high) = match sigma {
        Some(sigma) if sigma > 0.0 => (low.max((1.0 - sigma) * delay), high.max((1.0 + sigma) * delay)),
        _ => (low, high),
    };
    if !(high > low) {
        return Err(CosimError::InvalidParameters(format!(
            "maximum delay {} is not larger than the minimum one {}",
            high, low
        )));
    }
    Ok(Uniform::new(low, high).sample(rng))
}

/// Returns a receptor type specific to the source region.
pub fn receptor_by_source_region(source: usize, start: usize) -> usize {
    start + source
}

/// How the weight of an interface device connection is obtained.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightRule {
    Constant(f64),
    /// Normally distributed with mean `mean` and standard deviation `sigma`.
    RandomNormal { mean: f64, sigma: f64 },
    /// The scaled connectivity weight.
    TvbWeight { scale: f64 },
    /// Normally distributed around the scaled connectivity weight, with a standard deviation of
    /// `sigma` times that weight.
    RandomNormalTvbWeight { scale: f64, sigma: f64 },
}

impl Default for WeightRule {
    fn default() -> Self {
        WeightRule::Constant(1.0)
    }
}

impl WeightRule {
    pub fn evaluate<R: Rng>(&self, source: usize, target: usize, connectivity: &Connectivity, rng: &mut R) -> Result<f64> {
        match *self {
            WeightRule::Constant(weight) => Ok(weight),
            WeightRule::RandomNormal { mean, sigma } => random_normal(mean, sigma, rng),
            WeightRule::TvbWeight { scale } => Ok(scale * tvb_weight(source, target, connectivity)?),
            WeightRule::RandomNormalTvbWeight { scale, sigma } => {
                random_normal_weight(tvb_weight(source, target, connectivity)?, scale, sigma, rng)
            }
        }
    }
}

/// How the delay (in ms) of an interface device connection is obtained.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayRule {
    Constant(f64),
    /// The connectivity delay.
    TvbDelay,
    /// Uniformly distributed around the connectivity delay.
    RandomUniformTvbDelay { low: f64, high: f64, sigma: Option<f64> },
}

impl Default for DelayRule {
    fn default() -> Self {
        DelayRule::Constant(1.0)
    }
}

impl DelayRule {
    pub fn evaluate<R: Rng>(&self, source: usize, target: usize, connectivity: &Connectivity, rng: &mut R) -> Result<f64> {
        match *self {
            DelayRule::Constant(delay) => Ok(delay),
            DelayRule::TvbDelay => tvb_delay(source, target, connectivity),
            DelayRule::RandomUniformTvbDelay { low, high, sigma } => {
                random_uniform_delay(tvb_delay(source, target, connectivity)?, low, high, sigma, rng)
            }
        }
    }
}

/// How the receptor type of an interface device connection is obtained.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceptorRule {
    Fixed(usize),
    BySourceRegion { start: usize },
}

impl Default for ReceptorRule {
    fn default() -> Self {
        ReceptorRule::Fixed(0)
    }
}

impl ReceptorRule {
    pub fn evaluate(&self, source: usize) -> usize {
        match *self {
            ReceptorRule::Fixed(receptor) => receptor,
            ReceptorRule::BySourceRegion { start } => receptor_by_source_region(source, start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    #[test]
    fn test_random_normal_weight() {
        let mut rng = StdRng::seed_from_u64(SEED);
        assert_eq!(random_normal_weight(0.0, 2.0, 0.1, &mut rng).unwrap(), 0.0);

        let weights: Vec<f64> = (0..1000)
            .map(|_| random_normal_weight(-2.0, 0.5, 0.1, &mut rng).unwrap())
            .collect();
        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        assert!((mean + 1.0).abs() < 0.05);
        assert!(weights.iter().all(|w| *w < 0.0));

        assert!(matches!(
            random_normal_weight(1.0, 1.0, -0.1, &mut rng),
            Err(CosimError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_random_normal() {
        let mut rng = StdRng::seed_from_u64(SEED);
        // the spread does not depend on the mean
        let weights: Vec<f64> = (0..1000).map(|_| random_normal(0.0, 2.0, &mut rng).unwrap()).collect();
        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        let var = weights.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / weights.len() as f64;
        assert!(mean.abs() < 0.2);
        assert!((var.sqrt() - 2.0).abs() < 0.2);

        let rule = WeightRule::RandomNormal { mean: 5.0, sigma: 0.0 };
        let conn = Connectivity::uniform(1, 1.0, 1.0).unwrap();
        assert_eq!(rule.evaluate(0, 0, &conn, &mut rng).unwrap(), 5.0);
        assert!(matches!(random_normal(1.0, -0.1, &mut rng), Err(CosimError::InvalidParameters(_))));
    }

    #[test]
    fn test_random_uniform_delay() {
        let mut rng = StdRng::seed_from_u64(SEED);
        assert_eq!(random_uniform_delay(0.0, 0.0, 1.0, Some(0.1), &mut rng).unwrap(), 0.0);

        for _ in 0..100 {
            let delay = random_uniform_delay(10.0, 0.0, 1.0, Some(0.1), &mut rng).unwrap();
            assert!((9.0..11.0).contains(&delay));
        }
        for _ in 0..100 {
            let delay = random_uniform_delay(10.0, 2.0, 3.0, None, &mut rng).unwrap();
            assert!((2.0..3.0).contains(&delay));
        }

        assert!(matches!(
            random_uniform_delay(10.0, 5.0, 5.0, None, &mut rng),
            Err(CosimError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_receptor_by_source_region() {
        assert_eq!(receptor_by_source_region(0, 1), 1);
        assert_eq!(receptor_by_source_region(4, 1), 5);
        assert_eq!(ReceptorRule::BySourceRegion { start: 1 }.evaluate(2), 3);
        assert_eq!(ReceptorRule::default().evaluate(2), 0);
    }

    #[test]
    fn test_rules() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let conn = Connectivity::uniform(3, 0.5, 4.0).unwrap();

        assert_eq!(WeightRule::Constant(3.0).evaluate(0, 1, &conn, &mut rng).unwrap(), 3.0);
        assert_eq!(WeightRule::TvbWeight { scale: 2.0 }.evaluate(0, 1, &conn, &mut rng).unwrap(), 1.0);
        assert!(matches!(
            WeightRule::TvbWeight { scale: 2.0 }.evaluate(0, 7, &conn, &mut rng),
            Err(CosimError::InvalidParameters(_))
        ));
        assert_eq!(DelayRule::TvbDelay.evaluate(2, 1, &conn, &mut rng).unwrap(), 4.0);
        let delay = DelayRule::RandomUniformTvbDelay { low: 0.0, high: 0.0, sigma: Some(0.5) }
            .evaluate(2, 1, &conn, &mut rng)
            .unwrap();
        assert!((2.0..6.0).contains(&delay));
    }

    #[test]
    fn test_rules_serde() {
        let rule = WeightRule::RandomNormal { mean: 1.0, sigma: 0.1 };
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(serde_json::from_str::<WeightRule>(&json).unwrap(), rule);
        assert_eq!(serde_json::to_string(&DelayRule::TvbDelay).unwrap(), "\"tvb_delay\"");
    }
}
