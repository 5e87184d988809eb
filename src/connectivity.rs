//! Structural connectivity of the whole-brain model.
use nalgebra::DMatrix;

use crate::error::{CosimError, Result};

/// Region labels together with the inter-region weights and delays (in ms).
/// Matrices are indexed `(target, source)`.
#[derive(Debug, PartialEq, Clone)]
pub struct Connectivity {
    region_labels: Vec<String>,
    weights: DMatrix<f64>,
    delays: DMatrix<f64>,
}

impl Connectivity {
    /// Create a connectivity from region labels, weights and delays.
    /// The function returns an error if the matrices are not square with one row per region,
    /// or if any delay is negative.
    pub fn new(region_labels: Vec<String>, weights: DMatrix<f64>, delays: DMatrix<f64>) -> Result<Self> {
        let n = region_labels.len();
        for (name, matrix) in [("weights", &weights), ("delays", &delays)] {
            if matrix.shape() != (n, n) {
                return Err(CosimError::InvalidParameters(format!(
                    "{} must be a {}x{} matrix, got {:?}",
                    name,
                    n,
                    n,
                    matrix.shape()
                )));
            }
        }
        if delays.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(CosimError::InvalidParameters(
                "delays must be finite and non-negative".to_string(),
            ));
        }
        Ok(Connectivity {
            region_labels,
            weights,
            delays,
        })
    }

    /// Create a connectivity with the same weight and delay between all pairs of distinct regions.
    pub fn uniform(num_regions: usize, weight: f64, delay: f64) -> Result<Self> {
        let region_labels = (0..num_regions).map(|i| format!("region_{}", i)).collect();
        let off_diagonal = |value: f64| DMatrix::from_fn(num_regions, num_regions, |i, j| if i == j { 0.0 } else { value });
        Connectivity::new(region_labels, off_diagonal(weight), off_diagonal(delay))
    }

    pub fn number_of_regions(&self) -> usize {
        self.region_labels.len()
    }

    pub fn region_labels(&self) -> &[String] {
        &self.region_labels[..]
    }

    /// Returns the index of the region with the given label, if any.
    pub fn region_index(&self, label: &str) -> Option<usize> {
        self.region_labels.iter().position(|l| l == label)
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    pub fn delays(&self) -> &DMatrix<f64> {
        &self.delays
    }

    /// Returns the weight of the connection from the source to the target region.
    pub fn weight(&self, source: usize, target: usize) -> Option<f64> {
        self.weights.get((target, source)).copied()
    }

    /// Returns the delay of the connection from the source to the target region.
    pub fn delay(&self, source: usize, target: usize) -> Option<f64> {
        self.delays.get((target, source)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_indexing() {
        let weights = DMatrix::from_row_slice(2, 2, &[0.0, 0.5, 2.0, 0.0]);
        let delays = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 3.0, 0.0]);
        let conn = Connectivity::new(vec!["A".to_string(), "B".to_string()], weights, delays).unwrap();

        assert_eq!(conn.number_of_regions(), 2);
        assert_eq!(conn.region_index("B"), Some(1));
        // from B to A
        assert_eq!(conn.weight(1, 0), Some(0.5));
        assert_eq!(conn.delay(1, 0), Some(1.0));
        // from A to B
        assert_eq!(conn.weight(0, 1), Some(2.0));
        assert_eq!(conn.weight(0, 2), None);
    }

    #[test]
    fn test_connectivity_invalid() {
        let labels = vec!["A".to_string(), "B".to_string()];
        assert!(matches!(
            Connectivity::new(labels.clone(), DMatrix::zeros(2, 3), DMatrix::zeros(2, 2)),
            Err(CosimError::InvalidParameters(_))
        ));
        assert!(matches!(
            Connectivity::new(labels, DMatrix::zeros(2, 2), DMatrix::from_element(2, 2, -1.0)),
            Err(CosimError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_connectivity_uniform() {
        let conn = Connectivity::uniform(3, 1.5, 2.0).unwrap();
        assert_eq!(conn.region_labels()[2], "region_2");
        assert_eq!(conn.weight(0, 0), Some(0.0));
        assert_eq!(conn.weight(0, 2), Some(1.5));
        assert_eq!(conn.delay(2, 1), Some(2.0));
    }
}
