//! Windowed estimation of population rates from spike counts.
use ndarray::{ArrayD, IxDyn};

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};
use crate::MS_PER_SECOND;

use super::{Transformer, TransformerBuffers};

/// Estimates population rates (in Hz) from binned spike counts.
///
/// The input holds spike counts of shape `[time, neuron]` or `[time, ..., neuron]`, one bin of
/// width `dt` per time point. For every time point, the counts of all neurons are summed over a
/// rectangular window of `window / dt` bins ending at that time point, and divided by the window
/// duration and the number of neurons. At the start of the buffer, the window is truncated.
/// The output has shape `[time, 1]` for `[time, neuron]` inputs, and `[time, ...]` otherwise.
#[derive(Debug, PartialEq, Clone)]
pub struct SpikesToRates {
    window: f64,
    dt: f64,
    scale: f64,
    buffers: TransformerBuffers,
}

impl SpikesToRates {
    pub fn new(window: f64, dt: f64, scale: f64) -> Result<Self> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(CosimError::InvalidParameters(format!(
                "time bin width must be positive, got {}",
                dt
            )));
        }
        if !(window >= dt) || !window.is_finite() {
            return Err(CosimError::InvalidParameters(format!(
                "window must be finite and at least one time bin, got {}",
                window
            )));
        }
        Ok(SpikesToRates {
            window,
            dt,
            scale,
            buffers: TransformerBuffers::new(),
        })
    }

    /// Returns the number of bins of the window.
    pub fn window_bins(&self) -> usize {
        ((self.window / self.dt).round() as usize).max(1)
    }
}

impl Transformer for SpikesToRates {
    fn name(&self) -> &str {
        "SpikesToRates"
    }

    /// The bins of a window preceding its last bin.
    fn history(&self) -> f64 {
        (self.window_bins() - 1) as f64 * self.dt
    }

    fn buffers(&self) -> &TransformerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut TransformerBuffers {
        &mut self.buffers
    }

    fn compute(&mut self, input: &TimeValueBuffer) -> Result<TimeValueBuffer> {
        let shape = input.shape();
        if shape.len() < 2 || shape[shape.len() - 1] == 0 {
            return Err(CosimError::ShapeMismatch(format!(
                "spike counts need shape [time, ..., neuron] with at least one neuron, got {:?}",
                shape
            )));
        }
        let num_bins = shape[0];
        let num_neurons = shape[shape.len() - 1];
        let num_groups: usize = shape[1..shape.len() - 1].iter().product();

        let counts: Vec<f64> = input.values().iter().copied().collect();
        if let Some(count) = counts.iter().find(|c| !c.is_finite() || **c < 0.0) {
            return Err(CosimError::TransformError(format!(
                "spike counts must be finite and non-negative, got {}",
                count
            )));
        }

        // total count per (bin, group)
        let totals: Vec<f64> = counts
            .chunks(num_neurons)
            .map(|neurons| neurons.iter().sum())
            .collect();

        let window_bins = self.window_bins();
        let mut rates = vec![0.0; num_bins * num_groups];
        for t in 0..num_bins {
            let first = (t + 1).saturating_sub(window_bins);
            let duration = (t + 1 - first) as f64 * self.dt;
            for g in 0..num_groups {
                let total: f64 = (first..=t).map(|k| totals[k * num_groups + g]).sum();
                rates[t * num_groups + g] =
                    self.scale * total * MS_PER_SECOND / (duration * num_neurons as f64);
            }
        }

        let mut out_shape = shape[..shape.len() - 1].to_vec();
        if out_shape.len() == 1 {
            out_shape.push(1);
        }
        let values = ArrayD::from_shape_vec(IxDyn(&out_shape), rates)
            .map_err(|e| CosimError::ShapeMismatch(e.to_string()))?;
        TimeValueBuffer::new(input.time().to_vec(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_spikes_to_rates_single_bin() {
        // 2 neurons, 1 ms bins: 1 spike per bin over 2 neurons is 500 Hz
        let mut transformer = SpikesToRates::new(1.0, 1.0, 1.0).unwrap();
        transformer.set_input(TimeValueBuffer::new(vec![0.0, 1.0], array![[1.0, 0.0], [2.0, 2.0]].into_dyn()).unwrap());
        transformer.transform().unwrap();
        assert_eq!(transformer.output_buffer().unwrap(), &array![[500.0], [2000.0]].into_dyn());
    }

    #[test]
    fn test_spikes_to_rates_window() {
        // window of 2 bins, truncated at the start of the buffer
        let mut transformer = SpikesToRates::new(2.0, 1.0, 1.0).unwrap();
        transformer.set_input(
            TimeValueBuffer::new(vec![0.0, 1.0, 2.0], array![[2.0], [0.0], [4.0]].into_dyn()).unwrap(),
        );
        transformer.transform().unwrap();
        assert_eq!(
            transformer.output_buffer().unwrap(),
            &array![[2000.0], [1000.0], [2000.0]].into_dyn()
        );
    }

    #[test]
    fn test_spikes_to_rates_history() {
        assert_eq!(SpikesToRates::new(0.1, 0.1, 1.0).unwrap().history(), 0.0);
        assert!((SpikesToRates::new(1.0, 0.1, 1.0).unwrap().history() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_spikes_to_rates_groups() {
        let counts = Array3::from_shape_vec((1, 2, 2), vec![1.0, 1.0, 0.0, 0.0]).unwrap();
        let mut transformer = SpikesToRates::new(0.5, 0.5, 0.001).unwrap();
        transformer.set_input(TimeValueBuffer::new(vec![0.0], counts.into_dyn()).unwrap());
        transformer.transform().unwrap();
        assert_eq!(transformer.output().unwrap().shape(), &[1, 2]);
        assert_eq!(transformer.output_buffer().unwrap(), &array![[2.0, 0.0]].into_dyn());
    }

    #[test]
    fn test_spikes_to_rates_invalid() {
        assert!(matches!(SpikesToRates::new(1.0, 0.0, 1.0), Err(CosimError::InvalidParameters(_))));
        assert!(matches!(SpikesToRates::new(0.05, 0.1, 1.0), Err(CosimError::InvalidParameters(_))));

        let mut transformer = SpikesToRates::new(1.0, 1.0, 1.0).unwrap();
        transformer.set_input(TimeValueBuffer::new(vec![0.0], array![1.0].into_dyn()).unwrap());
        assert!(matches!(transformer.transform(), Err(CosimError::ShapeMismatch(_))));

        transformer.set_input(TimeValueBuffer::new(vec![0.0], array![[-1.0]].into_dyn()).unwrap());
        assert!(matches!(transformer.transform(), Err(CosimError::TransformError(_))));
    }
}
