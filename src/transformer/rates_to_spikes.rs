//! Stochastic conversion of rates into spike trains.
use log::trace;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Poisson};

use crate::buffer::{SpikeEvent, TimeValueBuffer};
use crate::error::{CosimError, Result};
use crate::MS_PER_SECOND;

use super::{Transformer, TransformerBuffers};

/// Generates spike trains from rates with an inhomogeneous Poisson process.
///
/// Every value of the input (after the time axis) is the rate, in Hz, of one target.
/// For every time bin `[t, t + dt)`, every target and every neuron of the target, the number of
/// spikes is drawn from `Poisson(scale * rate * dt / 1000)` and the spikes are placed uniformly
/// at random in the bin. The output is an event buffer (see [`TimeValueBuffer::from_spike_events`]).
#[derive(Debug, Clone)]
pub struct RatesToSpikes {
    dt: f64,
    number_of_neurons: usize,
    scale: f64,
    seed: u64,
    stream: u64,
    rng: ChaCha8Rng,
    buffers: TransformerBuffers,
}

impl RatesToSpikes {
    /// Create a new generator whose random draws are fully determined by the seed and the stream.
    /// Distinct streams with the same seed produce independent draws.
    pub fn new(dt: f64, number_of_neurons: usize, scale: f64, seed: u64, stream: u64) -> Result<Self> {
        if !(dt > 0.0) {
            return Err(CosimError::InvalidParameters(format!(
                "time bin width must be positive, got {}",
                dt
            )));
        }
        if number_of_neurons == 0 {
            return Err(CosimError::InvalidParameters(
                "number of neurons must be positive".to_string(),
            ));
        }
        if !scale.is_finite() || scale < 0.0 {
            return Err(CosimError::InvalidParameters(format!(
                "scale must be finite and non-negative, got {}",
                scale
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);

        Ok(RatesToSpikes {
            dt,
            number_of_neurons,
            scale,
            seed,
            stream,
            rng,
            buffers: TransformerBuffers::new(),
        })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn number_of_neurons(&self) -> usize {
        self.number_of_neurons
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stream(&self) -> u64 {
        self.stream
    }

    /// Restart the random number generator from its seed and stream.
    pub fn reset_rng(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.rng.set_stream(self.stream);
    }
}

impl Transformer for RatesToSpikes {
    fn name(&self) -> &str {
        "RatesToSpikes"
    }

    fn buffers(&self) -> &TransformerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut TransformerBuffers {
        &mut self.buffers
    }

    fn compute(&mut self, input: &TimeValueBuffer) -> Result<TimeValueBuffer> {
        let num_targets = input.row_len();
        let rates: Vec<f64> = input.values().iter().copied().collect();
        if let Some(rate) = rates.iter().find(|rate| !rate.is_finite() || **rate < 0.0) {
            return Err(CosimError::TransformError(format!(
                "rates must be finite and non-negative, got {}",
                rate
            )));
        }

        let mut spikes = vec![];
        for (i, &t) in input.time().iter().enumerate() {
            for target in 0..num_targets {
                let lambda = self.scale * rates[i * num_targets + target] * self.dt / MS_PER_SECOND;
                if lambda <= 0.0 {
                    continue;
                }
                let poisson = Poisson::new(lambda)
                    .map_err(|e| CosimError::TransformError(format!("invalid Poisson mean {}: {}", lambda, e)))?;
                for neuron in 0..self.number_of_neurons {
                    let num_spikes = poisson.sample(&mut self.rng) as usize;
                    for _ in 0..num_spikes {
                        let time = t + self.rng.gen_range(0.0..self.dt);
                        spikes.push(SpikeEvent::new(time, target, neuron));
                    }
                }
            }
        }

        trace!(
            "Generated {} spikes from {} time bins and {} targets",
            spikes.len(),
            input.len(),
            num_targets
        );
        Ok(TimeValueBuffer::from_spike_events(&spikes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    const SEED: u64 = 42;

    fn constant_rates(rate: f64, num_bins: usize, num_targets: usize) -> TimeValueBuffer {
        let time = (0..num_bins).map(|i| i as f64 * 0.1).collect();
        TimeValueBuffer::new(time, Array2::from_elem((num_bins, num_targets), rate).into_dyn()).unwrap()
    }

    #[test]
    fn test_rates_to_spikes_invalid_parameters() {
        assert!(matches!(RatesToSpikes::new(0.0, 10, 1.0, SEED, 0), Err(CosimError::InvalidParameters(_))));
        assert!(matches!(RatesToSpikes::new(0.1, 0, 1.0, SEED, 0), Err(CosimError::InvalidParameters(_))));
        assert!(matches!(RatesToSpikes::new(0.1, 10, -1.0, SEED, 0), Err(CosimError::InvalidParameters(_))));
    }

    #[test]
    fn test_rates_to_spikes_invalid_rates() {
        let mut transformer = RatesToSpikes::new(0.1, 10, 1.0, SEED, 0).unwrap();
        transformer.set_input(constant_rates(-5.0, 3, 1));
        assert!(matches!(transformer.transform(), Err(CosimError::TransformError(_))));

        transformer.set_input(constant_rates(f64::NAN, 3, 1));
        assert!(matches!(transformer.transform(), Err(CosimError::TransformError(_))));
    }

    #[test]
    fn test_rates_to_spikes_count() {
        // expected number of spikes per target: 1000 Hz * 100 neurons * 0.1 ms * 10 bins / 1000 = 100
        let mut transformer = RatesToSpikes::new(0.1, 100, 1.0, SEED, 0).unwrap();
        transformer.set_input(constant_rates(1000.0, 10, 2));
        transformer.transform().unwrap();

        let spikes = transformer.output().unwrap().spike_events().unwrap();
        for target in 0..2 {
            let count = spikes.iter().filter(|spike| spike.target == target).count();
            assert!((50..=150).contains(&count), "unexpected spike count {}", count);
        }
        assert!(spikes.iter().all(|spike| spike.time >= 0.0 && spike.time <= 1.0));
        assert!(spikes.iter().all(|spike| spike.neuron < 100));
        assert!(spikes.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn test_rates_to_spikes_zero_rate() {
        let mut transformer = RatesToSpikes::new(0.1, 100, 1.0, SEED, 0).unwrap();
        transformer.set_input(constant_rates(0.0, 10, 1));
        transformer.transform().unwrap();
        assert!(transformer.output().unwrap().is_empty());
    }

    #[test]
    fn test_rates_to_spikes_reproducible() {
        let mut t1 = RatesToSpikes::new(0.1, 50, 1.0, SEED, 3).unwrap();
        let mut t2 = RatesToSpikes::new(0.1, 50, 1.0, SEED, 3).unwrap();
        let mut t3 = RatesToSpikes::new(0.1, 50, 1.0, SEED, 4).unwrap();
        for transformer in [&mut t1, &mut t2, &mut t3] {
            transformer.set_input(constant_rates(500.0, 20, 1));
            transformer.transform().unwrap();
        }
        assert_eq!(t1.output().unwrap(), t2.output().unwrap());
        assert_ne!(t1.output().unwrap(), t3.output().unwrap());

        let first = t1.output().unwrap();
        t1.reset_rng();
        t1.transform().unwrap();
        assert_eq!(t1.output().unwrap(), first);
    }
}
