//! Input devices, stimulating spiking populations with the data coming from the interface.
use std::fmt;
use std::rc::Rc;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};

use super::{Device, PopulationHandle};

/// The model of an input device.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputModel {
    /// Injects a current into every neuron.
    Current,
    /// Imposes a rate on every neuron.
    Rate,
    /// Delivers (independent) Poisson spike trains to the neurons.
    PoissonGenerator,
    /// Delivers prescribed spike trains to the neurons.
    SpikeGenerator,
}

impl InputModel {
    /// Returns true if the device delivers spikes, false if it delivers a continuous signal.
    pub fn is_spiking(&self) -> bool {
        matches!(self, InputModel::PoissonGenerator | InputModel::SpikeGenerator)
    }
}

impl fmt::Display for InputModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            InputModel::Current => "current",
            InputModel::Rate => "rate",
            InputModel::PoissonGenerator => "poisson_generator",
            InputModel::SpikeGenerator => "spike_generator",
        };
        write!(f, "{}", name)
    }
}

/// A device delivering data, already in the units of the spiking network, to its populations.
/// Every call to [`InputDevice::apply`] replaces what the device delivers.
#[derive(Debug, Clone)]
pub struct InputDevice {
    device: Device,
    model: InputModel,
    /// Spike times per target neuron, for spiking models.
    spike_trains: Vec<Vec<f64>>,
    /// (time, amplitude) pairs, for continuous models.
    amplitudes: Vec<(f64, f64)>,
}

impl InputDevice {
    /// Create an input device, with the synaptic parameters `weight`, `delay` and `receptor_type`.
    pub fn new(label: &str, model: InputModel, populations: Vec<Rc<dyn PopulationHandle>>) -> Self {
        let device = Device::new(
            label,
            populations,
            &[("weight", 1.0), ("delay", 0.0), ("receptor_type", 0.0)],
        );
        let spike_trains = vec![vec![]; device.number_of_neurons()];
        InputDevice {
            device,
            model,
            spike_trains,
            amplitudes: vec![],
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn label(&self) -> &str {
        self.device.label()
    }

    pub fn model(&self) -> InputModel {
        self.model
    }

    /// Deliver the data to the populations.
    ///
    /// Spiking models expect an event buffer with a single target, whose neuron indices count the
    /// neurons of all populations in order. Continuous models expect a single value per time point.
    pub fn apply(&mut self, data: &TimeValueBuffer) -> Result<()> {
        if self.model.is_spiking() {
            let num_neurons = self.spike_trains.len();
            let mut spike_trains = vec![vec![]; num_neurons];
            for spike in data.spike_events()? {
                if spike.target != 0 || spike.neuron >= num_neurons {
                    return Err(CosimError::ShapeMismatch(format!(
                        "{} cannot deliver a spike to neuron {} of target {} ({} neurons)",
                        self.label(),
                        spike.neuron,
                        spike.target,
                        num_neurons
                    )));
                }
                spike_trains[spike.neuron].push(spike.time);
            }
            self.spike_trains = spike_trains;
            trace!("{} delivers {} spikes", self.label(), self.number_of_spikes());
        } else {
            if data.row_len() != 1 {
                return Err(CosimError::ShapeMismatch(format!(
                    "{} expects a single value per time point, got values of shape {:?}",
                    self.label(),
                    data.shape()
                )));
            }
            self.amplitudes = data
                .time()
                .iter()
                .copied()
                .zip(data.values().iter().copied())
                .collect();
            trace!("{} delivers {} amplitudes", self.label(), self.amplitudes.len());
        }
        Ok(())
    }

    /// Returns the spike times delivered to every neuron.
    pub fn spike_trains(&self) -> &[Vec<f64>] {
        &self.spike_trains[..]
    }

    pub fn number_of_spikes(&self) -> usize {
        self.spike_trains.iter().map(|train| train.len()).sum()
    }

    /// Returns the (time, amplitude) pairs delivered to every neuron.
    pub fn amplitudes(&self) -> &[(f64, f64)] {
        &self.amplitudes[..]
    }
}
