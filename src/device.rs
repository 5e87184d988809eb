//! Module implementing the devices through which the interface reads from and writes to the spiking network.
//!
//! A device is composed of its label, the populations it is connected to, and a dictionary of
//! parameters. Input devices stimulate their populations with what they receive from the
//! interface, output devices hold a backend recorder and expose its content.
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{CosimError, Result};

pub mod input;
pub mod output;

pub use input::{InputDevice, InputModel};
pub use output::{
    Events, MemoryRecorder, Multimeter, OutputDevice, OutputModel, RawEvent, Recorder,
    SharedOutputDevice, SpikeRecorder,
};

/// A population of the spiking network, as seen by the interface.
pub trait PopulationHandle: fmt::Debug {
    fn label(&self) -> &str;

    /// Returns the index of the brain region the population belongs to.
    fn region(&self) -> usize;

    fn number_of_neurons(&self) -> usize;
}

/// The part shared by all devices: label, connected populations and parameters.
#[derive(Debug, Clone)]
pub struct Device {
    label: String,
    populations: Vec<Rc<dyn PopulationHandle>>,
    params: BTreeMap<String, f64>,
}

impl Device {
    /// Create a device with the given parameters and their default values.
    /// Only these parameters can later be set or read.
    pub fn new(label: &str, populations: Vec<Rc<dyn PopulationHandle>>, defaults: &[(&str, f64)]) -> Self {
        Device {
            label: label.to_string(),
            populations,
            params: defaults.iter().map(|(key, value)| (key.to_string(), *value)).collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn populations(&self) -> &[Rc<dyn PopulationHandle>] {
        &self.populations[..]
    }

    /// Returns the total number of neurons of the connected populations.
    pub fn number_of_neurons(&self) -> usize {
        self.populations.iter().map(|p| p.number_of_neurons()).sum()
    }

    /// Returns the index of a neuron of the population with the given label, counting the neurons
    /// of all connected populations in order, or `None` if the device is not connected to it.
    pub fn neuron_index(&self, population: &str, neuron: usize) -> Option<usize> {
        let mut offset = 0;
        for p in self.populations.iter() {
            if p.label() == population {
                return (neuron < p.number_of_neurons()).then_some(offset + neuron);
            }
            offset += p.number_of_neurons();
        }
        None
    }

    /// Set the provided parameters.
    /// The function returns an error, and nothing is set, if any key is not a parameter of the device.
    pub fn set(&mut self, params: &BTreeMap<String, f64>) -> Result<()> {
        if let Some(key) = params.keys().find(|key| !self.params.contains_key(*key)) {
            return Err(CosimError::InvalidParameters(format!(
                "{} has no parameter {:?}",
                self.label, key
            )));
        }
        for (key, value) in params.iter() {
            self.params.insert(key.clone(), *value);
        }
        Ok(())
    }

    /// Returns the requested parameters, or all of them if no key is provided.
    /// The function returns an error if any key is not a parameter of the device.
    pub fn get(&self, keys: Option<&[&str]>) -> Result<BTreeMap<String, f64>> {
        match keys {
            None => Ok(self.params.clone()),
            Some(keys) => keys
                .iter()
                .map(|key| {
                    self.params
                        .get(*key)
                        .map(|value| (key.to_string(), *value))
                        .ok_or_else(|| {
                            CosimError::InvalidParameters(format!(
                                "{} has no parameter {:?}",
                                self.label, key
                            ))
                        })
                })
                .collect(),
        }
    }

    /// Returns the value of a single parameter.
    pub fn param(&self, key: &str) -> Result<f64> {
        self.params.get(key).copied().ok_or_else(|| {
            CosimError::InvalidParameters(format!("{} has no parameter {:?}", self.label, key))
        })
    }
}

/// Direction-independent description of a device model, used for logging.
#[derive(Debug, PartialEq, Clone)]
pub enum DeviceModel {
    Input(InputModel),
    Output(OutputModel),
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceModel::Input(model) => write!(f, "{}", model),
            DeviceModel::Output(model) => write!(f, "{}", model),
        }
    }
}
