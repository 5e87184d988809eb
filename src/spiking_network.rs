//! Module implementing the spiking network side of the interface: population lookup and device creation.
//!
//! The [`SpikingNetwork`] is an in-memory backend: it registers populations per region and owns
//! the devices created by the interface builder. A simulator driving the network reads the input
//! devices and fills the output devices.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::debug;

use crate::device::output::new_output_device;
use crate::device::{InputDevice, InputModel, OutputModel, PopulationHandle, SharedOutputDevice};
use crate::error::{CosimError, Result};

/// A population of neurons within a single brain region.
#[derive(Debug, PartialEq, Clone)]
pub struct NodePopulation {
    label: String,
    region: usize,
    size: usize,
}

impl NodePopulation {
    pub fn new(label: &str, region: usize, size: usize) -> Self {
        NodePopulation {
            label: label.to_string(),
            region,
            size,
        }
    }
}

impl PopulationHandle for NodePopulation {
    fn label(&self) -> &str {
        &self.label
    }

    fn region(&self) -> usize {
        self.region
    }

    fn number_of_neurons(&self) -> usize {
        self.size
    }
}

/// Lookup of spiking populations by label and region.
pub trait PopulationRegistry {
    /// Returns the population with the given label in the given region, if any.
    fn population(&self, label: &str, region: usize) -> Option<Rc<dyn PopulationHandle>>;

    /// Returns the labels of all populations, without duplicates.
    fn labels(&self) -> Vec<String>;
}

/// A spiking network able to host the devices of the interface.
pub trait SpikingBackend: PopulationRegistry {
    /// Returns true if a device with the given label already exists.
    fn has_device(&self, label: &str) -> bool;

    fn create_input_device(
        &mut self,
        label: &str,
        model: InputModel,
        populations: Vec<Rc<dyn PopulationHandle>>,
    ) -> Result<Rc<RefCell<InputDevice>>>;

    fn create_output_device(
        &mut self,
        label: &str,
        model: &OutputModel,
        populations: Vec<Rc<dyn PopulationHandle>>,
    ) -> Result<SharedOutputDevice>;
}

#[derive(Debug, Default)]
pub struct SpikingNetwork {
    populations: BTreeMap<(String, usize), Rc<NodePopulation>>,
    input_devices: BTreeMap<String, Rc<RefCell<InputDevice>>>,
    output_devices: BTreeMap<String, SharedOutputDevice>,
}

impl SpikingNetwork {
    pub fn new() -> Self {
        SpikingNetwork::default()
    }

    /// Add a population with the given label and number of neurons to every listed region.
    /// The function returns an error if the population is empty or already exists in one of the regions.
    pub fn add_population(&mut self, label: &str, regions: &[usize], size: usize) -> Result<()> {
        if size == 0 {
            return Err(CosimError::InvalidParameters(format!(
                "population {} must have at least one neuron",
                label
            )));
        }
        if let Some(region) = regions
            .iter()
            .find(|region| self.populations.contains_key(&(label.to_string(), **region)))
        {
            return Err(CosimError::InvalidParameters(format!(
                "population {} already exists in region {}",
                label, region
            )));
        }
        for &region in regions.iter() {
            self.populations.insert(
                (label.to_string(), region),
                Rc::new(NodePopulation::new(label, region, size)),
            );
        }
        debug!("Population {} of {} neurons added to regions {:?}", label, size, regions);
        Ok(())
    }

    /// Returns the total number of neurons of the network.
    pub fn number_of_neurons(&self) -> usize {
        self.populations.values().map(|p| p.number_of_neurons()).sum()
    }

    pub fn input_device(&self, label: &str) -> Option<Rc<RefCell<InputDevice>>> {
        self.input_devices.get(label).cloned()
    }

    pub fn output_device(&self, label: &str) -> Option<SharedOutputDevice> {
        self.output_devices.get(label).cloned()
    }

    /// Returns the input devices, ordered by label.
    pub fn input_devices(&self) -> impl Iterator<Item = &Rc<RefCell<InputDevice>>> + '_ {
        self.input_devices.values()
    }

    /// Returns the output devices, ordered by label.
    pub fn output_devices(&self) -> impl Iterator<Item = &SharedOutputDevice> + '_ {
        self.output_devices.values()
    }

    fn check_device_label(&self, label: &str) -> Result<()> {
        if self.has_device(label) {
            return Err(CosimError::InvalidParameters(format!(
                "a device labelled {} already exists",
                label
            )));
        }
        Ok(())
    }
}

impl PopulationRegistry for SpikingNetwork {
    fn population(&self, label: &str, region: usize) -> Option<Rc<dyn PopulationHandle>> {
        self.populations
            .get(&(label.to_string(), region))
            .map(|p| p.clone() as Rc<dyn PopulationHandle>)
    }

    fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.populations.keys().map(|(label, _)| label.clone()).collect();
        labels.dedup();
        labels
    }
}

impl SpikingBackend for SpikingNetwork {
    fn has_device(&self, label: &str) -> bool {
        self.input_devices.contains_key(label) || self.output_devices.contains_key(label)
    }
    fn create_input_device(
        &mut self,
        label: &str,
        model: InputModel,
        populations: Vec<Rc<dyn PopulationHandle>>,
    ) -> Result<Rc<RefCell<InputDevice>>> {
        self.check_device_label(label)?;
        let device = Rc::new(RefCell::new(InputDevice::new(label, model, populations)));
        self.input_devices.insert(label.to_string(), device.clone());
        debug!("Input device {} ({}) created", label, model);
        Ok(device)
    }

    fn create_output_device(
        &mut self,
        label: &str,
        model: &OutputModel,
        populations: Vec<Rc<dyn PopulationHandle>>,
    ) -> Result<SharedOutputDevice> {
        self.check_device_label(label)?;
        let device = new_output_device(label, model, populations);
        self.output_devices.insert(label.to_string(), device.clone());
        debug!("Output device {} ({}) created", label, model);
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{OutputDevice, RawEvent};

    #[test]
    fn test_populations() {
        let mut network = SpikingNetwork::new();
        network.add_population("E", &[0, 1], 80).unwrap();
        network.add_population("I", &[1], 20).unwrap();

        assert_eq!(network.labels(), vec!["E".to_string(), "I".to_string()]);
        assert_eq!(network.number_of_neurons(), 180);
        assert_eq!(network.population("E", 1).unwrap().number_of_neurons(), 80);
        assert!(network.population("I", 0).is_none());
        assert!(network.population("X", 0).is_none());

        assert!(matches!(network.add_population("E", &[2, 1], 10), Err(CosimError::InvalidParameters(_))));
        assert!(network.population("E", 2).is_none());
        assert!(matches!(network.add_population("X", &[0], 0), Err(CosimError::InvalidParameters(_))));
    }

    #[test]
    fn test_devices() {
        let mut network = SpikingNetwork::new();
        network.add_population("E", &[0], 10).unwrap();
        let populations = vec![network.population("E", 0).unwrap()];

        let input = network
            .create_input_device("in_R_0", InputModel::PoissonGenerator, populations.clone())
            .unwrap();
        assert_eq!(input.borrow().spike_trains().len(), 10);
        assert!(network.has_device("in_R_0"));
        assert!(!network.has_device("out_R_0"));
        assert!(matches!(
            network.create_output_device("in_R_0", &OutputModel::SpikeRecorder, populations.clone()),
            Err(CosimError::InvalidParameters(_))
        ));

        let output = network
            .create_output_device("out_R_0", &OutputModel::SpikeRecorder, populations)
            .unwrap();
        network
            .output_device("out_R_0")
            .unwrap()
            .borrow_mut()
            .record(RawEvent::spike(0.1, "E", 3))
            .unwrap();
        // the network and the interface share the device
        assert_eq!(output.borrow().number_of_events(), 1);
        assert_eq!(network.output_devices().count(), 1);
        assert_eq!(network.input_devices().count(), 1);
    }
}
