//! Module implementing the builder of co-simulation interfaces.
//!
//! The builder resolves the endpoints of a configuration against a spiking backend, then creates
//! one device, one transformer and one transport per endpoint. All endpoints are resolved, all
//! device labels checked and all transformers created before any device is created in the backend,
//! such that a build failing for any of these reasons leaves the backend untouched.
use std::collections::BTreeMap;
use std::fs;

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::communicator::Transport;
use crate::config::{InterfaceConfig, TransformerSide, TransportConfig};
use crate::connectivity::Connectivity;
use crate::device::DeviceModel;
use crate::error::{CosimError, Result};
use crate::interface::{CoSimInterface, InputPipeline, OutputPipeline};
use crate::proxy::{build_endpoints, Direction, Endpoint};
use crate::spiking_network::{PopulationRegistry, SpikingBackend};
use crate::transformer::{SharedTransformer, TransformerContext, TransformerRegistry};
use crate::ARCHIVE_EXTENSION;

pub mod models;

pub use models::{BasalGangliaIzhikevich, ModelWiring, RedWongWangExcIOInhI};

#[derive(Debug)]
pub struct InterfaceBuilder {
    config: InterfaceConfig,
    connectivity: Connectivity,
    transformers: TransformerRegistry,
}

impl InterfaceBuilder {
    /// Create a builder with the built-in transformers.
    pub fn new(config: InterfaceConfig, connectivity: Connectivity) -> Self {
        InterfaceBuilder {
            config,
            connectivity,
            transformers: TransformerRegistry::new(),
        }
    }

    /// Create a builder with the default wiring of a model at the given proxy regions.
    pub fn from_wiring<W: ModelWiring>(wiring: &W, proxy_inds: Vec<usize>, connectivity: Connectivity) -> Self {
        InterfaceBuilder::new(wiring.interface_config(proxy_inds), connectivity)
    }

    /// Use the given transformer registry instead of the built-in one.
    pub fn with_transformers(mut self, transformers: TransformerRegistry) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut InterfaceConfig {
        &mut self.config
    }

    /// Resolve the endpoints of the configuration.
    /// Synaptic parameters are drawn from a generator seeded with the seed of the configuration.
    pub fn build_endpoints(&self, registry: &dyn PopulationRegistry) -> Result<Vec<Endpoint>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        build_endpoints(&self.config, &self.connectivity, registry, &mut rng)
    }

    /// Build the interface, creating its devices in the backend.
    pub fn build<B: SpikingBackend>(&self, backend: &mut B) -> Result<CoSimInterface> {
        let endpoints = self.build_endpoints(&*backend)?;
        if let Some(endpoint) = endpoints.iter().find(|e| backend.has_device(&e.label)) {
            return Err(CosimError::InvalidParameters(format!(
                "a device labelled {} already exists",
                endpoint.label
            )));
        }
        let transformers = endpoints
            .iter()
            .enumerate()
            .map(|(i, endpoint)| self.transformer(endpoint, i))
            .collect::<Result<Vec<_>>>()?;
        if let TransportConfig::File { dir } = &self.config.transport {
            fs::create_dir_all(dir)?;
        }

        let mut inputs = vec![];
        let mut outputs = vec![];
        for (endpoint, transformer) in endpoints.into_iter().zip(transformers) {
            let transport = self.transport(&endpoint.label);
            debug!("{}", endpoint);

            match (&endpoint.direction, &endpoint.model) {
                (Direction::TvbToSpiking, DeviceModel::Input(model)) => {
                    let device = backend.create_input_device(&endpoint.label, *model, endpoint.populations.clone())?;
                    if let Some(synapse) = endpoint.synapse {
                        let params = BTreeMap::from([
                            ("weight".to_string(), synapse.weight),
                            ("delay".to_string(), synapse.delay),
                            ("receptor_type".to_string(), synapse.receptor_type as f64),
                        ]);
                        device.borrow_mut().device_mut().set(&params)?;
                    }
                    inputs.push(InputPipeline::new(endpoint, transport, transformer, device));
                }
                (Direction::SpikingToTvb, DeviceModel::Output(model)) => {
                    let device = backend.create_output_device(&endpoint.label, model, endpoint.populations.clone())?;
                    outputs.push(OutputPipeline::new(endpoint, device, transformer, transport));
                }
                (direction, model) => {
                    return Err(CosimError::InvalidParameters(format!(
                        "{} device cannot be used in direction {}",
                        model, direction
                    )))
                }
            }
        }

        info!(
            "Interface built with {} input and {} output pipelines at regions {:?}",
            inputs.len(),
            outputs.len(),
            self.config.proxy_inds
        );
        Ok(CoSimInterface::new(self.config.dt, inputs, outputs))
    }

    /// Create the transformer of the i-th endpoint, unless it runs outside of the interface.
    fn transformer(&self, endpoint: &Endpoint, i: usize) -> Result<Option<SharedTransformer>> {
        if endpoint.side == TransformerSide::Remote {
            return Ok(None);
        }
        if !self.transformers.contains(&endpoint.transformer) {
            return Err(CosimError::InvalidParameters(format!(
                "no transformer registered under {:?} for {}",
                endpoint.transformer, endpoint.label
            )));
        }
        let ctx = TransformerContext {
            label: endpoint.label.clone(),
            dt: self.config.dt,
            number_of_neurons: endpoint.number_of_neurons(),
            scale: endpoint.scale,
            window: endpoint.window,
            seed: self.config.seed,
            // stream 0 draws the synaptic parameters
            stream: i as u64 + 1,
        };
        self.transformers.create(&endpoint.transformer, &ctx).map(Some)
    }

    fn transport(&self, label: &str) -> Transport {
        match &self.config.transport {
            TransportConfig::Memory => Transport::memory(label),
            TransportConfig::File { dir } => Transport::file(dir.join(format!("{}.{}", label, ARCHIVE_EXTENSION))),
            TransportConfig::Channel => Transport::channel(label),
        }
    }
}
