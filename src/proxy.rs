//! Module implementing the proxy endpoints, binding a TVB state variable of a proxy region to spiking populations.
use std::fmt;
use std::rc::Rc;

use itertools::Itertools;
use log::debug;
use rand::Rng;

use crate::config::{InputInterfaceConfig, InterfaceConfig, OutputInterfaceConfig, TransformerSide};
use crate::connectivity::Connectivity;
use crate::device::{DeviceModel, InputModel, OutputModel, PopulationHandle};
use crate::error::{CosimError, Result};
use crate::spiking_network::PopulationRegistry;
use crate::transformer::registry::{ELEMENTARY, LINEAR_RATE, RATES_TO_SPIKES, SPIKES_TO_RATES};

/// The direction of the data flowing through an endpoint.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum Direction {
    TvbToSpiking,
    SpikingToTvb,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::TvbToSpiking => write!(f, "TVB -> spiking"),
            Direction::SpikingToTvb => write!(f, "spiking -> TVB"),
        }
    }
}

/// Synaptic parameters of the connections from an input device to its populations.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SynapticParams {
    pub weight: f64,
    pub delay: f64,
    pub receptor_type: usize,
}

/// The binding of one TVB state variable of one proxy region to spiking populations, in one direction.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub label: String,
    pub direction: Direction,
    pub region: usize,
    pub variable: String,
    /// The index of the variable in the TVB state array.
    pub variable_index: usize,
    pub populations: Vec<Rc<dyn PopulationHandle>>,
    pub model: DeviceModel,
    /// The key of the transformer in the registry.
    pub transformer: String,
    /// Where the transformer runs. No transformer is created for remote ones.
    pub side: TransformerSide,
    pub scale: f64,
    pub window: Option<f64>,
    /// Only for input endpoints.
    pub synapse: Option<SynapticParams>,
}

impl Endpoint {
    pub fn number_of_neurons(&self) -> usize {
        self.populations.iter().map(|p| p.number_of_neurons()).sum()
    }

    pub fn population_labels(&self) -> Vec<&str> {
        self.populations.iter().map(|p| p.label()).collect()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}[{}] <-> {} via {}",
            self.label,
            self.direction,
            self.variable,
            self.region,
            self.population_labels().join(", "),
            self.model,
        )?;
        match self.side {
            TransformerSide::Remote => write!(f, " (remote transformer)"),
            side => write!(f, " and {} on the {:?} side", self.transformer, side),
        }
    }
}

/// Returns the key of the default transformer of the given device model.
pub fn default_transformer(model: &DeviceModel) -> &'static str {
    match model {
        DeviceModel::Input(InputModel::Current) | DeviceModel::Input(InputModel::Rate) => LINEAR_RATE,
        DeviceModel::Input(InputModel::PoissonGenerator) | DeviceModel::Input(InputModel::SpikeGenerator) => {
            RATES_TO_SPIKES
        }
        DeviceModel::Output(OutputModel::SpikeRecorder) => SPIKES_TO_RATES,
        DeviceModel::Output(OutputModel::Multimeter { .. }) => ELEMENTARY,
    }
}

/// Returns the endpoint label of a variable of a region, e.g., `in_R_3`.
pub fn endpoint_label(direction: Direction, variable: &str, region: usize) -> String {
    match direction {
        Direction::TvbToSpiking => format!("in_{}_{}", variable, region),
        Direction::SpikingToTvb => format!("out_{}_{}", variable, region),
    }
}

/// Resolve the populations with the given labels in a region.
/// The function returns an error if any of them does not exist in that region.
fn resolve_populations(
    labels: &[String],
    region: usize,
    registry: &dyn PopulationRegistry,
) -> Result<Vec<Rc<dyn PopulationHandle>>> {
    labels
        .iter()
        .map(|label| {
            registry.population(label, region).ok_or_else(|| {
                CosimError::UnknownPopulation(format!("no population {:?} in region {}", label, region))
            })
        })
        .collect()
}

/// Build the endpoints of all input and output interfaces at all proxy regions.
///
/// Input endpoints come first, then output endpoints. Within each direction, endpoints follow the
/// declaration order of the interfaces, then ascending regions, such that building twice from the
/// same configuration yields the same endpoints in the same order. Random synaptic parameters are
/// drawn in that order.
pub fn build_endpoints<R: Rng>(
    config: &InterfaceConfig,
    connectivity: &Connectivity,
    registry: &dyn PopulationRegistry,
    rng: &mut R,
) -> Result<Vec<Endpoint>> {
    config.validate()?;
    let regions = config.proxy_inds.iter().copied().sorted().collect_vec();
    if let Some(region) = regions.iter().find(|r| **r >= connectivity.number_of_regions()) {
        return Err(CosimError::InvalidParameters(format!(
            "proxy region {} is out of the {} regions of the connectivity",
            region,
            connectivity.number_of_regions()
        )));
    }

    let mut endpoints = vec![];
    for (interface, &region) in config.input_interfaces.iter().cartesian_product(regions.iter()) {
        endpoints.push(input_endpoint(config, interface, region, connectivity, registry, rng)?);
    }
    for (interface, &region) in config.output_interfaces.iter().cartesian_product(regions.iter()) {
        endpoints.push(output_endpoint(config, interface, region, registry)?);
    }

    debug!("{} endpoints built for {} proxy regions", endpoints.len(), regions.len());
    Ok(endpoints)
}

fn input_endpoint<R: Rng>(
    config: &InterfaceConfig,
    interface: &InputInterfaceConfig,
    region: usize,
    connectivity: &Connectivity,
    registry: &dyn PopulationRegistry,
    rng: &mut R,
) -> Result<Endpoint> {
    let model = DeviceModel::Input(interface.model);
    // the device stands for the region itself
    let synapse = SynapticParams {
        weight: interface.weight.evaluate(region, region, connectivity, rng)?,
        delay: interface.delay.evaluate(region, region, connectivity, rng)?,
        receptor_type: interface.receptor.evaluate(region),
    };
    Ok(Endpoint {
        label: endpoint_label(Direction::TvbToSpiking, &interface.variable, region),
        direction: Direction::TvbToSpiking,
        region,
        variable: interface.variable.clone(),
        variable_index: config.variable_index(&interface.variable)?,
        populations: resolve_populations(&interface.populations, region, registry)?,
        transformer: interface
            .transformer
            .clone()
            .unwrap_or_else(|| default_transformer(&model).to_string()),
        model,
        side: interface.side,
        scale: interface.scale,
        window: None,
        synapse: Some(synapse),
    })
}

fn output_endpoint(
    config: &InterfaceConfig,
    interface: &OutputInterfaceConfig,
    region: usize,
    registry: &dyn PopulationRegistry,
) -> Result<Endpoint> {
    let model = DeviceModel::Output(interface.model.clone());
    Ok(Endpoint {
        label: endpoint_label(Direction::SpikingToTvb, &interface.variable, region),
        direction: Direction::SpikingToTvb,
        region,
        variable: interface.variable.clone(),
        variable_index: config.variable_index(&interface.variable)?,
        populations: resolve_populations(&interface.populations, region, registry)?,
        transformer: interface
            .transformer
            .clone()
            .unwrap_or_else(|| default_transformer(&model).to_string()),
        model,
        side: interface.side,
        scale: interface.scale,
        window: interface.window,
        synapse: None,
    })
}
