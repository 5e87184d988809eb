//! Serializable description of a co-simulation interface.
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::{InputModel, OutputModel};
use crate::error::{CosimError, Result};
use crate::templates::{DelayRule, ReceptorRule, WeightRule};
use crate::DEFAULT_DT;

fn default_dt() -> f64 {
    DEFAULT_DT
}

fn default_scale() -> f64 {
    1.0
}

/// Where the transformer of a pipeline runs, relative to the transport between both simulators.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformerSide {
    /// Next to the spiking network: after the transport for inputs, before it for outputs.
    #[default]
    Spiking,
    /// Next to TVB: before the transport for inputs, after it for outputs.
    Tvb,
    /// Outside of the interface, e.g., in another process: the data crosses the interface as is.
    /// Only devices taking or producing continuous values can be used without transformer.
    Remote,
}

/// An interface from a TVB state variable to spiking populations, instantiated once per proxy region.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InputInterfaceConfig {
    /// The TVB state variable read at every proxy region.
    pub variable: String,
    /// The labels of the target populations.
    pub populations: Vec<String>,
    /// The model of the input device.
    pub model: InputModel,
    /// The key of the transformer in the registry, or the default one of the model if not provided.
    #[serde(default)]
    pub transformer: Option<String>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub weight: WeightRule,
    #[serde(default)]
    pub delay: DelayRule,
    #[serde(default)]
    pub receptor: ReceptorRule,
    #[serde(default)]
    pub side: TransformerSide,
}

impl InputInterfaceConfig {
    pub fn new(variable: &str, populations: &[&str], model: InputModel) -> Self {
        InputInterfaceConfig {
            variable: variable.to_string(),
            populations: populations.iter().map(|p| p.to_string()).collect(),
            model,
            transformer: None,
            scale: default_scale(),
            weight: WeightRule::default(),
            delay: DelayRule::default(),
            receptor: ReceptorRule::default(),
            side: TransformerSide::default(),
        }
    }
}

/// An interface from spiking populations to a TVB state variable, instantiated once per proxy region.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputInterfaceConfig {
    /// The TVB state variable updated at every proxy region.
    pub variable: String,
    /// The labels of the source populations.
    pub populations: Vec<String>,
    /// The model of the output device.
    pub model: OutputModel,
    /// The key of the transformer in the registry, or the default one of the model if not provided.
    #[serde(default)]
    pub transformer: Option<String>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// The rate estimation window (in ms), one time step if not provided.
    /// The window may span several synchronization steps.
    #[serde(default)]
    pub window: Option<f64>,
    #[serde(default)]
    pub side: TransformerSide,
}

impl OutputInterfaceConfig {
    pub fn new(variable: &str, populations: &[&str], model: OutputModel) -> Self {
        OutputInterfaceConfig {
            variable: variable.to_string(),
            populations: populations.iter().map(|p| p.to_string()).collect(),
            model,
            transformer: None,
            scale: default_scale(),
            window: None,
            side: TransformerSide::default(),
        }
    }
}

/// The medium carrying the data between both simulators.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// In-process memory.
    #[default]
    Memory,
    /// Archive files in the given directory, one per pipeline.
    File { dir: PathBuf },
    /// Channels, as with a simulator running in another thread.
    Channel,
}

/// The description of a co-simulation interface.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// The synchronization time step (in ms).
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// The indices of the regions simulated by the spiking network.
    pub proxy_inds: Vec<usize>,
    /// The state variables of the TVB model, in the order of the TVB state array.
    pub tvb_state_variables: Vec<String>,
    #[serde(default)]
    pub input_interfaces: Vec<InputInterfaceConfig>,
    #[serde(default)]
    pub output_interfaces: Vec<OutputInterfaceConfig>,
    #[serde(default)]
    pub transport: TransportConfig,
    /// The seed of all random draws of the interface.
    #[serde(default)]
    pub seed: u64,
}

impl InterfaceConfig {
    pub fn new(proxy_inds: Vec<usize>, tvb_state_variables: &[&str]) -> Self {
        InterfaceConfig {
            dt: DEFAULT_DT,
            proxy_inds,
            tvb_state_variables: tvb_state_variables.iter().map(|v| v.to_string()).collect(),
            input_interfaces: vec![],
            output_interfaces: vec![],
            transport: TransportConfig::default(),
            seed: 0,
        }
    }

    /// Run the transformers of all input and all output interfaces on the given sides.
    pub fn with_transformer_sides(mut self, input: TransformerSide, output: TransformerSide) -> Self {
        for interface in self.input_interfaces.iter_mut() {
            interface.side = input;
        }
        for interface in self.output_interfaces.iter_mut() {
            interface.side = output;
        }
        self
    }

    /// Returns the index of the given state variable.
    pub fn variable_index(&self, variable: &str) -> Result<usize> {
        self.tvb_state_variables
            .iter()
            .position(|v| v == variable)
            .ok_or_else(|| {
                CosimError::InvalidParameters(format!("{:?} is not a TVB state variable", variable))
            })
    }

    /// Check the consistency of the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(CosimError::InvalidParameters(format!(
                "synchronization time step must be positive, got {}",
                self.dt
            )));
        }
        if self.proxy_inds.is_empty() {
            return Err(CosimError::InvalidParameters(
                "at least one proxy region is required".to_string(),
            ));
        }
        if self.proxy_inds.iter().collect::<BTreeSet<_>>().len() != self.proxy_inds.len() {
            return Err(CosimError::InvalidParameters(format!(
                "duplicate proxy regions in {:?}",
                self.proxy_inds
            )));
        }

        for interface in self.input_interfaces.iter() {
            check_remote(interface.side, &interface.transformer, interface.model.is_spiking(), &interface.variable)?;
        }
        for interface in self.output_interfaces.iter() {
            let spiking = interface.model == OutputModel::SpikeRecorder;
            check_remote(interface.side, &interface.transformer, spiking, &interface.variable)?;
        }

        let inputs = self
            .input_interfaces
            .iter()
            .map(|c| (&c.variable, &c.populations, c.scale, None));
        let outputs = self
            .output_interfaces
            .iter()
            .map(|c| (&c.variable, &c.populations, c.scale, c.window));
        for (direction, interfaces) in [("input", inputs.collect::<Vec<_>>()), ("output", outputs.collect())] {
            let mut variables = BTreeSet::new();
            for (variable, populations, scale, window) in interfaces {
                self.variable_index(variable)?;
                if !variables.insert(variable) {
                    return Err(CosimError::InvalidParameters(format!(
                        "more than one {} interface for {:?}",
                        direction, variable
                    )));
                }
                if populations.is_empty() {
                    return Err(CosimError::InvalidParameters(format!(
                        "{} interface for {:?} has no population",
                        direction, variable
                    )));
                }
                if !scale.is_finite() {
                    return Err(CosimError::InvalidParameters(format!(
                        "{} interface for {:?} has a non-finite scale",
                        direction, variable
                    )));
                }
                if let Some(window) = window {
                    if !(window >= self.dt) {
                        return Err(CosimError::InvalidParameters(format!(
                            "window of {} interface for {:?} is shorter than the time step",
                            direction, variable
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Save the configuration to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a configuration from a JSON file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Check that an interface without transformer neither names one nor exchanges spikes.
fn check_remote(side: TransformerSide, transformer: &Option<String>, spiking: bool, variable: &str) -> Result<()> {
    if side != TransformerSide::Remote {
        return Ok(());
    }
    if let Some(transformer) = transformer {
        return Err(CosimError::InvalidParameters(format!(
            "interface for {:?} has no transformer in the interface but names {:?}",
            variable, transformer
        )));
    }
    if spiking {
        return Err(CosimError::InvalidParameters(format!(
            "interface for {:?} exchanges spikes and cannot do without transformer",
            variable
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn config() -> InterfaceConfig {
        let mut config = InterfaceConfig::new(vec![0, 1], &["R", "Rin"]);
        config
            .input_interfaces
            .push(InputInterfaceConfig::new("R", &["E"], InputModel::PoissonGenerator));
        config
            .output_interfaces
            .push(OutputInterfaceConfig::new("Rin", &["E"], OutputModel::SpikeRecorder));
        config
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let mut invalid = config();
        invalid.dt = 0.0;
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.proxy_inds = vec![1, 1];
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.proxy_inds = vec![];
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.input_interfaces.push(InputInterfaceConfig::new("R", &["I"], InputModel::Current));
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.output_interfaces[0].variable = "V".to_string();
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.output_interfaces[0].populations.clear();
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.output_interfaces[0].window = Some(0.01);
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.input_interfaces[0].side = TransformerSide::Remote;
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = config();
        invalid.output_interfaces[0].side = TransformerSide::Remote;
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));

        let mut invalid = InterfaceConfig::new(vec![0], &["S_e"]);
        let mut input = InputInterfaceConfig::new("S_e", &["E"], InputModel::Current);
        input.transformer = Some("linear_rate".to_string());
        input.side = TransformerSide::Remote;
        invalid.input_interfaces.push(input);
        assert!(matches!(invalid.validate(), Err(CosimError::InvalidParameters(_))));
        invalid.input_interfaces[0].transformer = None;
        assert!(invalid.validate().is_ok());

        // the same variable may be used in both directions
        let mut valid = config();
        valid.output_interfaces[0].variable = "R".to_string();
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_save_load() {
        let mut config = config();
        config.transport = TransportConfig::File { dir: PathBuf::from("/tmp/cosim") };
        config.input_interfaces[0].weight = WeightRule::TvbWeight { scale: 2.0 };
        config.seed = 7;
        let config = config.with_transformer_sides(TransformerSide::Tvb, TransformerSide::Spiking);
        assert_eq!(config.input_interfaces[0].side, TransformerSide::Tvb);

        let file = NamedTempFile::new().unwrap();
        config.save_to(file.path()).unwrap();
        assert_eq!(InterfaceConfig::load_from(file.path()).unwrap(), config);
    }

    #[test]
    fn test_load_defaults() {
        let json = r#"{
            "proxy_inds": [3],
            "tvb_state_variables": ["S_e"],
            "input_interfaces": [{"variable": "S_e", "populations": ["E", "I"], "model": "current"}]
        }"#;
        let config: InterfaceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.dt, DEFAULT_DT);
        assert_eq!(config.transport, TransportConfig::Memory);
        assert_eq!(config.input_interfaces[0].scale, 1.0);
        assert_eq!(config.input_interfaces[0].transformer, None);
        assert_eq!(config.input_interfaces[0].side, TransformerSide::Spiking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"proxy_inds\": ").unwrap();
        assert!(matches!(InterfaceConfig::load_from(file.path()), Err(CosimError::ConfigError(_))));
        assert!(matches!(InterfaceConfig::load_from("/nonexistent/config.json"), Err(CosimError::IOError(_))));
    }
}
