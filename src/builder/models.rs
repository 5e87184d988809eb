//! Default wirings of the TVB models supported out of the box.
use crate::config::{InputInterfaceConfig, InterfaceConfig, OutputInterfaceConfig};
use crate::device::{InputModel, OutputModel};

/// The default coupling of a TVB model to a spiking network.
pub trait ModelWiring {
    fn name(&self) -> &str;

    /// The state variables of the TVB model, in the order of the TVB state array.
    fn tvb_state_variables(&self) -> Vec<&'static str>;

    fn default_input_config(&self) -> Vec<InputInterfaceConfig>;

    fn default_output_config(&self) -> Vec<OutputInterfaceConfig>;

    /// Returns the full interface configuration at the given proxy regions.
    fn interface_config(&self, proxy_inds: Vec<usize>) -> InterfaceConfig {
        let mut config = InterfaceConfig::new(proxy_inds, &self.tvb_state_variables());
        config.input_interfaces = self.default_input_config();
        config.output_interfaces = self.default_output_config();
        config
    }
}

/// Rate model of the basal ganglia coupled to Izhikevich spiking populations.
///
/// The TVB rate `R` drives the excitatory population through Poisson generators, and the
/// population rate is fed back into the instantaneous input rate `Rin`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasalGangliaIzhikevich;

impl ModelWiring for BasalGangliaIzhikevich {
    fn name(&self) -> &str {
        "BasalGangliaIzhikevich"
    }

    fn tvb_state_variables(&self) -> Vec<&'static str> {
        vec!["R", "Rin"]
    }

    fn default_input_config(&self) -> Vec<InputInterfaceConfig> {
        vec![InputInterfaceConfig::new("R", &["E"], InputModel::PoissonGenerator)]
    }

    fn default_output_config(&self) -> Vec<OutputInterfaceConfig> {
        vec![OutputInterfaceConfig::new("Rin", &["E"], OutputModel::SpikeRecorder)]
    }
}

/// Reduced Wong-Wang model with excitatory and inhibitory populations.
///
/// The excitatory synaptic gating `S_e` is injected as a current into both populations, and the
/// rates of the populations are read back into `R_e` and `R_i`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedWongWangExcIOInhI;

impl ModelWiring for RedWongWangExcIOInhI {
    fn name(&self) -> &str {
        "ReducedWongWangExcIOInhI"
    }

    fn tvb_state_variables(&self) -> Vec<&'static str> {
        vec!["S_e", "S_i", "R_e", "R_i"]
    }

    fn default_input_config(&self) -> Vec<InputInterfaceConfig> {
        vec![InputInterfaceConfig::new("S_e", &["E", "I"], InputModel::Current)]
    }

    fn default_output_config(&self) -> Vec<OutputInterfaceConfig> {
        vec![
            OutputInterfaceConfig::new("R_e", &["E"], OutputModel::SpikeRecorder),
            OutputInterfaceConfig::new("R_i", &["I"], OutputModel::SpikeRecorder),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basal_ganglia() {
        let config = BasalGangliaIzhikevich.interface_config(vec![4, 5]);
        assert!(config.validate().is_ok());
        assert_eq!(config.variable_index("Rin").unwrap(), 1);
        assert_eq!(config.input_interfaces[0].model, InputModel::PoissonGenerator);
        assert_eq!(config.output_interfaces[0].model, OutputModel::SpikeRecorder);
    }

    #[test]
    fn test_red_wong_wang() {
        let wiring = RedWongWangExcIOInhI;
        let config = wiring.interface_config(vec![0]);
        assert!(config.validate().is_ok());
        assert_eq!(config.input_interfaces[0].populations, vec!["E".to_string(), "I".to_string()]);
        let outputs: Vec<_> = config.output_interfaces.iter().map(|c| c.variable.as_str()).collect();
        assert_eq!(outputs, vec!["R_e", "R_i"]);
    }
}
