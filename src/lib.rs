//! This crate provides the interface layer for co-simulating a whole-brain mean-field model (TVB)
//! with spiking neural networks simulating some of its regions, the *proxy* regions.
//!
//! # Describing an Interface
//!
//! An interface is described by an [`config::InterfaceConfig`], which binds TVB state variables to
//! spiking populations in both directions. Default descriptions of common models are available.
//!
//! ```rust
//! use tvb_cosim::builder::{ModelWiring, RedWongWangExcIOInhI};
//!
//! let config = RedWongWangExcIOInhI.interface_config(vec![0, 3]);
//!
//! assert_eq!(config.tvb_state_variables, vec!["S_e", "S_i", "R_e", "R_i"]);
//! assert_eq!(config.input_interfaces.len(), 1);
//! assert_eq!(config.output_interfaces.len(), 2);
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Building an Interface
//!
//! The builder resolves the description against the populations of a spiking network and creates
//! one device, one transformer and one transport per proxy region and state variable.
//!
//! ```rust
//! use tvb_cosim::builder::{BasalGangliaIzhikevich, InterfaceBuilder};
//! use tvb_cosim::connectivity::Connectivity;
//! use tvb_cosim::spiking_network::SpikingNetwork;
//!
//! let mut network = SpikingNetwork::new();
//! network.add_population("E", &[0, 1], 100).unwrap();
//!
//! let connectivity = Connectivity::uniform(4, 1.0, 2.0).unwrap();
//! let builder = InterfaceBuilder::from_wiring(&BasalGangliaIzhikevich, vec![0, 1], connectivity);
//! let interface = builder.build(&mut network).unwrap();
//!
//! assert_eq!(interface.inputs().len(), 2);
//! assert_eq!(interface.outputs().len(), 2);
//! assert!(network.input_device("in_R_0").is_some());
//! ```
//!
//! # Exchanging Data
//!
//! Each synchronization step pushes the TVB state to the spiking network, then pulls what the
//! spiking network recorded back into the external input of TVB. See [`interface::CoSimInterface`]
//! and [`cosimulator::CoSimulator`].
//!
//! ```rust
//! use ndarray::Array3;
//! use tvb_cosim::buffer::TimeValueBuffer;
//! use tvb_cosim::builder::{BasalGangliaIzhikevich, InterfaceBuilder};
//! use tvb_cosim::connectivity::Connectivity;
//! use tvb_cosim::interface::ExternalInput;
//! use tvb_cosim::spiking_network::SpikingNetwork;
//!
//! let mut network = SpikingNetwork::new();
//! network.add_population("E", &[0], 100).unwrap();
//! let connectivity = Connectivity::uniform(2, 1.0, 2.0).unwrap();
//! let mut interface = InterfaceBuilder::from_wiring(&BasalGangliaIzhikevich, vec![0], connectivity)
//!     .build(&mut network)
//!     .unwrap();
//!
//! // 10 TVB steps of a 1000 Hz rate in region 0
//! let time = (0..10).map(|i| i as f64 * 0.1).collect();
//! let state = TimeValueBuffer::new(time, Array3::from_elem((10, 2, 2), 1000.0).into_dyn()).unwrap();
//! interface.tvb_to_spiking(&state).unwrap();
//! assert!(network.input_device("in_R_0").unwrap().borrow().number_of_spikes() > 0);
//!
//! // nothing recorded, hence no rate
//! let mut external = ExternalInput::new(2, 2);
//! interface.spiking_to_tvb(&mut external).unwrap();
//! assert_eq!(external.time().len(), 10);
//! assert_eq!(external.values().sum(), 0.0);
//! ```

pub mod archive;
pub mod buffer;
pub mod builder;
pub mod communicator;
pub mod config;
pub mod connectivity;
pub mod cosimulator;
pub mod device;
pub mod error;
pub mod interface;
pub mod proxy;
pub mod spiking_network;
pub mod templates;
pub mod transformer;

/// The default synchronization time step (in ms).
pub const DEFAULT_DT: f64 = 0.1;
/// The extension of the archive files exchanged by file transports.
pub const ARCHIVE_EXTENSION: &str = "tvba";
/// The number of milliseconds in a second, to convert rates (in Hz) to probabilities per time step (in ms).
pub const MS_PER_SECOND: f64 = 1000.0;
/// The tolerance for two time points to be considered equal.
pub const TOLERANCE: f64 = 1e-9;
