//! Module implementing the co-simulation loop, alternating TVB and spiking network steps.
use log::info;

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};
use crate::interface::{CoSimInterface, ExternalInput};

/// A whole-brain mean-field simulator.
pub trait TvbSimulator {
    fn number_of_state_variables(&self) -> usize;

    fn number_of_regions(&self) -> usize;

    /// Advance by one synchronization step, given the external input from the spiking network
    /// over the previous step (empty on the first call).
    /// Returns the state of shape `[time, variable, region(, mode)]` over the step.
    fn advance(&mut self, external: &ExternalInput) -> Result<TimeValueBuffer>;
}

/// A spiking network simulator, reading the input devices and filling the output devices of the interface.
pub trait SpikingSimulator {
    /// Run the network over `[start, end)`.
    fn run(&mut self, start: f64, end: f64) -> Result<()>;
}

/// Both simulators and the interface between them.
pub struct CoSimulator<T: TvbSimulator, S: SpikingSimulator> {
    tvb: T,
    spiking: S,
    interface: CoSimInterface,
    external: ExternalInput,
}

impl<T: TvbSimulator, S: SpikingSimulator> CoSimulator<T, S> {
    pub fn new(tvb: T, spiking: S, interface: CoSimInterface) -> Self {
        let external = ExternalInput::new(tvb.number_of_state_variables(), tvb.number_of_regions());
        CoSimulator {
            tvb,
            spiking,
            interface,
            external,
        }
    }

    /// Run the given number of synchronization steps.
    pub fn run(&mut self, steps: usize) -> Result<()> {
        if steps == 0 {
            return Err(CosimError::InvalidParameters(
                "at least one synchronization step is required".to_string(),
            ));
        }
        for _ in 0..steps {
            self.step()?;
        }
        info!("Co-simulation of {} steps done", self.interface.steps());
        Ok(())
    }

    /// Run a single synchronization step.
    pub fn step(&mut self) -> Result<()> {
        let state = self.tvb.advance(&self.external)?;
        self.interface.tvb_to_spiking(&state)?;
        let (start, end) = self.interface.window()?;
        self.spiking.run(start, end)?;
        self.interface.spiking_to_tvb(&mut self.external)
    }

    pub fn tvb(&self) -> &T {
        &self.tvb
    }

    pub fn spiking(&self) -> &S {
        &self.spiking
    }

    pub fn interface(&self) -> &CoSimInterface {
        &self.interface
    }

    /// Returns the latest external input of TVB.
    pub fn external(&self) -> &ExternalInput {
        &self.external
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    struct Clock {
        time: f64,
        inputs: Vec<usize>,
    }

    impl TvbSimulator for Clock {
        fn number_of_state_variables(&self) -> usize {
            1
        }

        fn number_of_regions(&self) -> usize {
            2
        }

        fn advance(&mut self, external: &ExternalInput) -> Result<TimeValueBuffer> {
            self.inputs.push(external.time().len());
            let time = vec![self.time, self.time + 0.1];
            self.time += 0.2;
            TimeValueBuffer::new(time, Array3::zeros((2, 1, 2)).into_dyn())
        }
    }

    #[derive(Default)]
    struct Windows(Vec<(f64, f64)>);

    impl SpikingSimulator for Windows {
        fn run(&mut self, start: f64, end: f64) -> Result<()> {
            self.0.push((start, end));
            Ok(())
        }
    }

    #[test]
    fn test_run() {
        let interface = CoSimInterface::new(0.1, vec![], vec![]);
        let tvb = Clock { time: 0.0, inputs: vec![] };
        let mut cosim = CoSimulator::new(tvb, Windows::default(), interface);

        assert!(matches!(cosim.run(0), Err(CosimError::InvalidParameters(_))));
        cosim.run(3).unwrap();

        assert_eq!(cosim.interface().steps(), 3);
        assert_eq!(cosim.tvb().inputs, vec![0, 2, 2]);
        let windows = &cosim.spiking().0;
        assert_eq!(windows.len(), 3);
        assert!((windows[2].0 - 0.4).abs() < 1e-9);
        assert!((windows[2].1 - 0.6).abs() < 1e-9);
        assert_eq!(cosim.external().values().dim(), (2, 1, 2));
    }
}
