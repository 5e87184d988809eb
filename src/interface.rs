//! Module implementing the co-simulation interface, exchanging data between both simulators in lock step.
//!
//! Every synchronization step is made of two exchanges, which must alternate:
//! 1. [`CoSimInterface::tvb_to_spiking`] pushes the TVB state of the proxy regions to the input
//!    devices of the spiking network,
//! 2. [`CoSimInterface::spiking_to_tvb`] pulls what the output devices recorded meanwhile and writes
//!    it to the external input of TVB for the next step.
use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace};
use ndarray::{Array3, Axis, Ix3};

use crate::buffer::TimeValueBuffer;
use crate::communicator::{GetFromTransformer, Receiver, SetToTransformer, Sender, Transport};
use crate::config::TransformerSide;
use crate::device::{InputDevice, SharedOutputDevice};
use crate::error::{CosimError, Result};
use crate::proxy::Endpoint;
use crate::transformer::SharedTransformer;

/// The exchange the interface is waiting for.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Phase {
    AwaitingTvbStep,
    AwaitingSpikingStep,
}

/// The input of the spiking network to TVB, of shape `[time, variable, region]`.
#[derive(Debug, PartialEq, Clone)]
pub struct ExternalInput {
    time: Vec<f64>,
    values: Array3<f64>,
}

impl ExternalInput {
    /// Create an empty external input (no time point) for the given number of variables and regions.
    pub fn new(number_of_state_variables: usize, number_of_regions: usize) -> Self {
        ExternalInput {
            time: vec![],
            values: Array3::zeros((0, number_of_state_variables, number_of_regions)),
        }
    }

    /// Set all values to zero over the given time points.
    pub fn reset(&mut self, time: Vec<f64>) {
        let (_, num_variables, num_regions) = self.values.dim();
        self.values = Array3::zeros((time.len(), num_variables, num_regions));
        self.time = time;
    }

    /// Write the data, with a single value per time point, to a variable of a region.
    /// The function returns an error if the data does not fit the external input.
    pub fn write(&mut self, variable: usize, region: usize, data: &TimeValueBuffer) -> Result<()> {
        let (num_steps, num_variables, num_regions) = self.values.dim();
        if variable >= num_variables || region >= num_regions {
            return Err(CosimError::ShapeMismatch(format!(
                "no variable {} of region {} in an external input of {} variables and {} regions",
                variable, region, num_variables, num_regions
            )));
        }
        if data.len() != num_steps || data.row_len() != 1 {
            return Err(CosimError::ShapeMismatch(format!(
                "cannot write values of shape {:?} to {} time points",
                data.shape(),
                num_steps
            )));
        }
        for (t, value) in data.values().iter().enumerate() {
            self.values[[t, variable, region]] = *value;
        }
        Ok(())
    }

    pub fn time(&self) -> &[f64] {
        &self.time[..]
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Extract the values of a variable of a region from a TVB state of shape `[time, variable, region]`
/// or `[time, variable, region, mode]` (first mode), as a `[time, 1]` buffer.
pub fn slice_state(state: &TimeValueBuffer, variable: usize, region: usize) -> Result<TimeValueBuffer> {
    let shape = state.shape();
    if shape.len() != 3 && shape.len() != 4 {
        return Err(CosimError::ShapeMismatch(format!(
            "TVB state must have shape [time, variable, region(, mode)], got {:?}",
            shape
        )));
    }
    if variable >= shape[1] || region >= shape[2] || (shape.len() == 4 && shape[3] == 0) {
        return Err(CosimError::ShapeMismatch(format!(
            "no variable {} of region {} in TVB state of shape {:?}",
            variable, region, shape
        )));
    }

    let mut values = state.values().view();
    if shape.len() == 4 {
        values = values.index_axis_move(Axis(3), 0);
    }
    let values = values
        .into_dimensionality::<Ix3>()
        .map_err(|e| CosimError::ShapeMismatch(e.to_string()))?;
    let column = values
        .index_axis(Axis(2), region)
        .index_axis(Axis(1), variable)
        .to_owned()
        .insert_axis(Axis(1));
    TimeValueBuffer::new(state.time().to_vec(), column.into_dyn())
}

/// A transformer with the communicators feeding and draining it.
struct TransformerStage {
    transformer: SharedTransformer,
    to_transformer: SetToTransformer,
    from_transformer: GetFromTransformer,
}

impl TransformerStage {
    fn new(transformer: SharedTransformer) -> Self {
        TransformerStage {
            to_transformer: SetToTransformer::new(transformer.clone()),
            from_transformer: GetFromTransformer::new(transformer.clone()),
            transformer,
        }
    }

    fn run(&mut self, data: &TimeValueBuffer) -> Result<TimeValueBuffer> {
        self.to_transformer.send(data)?;
        self.transformer.borrow_mut().transform()?;
        self.from_transformer.receive()
    }
}

/// Run the stage, if any and if it runs on the given side.
fn transform_on(
    stage: &mut Option<TransformerStage>,
    endpoint: &Endpoint,
    side: TransformerSide,
    data: TimeValueBuffer,
) -> Result<TimeValueBuffer> {
    match stage {
        Some(stage) if endpoint.side == side => stage.run(&data),
        _ => Ok(data),
    }
}

/// The path of the data from TVB to an input device.
///
/// The transformer runs before the transport if it sits on the TVB side, after it if it sits on
/// the spiking side. Without transformer, the TVB state reaches the device as is.
pub struct InputPipeline {
    endpoint: Endpoint,
    transport: Transport,
    stage: Option<TransformerStage>,
    device: Rc<RefCell<InputDevice>>,
}

impl InputPipeline {
    pub fn new(
        endpoint: Endpoint,
        transport: Transport,
        transformer: Option<SharedTransformer>,
        device: Rc<RefCell<InputDevice>>,
    ) -> Self {
        InputPipeline {
            endpoint,
            transport,
            stage: transformer.map(TransformerStage::new),
            device,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transformer(&self) -> Option<&SharedTransformer> {
        self.stage.as_ref().map(|stage| &stage.transformer)
    }

    pub fn device(&self) -> &Rc<RefCell<InputDevice>> {
        &self.device
    }

    fn run(&mut self, state: &TimeValueBuffer) -> Result<()> {
        let data = slice_state(state, self.endpoint.variable_index, self.endpoint.region)?;
        let data = transform_on(&mut self.stage, &self.endpoint, TransformerSide::Tvb, data)?;
        let data = self.transport.transfer(&data)?;
        let data = transform_on(&mut self.stage, &self.endpoint, TransformerSide::Spiking, data)?;
        self.device.borrow_mut().apply(&data)?;
        trace!("{} done", self.endpoint.label);
        Ok(())
    }
}

/// The path of the data from an output device to TVB.
///
/// The transformer runs before the transport if it sits on the spiking side, after it if it sits
/// on the TVB side. A transformer depending on past input, such as a rate estimation window, is
/// fed with the bins of the previous steps it needs, and only the bins of the current step are
/// written to TVB.
pub struct OutputPipeline {
    endpoint: Endpoint,
    device: SharedOutputDevice,
    stage: Option<TransformerStage>,
    transport: Transport,
}

impl OutputPipeline {
    pub fn new(
        endpoint: Endpoint,
        device: SharedOutputDevice,
        transformer: Option<SharedTransformer>,
        transport: Transport,
    ) -> Self {
        OutputPipeline {
            endpoint,
            device,
            stage: transformer.map(TransformerStage::new),
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transformer(&self) -> Option<&SharedTransformer> {
        self.stage.as_ref().map(|stage| &stage.transformer)
    }

    pub fn device(&self) -> &SharedOutputDevice {
        &self.device
    }

    /// Read the window `[start, end)` into the external input. Nothing before `origin`, the start
    /// of the co-simulation, is read.
    fn run(&mut self, start: f64, end: f64, dt: f64, origin: f64, external: &mut ExternalInput) -> Result<()> {
        let history = self.transformer().map_or(0.0, |t| t.borrow().history());
        let read_start = (start - history).max(origin);
        let lookback = ((start - read_start) / dt).round() as usize;

        let data = self.device.borrow().readout(read_start, end, dt)?;
        let data = transform_on(&mut self.stage, &self.endpoint, TransformerSide::Spiking, data)?;
        let data = self.transport.transfer(&data)?;
        let data = transform_on(&mut self.stage, &self.endpoint, TransformerSide::Tvb, data)?;
        external.write(self.endpoint.variable_index, self.endpoint.region, &data.skip(lookback))?;
        trace!("{} done, {} bins read back", self.endpoint.label, lookback);
        Ok(())
    }
}

/// The co-simulation interface, made of one pipeline per endpoint.
pub struct CoSimInterface {
    dt: f64,
    phase: Phase,
    inputs: Vec<InputPipeline>,
    outputs: Vec<OutputPipeline>,
    window: Option<(f64, f64)>,
    /// The start of the first synchronization step.
    origin: Option<f64>,
    steps: usize,
}

impl CoSimInterface {
    pub fn new(dt: f64, inputs: Vec<InputPipeline>, outputs: Vec<OutputPipeline>) -> Self {
        CoSimInterface {
            dt,
            phase: Phase::AwaitingTvbStep,
            inputs,
            outputs,
            window: None,
            origin: None,
            steps: 0,
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn inputs(&self) -> &[InputPipeline] {
        &self.inputs[..]
    }

    pub fn outputs(&self) -> &[OutputPipeline] {
        &self.outputs[..]
    }

    /// Returns the number of completed synchronization steps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Returns the time window `[start, end)` the spiking network has to run over, once the TVB
    /// state has been pushed.
    pub fn window(&self) -> Result<(f64, f64)> {
        match (self.phase, self.window) {
            (Phase::AwaitingSpikingStep, Some(window)) => Ok(window),
            _ => Err(CosimError::PhaseViolation(
                "no spiking step is pending".to_string(),
            )),
        }
    }

    /// Push the TVB state of shape `[time, variable, region(, mode)]` to the spiking network.
    /// The function returns an error if the previous spiking step has not been pulled yet.
    pub fn tvb_to_spiking(&mut self, state: &TimeValueBuffer) -> Result<()> {
        if self.phase != Phase::AwaitingTvbStep {
            return Err(CosimError::PhaseViolation(
                "the spiking step must be pulled before the next TVB step is pushed".to_string(),
            ));
        }
        let (start, last) = match (state.time().first(), state.time().last()) {
            (Some(start), Some(last)) => (*start, *last),
            _ => {
                return Err(CosimError::ShapeMismatch(
                    "TVB state has no time point".to_string(),
                ))
            }
        };

        for pipeline in self.inputs.iter_mut() {
            pipeline.run(state)?;
        }

        self.window = Some((start, last + self.dt));
        self.origin.get_or_insert(start);
        self.phase = Phase::AwaitingSpikingStep;
        trace!("TVB step [{}, {}) pushed, awaiting spiking step", start, last + self.dt);
        Ok(())
    }

    /// Pull what the spiking network recorded over the current window into the external input of TVB.
    /// The function returns an error if no TVB step has been pushed since the last pull.
    pub fn spiking_to_tvb(&mut self, external: &mut ExternalInput) -> Result<()> {
        let (start, end) = self.window().map_err(|_| {
            CosimError::PhaseViolation("a TVB step must be pushed before the spiking step is pulled".to_string())
        })?;

        let origin = self.origin.unwrap_or(start);
        let num_bins = ((end - start) / self.dt).round() as usize;
        external.reset((0..num_bins).map(|i| start + i as f64 * self.dt).collect());
        for pipeline in self.outputs.iter_mut() {
            pipeline.run(start, end, self.dt, origin, external)?;
        }

        self.phase = Phase::AwaitingTvbStep;
        self.steps += 1;
        debug!(
            "Synchronization step {} over [{}, {}) done ({} inputs, {} outputs)",
            self.steps,
            start,
            end,
            self.inputs.len(),
            self.outputs.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};

    #[test]
    fn test_slice_state() {
        let values = Array4::from_shape_fn((2, 3, 4, 2), |(t, v, r, m)| (1000 * t + 100 * v + 10 * r + m) as f64);
        let state = TimeValueBuffer::new(vec![0.0, 0.1], values.into_dyn()).unwrap();

        let column = slice_state(&state, 2, 1).unwrap();
        assert_eq!(column.values(), &array![[210.0], [1210.0]].into_dyn());
        assert_eq!(column.time(), &[0.0, 0.1]);

        let state = TimeValueBuffer::new(vec![0.0], array![[[1.0, 2.0]]].into_dyn()).unwrap();
        assert_eq!(slice_state(&state, 0, 1).unwrap().values(), &array![[2.0]].into_dyn());

        assert!(matches!(slice_state(&state, 1, 0), Err(CosimError::ShapeMismatch(_))));
        assert!(matches!(slice_state(&state, 0, 2), Err(CosimError::ShapeMismatch(_))));
        let state = TimeValueBuffer::from_rows(vec![0.0], &[vec![1.0]]).unwrap();
        assert!(matches!(slice_state(&state, 0, 0), Err(CosimError::ShapeMismatch(_))));
    }

    #[test]
    fn test_external_input() {
        let mut external = ExternalInput::new(2, 3);
        assert!(external.is_empty());

        external.reset(vec![0.0, 0.1]);
        assert_eq!(external.values().dim(), (2, 2, 3));

        let data = TimeValueBuffer::from_rows(vec![0.0, 0.1], &[vec![5.0], vec![6.0]]).unwrap();
        external.write(1, 2, &data).unwrap();
        assert_eq!(external.values()[[1, 1, 2]], 6.0);
        assert_eq!(external.values().sum(), 11.0);

        assert!(matches!(external.write(2, 0, &data), Err(CosimError::ShapeMismatch(_))));
        let data = TimeValueBuffer::from_rows(vec![0.0], &[vec![5.0]]).unwrap();
        assert!(matches!(external.write(0, 0, &data), Err(CosimError::ShapeMismatch(_))));
    }

    #[test]
    fn test_phase_violation() {
        let mut interface = CoSimInterface::new(0.1, vec![], vec![]);
        let mut external = ExternalInput::new(1, 1);
        assert!(matches!(interface.spiking_to_tvb(&mut external), Err(CosimError::PhaseViolation(_))));
        assert!(matches!(interface.window(), Err(CosimError::PhaseViolation(_))));

        let state = TimeValueBuffer::new(vec![0.0, 0.1], Array3::zeros((2, 1, 1)).into_dyn()).unwrap();
        interface.tvb_to_spiking(&state).unwrap();
        assert_eq!(interface.phase(), Phase::AwaitingSpikingStep);
        assert!(matches!(interface.tvb_to_spiking(&state), Err(CosimError::PhaseViolation(_))));

        let (start, end) = interface.window().unwrap();
        assert_eq!(start, 0.0);
        assert!((end - 0.2).abs() < 1e-12);

        interface.spiking_to_tvb(&mut external).unwrap();
        assert_eq!(interface.phase(), Phase::AwaitingTvbStep);
        assert_eq!(interface.steps(), 1);
        assert_eq!(external.time().len(), 2);
    }
}
