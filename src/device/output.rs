//! Output devices, exposing what a backend recorder collected from the spiking populations.
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use itertools::Itertools;
use ndarray::{Array2, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};
use crate::{MS_PER_SECOND, TOLERANCE};

use super::{Device, PopulationHandle};

/// The model of an output device.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputModel {
    /// Records spikes.
    SpikeRecorder,
    /// Samples a continuous state variable of every neuron.
    Multimeter { variable: String },
}

impl fmt::Display for OutputModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputModel::SpikeRecorder => write!(f, "spike_recorder"),
            OutputModel::Multimeter { variable } => write!(f, "multimeter({})", variable),
        }
    }
}

/// A single event as recorded by a backend: a spike, or a sample of the recorded variables.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub time: f64,
    /// The label of the population of the sender.
    pub population: String,
    /// The index of the sender within its population.
    pub neuron: usize,
    /// The values of the recorded variables, in the order of [`Recorder::variables`].
    pub values: Vec<f64>,
}

impl RawEvent {
    pub fn spike(time: f64, population: &str, neuron: usize) -> Self {
        RawEvent {
            time,
            population: population.to_string(),
            neuron,
            values: vec![],
        }
    }

    pub fn sample(time: f64, population: &str, neuron: usize, values: Vec<f64>) -> Self {
        RawEvent {
            time,
            population: population.to_string(),
            neuron,
            values,
        }
    }
}

/// The events of an output device, sorted by time then sender.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Events {
    pub times: Vec<f64>,
    /// (population label, neuron index) of the sender of every event.
    pub senders: Vec<(String, usize)>,
    /// Values of every recorded variable, one per event.
    pub variables: BTreeMap<String, Vec<f64>>,
}

impl Events {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Storage of the events of an output device, owned and filled by the spiking backend.
///
/// Nothing guarantees that the backend only stores events of the connected neurons, with one value
/// per recorded variable: devices check every event they read.
pub trait Recorder: fmt::Debug {
    /// Returns the recorded variables (none for spike recorders).
    fn variables(&self) -> &[String];

    /// Returns the events in the order they were recorded.
    fn raw_events(&self) -> &[RawEvent];

    fn record(&mut self, event: RawEvent) -> Result<()>;

    fn clear(&mut self);
}

/// A recorder keeping all events in memory.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct MemoryRecorder {
    variables: Vec<String>,
    events: Vec<RawEvent>,
}

impl MemoryRecorder {
    pub fn new(variables: Vec<String>) -> Self {
        MemoryRecorder {
            variables,
            events: vec![],
        }
    }
}

impl Recorder for MemoryRecorder {
    fn variables(&self) -> &[String] {
        &self.variables[..]
    }

    fn raw_events(&self) -> &[RawEvent] {
        &self.events[..]
    }

    /// The function returns an error if the event does not carry one value per recorded variable.
    fn record(&mut self, event: RawEvent) -> Result<()> {
        if event.values.len() != self.variables.len() {
            return Err(CosimError::ShapeMismatch(format!(
                "event with {} values for {} recorded variables",
                event.values.len(),
                self.variables.len()
            )));
        }
        self.events.push(event);
        Ok(())
    }

    fn clear(&mut self) {
        self.events.clear();
    }
}

/// An output device shared between the spiking backend, which fills it, and the interface, which reads it.
pub type SharedOutputDevice = Rc<RefCell<dyn OutputDevice>>;

/// Create an output device of the given model, with an in-memory recorder.
pub fn new_output_device(label: &str, model: &OutputModel, populations: Vec<Rc<dyn PopulationHandle>>) -> SharedOutputDevice {
    match model {
        OutputModel::SpikeRecorder => Rc::new(RefCell::new(SpikeRecorder::new(label, populations))),
        OutputModel::Multimeter { variable } => {
            Rc::new(RefCell::new(Multimeter::new(label, variable, populations)))
        }
    }
}

pub trait OutputDevice: fmt::Debug {
    fn device(&self) -> &Device;

    fn device_mut(&mut self) -> &mut Device;

    fn model(&self) -> OutputModel;

    fn recorder(&self) -> &dyn Recorder;

    fn recorder_mut(&mut self) -> &mut dyn Recorder;

    /// Returns what was recorded over the read window `[start, end)` in bins of width `dt`,
    /// as a buffer with one time point (the start of the bin) per bin.
    fn readout(&self, start: f64, end: f64, dt: f64) -> Result<TimeValueBuffer>;

    fn label(&self) -> &str {
        self.device().label()
    }

    fn populations(&self) -> &[Rc<dyn PopulationHandle>] {
        self.device().populations()
    }

    /// Returns the recorded variables.
    fn record_from(&self) -> Vec<String> {
        self.recorder().variables().to_vec()
    }

    /// Record an event, if it lies within the `[start, stop)` recording window of the device.
    /// The function returns an error if the sender is not a neuron of the connected populations.
    fn record(&mut self, event: RawEvent) -> Result<()> {
        let (start, stop) = (self.device().param("start")?, self.device().param("stop")?);
        if event.time < start || event.time >= stop {
            return Ok(());
        }
        sender_index(self.device(), &event)?;
        self.recorder_mut().record(event)
    }

    /// Returns the events, recomputed from the current content of the recorder.
    /// The function returns an error if an event does not carry one value per recorded variable.
    fn events(&self) -> Result<Events> {
        let recorder = self.recorder();
        let num_variables = recorder.variables().len();
        if let Some(event) = recorder.raw_events().iter().find(|e| e.values.len() != num_variables) {
            return Err(CosimError::ShapeMismatch(format!(
                "{} holds an event with {} values for {} recorded variables",
                self.label(),
                event.values.len(),
                num_variables
            )));
        }
        let sorted = recorder
            .raw_events()
            .iter()
            .sorted_by(|a, b| {
                a.time
                    .total_cmp(&b.time)
                    .then_with(|| a.population.cmp(&b.population))
                    .then_with(|| a.neuron.cmp(&b.neuron))
            })
            .collect_vec();

        let variables = recorder
            .variables()
            .iter()
            .enumerate()
            .map(|(i, variable)| (variable.clone(), sorted.iter().map(|event| event.values[i]).collect()))
            .collect();

        Ok(Events {
            times: sorted.iter().map(|event| event.time).collect(),
            senders: sorted
                .iter()
                .map(|event| (event.population.clone(), event.neuron))
                .collect(),
            variables,
        })
    }

    fn number_of_events(&self) -> usize {
        self.recorder().raw_events().len()
    }

    /// Clear all recorded events.
    /// A backend clearing the recorder must do it through this function.
    fn reset(&mut self) {
        self.recorder_mut().clear();
    }
}

/// Returns the index of the sender of an event among the neurons of the device.
fn sender_index(device: &Device, event: &RawEvent) -> Result<usize> {
    device.neuron_index(&event.population, event.neuron).ok_or_else(|| {
        CosimError::UnknownPopulation(format!(
            "{} is not connected to neuron {} of {}",
            device.label(),
            event.neuron,
            event.population
        ))
    })
}

/// The position of the first recorded event which may still be read.
///
/// Backends record events as the simulation advances and read windows never move backwards in
/// practice, so every readout only skips the leading events older than its window instead of
/// scanning the whole history again. A window starting earlier than the previous one rescans
/// from the first event.
#[derive(Debug)]
struct ReadCursor {
    position: Cell<usize>,
    start: Cell<f64>,
}

impl ReadCursor {
    fn new() -> Self {
        ReadCursor {
            position: Cell::new(0),
            start: Cell::new(f64::NEG_INFINITY),
        }
    }

    /// Returns the events which may lie at or after `start`.
    fn events_from<'a>(&self, events: &'a [RawEvent], start: f64) -> &'a [RawEvent] {
        let mut position = self.position.get();
        if start < self.start.get() || position > events.len() {
            position = 0;
        }
        while position < events.len() && events[position].time < start {
            position += 1;
        }
        self.position.set(position);
        self.start.set(start);
        &events[position..]
    }

    fn reset(&self) {
        self.position.set(0);
        self.start.set(f64::NEG_INFINITY);
    }
}

fn output_params() -> [(&'static str, f64); 2] {
    [("start", 0.0), ("stop", f64::INFINITY)]
}

/// Returns the number of bins of width `dt` in `[start, end)`.
fn number_of_bins(start: f64, end: f64, dt: f64) -> Result<usize> {
    if !(dt > 0.0) || !(end >= start) || !start.is_finite() || !end.is_finite() {
        return Err(CosimError::InvalidParameters(format!(
            "invalid read window [{}, {}) with bins of {}",
            start, end, dt
        )));
    }
    Ok(((end - start) / dt).round() as usize)
}

/// Returns the bin of the given time, if within the `num_bins` bins of width `dt` starting at `start`.
fn bin_of(time: f64, start: f64, dt: f64, num_bins: usize) -> Option<usize> {
    if time < start {
        return None;
    }
    let bin = ((time - start) / dt + TOLERANCE).floor() as usize;
    (bin < num_bins).then_some(bin)
}

/// A device recording the spikes of its populations.
#[derive(Debug)]
pub struct SpikeRecorder {
    device: Device,
    recorder: Box<dyn Recorder>,
    cursor: ReadCursor,
}

impl SpikeRecorder {
    pub fn new(label: &str, populations: Vec<Rc<dyn PopulationHandle>>) -> Self {
        SpikeRecorder::with_recorder(label, populations, Box::new(MemoryRecorder::new(vec![])))
    }

    pub fn with_recorder(label: &str, populations: Vec<Rc<dyn PopulationHandle>>, recorder: Box<dyn Recorder>) -> Self {
        SpikeRecorder {
            device: Device::new(label, populations, &output_params()),
            recorder,
            cursor: ReadCursor::new(),
        }
    }

    /// Returns the mean firing rate (in Hz) of the connected neurons over `[start, end)`.
    pub fn mean_rate(&self, start: f64, end: f64) -> Result<f64> {
        let num_neurons = self.device.number_of_neurons();
        if num_neurons == 0 || !(end > start) {
            return Err(CosimError::InvalidParameters(format!(
                "cannot compute a rate over [{}, {}) for {} neurons",
                start, end, num_neurons
            )));
        }
        let num_spikes = self
            .recorder
            .raw_events()
            .iter()
            .filter(|event| event.time >= start && event.time < end)
            .count();
        Ok(num_spikes as f64 * MS_PER_SECOND / ((end - start) * num_neurons as f64))
    }
}

impl OutputDevice for SpikeRecorder {
    fn device(&self) -> &Device {
        &self.device
    }

    fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    fn model(&self) -> OutputModel {
        OutputModel::SpikeRecorder
    }

    fn recorder(&self) -> &dyn Recorder {
        self.recorder.as_ref()
    }

    fn recorder_mut(&mut self) -> &mut dyn Recorder {
        self.recorder.as_mut()
    }

    /// Returns the spike counts of shape `[bin, neuron]`.
    /// The function returns an error if a spike within the window was not emitted by a connected neuron.
    fn readout(&self, start: f64, end: f64, dt: f64) -> Result<TimeValueBuffer> {
        let num_bins = number_of_bins(start, end, dt)?;
        let mut counts = Array2::<f64>::zeros((num_bins, self.device.number_of_neurons()));
        for event in self.cursor.events_from(self.recorder.raw_events(), start) {
            if let Some(bin) = bin_of(event.time, start, dt, num_bins) {
                counts[[bin, sender_index(&self.device, event)?]] += 1.0;
            }
        }
        let time = (0..num_bins).map(|i| start + i as f64 * dt).collect();
        TimeValueBuffer::new(time, counts.into_dyn())
    }

    fn reset(&mut self) {
        self.recorder.clear();
        self.cursor.reset();
    }
}

/// A device sampling a continuous variable of the neurons of its populations.
#[derive(Debug)]
pub struct Multimeter {
    device: Device,
    variable: String,
    recorder: Box<dyn Recorder>,
    cursor: ReadCursor,
    /// The last value read out, held over bins without samples.
    last_value: RefCell<f64>,
}

impl Multimeter {
    pub fn new(label: &str, variable: &str, populations: Vec<Rc<dyn PopulationHandle>>) -> Self {
        Multimeter::with_recorder(label, variable, populations, Box::new(MemoryRecorder::new(vec![variable.to_string()])))
    }

    pub fn with_recorder(
        label: &str,
        variable: &str,
        populations: Vec<Rc<dyn PopulationHandle>>,
        recorder: Box<dyn Recorder>,
    ) -> Self {
        Multimeter {
            device: Device::new(label, populations, &output_params()),
            variable: variable.to_string(),
            recorder,
            cursor: ReadCursor::new(),
            last_value: RefCell::new(0.0),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }
}

impl OutputDevice for Multimeter {
    fn device(&self) -> &Device {
        &self.device
    }

    fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    fn model(&self) -> OutputModel {
        OutputModel::Multimeter {
            variable: self.variable.clone(),
        }
    }

    fn recorder(&self) -> &dyn Recorder {
        self.recorder.as_ref()
    }

    fn recorder_mut(&mut self) -> &mut dyn Recorder {
        self.recorder.as_mut()
    }

    /// Returns the mean of the variable over all neurons and samples of every bin, of shape `[bin, 1]`.
    /// Bins without any sample hold the previous value.
    fn readout(&self, start: f64, end: f64, dt: f64) -> Result<TimeValueBuffer> {
        let num_bins = number_of_bins(start, end, dt)?;
        let index = self
            .recorder
            .variables()
            .iter()
            .position(|v| *v == self.variable)
            .ok_or_else(|| {
                CosimError::InvalidParameters(format!("{} does not record {:?}", self.label(), self.variable))
            })?;

        let mut sums = vec![0.0; num_bins];
        let mut counts = vec![0usize; num_bins];
        for event in self.cursor.events_from(self.recorder.raw_events(), start) {
            if let Some(bin) = bin_of(event.time, start, dt, num_bins) {
                let value = event.values.get(index).ok_or_else(|| {
                    CosimError::ShapeMismatch(format!(
                        "{} holds a sample without {:?} at time {}",
                        self.label(),
                        self.variable,
                        event.time
                    ))
                })?;
                sums[bin] += *value;
                counts[bin] += 1;
            }
        }

        let mut last_value = self.last_value.borrow_mut();
        let means: Vec<f64> = sums
            .iter()
            .zip(counts.iter())
            .map(|(sum, &count)| {
                if count > 0 {
                    *last_value = sum / count as f64;
                }
                *last_value
            })
            .collect();

        let values = ArrayD::from_shape_vec(IxDyn(&[num_bins, 1]), means)
            .map_err(|e| CosimError::ShapeMismatch(e.to_string()))?;
        let time = (0..num_bins).map(|i| start + i as f64 * dt).collect();
        TimeValueBuffer::new(time, values)
    }

    fn reset(&mut self) {
        self.recorder.clear();
        self.cursor.reset();
        *self.last_value.borrow_mut() = 0.0;
    }
}
