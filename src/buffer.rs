//! Module implementing the (time, values) buffers exchanged at the interface boundary.
//!
//! Values are stored in an N-dimensional array whose first axis is always time.
//! The canonical layout is `[time, variable, region, neuron-or-mode]`, but lower
//! dimensional layouts such as `[time, region]` are accepted as well.
//!
//! Spike trains are exchanged as *event buffers*: one time entry per spike and a
//! `[num_spikes, 2]` value array holding the target index and the neuron index.
use ndarray::{Array2, ArrayD, Axis, Ix2, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{CosimError, Result};

/// A single spike delivered to (or emitted by) a neuron of a target.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct SpikeEvent {
    /// The time of the spike.
    pub time: f64,
    /// The index of the target (e.g., the proxied region) within the buffer.
    pub target: usize,
    /// The index of the neuron within the target population.
    pub neuron: usize,
}

impl SpikeEvent {
    pub fn new(time: f64, target: usize, neuron: usize) -> Self {
        SpikeEvent {
            time,
            target,
            neuron,
        }
    }
}

/// An ordered pair of time points and values, with time along the first axis of the values.
#[derive(Debug, PartialEq, Clone)]
pub struct TimeValueBuffer {
    time: Vec<f64>,
    values: ArrayD<f64>,
}

impl TimeValueBuffer {
    /// Create a buffer from time points and values.
    /// The function returns an error if the first axis of the values does not match the time points.
    pub fn new(time: Vec<f64>, values: ArrayD<f64>) -> Result<Self> {
        if values.ndim() == 0 {
            return Err(CosimError::ShapeMismatch(
                "values must have at least one (time) axis".to_string(),
            ));
        }
        if values.shape()[0] != time.len() {
            return Err(CosimError::ShapeMismatch(format!(
                "{} time points for values of shape {:?}",
                time.len(),
                values.shape()
            )));
        }
        Ok(TimeValueBuffer { time, values })
    }

    /// Create a `[time, column]` buffer from rows of values, one row per time point.
    pub fn from_rows(time: Vec<f64>, rows: &[Vec<f64>]) -> Result<Self> {
        let num_columns = rows.first().map_or(0, |row| row.len());
        if rows.iter().any(|row| row.len() != num_columns) {
            return Err(CosimError::ShapeMismatch(
                "all rows must have the same length".to_string(),
            ));
        }
        let data: Vec<f64> = rows.iter().flatten().copied().collect();
        let values = Array2::from_shape_vec((rows.len(), num_columns), data)
            .map_err(|e| CosimError::ShapeMismatch(e.to_string()))?;
        TimeValueBuffer::new(time, values.into_dyn())
    }

    /// Create an event buffer from a collection of spikes.
    /// The spikes are sorted by time (ties keep their original order).
    pub fn from_spike_events(spikes: &[SpikeEvent]) -> Self {
        let mut spikes = spikes.to_vec();
        spikes.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut values = Array2::<f64>::zeros((spikes.len(), 2));
        for (i, spike) in spikes.iter().enumerate() {
            values[[i, 0]] = spike.target as f64;
            values[[i, 1]] = spike.neuron as f64;
        }
        TimeValueBuffer {
            time: spikes.iter().map(|spike| spike.time).collect(),
            values: values.into_dyn(),
        }
    }

    /// Interpret the buffer as an event buffer and returns its spikes.
    pub fn spike_events(&self) -> Result<Vec<SpikeEvent>> {
        if self.values.ndim() != 2 || self.values.shape()[1] != 2 {
            return Err(CosimError::ShapeMismatch(format!(
                "spike events need values of shape [num_spikes, 2], got {:?}",
                self.values.shape()
            )));
        }

        let values = self
            .values
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| CosimError::ShapeMismatch(e.to_string()))?;

        self.time
            .iter()
            .enumerate()
            .map(|(i, &time)| {
                let target = as_index(values[[i, 0]])?;
                let neuron = as_index(values[[i, 1]])?;
                Ok(SpikeEvent::new(time, target, neuron))
            })
            .collect()
    }

    /// Returns the time points of the buffer.
    pub fn time(&self) -> &[f64] {
        &self.time[..]
    }

    /// Returns the values of the buffer.
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    /// Returns the shape of the values of the buffer.
    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Returns the number of time points of the buffer.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Returns true if the buffer has no time points.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Returns the number of values per time point.
    pub fn row_len(&self) -> usize {
        self.values.shape()[1..].iter().product()
    }

    /// Decompose the buffer into its time points and values.
    pub fn into_parts(self) -> (Vec<f64>, ArrayD<f64>) {
        (self.time, self.values)
    }

    /// Check that the values (without the time axis) have the expected shape.
    pub fn check_trailing_shape(&self, expected: &[usize]) -> Result<()> {
        if &self.values.shape()[1..] != expected {
            return Err(CosimError::ShapeMismatch(format!(
                "expected values of shape [time, {}], got {:?}",
                expected.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", "),
                self.values.shape()
            )));
        }
        Ok(())
    }

    /// Returns a copy of the buffer without its first `n` time points.
    pub fn skip(&self, n: usize) -> Self {
        let n = n.min(self.len());
        TimeValueBuffer {
            time: self.time[n..].to_vec(),
            values: self.values.slice_axis(Axis(0), (n..).into()).to_owned(),
        }
    }

    /// Returns a copy of the buffer with the time points shifted by the given offset.
    pub fn shifted(&self, offset: f64) -> Self {
        TimeValueBuffer {
            time: self.time.iter().map(|t| t + offset).collect(),
            values: self.values.clone(),
        }
    }
}

impl Default for TimeValueBuffer {
    fn default() -> Self {
        TimeValueBuffer {
            time: vec![],
            values: ArrayD::zeros(IxDyn(&[0])),
        }
    }
}

fn as_index(value: f64) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
        return Err(CosimError::ShapeMismatch(format!(
            "{} is not a valid index",
            value
        )));
    }
    Ok(value as usize)
}
