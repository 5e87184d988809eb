//! Linear transformers, rescaling values or shifting time.
use ndarray::Axis;

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};

use super::{Transformer, TransformerBuffers};

/// Applies `scale * input + translation` elementwise.
///
/// The scale is either a single factor, or one factor per entry of the last axis of the values
/// (e.g., one per region for `[time, region]` data).
#[derive(Debug, PartialEq, Clone)]
pub struct LinearRate {
    scale: Vec<f64>,
    translation: f64,
    buffers: TransformerBuffers,
}

impl LinearRate {
    pub fn new(scale: Vec<f64>, translation: f64) -> Self {
        LinearRate {
            scale,
            translation,
            buffers: TransformerBuffers::new(),
        }
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale[..]
    }

    pub fn translation(&self) -> f64 {
        self.translation
    }
}

impl Default for LinearRate {
    fn default() -> Self {
        LinearRate::new(vec![1.0], 0.0)
    }
}

impl Transformer for LinearRate {
    fn name(&self) -> &str {
        "LinearRate"
    }

    fn buffers(&self) -> &TransformerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut TransformerBuffers {
        &mut self.buffers
    }

    fn compute(&mut self, input: &TimeValueBuffer) -> Result<TimeValueBuffer> {
        if let Some(value) = input.values().iter().find(|v| !v.is_finite()) {
            return Err(CosimError::TransformError(format!(
                "cannot rescale non-finite value {}",
                value
            )));
        }

        let mut values = input.values().clone();
        match self.scale[..] {
            [] => {
                return Err(CosimError::InvalidParameters(
                    "linear transformer needs at least one scale factor".to_string(),
                ))
            }
            [scale] => values.mapv_inplace(|v| scale * v + self.translation),
            _ => {
                let last = values.ndim() - 1;
                if last == 0 || values.shape()[last] != self.scale.len() {
                    return Err(CosimError::ShapeMismatch(format!(
                        "{} scale factors for values of shape {:?}",
                        self.scale.len(),
                        values.shape()
                    )));
                }
                for mut lane in values.lanes_mut(Axis(last)) {
                    for (v, scale) in lane.iter_mut().zip(self.scale.iter()) {
                        *v = scale * *v + self.translation;
                    }
                }
            }
        }

        TimeValueBuffer::new(input.time().to_vec(), values)
    }
}

/// Shifts the time of its input by a fixed delay, values are copied unchanged.
#[derive(Debug, PartialEq, Clone)]
pub struct LinearDelay {
    delay: f64,
    buffers: TransformerBuffers,
}

impl LinearDelay {
    pub fn new(delay: f64) -> Self {
        LinearDelay {
            delay,
            buffers: TransformerBuffers::new(),
        }
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }
}

impl Transformer for LinearDelay {
    fn name(&self) -> &str {
        "LinearDelay"
    }

    fn buffers(&self) -> &TransformerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut TransformerBuffers {
        &mut self.buffers
    }

    fn compute(&mut self, input: &TimeValueBuffer) -> Result<TimeValueBuffer> {
        if !self.delay.is_finite() {
            return Err(CosimError::InvalidParameters(format!(
                "delay must be finite, got {}",
                self.delay
            )));
        }
        Ok(input.shifted(self.delay))
    }
}
