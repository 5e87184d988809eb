//! Module implementing the transformers converting data between the representations of both simulators.
//!
//! A transformer holds an input and an output buffer. Data is set as input, consumed by
//! [`Transformer::transform`], and made available as output. Buffers are overwritten on
//! every step, never appended.
use std::cell::RefCell;
use std::rc::Rc;

use ndarray::ArrayD;

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};

pub mod elementary;
pub mod linear;
pub mod rates_to_spikes;
pub mod registry;
pub mod spikes_to_rates;

pub use elementary::Elementary;
pub use linear::{LinearDelay, LinearRate};
pub use rates_to_spikes::RatesToSpikes;
pub use registry::{TransformerContext, TransformerRegistry};
pub use spikes_to_rates::SpikesToRates;

/// A transformer shared between the communicators feeding and draining it.
pub type SharedTransformer = Rc<RefCell<dyn Transformer>>;

/// Wrap a transformer to be shared between communicators.
pub fn shared<T: Transformer + 'static>(transformer: T) -> SharedTransformer {
    Rc::new(RefCell::new(transformer))
}

/// The input and output buffers of a transformer.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct TransformerBuffers {
    input: Option<TimeValueBuffer>,
    output: Option<TimeValueBuffer>,
}

impl TransformerBuffers {
    pub fn new() -> Self {
        TransformerBuffers::default()
    }

    /// Set a new input. The previous output is invalidated.
    pub fn set_input(&mut self, data: TimeValueBuffer) {
        self.input = Some(data);
        self.output = None;
    }

    pub fn input(&self) -> Option<&TimeValueBuffer> {
        self.input.as_ref()
    }

    pub fn output(&self) -> Option<&TimeValueBuffer> {
        self.output.as_ref()
    }
}

pub trait Transformer {
    /// Returns a short name describing the transformation.
    fn name(&self) -> &str;

    fn buffers(&self) -> &TransformerBuffers;

    fn buffers_mut(&mut self) -> &mut TransformerBuffers;

    /// Compute the output corresponding to the provided input.
    fn compute(&mut self, input: &TimeValueBuffer) -> Result<TimeValueBuffer>;

    /// Returns the duration of input, before the first time point of an output, that this output
    /// depends on. Transformations without memory need none.
    fn history(&self) -> f64 {
        0.0
    }

    /// Set the input of the transformer, invalidating its current output.
    fn set_input(&mut self, data: TimeValueBuffer) {
        self.buffers_mut().set_input(data);
    }

    /// Transform the current input and store the result as output.
    /// The function returns an error if no input has been set or if the computation fails.
    fn transform(&mut self) -> Result<()> {
        let input = self.buffers_mut().input.take().ok_or_else(|| {
            CosimError::ShapeMismatch(format!("{} transformer has no input to transform", self.name()))
        })?;
        let result = self.compute(&input);
        self.buffers_mut().input = Some(input);
        self.buffers_mut().output = Some(result?);
        Ok(())
    }

    fn input_time(&self) -> Option<&[f64]> {
        self.buffers().input().map(|buffer| buffer.time())
    }

    fn input_buffer(&self) -> Option<&ArrayD<f64>> {
        self.buffers().input().map(|buffer| buffer.values())
    }

    fn output_time(&self) -> Option<&[f64]> {
        self.buffers().output().map(|buffer| buffer.time())
    }

    fn output_buffer(&self) -> Option<&ArrayD<f64>> {
        self.buffers().output().map(|buffer| buffer.values())
    }

    /// Returns a copy of the current output.
    /// The function returns an error if the current input has not been transformed yet.
    fn output(&self) -> Result<TimeValueBuffer> {
        self.buffers().output().cloned().ok_or_else(|| {
            CosimError::ShapeMismatch(format!("{} transformer has no output available", self.name()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_transform_lifecycle() {
        let mut transformer = Elementary::new();
        assert!(matches!(transformer.transform(), Err(CosimError::ShapeMismatch(_))));
        assert!(matches!(transformer.output(), Err(CosimError::ShapeMismatch(_))));

        let data = TimeValueBuffer::new(vec![0.0, 0.1], array![[1.0], [2.0]].into_dyn()).unwrap();
        transformer.set_input(data.clone());
        assert_eq!(transformer.input_time(), Some(&[0.0, 0.1][..]));
        assert!(transformer.output_time().is_none());

        transformer.transform().unwrap();
        assert_eq!(transformer.output().unwrap(), data);

        // a new input invalidates the previous output
        transformer.set_input(data.shifted(0.2));
        assert!(transformer.output_buffer().is_none());
        transformer.transform().unwrap();
        assert_eq!(transformer.output_time(), Some(&[0.2, 0.30000000000000004][..]));
    }

    #[test]
    fn test_failed_transform_keeps_input() {
        let mut transformer = LinearRate::new(vec![1.0], 0.0);
        let data = TimeValueBuffer::new(vec![0.0], array![[f64::INFINITY]].into_dyn()).unwrap();
        transformer.set_input(data.clone());

        assert!(matches!(transformer.transform(), Err(CosimError::TransformError(_))));
        assert_eq!(transformer.buffers().input(), Some(&data));
        assert!(transformer.output_time().is_none());
    }
}
