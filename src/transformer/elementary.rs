//! Identity transformer.
use crate::buffer::TimeValueBuffer;
use crate::error::Result;

use super::{Transformer, TransformerBuffers};

/// Copies its input to its output unchanged.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Elementary {
    buffers: TransformerBuffers,
}

impl Elementary {
    pub fn new() -> Self {
        Elementary::default()
    }
}

impl Transformer for Elementary {
    fn name(&self) -> &str {
        "Elementary"
    }

    fn buffers(&self) -> &TransformerBuffers {
        &self.buffers
    }

    fn buffers_mut(&mut self) -> &mut TransformerBuffers {
        &mut self.buffers
    }

    fn compute(&mut self, input: &TimeValueBuffer) -> Result<TimeValueBuffer> {
        Ok(input.clone())
    }
}
