//! In-process communicators, writing to and reading from shared memory.
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};
use crate::transformer::Transformer;

use super::{check_shape, Receiver, Sender};

/// Something a buffer can be written to in memory.
pub trait MemoryTarget {
    fn write_input(&mut self, data: TimeValueBuffer);
    fn target_label(&self) -> String;
}

/// Something a buffer can be read from in memory.
pub trait MemorySource {
    fn read_output(&self) -> Result<TimeValueBuffer>;
    fn source_label(&self) -> String;
}

impl MemoryTarget for dyn Transformer {
    fn write_input(&mut self, data: TimeValueBuffer) {
        self.set_input(data);
    }

    fn target_label(&self) -> String {
        self.name().to_string()
    }
}

impl MemorySource for dyn Transformer {
    fn read_output(&self) -> Result<TimeValueBuffer> {
        self.output()
    }

    fn source_label(&self) -> String {
        self.name().to_string()
    }
}

/// A single buffer slot, holding the latest buffer written to it.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct MemorySlot {
    label: String,
    data: Option<TimeValueBuffer>,
}

impl MemorySlot {
    pub fn new(label: &str) -> Self {
        MemorySlot {
            label: label.to_string(),
            data: None,
        }
    }

    pub fn shared(label: &str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(MemorySlot::new(label)))
    }
}

impl MemoryTarget for MemorySlot {
    fn write_input(&mut self, data: TimeValueBuffer) {
        self.data = Some(data);
    }

    fn target_label(&self) -> String {
        format!("slot {}", self.label)
    }
}

impl MemorySource for MemorySlot {
    fn read_output(&self) -> Result<TimeValueBuffer> {
        self.data.clone().ok_or_else(|| {
            CosimError::ShapeMismatch(format!("slot {} holds no data", self.label))
        })
    }

    fn source_label(&self) -> String {
        format!("slot {}", self.label)
    }
}

/// Sends a copy of the data to a shared in-memory target.
pub struct SetToMemory<T: ?Sized> {
    target: Rc<RefCell<T>>,
    shape: Option<Vec<usize>>,
}

/// Sends a copy of the data as input of a shared transformer.
pub type SetToTransformer = SetToMemory<dyn Transformer>;

impl<T: ?Sized + MemoryTarget> SetToMemory<T> {
    pub fn new(target: Rc<RefCell<T>>) -> Self {
        SetToMemory {
            target,
            shape: None,
        }
    }

    /// Only accept data with the given shape (without the time axis).
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Some(shape);
        self
    }
}

impl<T: ?Sized + MemoryTarget> Sender for SetToMemory<T> {
    fn send(&mut self, data: &TimeValueBuffer) -> Result<()> {
        check_shape(&self.shape, data)?;
        self.target.borrow_mut().write_input(data.clone());
        Ok(())
    }
}

impl<T: ?Sized + MemoryTarget> fmt::Display for SetToMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sender to memory target {}", self.target.borrow().target_label())
    }
}

/// Receives a copy of the data of a shared in-memory source.
pub struct GetFromMemory<T: ?Sized> {
    source: Rc<RefCell<T>>,
    shape: Option<Vec<usize>>,
}

/// Receives a copy of the output of a shared transformer.
pub type GetFromTransformer = GetFromMemory<dyn Transformer>;

impl<T: ?Sized + MemorySource> GetFromMemory<T> {
    pub fn new(source: Rc<RefCell<T>>) -> Self {
        GetFromMemory {
            source,
            shape: None,
        }
    }

    /// Only accept data with the given shape (without the time axis).
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Some(shape);
        self
    }
}

impl<T: ?Sized + MemorySource> Receiver for GetFromMemory<T> {
    fn receive(&mut self) -> Result<TimeValueBuffer> {
        let data = self.source.borrow().read_output()?;
        check_shape(&self.shape, &data)?;
        Ok(data)
    }
}

impl<T: ?Sized + MemorySource> fmt::Display for GetFromMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Receiver from memory source {}", self.source.borrow().source_label())
    }
}
