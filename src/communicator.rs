//! Module implementing the communicators moving buffers across the interface boundary.
//!
//! A [`Sender`] pushes a buffer to exactly one target and a [`Receiver`] pulls a buffer from
//! exactly one source. Buffers are always copied across a communicator, such that the producer
//! and the consumer never share data.
use std::fmt;
use std::path::PathBuf;

use log::trace;

use crate::buffer::TimeValueBuffer;
use crate::error::Result;

pub mod channel;
pub mod file;
pub mod memory;

pub use channel::{ChannelReceiver, ChannelSender};
pub use file::{ReaderFromFile, WriterToFile};
pub use memory::{
    GetFromMemory, GetFromTransformer, MemorySlot, MemorySource, MemoryTarget, SetToMemory,
    SetToTransformer,
};

pub trait Sender: fmt::Display {
    /// Push a copy of the data to the target.
    fn send(&mut self, data: &TimeValueBuffer) -> Result<()>;

    /// Same as [`Sender::send`].
    fn call(&mut self, data: &TimeValueBuffer) -> Result<()> {
        self.send(data)
    }
}

pub trait Receiver: fmt::Display {
    /// Pull a copy of the data from the source.
    fn receive(&mut self) -> Result<TimeValueBuffer>;

    /// Same as [`Receiver::receive`].
    fn call(&mut self) -> Result<TimeValueBuffer> {
        self.receive()
    }
}

/// Check the shape of the data (without the time axis) against an optional expected shape.
pub(crate) fn check_shape(expected: &Option<Vec<usize>>, data: &TimeValueBuffer) -> Result<()> {
    match expected {
        Some(shape) => data.check_trailing_shape(shape),
        None => Ok(()),
    }
}

/// A sender and a receiver connected to the same medium, used to carry buffers from one simulator
/// side to the other.
pub struct Transport {
    sender: Box<dyn Sender>,
    receiver: Box<dyn Receiver>,
}

impl Transport {
    pub fn new(sender: Box<dyn Sender>, receiver: Box<dyn Receiver>) -> Self {
        Transport { sender, receiver }
    }

    /// Create a transport through an in-process memory slot.
    pub fn memory(label: &str) -> Self {
        let slot = MemorySlot::shared(label);
        Transport::new(
            Box::new(SetToMemory::new(slot.clone())),
            Box::new(GetFromMemory::new(slot)),
        )
    }

    /// Create a transport through a named-array archive at the given path.
    pub fn file(path: PathBuf) -> Self {
        Transport::new(
            Box::new(WriterToFile::new(path.clone())),
            Box::new(ReaderFromFile::new(path)),
        )
    }

    /// Create a transport through a channel.
    pub fn channel(label: &str) -> Self {
        let (sender, receiver) = channel::channel(label);
        Transport::new(Box::new(sender), Box::new(receiver))
    }

    /// Send the data on one end and returns what is received on the other end.
    pub fn transfer(&mut self, data: &TimeValueBuffer) -> Result<TimeValueBuffer> {
        trace!("Transfer of {} time points: {}", data.len(), self);
        self.sender.send(data)?;
        self.receiver.receive()
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} | {}", self.sender, self.receiver)
    }
}
