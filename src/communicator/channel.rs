//! Communicators over a channel, standing in for a transport to another process.
use std::fmt;
use std::sync::mpsc;

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};

use super::{check_shape, Receiver, Sender};

/// Create a connected pair of channel communicators.
pub fn channel(label: &str) -> (ChannelSender, ChannelReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        ChannelSender {
            label: label.to_string(),
            tx,
            shape: None,
        },
        ChannelReceiver {
            label: label.to_string(),
            rx,
            shape: None,
        },
    )
}

/// Sends a copy of the data through a channel.
#[derive(Debug)]
pub struct ChannelSender {
    label: String,
    tx: mpsc::Sender<TimeValueBuffer>,
    shape: Option<Vec<usize>>,
}

impl ChannelSender {
    /// Only accept data with the given shape (without the time axis).
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Some(shape);
        self
    }
}

impl Sender for ChannelSender {
    fn send(&mut self, data: &TimeValueBuffer) -> Result<()> {
        check_shape(&self.shape, data)?;
        self.tx
            .send(data.clone())
            .map_err(|_| CosimError::ChannelClosed(format!("receiver of {} is gone", self.label)))
    }
}

impl fmt::Display for ChannelSender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Sender to channel {}", self.label)
    }
}

/// Receives the data sent through a channel, in order.
/// Receiving blocks until data is available.
#[derive(Debug)]
pub struct ChannelReceiver {
    label: String,
    rx: mpsc::Receiver<TimeValueBuffer>,
    shape: Option<Vec<usize>>,
}

impl ChannelReceiver {
    /// Only accept data with the given shape (without the time axis).
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Some(shape);
        self
    }
}

impl Receiver for ChannelReceiver {
    fn receive(&mut self) -> Result<TimeValueBuffer> {
        let data = self
            .rx
            .recv()
            .map_err(|_| CosimError::ChannelClosed(format!("sender of {} is gone", self.label)))?;
        check_shape(&self.shape, &data)?;
        Ok(data)
    }
}

impl fmt::Display for ChannelReceiver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Receiver from channel {}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_in_order() {
        let (mut sender, mut receiver) = channel("test");
        let first = TimeValueBuffer::from_rows(vec![0.0], &[vec![1.0]]).unwrap();
        let second = first.shifted(0.1);
        sender.send(&first).unwrap();
        sender.send(&second).unwrap();
        assert_eq!(receiver.receive().unwrap(), first);
        assert_eq!(receiver.receive().unwrap(), second);
    }

    #[test]
    fn test_channel_closed() {
        let (sender, mut receiver) = channel("test");
        drop(sender);
        assert!(matches!(receiver.receive(), Err(CosimError::ChannelClosed(_))));

        let (mut sender, receiver) = channel("test");
        drop(receiver);
        let data = TimeValueBuffer::from_rows(vec![0.0], &[vec![1.0]]).unwrap();
        assert!(matches!(sender.send(&data), Err(CosimError::ChannelClosed(_))));
    }

    #[test]
    fn test_channel_across_threads() {
        let (mut sender, mut receiver) = channel("remote");
        let handle = std::thread::spawn(move || receiver.receive());
        let data = TimeValueBuffer::from_rows(vec![0.0, 0.1], &[vec![1.0], vec![2.0]]).unwrap();
        sender.send(&data).unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), data);
    }
}
