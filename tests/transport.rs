use std::thread;

use ndarray::{array, ArrayD, IxDyn};

use tvb_cosim::archive::{read_archive, write_archive, NamedArray};
use tvb_cosim::buffer::{SpikeEvent, TimeValueBuffer};
use tvb_cosim::communicator::channel::channel;
use tvb_cosim::communicator::{
    GetFromMemory, MemorySlot, MemorySource, ReaderFromFile, Receiver, Sender, SetToMemory, WriterToFile,
};
use tvb_cosim::error::CosimError;

fn state() -> TimeValueBuffer {
    let values = ArrayD::from_shape_vec(IxDyn(&[2, 2, 3]), (0..12).map(|v| v as f64 * 0.5).collect()).unwrap();
    TimeValueBuffer::new(vec![0.0, 0.1], values).unwrap()
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in_S_e_0.tvba");

    let mut writer = WriterToFile::new(path.clone());
    let mut reader = ReaderFromFile::new(path.clone()).with_shape(vec![2, 3]);
    writer.send(&state()).unwrap();
    assert_eq!(reader.receive().unwrap(), state());

    // the last write wins
    let spikes = TimeValueBuffer::from_spike_events(&[SpikeEvent::new(0.3, 0, 7), SpikeEvent::new(0.1, 1, 2)]);
    writer.send(&spikes).unwrap();
    let received = ReaderFromFile::new(path).receive().unwrap();
    assert_eq!(received.spike_events().unwrap(), spikes.spike_events().unwrap());
}

#[test]
fn test_file_shape_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out_R_e_0.tvba");

    WriterToFile::new(path.clone()).send(&state()).unwrap();
    let mut reader = ReaderFromFile::new(path).with_shape(vec![3]);
    assert!(matches!(reader.receive(), Err(CosimError::ShapeMismatch(_))));
}

#[test]
fn test_archive_extra_arrays() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extra.tvba");

    let arrays = vec![
        NamedArray::from_slice("time", &[0.0, 0.1]),
        NamedArray::from_array("values", &array![[1.0], [2.0]].into_dyn()),
        NamedArray::from_slice("weights", &[0.5]),
    ];
    write_archive(&path, &arrays).unwrap();
    assert_eq!(read_archive(&path).unwrap(), arrays);

    let received = ReaderFromFile::new(path).receive().unwrap();
    assert_eq!(received.time(), &[0.0, 0.1]);
    assert_eq!(received.shape(), &[2, 1]);
}

#[test]
fn test_memory_does_not_alias() {
    let slot = MemorySlot::shared("in_R_0");
    let mut sender = SetToMemory::new(slot.clone());
    let mut receiver = GetFromMemory::new(slot.clone());

    let data = state();
    sender.send(&data).unwrap();
    // the sender changes its buffer in place once sent
    let (mut time, mut values) = data.into_parts();
    time[0] = -1.0;
    values.fill(-1.0);

    // the receiver changes its copy in place
    let (mut time, mut values) = receiver.receive().unwrap().into_parts();
    time[1] = -2.0;
    values[[0, 1, 2]] = -2.0;

    assert_eq!(slot.borrow().read_output().unwrap(), state());
    assert_eq!(receiver.receive().unwrap(), state());
}

#[test]
fn test_channel_across_threads() {
    let (mut sender, receiver) = channel("out_Rin_0");
    let handle = thread::spawn(move || {
        let mut receiver = receiver.with_shape(vec![2, 3]);
        (0..3).map(|_| receiver.receive().unwrap()).collect::<Vec<_>>()
    });

    for i in 0..3 {
        sender.send(&state().shifted(i as f64)).unwrap();
    }
    let received = handle.join().unwrap();
    assert_eq!(received.len(), 3);
    assert!((received[2].time()[0] - 2.0).abs() < 1e-9);
}

#[test]
fn test_channel_closed() {
    let (mut sender, receiver) = channel("out_Rin_0");
    drop(receiver);
    assert!(matches!(sender.send(&state()), Err(CosimError::ChannelClosed(_))));

    let (sender, mut receiver) = channel("out_Rin_0");
    drop(sender);
    assert!(matches!(receiver.receive(), Err(CosimError::ChannelClosed(_))));
}
