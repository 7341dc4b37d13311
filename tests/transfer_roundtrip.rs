// Run: cargo test --test transfer_roundtrip -- --nocapture
//
// Host transfer collaborator: round-trip fidelity, direction checks,
// and range validation against a bound arena.

mod common;

use staged_compute::{
    BufferArena, BufferUsage, ComputeError, TransferError,
};
use staged_compute::gpu::transfer::{read_buffer, update_buffer};

#[test]
fn update_then_read_round_trips_bytes() {
    let Some(context) = common::test_context() else { return };

    let mut arena = BufferArena::new();
    let buffer = arena.request("roundtrip", 1024, BufferUsage::Target).unwrap();
    arena.allocate_and_bind(context, 0).unwrap();

    let data: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
    update_buffer(context, &arena, buffer, 0, &data).unwrap();

    let readback = read_buffer(context, &arena, buffer, 0, 1024).unwrap();
    assert_eq!(readback, data);
}

#[test]
fn partial_range_round_trips() {
    let Some(context) = common::test_context() else { return };

    let mut arena = BufferArena::new();
    let buffer = arena.request("partial", 256, BufferUsage::Target).unwrap();
    arena.allocate_and_bind(context, 0).unwrap();

    update_buffer(context, &arena, buffer, 0, &[0u8; 256]).unwrap();
    update_buffer(context, &arena, buffer, 64, &[0xAB; 32]).unwrap();

    let readback = read_buffer(context, &arena, buffer, 64, 32).unwrap();
    assert_eq!(readback, vec![0xAB; 32]);

    let untouched = read_buffer(context, &arena, buffer, 0, 64).unwrap();
    assert_eq!(untouched, vec![0u8; 64]);
}

#[test]
fn scratch_buffers_reject_host_transfers() {
    let Some(context) = common::test_context() else { return };

    let mut arena = BufferArena::new();
    let scratch = arena.request("scratch", 64, BufferUsage::Scratch).unwrap();
    arena.allocate_and_bind(context, 0).unwrap();

    let write = update_buffer(context, &arena, scratch, 0, &[0u8; 64]).unwrap_err();
    assert!(matches!(
        write,
        ComputeError::Transfer(TransferError::WrongDirection { .. })
    ));

    let read = read_buffer(context, &arena, scratch, 0, 64).unwrap_err();
    assert!(matches!(
        read,
        ComputeError::Transfer(TransferError::WrongDirection { .. })
    ));
}

#[test]
fn source_buffers_reject_read_back() {
    let Some(context) = common::test_context() else { return };

    let mut arena = BufferArena::new();
    let source = arena.request("input_only", 64, BufferUsage::Source).unwrap();
    arena.allocate_and_bind(context, 0).unwrap();

    let err = read_buffer(context, &arena, source, 0, 64).unwrap_err();
    assert!(matches!(
        err,
        ComputeError::Transfer(TransferError::WrongDirection { .. })
    ));
}

#[test]
fn out_of_range_transfers_are_rejected() {
    let Some(context) = common::test_context() else { return };

    let mut arena = BufferArena::new();
    let buffer = arena.request("bounded", 64, BufferUsage::Target).unwrap();
    arena.allocate_and_bind(context, 0).unwrap();

    let err = update_buffer(context, &arena, buffer, 32, &[0u8; 64]).unwrap_err();
    assert_eq!(
        err,
        ComputeError::Transfer(TransferError::OutOfRange {
            buffer,
            offset: 32,
            len: 64,
            region: 64,
        })
    );

    let err = read_buffer(context, &arena, buffer, 64, 4).unwrap_err();
    assert!(matches!(
        err,
        ComputeError::Transfer(TransferError::OutOfRange { .. })
    ));
}

#[test]
fn misaligned_transfers_are_rejected() {
    let Some(context) = common::test_context() else { return };

    let mut arena = BufferArena::new();
    let buffer = arena.request("aligned", 64, BufferUsage::Target).unwrap();
    arena.allocate_and_bind(context, 0).unwrap();

    let err = update_buffer(context, &arena, buffer, 2, &[0u8; 4]).unwrap_err();
    assert_eq!(
        err,
        ComputeError::Transfer(TransferError::Misaligned { offset: 2, len: 4 })
    );
}
