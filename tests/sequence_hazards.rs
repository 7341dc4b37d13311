// Run: cargo test --test sequence_hazards -- --nocapture
//
// Barrier placement and the barrier-omission defect. The hazard
// detector is the host-observable witness for a dropped barrier: the
// backend's own tracking can mask the race at runtime, so correctness
// of the recorded sequence is asserted on the sequence itself, and the
// barrier-correct path is additionally checked for run-to-run
// stability.

mod common;

use staged_compute::{
    BarrierPolicy, PrefixScan, SequenceBuilder, SequenceError, TotalReduce, BLOCK_SIZE,
};

#[test]
fn empty_sequence_is_rejected() {
    let err = SequenceBuilder::new()
        .build(BarrierPolicy::Automatic)
        .unwrap_err();
    assert_eq!(err, SequenceError::EmptySequence);
}

#[test]
fn automatic_reduce_sequence_is_hazard_free() {
    let Some(context) = common::test_context() else { return };

    let reduce = TotalReduce::new(context, 4 * BLOCK_SIZE).unwrap();
    let sequence = reduce.build_sequence(BarrierPolicy::Automatic).unwrap();

    assert_eq!(sequence.stage_count(), 3);
    // One barrier on the group-sum buffer per dependent edge: 1→2, 2→3.
    assert_eq!(sequence.barrier_count(), 2);
    assert!(sequence.unsynchronized_hazards().is_empty());
}

#[test]
fn automatic_scan_sequence_is_hazard_free() {
    let Some(context) = common::test_context() else { return };

    let scan = PrefixScan::new(context, 3 * BLOCK_SIZE + 5).unwrap();
    let sequence = scan.build_sequence(BarrierPolicy::Automatic).unwrap();

    assert_eq!(sequence.stage_count(), 2);
    assert_eq!(sequence.barrier_count(), 1);
    assert!(sequence.unsynchronized_hazards().is_empty());
}

#[test]
fn omitted_barriers_are_detected_as_hazards() {
    let Some(context) = common::test_context() else { return };

    let reduce = TotalReduce::new(context, 4 * BLOCK_SIZE).unwrap();
    let racy = reduce.build_sequence(BarrierPolicy::AsRecorded).unwrap();

    assert_eq!(racy.barrier_count(), 0);
    let hazards = racy.unsynchronized_hazards();
    assert!(!hazards.is_empty());

    // The two dependent edges of the reduction must both be reported.
    assert!(hazards
        .iter()
        .any(|h| h.producer == 0 && h.consumer == 1));
    assert!(hazards
        .iter()
        .any(|h| h.producer == 1 && h.consumer == 2));
}

#[test]
fn omitted_scan_barrier_names_the_block_scan_buffer() {
    let Some(context) = common::test_context() else { return };

    let scan = PrefixScan::new(context, 2 * BLOCK_SIZE).unwrap();
    let racy = scan.build_sequence(BarrierPolicy::AsRecorded).unwrap();

    let hazards = racy.unsynchronized_hazards();
    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].producer, 0);
    assert_eq!(hazards[0].consumer, 1);
    assert_eq!(hazards[0].range.size, u64::from(2 * BLOCK_SIZE) * 4);
}

#[test]
fn barrier_correct_path_is_stable_across_many_runs() {
    let Some(context) = common::test_context() else { return };

    let n = 3 * BLOCK_SIZE + 5;
    let values: Vec<f32> = (0..n).map(|i| ((i * 13 + 1) % 89) as f32).collect();
    let scan = PrefixScan::new(context, n).unwrap();

    scan.seed(context, &values).unwrap();
    let baseline = common::bits_of(&scan.execute(context).unwrap());

    for run in 0..16 {
        scan.seed(context, &values).unwrap();
        let result = common::bits_of(&scan.execute(context).unwrap());
        assert_eq!(result, baseline, "unstable result on run {run}");
    }
}
