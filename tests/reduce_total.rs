// Run: cargo test --test reduce_total -- --nocapture
//
// Exercises the three-stage reduction end to end: partial sums per
// group, single-group combine, scalar broadcast. Skips when no adapter
// is present.

mod common;

use staged_compute::{BLOCK_SIZE, ComputeError, SequenceError, TotalReduce};

#[test]
fn all_ones_reduce_equals_length() {
    let Some(context) = common::test_context() else { return };

    for n in [1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, BLOCK_SIZE * BLOCK_SIZE] {
        let reduce = TotalReduce::new(context, n).unwrap();
        reduce.seed(context, &vec![1.0f32; n as usize]).unwrap();

        let total = reduce.execute(context).unwrap();
        assert_eq!(total, n as f32, "wrong total for n = {n}");
    }
}

#[test]
fn broadcast_fills_every_output_element() {
    let Some(context) = common::test_context() else { return };

    let n = 3 * BLOCK_SIZE + 7;
    let reduce = TotalReduce::new(context, n).unwrap();
    reduce.seed(context, &vec![1.0f32; n as usize]).unwrap();
    reduce.execute(context).unwrap();

    let output = reduce.read_output(context).unwrap();
    assert_eq!(output.len(), n as usize);
    assert!(output.iter().all(|&v| v == n as f32));
}

#[test]
fn integer_valued_inputs_sum_exactly() {
    let Some(context) = common::test_context() else { return };

    let n = 1000u32;
    let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
    // Integer-valued f32 sums below 2^24 are exact in any addition
    // order, so the GPU tree reduction must match the closed form.
    let expected = (n * (n - 1) / 2) as f32;

    let reduce = TotalReduce::new(context, n).unwrap();
    reduce.seed(context, &values).unwrap();
    assert_eq!(reduce.execute(context).unwrap(), expected);
}

#[test]
fn group_capacity_overflow_is_rejected_not_silently_wrong() {
    let Some(context) = common::test_context() else { return };

    // One element past BLOCK_SIZE² needs BLOCK_SIZE + 1 groups, which
    // the fixed-capacity group-sum buffer cannot hold. The documented
    // limitation must surface as an error.
    let err = TotalReduce::new(context, BLOCK_SIZE * BLOCK_SIZE + 1).unwrap_err();
    assert_eq!(
        err,
        ComputeError::Sequence(SequenceError::GroupCapacityExceeded {
            groups: BLOCK_SIZE + 1,
            capacity: BLOCK_SIZE,
        })
    );
}

#[test]
fn reexecution_on_reseeded_inputs_is_bit_identical() {
    let Some(context) = common::test_context() else { return };

    let n = 2 * BLOCK_SIZE + 3;
    let values: Vec<f32> = (0..n).map(|i| (i % 17) as f32 * 0.5).collect();
    let reduce = TotalReduce::new(context, n).unwrap();

    reduce.seed(context, &values).unwrap();
    let first = reduce.execute(context).unwrap();
    let first_out = common::bits_of(&reduce.read_output(context).unwrap());

    reduce.seed(context, &values).unwrap();
    let second = reduce.execute(context).unwrap();
    let second_out = common::bits_of(&reduce.read_output(context).unwrap());

    assert_eq!(first.to_bits(), second.to_bits());
    assert_eq!(first_out, second_out);
}
