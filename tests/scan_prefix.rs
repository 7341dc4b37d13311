// Run: cargo test --test scan_prefix -- --nocapture
//
// Exercises the two-pass inclusive scan, including lengths that are not
// a multiple of the block size (the remainder elements a floor-divided
// dispatch would drop).

mod common;

use staged_compute::{PrefixScan, BLOCK_SIZE};

#[test]
fn inclusive_prefix_sums_match_closed_form() {
    let Some(context) = common::test_context() else { return };

    for n in [BLOCK_SIZE, 3 * BLOCK_SIZE, 3 * BLOCK_SIZE + 5] {
        let scan = PrefixScan::new(context, n).unwrap();
        let values: Vec<f32> = (0..n).map(|i| i as f32).collect();
        scan.seed(context, &values).unwrap();

        let output = scan.execute(context).unwrap();
        assert_eq!(output.len(), n as usize);

        for i in 0..n as u64 {
            let expected = (i * (i + 1) / 2) as f32;
            assert_eq!(output[i as usize], expected, "mismatch at index {i} for n = {n}");
        }
    }
}

#[test]
fn partial_final_block_is_not_dropped() {
    let Some(context) = common::test_context() else { return };

    // ceil dispatch must cover the lone remainder element.
    let n = BLOCK_SIZE + 1;
    let scan = PrefixScan::new(context, n).unwrap();
    scan.seed(context, &vec![1.0f32; n as usize]).unwrap();

    let output = scan.execute(context).unwrap();
    assert_eq!(output[(n - 1) as usize], n as f32);
}

#[test]
fn repeated_runs_are_bit_identical() {
    let Some(context) = common::test_context() else { return };

    let n = 3 * BLOCK_SIZE + 5;
    let values: Vec<f32> = (0..n).map(|i| ((i * 31 + 7) % 101) as f32).collect();
    let scan = PrefixScan::new(context, n).unwrap();

    scan.seed(context, &values).unwrap();
    let first = common::bits_of(&scan.execute(context).unwrap());

    scan.seed(context, &values).unwrap();
    let second = common::bits_of(&scan.execute(context).unwrap());

    assert_eq!(first, second);
}
