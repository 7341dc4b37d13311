#![allow(dead_code)]

use std::sync::OnceLock;

use staged_compute::{ContextOptions, GpuContext};

/// Shared context for every GPU test in one binary.
///
/// Returns `None` (and the tests skip) when no adapter is present, so
/// the suite stays green on CI machines without a GPU.
pub fn test_context() -> Option<&'static GpuContext> {
    static CONTEXT: OnceLock<Option<GpuContext>> = OnceLock::new();

    CONTEXT
        .get_or_init(|| {
            let _ = env_logger::builder().is_test(true).try_init();
            match GpuContext::new(&ContextOptions::default()) {
                Ok(context) => Some(context),
                Err(error) => {
                    eprintln!("skipping GPU tests: {error}");
                    None
                }
            }
        })
        .as_ref()
}

/// Bit-exact comparison for f32 result vectors.
pub fn bits_of(values: &[f32]) -> Vec<u32> {
    values.iter().map(|v| v.to_bits()).collect()
}
