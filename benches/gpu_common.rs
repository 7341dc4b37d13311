#![allow(dead_code)]

use std::sync::OnceLock;

use staged_compute::{ContextOptions, GpuContext};

pub fn bench_context() -> Option<&'static GpuContext> {
    static CONTEXT: OnceLock<Option<GpuContext>> = OnceLock::new();

    CONTEXT
        .get_or_init(|| {
            let _ = env_logger::try_init();
            match GpuContext::new(&ContextOptions::default()) {
                Ok(context) => Some(context),
                Err(error) => {
                    eprintln!("skipping GPU benches: {error}");
                    None
                }
            }
        })
        .as_ref()
}
