//! Built-in compute kernels and their push-constant records.
//!
//! All kernels operate on `f32` element arrays and are written for a
//! fixed invocation-group size of [`BLOCK_SIZE`] — the workgroup size
//! literals in the WGSL below must match it.
//!
//! Every storage slot is declared `read_write` regardless of how a
//! kernel actually uses it: the logical buffers share one backing
//! allocation, so a mixed read-only/read-write view of the same backing
//! buffer within one dispatch would be rejected by the backend's usage
//! tracking. The binding-set layouts are uniformly read-write to match.

use crate::gpu::kernel::{KernelLibrary, KernelSource};

/// Invocations per group. Kernel workgroup sizes are compiled to this.
pub const BLOCK_SIZE: u32 = 256;

/// Push-constant record of the reduction kernel: `{totalLength, depth}`
/// as two 32-bit fields, interpreted positionally.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ReduceParams {
    /// Number of valid elements in the stage's source slot.
    pub total: u32,

    /// Reduction level: 0 for the per-group pass, 1 for the combining
    /// pass.
    pub depth: u32,
}

unsafe impl bytemuck::Pod for ReduceParams {}
unsafe impl bytemuck::Zeroable for ReduceParams {}

/// Push-constant record of the scan and broadcast kernels:
/// `{totalLength}` as one 32-bit field.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ScanParams {
    /// Number of valid elements.
    pub total: u32,
}

unsafe impl bytemuck::Pod for ScanParams {}
unsafe impl bytemuck::Zeroable for ScanParams {}

/// Tree reduction of one group of 256 elements into a single partial
/// sum per group.
///
/// Slots: 0 = source array, 1 = group sums, 2 = unused (kept so the
/// per-group and combining passes share one 3-slot layout).
/// At depth 0 each group `g` sums `src[g*256 .. (g+1)*256)` into
/// `sums[g]`; at depth 1 a single group reduces the group sums in
/// place, leaving the total in `sums[0]`.
pub const REDUCE_BLOCK_SUM: &str = r#"
struct Params {
    total: u32,
    depth: u32,
}

var<push_constant> pc: Params;

@group(0) @binding(0) var<storage, read_write> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> sums: array<f32>;
@group(0) @binding(2) var<storage, read_write> aux: array<f32>;

var<workgroup> tile: array<f32, 256u>;

@compute @workgroup_size(256)
fn block_sum(@builtin(local_invocation_id) lid: vec3<u32>,
             @builtin(global_invocation_id) gid: vec3<u32>,
             @builtin(workgroup_id) wid: vec3<u32>) {
    let lane = lid.x;

    var value = 0.0;
    if (gid.x < pc.total) {
        value = src[gid.x];
    }
    tile[lane] = value;
    workgroupBarrier();

    var stride = 128u;
    loop {
        if (stride == 0u) {
            break;
        }
        if (lane < stride) {
            tile[lane] = tile[lane] + tile[lane + stride];
        }
        workgroupBarrier();
        stride = stride >> 1u;
    }

    if (lane == 0u) {
        sums[wid.x] = tile[0u];
    }
}
"#;

/// Broadcasts the reduced scalar `sums[0]` to every element of the
/// destination. Slots: 0 = group sums, 1 = destination.
pub const REDUCE_BROADCAST: &str = r#"
struct Params {
    total: u32,
}

var<push_constant> pc: Params;

@group(0) @binding(0) var<storage, read_write> sums: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;

@compute @workgroup_size(256)
fn broadcast_total(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x < pc.total) {
        dst[gid.x] = sums[0u];
    }
}
"#;

/// Per-block inclusive scan (Hillis–Steele in workgroup memory).
/// Slots: 0 = source, 1 = block-scanned destination. The last element
/// of each block in the destination is that block's total.
pub const SCAN_BLOCK: &str = r#"
struct Params {
    total: u32,
}

var<push_constant> pc: Params;

@group(0) @binding(0) var<storage, read_write> src: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;

var<workgroup> tile: array<f32, 256u>;

@compute @workgroup_size(256)
fn scan_block(@builtin(local_invocation_id) lid: vec3<u32>,
              @builtin(global_invocation_id) gid: vec3<u32>) {
    let lane = lid.x;

    var value = 0.0;
    if (gid.x < pc.total) {
        value = src[gid.x];
    }
    tile[lane] = value;
    workgroupBarrier();

    var offset = 1u;
    loop {
        if (offset >= 256u) {
            break;
        }
        var addend = 0.0;
        if (lane >= offset) {
            addend = tile[lane - offset];
        }
        workgroupBarrier();
        tile[lane] = tile[lane] + addend;
        workgroupBarrier();
        offset = offset << 1u;
    }

    if (gid.x < pc.total) {
        dst[gid.x] = tile[lane];
    }
}
"#;

/// Adds the totals of all preceding blocks to each block-scanned
/// element, producing the global inclusive scan.
/// Slots: 0 = block-scanned values, 1 = destination.
pub const SCAN_COMBINE: &str = r#"
struct Params {
    total: u32,
}

var<push_constant> pc: Params;

@group(0) @binding(0) var<storage, read_write> scans: array<f32>;
@group(0) @binding(1) var<storage, read_write> dst: array<f32>;

@compute @workgroup_size(256)
fn scan_combine(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    if (i >= pc.total) {
        return;
    }

    let block = i / 256u;
    var carry = 0.0;
    var b = 0u;
    loop {
        if (b >= block) {
            break;
        }
        let tail = min((b + 1u) * 256u, pc.total) - 1u;
        carry = carry + scans[tail];
        b = b + 1u;
    }

    dst[i] = scans[i] + carry;
}
"#;

/// Library with every built-in kernel registered.
pub fn library() -> KernelLibrary {
    let mut library = KernelLibrary::new();
    library.register(
        "reduce_block_sum",
        KernelSource { wgsl: REDUCE_BLOCK_SUM, entry: "block_sum" },
    );
    library.register(
        "reduce_broadcast",
        KernelSource { wgsl: REDUCE_BROADCAST, entry: "broadcast_total" },
    );
    library.register(
        "scan_block",
        KernelSource { wgsl: SCAN_BLOCK, entry: "scan_block" },
    );
    library.register(
        "scan_combine",
        KernelSource { wgsl: SCAN_COMBINE, entry: "scan_combine" },
    );
    library
}
