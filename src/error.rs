//! Error types for the staged compute pipeline.
//!
//! This module declares focused, composable error types used across
//! pipeline construction and execution. Each error carries enough
//! context to make failures actionable while remaining small and cheap
//! to pass around or convert into the aggregate [`ComputeError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode
//!   (allocation exhaustion, binding-shape mismatch, device timeout).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into
//!   [`ComputeError`].
//! * **Fail-fast:** The pipeline treats every error as fatal. A failed
//!   stage build aborts the whole algorithm setup; a failed wait aborts
//!   the run. No partial results are valid after any failure.
//!
//! ## Typical flow
//! Low-level component operations return dedicated error types
//! (e.g. [`AllocationError`]). Orchestration code uses `?` to bubble
//! failures into [`ComputeError`], which callers can match on for
//! control flow or log with user-readable messages.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing identifying the failing operation).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;
use std::time::Duration;

use crate::types::{BufferId, LayoutId, StageIndex};

/// Convenient result alias used across the crate.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Returned when GPU bring-up fails before any pipeline work starts.
///
/// Bring-up resolves an adapter (optionally by explicit index), opens a
/// device with the push-constant capability, and captures the capability
/// table. Any failure here aborts construction of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// No compute-capable adapter was found on this system.
    NoAdapter,

    /// An explicit adapter index was requested but fewer adapters exist.
    AdapterIndexOutOfRange {
        /// Requested adapter index.
        index: usize,
        /// Number of adapters actually enumerated.
        available: usize,
    },

    /// The selected adapter does not support push constants.
    MissingPushConstants {
        /// Adapter name, for diagnostics.
        adapter: String,
    },

    /// The device request was rejected by the driver.
    DeviceRequestFailed {
        /// Driver-provided failure detail.
        detail: String,
    },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::NoAdapter => f.write_str("no compute-capable adapter found"),
            InitError::AdapterIndexOutOfRange { index, available } => write!(
                f,
                "adapter index {} out of range ({} adapters available)",
                index, available
            ),
            InitError::MissingPushConstants { adapter } => {
                write!(f, "adapter '{}' does not support push constants", adapter)
            }
            InitError::DeviceRequestFailed { detail } => {
                write!(f, "device request failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for InitError {}

/// Returned when buffer allocation or binding cannot be satisfied.
///
/// All working buffers of one algorithm instance are requested up front
/// and bound by a single backing allocation; any request that cannot be
/// honored fails the whole setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    /// A buffer was requested with a byte size of zero.
    ZeroSize {
        /// Label of the offending buffer request.
        label: &'static str,
    },

    /// A request arrived after the arena was already bound.
    AlreadyBound,

    /// A region or binding was queried before `allocate_and_bind`.
    NotBound,

    /// The combined aligned size of all requests exceeds what the device
    /// can provide in a single allocation.
    Exhausted {
        /// Total aligned bytes requested.
        requested: u64,
        /// Device limit that was exceeded.
        limit: u64,
    },

    /// A single buffer request exceeds the maximum storage binding size.
    RegionTooLarge {
        /// Requested region size in bytes.
        requested: u64,
        /// Device per-binding limit.
        limit: u64,
    },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::ZeroSize { label } => {
                write!(f, "buffer '{}' requested with zero size", label)
            }
            AllocationError::AlreadyBound => {
                f.write_str("buffer arena is already bound; requests must precede binding")
            }
            AllocationError::NotBound => {
                f.write_str("buffer arena is not bound yet")
            }
            AllocationError::Exhausted { requested, limit } => write!(
                f,
                "allocation of {} bytes exceeds device limit of {} bytes",
                requested, limit
            ),
            AllocationError::RegionTooLarge { requested, limit } => write!(
                f,
                "buffer region of {} bytes exceeds per-binding limit of {} bytes",
                requested, limit
            ),
        }
    }
}

impl std::error::Error for AllocationError {}

/// Returned when a binding set does not match the established slot shape.
///
/// Binding-set layouts are created once per slot count and shared by
/// every set with the same shape; a set that deviates from the shape it
/// claims is rejected before any descriptor is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMismatchError {
    /// `bind_buffer` or `end` was called without an open builder scope.
    NoOpenSet,

    /// `begin` was called while a previous scope was still open.
    SetAlreadyOpen,

    /// The same slot index was bound twice in one set.
    DuplicateSlot {
        /// Offending slot index.
        slot: u32,
    },

    /// Slot indices do not form a contiguous run starting at zero.
    NonContiguousSlots {
        /// First missing slot index.
        missing: u32,
        /// Number of slots actually bound.
        bound: u32,
    },

    /// The set was finalized with no slots bound.
    EmptySet,

    /// The set's slot count differs from the shared layout it claims.
    SlotCountMismatch {
        /// Slot count of the established shared layout.
        expected: u32,
        /// Slot count the set actually bound.
        actual: u32,
    },

    /// A bound buffer ID does not exist in the arena.
    UnknownBuffer {
        /// Offending buffer ID.
        buffer: BufferId,
    },

    /// A claimed shared layout was never established by this builder.
    UnknownLayout {
        /// Offending layout ID.
        layout: LayoutId,
    },
}

impl fmt::Display for LayoutMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutMismatchError::NoOpenSet => {
                f.write_str("no binding set is open; call begin first")
            }
            LayoutMismatchError::SetAlreadyOpen => {
                f.write_str("a binding set is already open; call end first")
            }
            LayoutMismatchError::DuplicateSlot { slot } => {
                write!(f, "slot {} bound more than once", slot)
            }
            LayoutMismatchError::NonContiguousSlots { missing, bound } => write!(
                f,
                "slots must be contiguous from 0: slot {} missing ({} slots bound)",
                missing, bound
            ),
            LayoutMismatchError::EmptySet => f.write_str("binding set has no slots"),
            LayoutMismatchError::SlotCountMismatch { expected, actual } => write!(
                f,
                "binding set has {} slots but the shared layout declares {}",
                actual, expected
            ),
            LayoutMismatchError::UnknownBuffer { buffer } => {
                write!(f, "buffer id {} not present in arena", buffer)
            }
            LayoutMismatchError::UnknownLayout { layout } => {
                write!(f, "layout id {} was never established", layout)
            }
        }
    }
}

impl std::error::Error for LayoutMismatchError {}

/// Returned when a named kernel cannot be located or fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelLoadError {
    /// The identifier is not present in the kernel registry.
    UnknownKernel {
        /// Requested kernel identifier.
        name: String,
    },

    /// The kernel source was rejected by shader validation.
    InvalidSource {
        /// Kernel identifier.
        name: String,
        /// Validator-provided failure detail.
        detail: String,
    },
}

impl fmt::Display for KernelLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelLoadError::UnknownKernel { name } => {
                write!(f, "unknown kernel '{}'", name)
            }
            KernelLoadError::InvalidSource { name, detail } => {
                write!(f, "kernel '{}' failed validation: {}", name, detail)
            }
        }
    }
}

impl std::error::Error for KernelLoadError {}

/// Returned when the driver rejects a pipeline build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineCreationError {
    /// The requested push-constant payload exceeds the device limit.
    PushConstantsTooLarge {
        /// Kernel the pipeline was built for.
        kernel: String,
        /// Requested payload size in bytes.
        requested: u32,
        /// Device push-constant limit in bytes.
        limit: u32,
    },

    /// The device rejected the pipeline (incompatible layout, bad
    /// entry point, or other driver-side validation failure).
    Rejected {
        /// Kernel the pipeline was built for.
        kernel: String,
        /// Driver-provided failure detail.
        detail: String,
    },
}

impl fmt::Display for PipelineCreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineCreationError::PushConstantsTooLarge { kernel, requested, limit } => write!(
                f,
                "pipeline '{}': push-constant size {} exceeds device limit {}",
                kernel, requested, limit
            ),
            PipelineCreationError::Rejected { kernel, detail } => {
                write!(f, "pipeline '{}' rejected: {}", kernel, detail)
            }
        }
    }
}

impl std::error::Error for PipelineCreationError {}

/// Returned when a stage sequence cannot be built as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    /// The sequence contains no stages.
    EmptySequence,

    /// A stage was recorded with a dispatch extent of zero groups.
    ZeroDispatch {
        /// Index of the offending stage.
        stage: StageIndex,
    },

    /// The group count exceeds the fixed capacity of the group-sum
    /// buffer, so the two-level reduction would be silently wrong.
    GroupCapacityExceeded {
        /// Groups required by the input length.
        groups: u32,
        /// Fixed capacity of the group-sum buffer.
        capacity: u32,
    },
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::EmptySequence => f.write_str("stage sequence is empty"),
            SequenceError::ZeroDispatch { stage } => {
                write!(f, "stage {} has a dispatch extent of zero groups", stage)
            }
            SequenceError::GroupCapacityExceeded { groups, capacity } => write!(
                f,
                "{} groups exceed the group-sum capacity of {}; result would be incorrect",
                groups, capacity
            ),
        }
    }
}

impl std::error::Error for SequenceError {}

/// Returned when the device did not signal completion within bound.
///
/// The submitted sequence may still be running; the caller must not
/// reuse the command sequence until the device settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError {
    /// How long the host waited before giving up.
    pub waited: Duration,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "device did not signal completion within {:?}",
            self.waited
        )
    }
}

impl std::error::Error for TimeoutError {}

/// Returned when a host↔device transfer cannot be performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The buffer ID does not exist in the arena.
    UnknownBuffer {
        /// Offending buffer ID.
        buffer: BufferId,
    },

    /// The transfer addresses bytes outside the buffer's region.
    OutOfRange {
        /// Target buffer.
        buffer: BufferId,
        /// Requested byte offset.
        offset: u64,
        /// Requested byte count.
        len: u64,
        /// Size of the buffer's bound region.
        region: u64,
    },

    /// The transfer direction is not legal for the buffer's role
    /// (e.g. reading back a `Source` buffer).
    WrongDirection {
        /// Target buffer.
        buffer: BufferId,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// Transfer offsets and lengths must be 4-byte aligned.
    Misaligned {
        /// Requested byte offset.
        offset: u64,
        /// Requested byte count.
        len: u64,
    },

    /// Mapping the staging buffer for read-back failed.
    MapFailed {
        /// Driver-provided failure detail.
        detail: String,
    },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::UnknownBuffer { buffer } => {
                write!(f, "buffer id {} not present in arena", buffer)
            }
            TransferError::OutOfRange { buffer, offset, len, region } => write!(
                f,
                "transfer on buffer {} out of range: offset {} + len {} > region {}",
                buffer, offset, len, region
            ),
            TransferError::WrongDirection { buffer, operation } => {
                write!(f, "buffer {} does not permit {}", buffer, operation)
            }
            TransferError::Misaligned { offset, len } => write!(
                f,
                "transfer offset {} / length {} must be 4-byte aligned",
                offset, len
            ),
            TransferError::MapFailed { detail } => {
                write!(f, "staging map failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for TransferError {}

/// Aggregate error for the staged compute pipeline.
///
/// Wraps the component-level failures so orchestration code can return a
/// single expressive type via `?`. Construction and execution are
/// fail-fast throughout: a variant here always means the run or setup
/// was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// GPU bring-up failed.
    Init(InitError),

    /// Buffer allocation or binding failed.
    Allocation(AllocationError),

    /// A binding set deviated from its declared slot shape.
    LayoutMismatch(LayoutMismatchError),

    /// A kernel could not be located or validated.
    KernelLoad(KernelLoadError),

    /// The driver rejected a pipeline build.
    PipelineCreation(PipelineCreationError),

    /// A stage sequence was malformed.
    Sequence(SequenceError),

    /// The device did not complete within bound.
    Timeout(TimeoutError),

    /// A host↔device transfer failed.
    Transfer(TransferError),
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeError::Init(e) => write!(f, "{e}"),
            ComputeError::Allocation(e) => write!(f, "{e}"),
            ComputeError::LayoutMismatch(e) => write!(f, "{e}"),
            ComputeError::KernelLoad(e) => write!(f, "{e}"),
            ComputeError::PipelineCreation(e) => write!(f, "{e}"),
            ComputeError::Sequence(e) => write!(f, "{e}"),
            ComputeError::Timeout(e) => write!(f, "{e}"),
            ComputeError::Transfer(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ComputeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComputeError::Init(e) => Some(e),
            ComputeError::Allocation(e) => Some(e),
            ComputeError::LayoutMismatch(e) => Some(e),
            ComputeError::KernelLoad(e) => Some(e),
            ComputeError::PipelineCreation(e) => Some(e),
            ComputeError::Sequence(e) => Some(e),
            ComputeError::Timeout(e) => Some(e),
            ComputeError::Transfer(e) => Some(e),
        }
    }
}

impl From<InitError> for ComputeError {
    fn from(e: InitError) -> Self { ComputeError::Init(e) }
}
impl From<AllocationError> for ComputeError {
    fn from(e: AllocationError) -> Self { ComputeError::Allocation(e) }
}
impl From<LayoutMismatchError> for ComputeError {
    fn from(e: LayoutMismatchError) -> Self { ComputeError::LayoutMismatch(e) }
}
impl From<KernelLoadError> for ComputeError {
    fn from(e: KernelLoadError) -> Self { ComputeError::KernelLoad(e) }
}
impl From<PipelineCreationError> for ComputeError {
    fn from(e: PipelineCreationError) -> Self { ComputeError::PipelineCreation(e) }
}
impl From<SequenceError> for ComputeError {
    fn from(e: SequenceError) -> Self { ComputeError::Sequence(e) }
}
impl From<TimeoutError> for ComputeError {
    fn from(e: TimeoutError) -> Self { ComputeError::Timeout(e) }
}
impl From<TransferError> for ComputeError {
    fn from(e: TransferError) -> Self { ComputeError::Transfer(e) }
}
