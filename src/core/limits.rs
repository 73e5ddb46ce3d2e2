/*!
 * System Limits and Constants
 *
 * Centralized location for engine-wide limits and defaults.
 * `IpcConfig` starts from these values; most can be overridden at init.
 */

// =============================================================================
// HANDLE TABLE
// =============================================================================

/// Bits of a handle value that carry the slot index (+1)
/// The remaining high bits carry the slot generation
pub const HANDLE_INDEX_BITS: u32 = 20;

/// Mask selecting the index part of a handle value
pub const HANDLE_INDEX_MASK: u32 = (1 << HANDLE_INDEX_BITS) - 1;

/// Generations per slot before values repeat
pub const HANDLE_GENERATIONS: u32 = 1 << (32 - HANDLE_INDEX_BITS);

/// Hard ceiling on live handles (index 0 is never issued)
pub const MAX_HANDLE_SLOTS: usize = HANDLE_INDEX_MASK as usize;

/// Default live handle limit
pub const DEFAULT_MAX_HANDLES: usize = 256 * 1024;

/// Freed slots held back before the oldest one is reissued
pub const HANDLE_QUARANTINE_LEN: usize = 1024;

// =============================================================================
// MESSAGE PIPES
// =============================================================================

/// Largest message payload (4MB)
pub const DEFAULT_MAX_MESSAGE_NUM_BYTES: usize = 4 * 1024 * 1024;

/// Most handles attached to one message
pub const DEFAULT_MAX_MESSAGE_NUM_HANDLES: usize = 10_000;

// =============================================================================
// DATA PIPES
// =============================================================================

/// Element size used when no options are supplied
pub const DEFAULT_DATA_PIPE_ELEMENT_SIZE: u32 = 1;

/// Capacity used when no options are supplied (1MB)
pub const DEFAULT_DATA_PIPE_CAPACITY: u32 = 1024 * 1024;

/// Largest data pipe ring (256MB)
pub const MAX_DATA_PIPE_CAPACITY: u32 = 256 * 1024 * 1024;

// =============================================================================
// SHARED BUFFERS
// =============================================================================

/// Largest single shared buffer (1GB)
pub const MAX_SHARED_BUFFER_BYTES: u64 = 1024 * 1024 * 1024;
