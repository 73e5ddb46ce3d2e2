/*!
 * Boundary Vocabulary
 *
 * Everything a foreign binding layer mirrors bit for bit: handle values,
 * deadlines, time ticks, signal bits, flag bits and option records.
 */

pub mod flags;
pub mod options;
pub mod signals;
pub mod types;

pub use flags::*;
pub use options::{
    CreateDataPipeOptions, CreateMessagePipeOptions, CreateSharedBufferOptions,
    DuplicateBufferHandleOptions, OptionRecord, OPTIONS_HEADER_SIZE,
};
pub use signals::{HandleSignals, HandleSignalsState};
pub use types::{time_ticks_now, Deadline, Handle, TimeTicks};
