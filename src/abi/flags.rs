/*!
 * Operation Flags
 * Flag sets accepted by the pipe and buffer calls, with the native bit positions
 */

use crate::core::errors::{IpcError, IpcResult};
use bitflags::bitflags;

bitflags! {
    /// Flags for writing a message
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WriteMessageFlags: u32 {}
}

bitflags! {
    /// Flags for reading a message
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReadMessageFlags: u32 {
        /// Drop a message that does not fit the caller's bounds
        const MAY_DISCARD = 1 << 0;
    }
}

bitflags! {
    /// Flags for writing to a data pipe producer
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WriteDataFlags: u32 {
        /// Write everything or nothing
        const ALL_OR_NONE = 1 << 0;
    }
}

bitflags! {
    /// Flags for reading from a data pipe consumer
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReadDataFlags: u32 {
        /// Read everything requested or nothing
        const ALL_OR_NONE = 1 << 0;
        /// Drop the data instead of returning it
        const DISCARD = 1 << 1;
        /// Only report how many bytes are available
        const QUERY = 1 << 2;
        /// Copy the data out but leave it buffered
        const PEEK = 1 << 3;
    }
}

bitflags! {
    /// Flags for creating a data pipe
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreateDataPipeFlags: u32 {
        /// On overflow, drop the oldest buffered elements instead of refusing the write
        const MAY_DISCARD = 1 << 0;
    }
}

bitflags! {
    /// Flags for creating a message pipe
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreateMessagePipeFlags: u32 {}
}

bitflags! {
    /// Flags for creating a shared buffer
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreateSharedBufferFlags: u32 {}
}

bitflags! {
    /// Flags for duplicating a shared buffer handle
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DuplicateBufferHandleFlags: u32 {
        /// The new handle (and its mappings) may only read
        const READ_ONLY = 1 << 0;
    }
}

bitflags! {
    /// Flags for mapping a shared buffer
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapBufferFlags: u32 {}
}

/// Reject bits this engine does not define
///
/// Flags built with `from_bits_retain` can carry anything the boundary sent.
pub fn reject_unknown<F>(flags: F, what: &str) -> IpcResult<()>
where
    F: bitflags::Flags<Bits = u32>,
{
    let unknown = flags.bits() & !F::all().bits();
    if unknown != 0 {
        return Err(IpcError::Unimplemented(format!(
            "unsupported {} flag bits {:#x}",
            what, unknown
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions() {
        assert_eq!(ReadMessageFlags::MAY_DISCARD.bits(), 1);
        assert_eq!(WriteDataFlags::ALL_OR_NONE.bits(), 1);
        assert_eq!(ReadDataFlags::ALL_OR_NONE.bits(), 1);
        assert_eq!(ReadDataFlags::DISCARD.bits(), 2);
        assert_eq!(ReadDataFlags::QUERY.bits(), 4);
        assert_eq!(ReadDataFlags::PEEK.bits(), 8);
        assert_eq!(CreateDataPipeFlags::MAY_DISCARD.bits(), 1);
        assert_eq!(DuplicateBufferHandleFlags::READ_ONLY.bits(), 1);
        assert_eq!(WriteMessageFlags::all().bits(), 0);
    }

    #[test]
    fn test_reject_unknown() {
        assert!(reject_unknown(ReadDataFlags::PEEK, "read data").is_ok());
        let bogus = ReadDataFlags::from_bits_retain(1 << 9);
        assert!(matches!(
            reject_unknown(bogus, "read data"),
            Err(IpcError::Unimplemented(_))
        ));
        let bogus = MapBufferFlags::from_bits_retain(1);
        assert!(reject_unknown(bogus, "map").is_err());
    }
}
