/*!
 * Option Records
 *
 * Fixed-layout creation/duplication options. Every record starts with its own
 * size so newer callers can append fields: decoding accepts longer records
 * (trailing bytes ignored) and fills fields missing from shorter ones with
 * defaults.
 */

use super::flags::{
    CreateDataPipeFlags, CreateMessagePipeFlags, CreateSharedBufferFlags,
    DuplicateBufferHandleFlags,
};
use crate::core::errors::{IpcError, IpcResult};
use crate::core::limits::{DEFAULT_DATA_PIPE_CAPACITY, DEFAULT_DATA_PIPE_ELEMENT_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the `{struct_size, flags}` header every record starts with
pub const OPTIONS_HEADER_SIZE: u32 = 8;

/// A record that crosses the call boundary as little-endian bytes
pub trait OptionRecord: Sized {
    /// Size the native side expects in `struct_size`
    const STRUCT_SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Serialize in native layout
    fn encode(&self) -> Bytes;

    /// Parse a record received from the boundary
    fn decode(raw: &[u8]) -> IpcResult<Self>;
}

/// Read the header, returning the declared size, the flags and the fields after the header
fn decode_header(raw: &[u8], what: &str) -> IpcResult<(u32, u32, Bytes)> {
    let mut buf = raw;
    if buf.remaining() < OPTIONS_HEADER_SIZE as usize {
        return Err(IpcError::InvalidArgument(format!(
            "{} record truncated: {} bytes",
            what,
            raw.len()
        )));
    }
    let struct_size = buf.get_u32_le();
    let flags = buf.get_u32_le();
    if struct_size < OPTIONS_HEADER_SIZE || struct_size as usize > raw.len() {
        return Err(IpcError::InvalidArgument(format!(
            "{} record declares size {} but {} bytes were supplied",
            what,
            struct_size,
            raw.len()
        )));
    }
    let body_len = struct_size as usize - OPTIONS_HEADER_SIZE as usize;
    Ok((struct_size, flags, Bytes::copy_from_slice(&buf[..body_len])))
}

fn next_field(body: &mut Bytes, default: u32) -> u32 {
    if body.remaining() >= 4 {
        body.get_u32_le()
    } else {
        default
    }
}

/// Options for creating a data pipe
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateDataPipeOptions {
    pub struct_size: u32,
    pub flags: CreateDataPipeFlags,
    /// Bytes per element; every transfer is a whole number of elements
    pub element_num_bytes: u32,
    /// Ring size in bytes; a multiple of `element_num_bytes`
    pub capacity_num_bytes: u32,
}

impl CreateDataPipeOptions {
    pub fn new(flags: CreateDataPipeFlags, element_num_bytes: u32, capacity_num_bytes: u32) -> Self {
        Self {
            struct_size: Self::STRUCT_SIZE,
            flags,
            element_num_bytes,
            capacity_num_bytes,
        }
    }

    #[inline]
    pub fn may_discard(&self) -> bool {
        self.flags.contains(CreateDataPipeFlags::MAY_DISCARD)
    }
}

impl Default for CreateDataPipeOptions {
    fn default() -> Self {
        Self::new(
            CreateDataPipeFlags::empty(),
            DEFAULT_DATA_PIPE_ELEMENT_SIZE,
            DEFAULT_DATA_PIPE_CAPACITY,
        )
    }
}

impl OptionRecord for CreateDataPipeOptions {
    fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::STRUCT_SIZE as usize);
        buf.put_u32_le(self.struct_size);
        buf.put_u32_le(self.flags.bits());
        buf.put_u32_le(self.element_num_bytes);
        buf.put_u32_le(self.capacity_num_bytes);
        buf.freeze()
    }

    fn decode(raw: &[u8]) -> IpcResult<Self> {
        let (struct_size, flags, mut body) = decode_header(raw, "data pipe options")?;
        Ok(Self {
            struct_size,
            flags: CreateDataPipeFlags::from_bits_retain(flags),
            element_num_bytes: next_field(&mut body, DEFAULT_DATA_PIPE_ELEMENT_SIZE),
            capacity_num_bytes: next_field(&mut body, DEFAULT_DATA_PIPE_CAPACITY),
        })
    }
}

macro_rules! flags_only_record {
    ($(#[$doc:meta])* $name:ident, $flags:ty, $what:literal) => {
        $(#[$doc])*
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub struct_size: u32,
            pub flags: $flags,
        }

        impl $name {
            pub fn new(flags: $flags) -> Self {
                Self {
                    struct_size: <Self as OptionRecord>::STRUCT_SIZE,
                    flags,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new(<$flags>::empty())
            }
        }

        impl OptionRecord for $name {
            fn encode(&self) -> Bytes {
                let mut buf = BytesMut::with_capacity(Self::STRUCT_SIZE as usize);
                buf.put_u32_le(self.struct_size);
                buf.put_u32_le(self.flags.bits());
                buf.freeze()
            }

            fn decode(raw: &[u8]) -> IpcResult<Self> {
                let (struct_size, flags, _) = decode_header(raw, $what)?;
                Ok(Self {
                    struct_size,
                    flags: <$flags>::from_bits_retain(flags),
                })
            }
        }
    };
}

flags_only_record!(
    /// Options for creating a message pipe
    CreateMessagePipeOptions,
    CreateMessagePipeFlags,
    "message pipe options"
);

flags_only_record!(
    /// Options for creating a shared buffer
    CreateSharedBufferOptions,
    CreateSharedBufferFlags,
    "shared buffer options"
);

flags_only_record!(
    /// Options for duplicating a shared buffer handle
    DuplicateBufferHandleOptions,
    DuplicateBufferHandleFlags,
    "duplicate buffer options"
);

/// Reject a record whose declared size cannot hold the header
pub(crate) fn check_struct_size(struct_size: u32, what: &str) -> IpcResult<()> {
    if struct_size < OPTIONS_HEADER_SIZE {
        return Err(IpcError::InvalidArgument(format!(
            "{} struct_size {} is smaller than the {}-byte header",
            what, struct_size, OPTIONS_HEADER_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_layouts_match_native() {
        assert_eq!(size_of::<CreateDataPipeOptions>(), 16);
        assert_eq!(offset_of!(CreateDataPipeOptions, flags), 4);
        assert_eq!(offset_of!(CreateDataPipeOptions, element_num_bytes), 8);
        assert_eq!(offset_of!(CreateDataPipeOptions, capacity_num_bytes), 12);
        assert_eq!(size_of::<CreateMessagePipeOptions>(), 8);
        assert_eq!(size_of::<CreateSharedBufferOptions>(), 8);
        assert_eq!(size_of::<DuplicateBufferHandleOptions>(), 8);
        assert_eq!(CreateDataPipeOptions::default().struct_size, 16);
        assert_eq!(DuplicateBufferHandleOptions::default().struct_size, 8);
    }

    #[test]
    fn test_encode_is_little_endian() {
        let options = CreateDataPipeOptions::new(CreateDataPipeFlags::MAY_DISCARD, 4, 64);
        let bytes = options.encode();
        assert_eq!(
            &bytes[..],
            &[16, 0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 64, 0, 0, 0]
        );
        assert_eq!(CreateDataPipeOptions::decode(&bytes).unwrap(), options);
    }

    #[test]
    fn test_decode_short_record_uses_defaults() {
        // Header plus element size only
        let raw = [12, 0, 0, 0, 0, 0, 0, 0, 8, 0, 0, 0];
        let options = CreateDataPipeOptions::decode(&raw).unwrap();
        assert_eq!(options.element_num_bytes, 8);
        assert_eq!(options.capacity_num_bytes, DEFAULT_DATA_PIPE_CAPACITY);
    }

    #[test]
    fn test_decode_longer_record_ignores_tail() {
        let mut raw = CreateDataPipeOptions::new(CreateDataPipeFlags::empty(), 2, 8)
            .encode()
            .to_vec();
        raw[0] = 20;
        raw.extend_from_slice(&[0xAA; 4]);
        let options = CreateDataPipeOptions::decode(&raw).unwrap();
        assert_eq!(options.struct_size, 20);
        assert_eq!(options.capacity_num_bytes, 8);
    }

    #[test]
    fn test_decode_rejects_bad_sizes() {
        assert!(CreateMessagePipeOptions::decode(&[8, 0, 0]).is_err());
        assert!(CreateMessagePipeOptions::decode(&[4, 0, 0, 0, 0, 0, 0, 0]).is_err());
        assert!(CreateMessagePipeOptions::decode(&[12, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_flags_survive_round_trip() {
        let options = DuplicateBufferHandleOptions::new(DuplicateBufferHandleFlags::READ_ONLY);
        let decoded = DuplicateBufferHandleOptions::decode(&options.encode()).unwrap();
        assert!(decoded.flags.contains(DuplicateBufferHandleFlags::READ_ONLY));
    }
}
