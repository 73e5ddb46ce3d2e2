/*!
 * Shared Buffers
 * Reference-counted memory regions with duplicable, mappable handles
 */

mod region;
mod types;

pub use region::{Mapping, SharedBufferHandle, SharedRegion};
pub use types::{BufferAccess, BufferInfo};
