/*!
 * Message Pipes
 * Bidirectional endpoint pairs carrying whole messages and transferred handles
 */

mod pipe;
mod types;

pub use pipe::{MessagePipe, MessagePipeEndpoint};
pub use types::{Message, ReadBounds};
pub(crate) use types::QueuedMessage;
