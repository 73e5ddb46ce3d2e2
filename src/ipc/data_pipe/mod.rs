/*!
 * Data Pipes
 * Unidirectional producer/consumer byte streams with element framing
 */

mod pipe;
mod types;

pub use pipe::{DataPipe, DataPipeConsumer, DataPipeProducer};
pub use types::{DataPipeGeometry, ReadData};
