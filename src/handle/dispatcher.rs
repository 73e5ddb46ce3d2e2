/*!
 * Dispatchers
 * The endpoint object a handle resolves to, one variant per primitive
 */

use crate::abi::{HandleSignals, HandleSignalsState};
use crate::core::errors::{IpcError, IpcResult};
use crate::core::sync::Awakable;
use crate::core::types::WaitContext;
use crate::ipc::data_pipe::{DataPipeConsumer, DataPipeProducer};
use crate::ipc::message_pipe::MessagePipeEndpoint;
use crate::ipc::shared_buffer::SharedBufferHandle;
use crate::signals::{NotRegistered, WaiterToken};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What kind of object a handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherKind {
    MessagePipe,
    DataPipeProducer,
    DataPipeConsumer,
    SharedBuffer,
}

impl fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MessagePipe => "message_pipe",
            Self::DataPipeProducer => "data_pipe_producer",
            Self::DataPipeConsumer => "data_pipe_consumer",
            Self::SharedBuffer => "shared_buffer",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum Dispatcher {
    MessagePipe(MessagePipeEndpoint),
    DataPipeProducer(DataPipeProducer),
    DataPipeConsumer(DataPipeConsumer),
    SharedBuffer(SharedBufferHandle),
}

impl Dispatcher {
    pub fn kind(&self) -> DispatcherKind {
        match self {
            Self::MessagePipe(_) => DispatcherKind::MessagePipe,
            Self::DataPipeProducer(_) => DispatcherKind::DataPipeProducer,
            Self::DataPipeConsumer(_) => DispatcherKind::DataPipeConsumer,
            Self::SharedBuffer(_) => DispatcherKind::SharedBuffer,
        }
    }

    pub fn signals_state(&self) -> HandleSignalsState {
        match self {
            Self::MessagePipe(endpoint) => endpoint.signals_state(),
            Self::DataPipeProducer(producer) => producer.signals_state(),
            Self::DataPipeConsumer(consumer) => consumer.signals_state(),
            Self::SharedBuffer(_) => HandleSignalsState::never(),
        }
    }

    pub fn add_waiter(
        &self,
        waiter: Arc<dyn Awakable>,
        signals: HandleSignals,
        context: WaitContext,
    ) -> Result<WaiterToken, NotRegistered> {
        match self {
            Self::MessagePipe(endpoint) => endpoint.cell().add_waiter(waiter, signals, context),
            Self::DataPipeProducer(producer) => producer.cell().add_waiter(waiter, signals, context),
            Self::DataPipeConsumer(consumer) => consumer.cell().add_waiter(waiter, signals, context),
            Self::SharedBuffer(_) => Err(NotRegistered {
                error: IpcError::FailedPrecondition("shared buffers never signal".to_string()),
                state: HandleSignalsState::never(),
            }),
        }
    }

    pub fn remove_waiter(&self, token: WaiterToken) {
        match self {
            Self::MessagePipe(endpoint) => endpoint.cell().remove_waiter(token),
            Self::DataPipeProducer(producer) => producer.cell().remove_waiter(token),
            Self::DataPipeConsumer(consumer) => consumer.cell().remove_waiter(token),
            Self::SharedBuffer(_) => {}
        }
    }

    /// End every wait parked on this endpoint without closing it
    pub fn cancel_waiters(&self) {
        match self {
            Self::MessagePipe(endpoint) => {
                endpoint.cell().cancel_waiters();
            }
            Self::DataPipeProducer(producer) => {
                producer.cell().cancel_waiters();
            }
            Self::DataPipeConsumer(consumer) => {
                consumer.cell().cancel_waiters();
            }
            Self::SharedBuffer(_) => {}
        }
    }

    /// Release the endpoint: notify the peer and cancel local waiters
    ///
    /// Idempotent; only the first call has an effect.
    pub fn close(&self) {
        match self {
            Self::MessagePipe(endpoint) => endpoint.close(),
            Self::DataPipeProducer(producer) => producer.close(),
            Self::DataPipeConsumer(consumer) => consumer.close(),
            // The region goes away with its last handle or mapping
            Self::SharedBuffer(_) => {}
        }
    }

    pub fn as_message_pipe(&self) -> IpcResult<&MessagePipeEndpoint> {
        match self {
            Self::MessagePipe(endpoint) => Ok(endpoint),
            other => Err(wrong_kind(other, DispatcherKind::MessagePipe)),
        }
    }

    pub fn as_producer(&self) -> IpcResult<&DataPipeProducer> {
        match self {
            Self::DataPipeProducer(producer) => Ok(producer),
            other => Err(wrong_kind(other, DispatcherKind::DataPipeProducer)),
        }
    }

    pub fn as_consumer(&self) -> IpcResult<&DataPipeConsumer> {
        match self {
            Self::DataPipeConsumer(consumer) => Ok(consumer),
            other => Err(wrong_kind(other, DispatcherKind::DataPipeConsumer)),
        }
    }

    pub fn as_shared_buffer(&self) -> IpcResult<&SharedBufferHandle> {
        match self {
            Self::SharedBuffer(buffer) => Ok(buffer),
            other => Err(wrong_kind(other, DispatcherKind::SharedBuffer)),
        }
    }
}

impl Drop for Dispatcher {
    // Last reference gone without an explicit close (unread cargo, teardown)
    fn drop(&mut self) {
        self.close();
    }
}

fn wrong_kind(dispatcher: &Dispatcher, expected: DispatcherKind) -> IpcError {
    IpcError::InvalidArgument(format!(
        "expected a {} handle, got a {} handle",
        expected,
        dispatcher.kind()
    ))
}
