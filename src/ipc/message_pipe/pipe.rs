/*!
 * Message Pipe Implementation
 *
 * Both endpoints share one `MessagePipe`; a single mutex covers both queues so
 * every read, write and close is atomic as a whole. Signal cells are updated
 * while that mutex is held.
 */

use super::types::{QueuedMessage, ReadBounds};
use crate::abi::{HandleSignals, HandleSignalsState};
use crate::core::errors::{IpcError, IpcResult};
use crate::handle::Dispatcher;
use crate::signals::SignalCell;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct EndpointState {
    open: bool,
    /// Messages waiting to be read on this side
    incoming: VecDeque<QueuedMessage>,
}

#[derive(Debug)]
struct PipeState {
    endpoints: [EndpointState; 2],
}

impl PipeState {
    fn signals(&self, side: usize) -> HandleSignalsState {
        let own = &self.endpoints[side];
        let peer_open = self.endpoints[1 - side].open;
        let has_message = !own.incoming.is_empty();

        let mut satisfied = HandleSignals::empty();
        let mut satisfiable = HandleSignals::PEER_CLOSED;
        if has_message {
            satisfied |= HandleSignals::READABLE;
        }
        if has_message || peer_open {
            satisfiable |= HandleSignals::READABLE;
        }
        if peer_open {
            satisfied |= HandleSignals::WRITABLE;
            satisfiable |= HandleSignals::WRITABLE;
        } else {
            satisfied |= HandleSignals::PEER_CLOSED;
        }
        HandleSignalsState::new(satisfied, satisfiable)
    }
}

/// Shared state of a connected endpoint pair
#[derive(Debug)]
pub struct MessagePipe {
    state: Mutex<PipeState>,
    cells: [SignalCell; 2],
}

impl MessagePipe {
    /// New pipe with both endpoints open
    pub fn create() -> (MessagePipeEndpoint, MessagePipeEndpoint) {
        let state = PipeState {
            endpoints: [
                EndpointState {
                    open: true,
                    incoming: VecDeque::new(),
                },
                EndpointState {
                    open: true,
                    incoming: VecDeque::new(),
                },
            ],
        };
        let cells = [
            SignalCell::new(state.signals(0)),
            SignalCell::new(state.signals(1)),
        ];
        let pipe = Arc::new(MessagePipe {
            state: Mutex::new(state),
            cells,
        });
        (
            MessagePipeEndpoint {
                pipe: pipe.clone(),
                side: 0,
            },
            MessagePipeEndpoint { pipe, side: 1 },
        )
    }

    fn publish(&self, state: &PipeState, side: usize) {
        self.cells[side].update(state.signals(side));
    }

    fn write(&self, side: usize, message: QueuedMessage) -> IpcResult<()> {
        let mut state = self.state.lock();
        if !state.endpoints[side].open {
            return Err(IpcError::InvalidArgument("endpoint is closed".to_string()));
        }
        let peer = 1 - side;
        if !state.endpoints[peer].open {
            return Err(IpcError::FailedPrecondition(
                "peer endpoint closed".to_string(),
            ));
        }

        trace!(
            side,
            num_bytes = message.bytes.len(),
            num_handles = message.cargo.len(),
            "Message queued"
        );
        state.endpoints[peer].incoming.push_back(message);
        self.publish(&state, peer);
        Ok(())
    }

    fn read(&self, side: usize, bounds: ReadBounds, may_discard: bool) -> IpcResult<QueuedMessage> {
        let discarded = {
            let mut state = self.state.lock();
            if !state.endpoints[side].open {
                return Err(IpcError::InvalidArgument("endpoint is closed".to_string()));
            }
            let peer_open = state.endpoints[1 - side].open;
            let Some(next) = state.endpoints[side].incoming.front() else {
                return Err(if peer_open {
                    IpcError::ShouldWait("no message queued".to_string())
                } else {
                    IpcError::FailedPrecondition(
                        "no message queued and peer endpoint closed".to_string(),
                    )
                });
            };

            if next.fits(bounds) {
                let message = state.endpoints[side]
                    .incoming
                    .pop_front()
                    .ok_or_else(|| IpcError::Internal("queue emptied under lock".to_string()))?;
                self.publish(&state, side);
                return Ok(message);
            }

            let (num_bytes, num_handles) = (next.bytes.len(), next.cargo.len());
            if !may_discard {
                return Err(IpcError::ResourceExhausted(format!(
                    "message needs {} bytes and {} handles",
                    num_bytes, num_handles
                )));
            }
            let dropped = state.endpoints[side].incoming.pop_front();
            self.publish(&state, side);
            debug!(side, num_bytes, num_handles, "Oversized message discarded");
            dropped
        };

        // Cargo may belong to other pipes; close it outside our lock
        let message = discarded.ok_or_else(|| IpcError::Internal("queue emptied under lock".to_string()))?;
        let (num_bytes, num_handles) = (message.bytes.len(), message.cargo.len());
        message.close_cargo();
        Err(IpcError::ResourceExhausted(format!(
            "message needs {} bytes and {} handles (discarded)",
            num_bytes, num_handles
        )))
    }

    /// Put a message back at the head of the queue after a failed delivery
    fn unread(&self, side: usize, message: QueuedMessage) {
        let rejected = {
            let mut state = self.state.lock();
            if state.endpoints[side].open {
                state.endpoints[side].incoming.push_front(message);
                self.publish(&state, side);
                None
            } else {
                Some(message)
            }
        };
        if let Some(message) = rejected {
            message.close_cargo();
        }
    }

    fn close(&self, side: usize) {
        let drained = {
            let mut state = self.state.lock();
            if !state.endpoints[side].open {
                return;
            }
            state.endpoints[side].open = false;
            let drained: Vec<QueuedMessage> = state.endpoints[side].incoming.drain(..).collect();
            self.cells[side].cancel_all();
            self.publish(&state, 1 - side);
            drained
        };

        debug!(side, undelivered = drained.len(), "Message pipe endpoint closed");
        for message in drained {
            message.close_cargo();
        }
    }

    fn queued(&self, side: usize) -> usize {
        self.state.lock().endpoints[side].incoming.len()
    }
}

/// One side of a message pipe
#[derive(Debug)]
pub struct MessagePipeEndpoint {
    pipe: Arc<MessagePipe>,
    side: usize,
}

impl MessagePipeEndpoint {
    /// Enqueue a message on the peer's side
    pub(crate) fn write(&self, bytes: Vec<u8>, cargo: Vec<Arc<Dispatcher>>) -> IpcResult<()> {
        self.pipe.write(self.side, QueuedMessage { bytes, cargo })
    }

    /// Dequeue the next message addressed to this side
    pub(crate) fn read(&self, bounds: ReadBounds, may_discard: bool) -> IpcResult<QueuedMessage> {
        self.pipe.read(self.side, bounds, may_discard)
    }

    pub(crate) fn unread(&self, message: QueuedMessage) {
        self.pipe.unread(self.side, message)
    }

    pub fn close(&self) {
        self.pipe.close(self.side)
    }

    pub fn signals_state(&self) -> HandleSignalsState {
        self.cell().get()
    }

    pub(crate) fn cell(&self) -> &SignalCell {
        &self.pipe.cells[self.side]
    }

    /// Messages waiting to be read on this side
    pub fn queued(&self) -> usize {
        self.pipe.queued(self.side)
    }

    /// True if `other` is either endpoint of this same pipe
    pub fn same_pipe(&self, other: &MessagePipeEndpoint) -> bool {
        Arc::ptr_eq(&self.pipe, &other.pipe)
    }
}
