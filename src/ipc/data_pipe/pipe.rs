/*!
 * Data Pipe Implementation
 * Element-granular byte stream over a ringbuf-backed circular buffer
 */

use super::types::{DataPipeGeometry, ReadData};
use crate::abi::{HandleSignals, HandleSignalsState, ReadDataFlags, WriteDataFlags};
use crate::core::errors::{IpcError, IpcResult};
use crate::signals::SignalCell;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;
use tracing::{debug, trace};

struct DataPipeState {
    ring: HeapRb<u8>,
    producer_open: bool,
    consumer_open: bool,
}

pub struct DataPipe {
    geometry: DataPipeGeometry,
    state: Mutex<DataPipeState>,
    producer_cell: SignalCell,
    consumer_cell: SignalCell,
}

impl std::fmt::Debug for DataPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DataPipe")
            .field("geometry", &self.geometry)
            .field("buffered", &state.ring.occupied_len())
            .field("producer_open", &state.producer_open)
            .field("consumer_open", &state.consumer_open)
            .finish()
    }
}

impl DataPipe {
    /// New pipe with both ends open
    pub fn create(geometry: DataPipeGeometry) -> (DataPipeProducer, DataPipeConsumer) {
        let state = DataPipeState {
            ring: HeapRb::<u8>::new(geometry.capacity_num_bytes),
            producer_open: true,
            consumer_open: true,
        };
        let pipe = Arc::new(DataPipe {
            producer_cell: SignalCell::new(Self::producer_signals(&geometry, &state)),
            consumer_cell: SignalCell::new(Self::consumer_signals(&geometry, &state)),
            geometry,
            state: Mutex::new(state),
        });
        (
            DataPipeProducer { pipe: pipe.clone() },
            DataPipeConsumer { pipe },
        )
    }

    fn producer_signals(geometry: &DataPipeGeometry, state: &DataPipeState) -> HandleSignalsState {
        if !state.consumer_open {
            return HandleSignalsState::new(HandleSignals::PEER_CLOSED, HandleSignals::PEER_CLOSED);
        }
        let mut satisfied = HandleSignals::empty();
        if geometry.may_discard || state.ring.vacant_len() >= geometry.element_num_bytes {
            satisfied |= HandleSignals::WRITABLE;
        }
        HandleSignalsState::new(
            satisfied,
            HandleSignals::WRITABLE | HandleSignals::PEER_CLOSED,
        )
    }

    fn consumer_signals(geometry: &DataPipeGeometry, state: &DataPipeState) -> HandleSignalsState {
        let buffered = state.ring.occupied_len();
        let mut satisfied = HandleSignals::empty();
        let mut satisfiable = HandleSignals::PEER_CLOSED;
        if buffered >= geometry.element_num_bytes {
            satisfied |= HandleSignals::READABLE;
        }
        if state.producer_open || buffered > 0 {
            satisfiable |= HandleSignals::READABLE;
        }
        if !state.producer_open {
            satisfied |= HandleSignals::PEER_CLOSED;
        }
        HandleSignalsState::new(satisfied, satisfiable)
    }

    fn publish(&self, state: &DataPipeState) {
        if state.producer_open {
            self.producer_cell
                .update(Self::producer_signals(&self.geometry, state));
        }
        if state.consumer_open {
            self.consumer_cell
                .update(Self::consumer_signals(&self.geometry, state));
        }
    }

    fn write(&self, data: &[u8], flags: WriteDataFlags) -> IpcResult<usize> {
        let geometry = &self.geometry;
        let mut state = self.state.lock();
        if !state.producer_open {
            return Err(IpcError::InvalidArgument("producer is closed".to_string()));
        }
        if !geometry.is_whole_elements(data.len()) {
            return Err(IpcError::InvalidArgument(format!(
                "{} bytes is not a whole number of {}-byte elements",
                data.len(),
                geometry.element_num_bytes
            )));
        }
        if !state.consumer_open {
            return Err(IpcError::FailedPrecondition("consumer closed".to_string()));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let all_or_none = flags.contains(WriteDataFlags::ALL_OR_NONE);
        let vacant = state.ring.vacant_len();
        let (start, count) = if geometry.may_discard {
            if all_or_none && data.len() > geometry.capacity_num_bytes {
                return Err(IpcError::OutOfRange(format!(
                    "{} bytes exceed capacity {}",
                    data.len(),
                    geometry.capacity_num_bytes
                )));
            }
            let count = data.len().min(geometry.capacity_num_bytes);
            if count > vacant {
                // Buffered data is whole elements, so this is too
                let dropped = state.ring.skip(count - vacant);
                debug!(dropped, "Data pipe overflow discarded oldest elements");
            }
            // Oversized writes keep their newest elements
            (data.len() - count, count)
        } else {
            if all_or_none && data.len() > vacant {
                return Err(IpcError::OutOfRange(format!(
                    "{} bytes requested but only {} vacant",
                    data.len(),
                    vacant
                )));
            }
            let count = geometry.round_down(data.len().min(vacant));
            if count == 0 {
                return Err(IpcError::ShouldWait("data pipe full".to_string()));
            }
            (0, count)
        };

        let written = state.ring.push_slice(&data[start..start + count]);
        trace!(written, buffered = state.ring.occupied_len(), "Data pipe write");
        self.publish(&state);
        Ok(written)
    }

    fn read(&self, num_bytes: usize, flags: ReadDataFlags) -> IpcResult<ReadData> {
        let discard = flags.contains(ReadDataFlags::DISCARD);
        let query = flags.contains(ReadDataFlags::QUERY);
        let peek = flags.contains(ReadDataFlags::PEEK);
        if (discard && peek) || (query && (discard || peek)) {
            return Err(IpcError::InvalidArgument(format!(
                "conflicting read flags {:?}",
                flags
            )));
        }

        let geometry = &self.geometry;
        let mut state = self.state.lock();
        if !state.consumer_open {
            return Err(IpcError::InvalidArgument("consumer is closed".to_string()));
        }
        let buffered = state.ring.occupied_len();
        if query {
            return Ok(ReadData::Queried(buffered as u32));
        }
        if !geometry.is_whole_elements(num_bytes) {
            return Err(IpcError::InvalidArgument(format!(
                "{} bytes is not a whole number of {}-byte elements",
                num_bytes, geometry.element_num_bytes
            )));
        }
        if buffered == 0 {
            return Err(if state.producer_open {
                IpcError::ShouldWait("data pipe empty".to_string())
            } else {
                IpcError::FailedPrecondition("data pipe empty and producer closed".to_string())
            });
        }
        if flags.contains(ReadDataFlags::ALL_OR_NONE) && buffered < num_bytes {
            let context = format!("{} bytes requested but only {} buffered", num_bytes, buffered);
            return Err(if state.producer_open {
                IpcError::OutOfRange(context)
            } else {
                IpcError::FailedPrecondition(context)
            });
        }

        let count = num_bytes.min(buffered);
        let outcome = if discard {
            ReadData::Discarded(state.ring.skip(count) as u32)
        } else {
            let mut out = vec![0u8; count];
            let copied = if peek {
                state.ring.peek_slice(&mut out)
            } else {
                state.ring.pop_slice(&mut out)
            };
            out.truncate(copied);
            ReadData::Data(out)
        };

        if !peek {
            trace!(count, buffered = state.ring.occupied_len(), "Data pipe read");
            self.publish(&state);
        }
        Ok(outcome)
    }

    fn close_producer(&self) {
        let mut state = self.state.lock();
        if !state.producer_open {
            return;
        }
        state.producer_open = false;
        self.producer_cell.cancel_all();
        self.publish(&state);
        debug!(buffered = state.ring.occupied_len(), "Data pipe producer closed");
    }

    fn close_consumer(&self) {
        let mut state = self.state.lock();
        if !state.consumer_open {
            return;
        }
        state.consumer_open = false;
        let buffered = state.ring.occupied_len();
        let dropped = state.ring.skip(buffered);
        self.consumer_cell.cancel_all();
        self.publish(&state);
        debug!(dropped, "Data pipe consumer closed");
    }
}

/// Write end of a data pipe
#[derive(Debug)]
pub struct DataPipeProducer {
    pipe: Arc<DataPipe>,
}

impl DataPipeProducer {
    /// Write whole elements; returns the byte count accepted
    pub fn write(&self, data: &[u8], flags: WriteDataFlags) -> IpcResult<usize> {
        self.pipe.write(data, flags)
    }

    pub fn close(&self) {
        self.pipe.close_producer()
    }

    pub fn geometry(&self) -> DataPipeGeometry {
        self.pipe.geometry
    }

    pub fn signals_state(&self) -> HandleSignalsState {
        self.pipe.producer_cell.get()
    }

    pub(crate) fn cell(&self) -> &SignalCell {
        &self.pipe.producer_cell
    }
}

/// Read end of a data pipe
#[derive(Debug)]
pub struct DataPipeConsumer {
    pipe: Arc<DataPipe>,
}

impl DataPipeConsumer {
    pub fn read(&self, num_bytes: usize, flags: ReadDataFlags) -> IpcResult<ReadData> {
        self.pipe.read(num_bytes, flags)
    }

    pub fn close(&self) {
        self.pipe.close_consumer()
    }

    pub fn geometry(&self) -> DataPipeGeometry {
        self.pipe.geometry
    }

    pub fn signals_state(&self) -> HandleSignalsState {
        self.pipe.consumer_cell.get()
    }

    pub(crate) fn cell(&self) -> &SignalCell {
        &self.pipe.consumer_cell
    }
}
