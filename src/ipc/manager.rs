/*!
 * IPC Manager
 *
 * Single entry point for every operation by handle. Owns the handle table,
 * the configuration and the statistics of one engine instance.
 */

use super::data_pipe::{DataPipe, DataPipeGeometry, ReadData};
use super::message_pipe::{Message, MessagePipe, ReadBounds};
use super::shared_buffer::{BufferInfo, Mapping, SharedBufferHandle};
use super::stats::{IpcStats, StatsCounters};
use crate::abi::flags::reject_unknown;
use crate::abi::options::check_struct_size;
use crate::abi::{
    CreateDataPipeOptions, CreateMessagePipeOptions, CreateSharedBufferOptions, Deadline,
    DuplicateBufferHandleFlags, DuplicateBufferHandleOptions, Handle, HandleSignals,
    HandleSignalsState, MapBufferFlags, ReadDataFlags, ReadMessageFlags, WriteDataFlags,
    WriteMessageFlags,
};
use crate::core::errors::{IpcError, IpcResult};
use crate::core::IpcConfig;
use crate::handle::{Dispatcher, HandleTable};
use crate::wait::{self, WaitError, WaitResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// One engine instance
///
/// # Performance
/// - Handle lookups share a read lock; only create/close/transfer take the write lock
/// - Each pipe has its own lock, so distinct pipes never contend
pub struct IpcManager {
    config: IpcConfig,
    table: HandleTable,
    counters: StatsCounters,
    shared_bytes: Arc<AtomicU64>,
}

impl IpcManager {
    pub fn new(config: IpcConfig) -> IpcResult<Self> {
        config.validate()?;
        info!(
            max_handles = config.max_handles,
            max_message_num_bytes = config.max_message_num_bytes,
            default_data_pipe_capacity = config.default_data_pipe_capacity,
            "IPC manager initialized"
        );
        Ok(Self {
            table: HandleTable::new(config.max_handles),
            config,
            counters: StatsCounters::default(),
            shared_bytes: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    /// Register two dispatchers; if the second does not fit, the first is rolled back
    fn add_pair(&self, first: Dispatcher, second: Dispatcher) -> IpcResult<(Handle, Handle)> {
        let handles = self
            .table
            .add_many(vec![Arc::new(first), Arc::new(second)])?;
        Ok((handles[0], handles[1]))
    }

    // =========================================================================
    // MESSAGE PIPES
    // =========================================================================

    pub fn create_message_pipe(
        &self,
        options: Option<&CreateMessagePipeOptions>,
    ) -> IpcResult<(Handle, Handle)> {
        if let Some(options) = options {
            check_struct_size(options.struct_size, "message pipe options")?;
            reject_unknown(options.flags, "create message pipe")?;
        }
        let (a, b) = MessagePipe::create();
        let (ha, hb) = self.add_pair(Dispatcher::MessagePipe(a), Dispatcher::MessagePipe(b))?;
        StatsCounters::bump(&self.counters.message_pipes_created, 1);
        debug!(%ha, %hb, "Message pipe created");
        Ok((ha, hb))
    }

    /// Send `bytes` and move `handles` to the peer endpoint
    ///
    /// On success the attached handles are no longer valid here. On failure
    /// they stay valid and untouched.
    pub fn write_message(
        &self,
        handle: Handle,
        bytes: &[u8],
        handles: &[Handle],
        flags: WriteMessageFlags,
    ) -> IpcResult<()> {
        let dispatcher = self.table.get(handle)?;
        let endpoint = dispatcher.as_message_pipe()?;
        reject_unknown(flags, "write message")?;

        if bytes.len() > self.config.max_message_num_bytes {
            return Err(IpcError::ResourceExhausted(format!(
                "message of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.config.max_message_num_bytes
            )));
        }
        if handles.len() > self.config.max_message_num_handles {
            return Err(IpcError::ResourceExhausted(format!(
                "{} attached handles exceed the limit of {}",
                handles.len(),
                self.config.max_message_num_handles
            )));
        }
        if handles.contains(&handle) {
            return Err(IpcError::InvalidArgument(
                "a pipe endpoint cannot be sent through itself".to_string(),
            ));
        }

        let cargo = self.table.begin_transport(handles)?;
        let sends_peer = cargo.iter().any(|attached| {
            matches!(attached.as_ref(), Dispatcher::MessagePipe(other) if other.same_pipe(endpoint))
        });
        if sends_peer {
            self.table.end_transport(handles, false);
            return Err(IpcError::InvalidArgument(
                "a pipe endpoint cannot be sent through its own pipe".to_string(),
            ));
        }

        let moved = cargo.clone();
        match endpoint.write(bytes.to_vec(), cargo) {
            Ok(()) => {
                self.table.end_transport(handles, true);
                // Waits made through the sent handles end here
                for dispatcher in &moved {
                    dispatcher.cancel_waiters();
                }
                StatsCounters::bump(&self.counters.messages_written, 1);
                StatsCounters::bump(&self.counters.handles_transferred, handles.len() as u64);
                trace!(%handle, num_bytes = bytes.len(), num_handles = handles.len(), "Message written");
                Ok(())
            }
            Err(e) => {
                self.table.end_transport(handles, false);
                Err(e)
            }
        }
    }

    pub fn read_message(&self, handle: Handle, flags: ReadMessageFlags) -> IpcResult<Message> {
        self.read_message_bounded(handle, ReadBounds::UNBOUNDED, flags)
    }

    /// Read the next message if it fits `bounds`
    ///
    /// An oversized message stays queued (`ResourceExhausted`), or is dropped
    /// with `MAY_DISCARD` (still `ResourceExhausted`).
    pub fn read_message_bounded(
        &self,
        handle: Handle,
        bounds: ReadBounds,
        flags: ReadMessageFlags,
    ) -> IpcResult<Message> {
        let dispatcher = self.table.get(handle)?;
        let endpoint = dispatcher.as_message_pipe()?;
        reject_unknown(flags, "read message")?;

        let queued = endpoint.read(bounds, flags.contains(ReadMessageFlags::MAY_DISCARD))?;
        match self.table.add_many(queued.cargo.clone()) {
            Ok(handles) => {
                StatsCounters::bump(&self.counters.messages_read, 1);
                trace!(%handle, num_bytes = queued.bytes.len(), num_handles = handles.len(), "Message read");
                Ok(Message {
                    bytes: queued.bytes,
                    handles,
                })
            }
            Err(e) => {
                endpoint.unread(queued);
                Err(e)
            }
        }
    }

    // =========================================================================
    // DATA PIPES
    // =========================================================================

    /// Create a producer/consumer pair; `None` uses one-byte elements and the default capacity
    pub fn create_data_pipe(
        &self,
        options: Option<&CreateDataPipeOptions>,
    ) -> IpcResult<(Handle, Handle)> {
        if let Some(options) = options {
            check_struct_size(options.struct_size, "data pipe options")?;
            reject_unknown(options.flags, "create data pipe")?;
        }
        let geometry = DataPipeGeometry::from_options(options, &self.config)?;
        let (producer, consumer) = DataPipe::create(geometry);
        let (hp, hc) = self.add_pair(
            Dispatcher::DataPipeProducer(producer),
            Dispatcher::DataPipeConsumer(consumer),
        )?;
        StatsCounters::bump(&self.counters.data_pipes_created, 1);
        debug!(
            producer = %hp,
            consumer = %hc,
            element_num_bytes = geometry.element_num_bytes,
            capacity_num_bytes = geometry.capacity_num_bytes,
            may_discard = geometry.may_discard,
            "Data pipe created"
        );
        Ok((hp, hc))
    }

    /// Write whole elements; returns the number of bytes accepted
    pub fn write_data(&self, producer: Handle, data: &[u8], flags: WriteDataFlags) -> IpcResult<usize> {
        let dispatcher = self.table.get(producer)?;
        reject_unknown(flags, "write data")?;
        let written = dispatcher.as_producer()?.write(data, flags)?;
        StatsCounters::bump(&self.counters.data_bytes_written, written as u64);
        Ok(written)
    }

    pub fn read_data(&self, consumer: Handle, num_bytes: usize, flags: ReadDataFlags) -> IpcResult<ReadData> {
        let dispatcher = self.table.get(consumer)?;
        reject_unknown(flags, "read data")?;
        let outcome = dispatcher.as_consumer()?.read(num_bytes, flags)?;
        if let ReadData::Data(bytes) = &outcome {
            if !flags.contains(ReadDataFlags::PEEK) {
                StatsCounters::bump(&self.counters.data_bytes_read, bytes.len() as u64);
            }
        }
        Ok(outcome)
    }

    /// Bytes currently buffered in the pipe
    pub fn query_data(&self, consumer: Handle) -> IpcResult<u32> {
        self.read_data(consumer, 0, ReadDataFlags::QUERY)
            .map(|outcome| outcome.num_bytes())
    }

    /// Drop up to `num_bytes` (exactly `num_bytes` with `all_or_none`)
    pub fn discard_data(&self, consumer: Handle, num_bytes: usize, all_or_none: bool) -> IpcResult<u32> {
        let mut flags = ReadDataFlags::DISCARD;
        flags.set(ReadDataFlags::ALL_OR_NONE, all_or_none);
        self.read_data(consumer, num_bytes, flags)
            .map(|outcome| outcome.num_bytes())
    }

    // =========================================================================
    // SHARED BUFFERS
    // =========================================================================

    pub fn create_shared_buffer(
        &self,
        num_bytes: u64,
        options: Option<&CreateSharedBufferOptions>,
    ) -> IpcResult<Handle> {
        if let Some(options) = options {
            check_struct_size(options.struct_size, "shared buffer options")?;
            reject_unknown(options.flags, "create shared buffer")?;
        }
        if num_bytes == 0 {
            return Err(IpcError::InvalidArgument(
                "shared buffer size must be non-zero".to_string(),
            ));
        }
        if num_bytes > self.config.max_shared_buffer_bytes {
            return Err(IpcError::ResourceExhausted(format!(
                "shared buffer of {} bytes exceeds the {} byte limit",
                num_bytes, self.config.max_shared_buffer_bytes
            )));
        }
        let size = usize::try_from(num_bytes).map_err(|_| {
            IpcError::ResourceExhausted(format!("{} bytes is not addressable", num_bytes))
        })?;

        let buffer = SharedBufferHandle::allocate(size, self.shared_bytes.clone())?;
        let handle = self.table.add(Arc::new(Dispatcher::SharedBuffer(buffer)))?;
        StatsCounters::bump(&self.counters.shared_buffers_created, 1);
        debug!(%handle, num_bytes, "Shared buffer created");
        Ok(handle)
    }

    /// New handle on the same region; `READ_ONLY` narrows access
    pub fn duplicate_buffer_handle(
        &self,
        handle: Handle,
        options: Option<&DuplicateBufferHandleOptions>,
    ) -> IpcResult<Handle> {
        let dispatcher = self.table.get(handle)?;
        let buffer = dispatcher.as_shared_buffer()?;
        let read_only = match options {
            Some(options) => {
                check_struct_size(options.struct_size, "duplicate buffer options")?;
                reject_unknown(options.flags, "duplicate buffer handle")?;
                options.flags.contains(DuplicateBufferHandleFlags::READ_ONLY)
            }
            None => false,
        };
        let duplicate = buffer.duplicate(read_only);
        let access = duplicate.access();
        let new_handle = self.table.add(Arc::new(Dispatcher::SharedBuffer(duplicate)))?;
        debug!(%handle, %new_handle, ?access, "Shared buffer handle duplicated");
        Ok(new_handle)
    }

    pub fn map_buffer(
        &self,
        handle: Handle,
        offset: u64,
        num_bytes: u64,
        flags: MapBufferFlags,
    ) -> IpcResult<Mapping> {
        let dispatcher = self.table.get(handle)?;
        let buffer = dispatcher.as_shared_buffer()?;
        reject_unknown(flags, "map buffer")?;
        buffer.map(offset, num_bytes)
    }

    pub fn buffer_info(&self, handle: Handle) -> IpcResult<BufferInfo> {
        let dispatcher = self.table.get(handle)?;
        Ok(dispatcher.as_shared_buffer()?.info())
    }

    // =========================================================================
    // SIGNALS AND WAITING
    // =========================================================================

    pub fn signals_state(&self, handle: Handle) -> IpcResult<HandleSignalsState> {
        Ok(self.table.get(handle)?.signals_state())
    }

    pub fn wait(
        &self,
        handle: Handle,
        signals: HandleSignals,
        deadline: Deadline,
    ) -> Result<HandleSignalsState, WaitError> {
        wait::wait_one(&self.table, handle, signals, deadline)
    }

    pub fn wait_many(
        &self,
        handles: &[Handle],
        signals: &[HandleSignals],
        deadline: Deadline,
    ) -> WaitResult {
        wait::wait_many(&self.table, handles, signals, deadline)
    }

    pub async fn wait_async(
        &self,
        handle: Handle,
        signals: HandleSignals,
        deadline: Deadline,
    ) -> Result<HandleSignalsState, WaitError> {
        wait::wait_one_async(&self.table, handle, signals, deadline).await
    }

    pub async fn wait_many_async(
        &self,
        handles: &[Handle],
        signals: &[HandleSignals],
        deadline: Deadline,
    ) -> WaitResult {
        wait::wait_many_async(&self.table, handles, signals, deadline).await
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Close `handle`; its peer (if any) observes `PEER_CLOSED`
    pub fn close(&self, handle: Handle) -> IpcResult<()> {
        let dispatcher = self.table.remove(handle)?;
        dispatcher.close();
        Ok(())
    }

    pub fn handle_count(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> IpcStats {
        self.counters.snapshot(
            self.table.len(),
            self.shared_bytes.load(Ordering::Relaxed),
        )
    }

    /// Close every handle, cancelling all outstanding waits
    pub fn shutdown(&self) -> usize {
        let dispatchers = self.table.drain();
        let count = dispatchers.len();
        for dispatcher in &dispatchers {
            dispatcher.close();
        }
        info!(closed = count, "IPC manager shut down");
        count
    }
}

impl std::fmt::Debug for IpcManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcManager")
            .field("config", &self.config)
            .field("table", &self.table)
            .finish()
    }
}
