/*!
 * Process-Wide Instance
 *
 * Optional global engine for embedders that want one handle namespace per
 * process. Tests and libraries can keep using `IpcManager` directly.
 */

use super::manager::IpcManager;
use crate::core::errors::{IpcError, IpcResult};
use crate::core::IpcConfig;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

static GLOBAL: RwLock<Option<Arc<IpcManager>>> = RwLock::new(None);

/// Install the process-wide engine
///
/// Fails with `AlreadyExists` if one is already installed.
pub fn init(config: IpcConfig) -> IpcResult<Arc<IpcManager>> {
    let mut slot = GLOBAL.write();
    if slot.is_some() {
        return Err(IpcError::AlreadyExists(
            "IPC engine already initialized".to_string(),
        ));
    }
    let manager = Arc::new(IpcManager::new(config)?);
    *slot = Some(manager.clone());
    info!("Global IPC engine installed");
    Ok(manager)
}

/// The process-wide engine; `FailedPrecondition` before `init`
pub fn global() -> IpcResult<Arc<IpcManager>> {
    GLOBAL.read().clone().ok_or_else(|| {
        IpcError::FailedPrecondition("IPC engine not initialized".to_string())
    })
}

pub fn is_initialized() -> bool {
    GLOBAL.read().is_some()
}

/// Uninstall the process-wide engine and close every handle it owns
///
/// Returns the number of handles closed.
pub fn shutdown() -> IpcResult<usize> {
    let manager = GLOBAL.write().take().ok_or_else(|| {
        IpcError::FailedPrecondition("IPC engine not initialized".to_string())
    })?;
    Ok(manager.shutdown())
}
