/*!
 * Core Types
 * Common aliases used across the engine
 */

/// Opaque value a waiter attaches to a registration and gets back when woken
pub type WaitContext = u64;
