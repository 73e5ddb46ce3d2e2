/*!
 * Monitoring
 * Structured logging setup for the engine and its binary
 */

mod tracer;

pub use tracer::{generate_run_id, init_tracing, OperationSpan};
