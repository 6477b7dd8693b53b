//! Tracing and logging (shared setup).

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide tracing with the given output format.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
