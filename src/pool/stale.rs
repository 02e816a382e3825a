//! Stale connection detection.
//!
//! A connection sitting idle can be silently dropped by the node or by
//! something in between. Socket state cannot be trusted for half-open
//! connections, so liveness is decided by a real health round-trip and by
//! classifying the failure it produces.

use crate::pool::connection::Connection;
use crate::utils::error::{NodePoolError, TransportError};
use tracing::debug;

const BROKEN_PIPE: &str = "BROKEN PIPE";
const CONNECTION_RESET: &str = "CONNECTION RESET";

/// Whether a transport failure was caused by a broken socket.
///
/// Only a cause that is a socket-level [`std::io::Error`] qualifies, and only
/// when its message mentions a broken pipe or a connection reset, in any case.
pub fn is_broken_socket(err: &TransportError) -> bool {
    let Some(cause) = err.cause() else {
        return false;
    };

    let Some(socket_err) = cause.downcast_ref::<std::io::Error>() else {
        return false;
    };

    let message = socket_err.to_string().to_uppercase();
    message.contains(BROKEN_PIPE) || message.contains(CONNECTION_RESET)
}

/// Probe a candidate pulled from the idle set.
///
/// `Ok(true)` means the connection is dead and should be discarded,
/// `Ok(false)` that it answered. Any failure that is not a broken socket is
/// returned as [`NodePoolError::TransportFailure`].
pub async fn check_stale<C: Connection>(conn: &mut C) -> Result<bool, NodePoolError> {
    debug!("Performing connection stale check");
    match conn.health_check().await {
        Ok(()) => {
            debug!("Connection is not stale");
            Ok(false)
        }
        Err(err) if is_broken_socket(&err) => Ok(true),
        Err(err) => Err(NodePoolError::TransportFailure(err)),
    }
}
