//! Connection handshake
//!
//! The FNB58 only starts streaming after init-1 followed by init-2 twice. Each
//! command is answered with one frame that carries nothing useful; it is read
//! and discarded to keep the IN pipe in step.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::ConnectionState;
use crate::error::{MeterError, Result};
use crate::fnb58::encoder::HANDSHAKE_SEQUENCE;
use crate::fnb58::protocol::PACKET_TYPE_OFFSET;
use crate::transport::Transport;

/// Run the init sequence on `transport`
///
/// `state` is `HandshakeInProgress` while the sequence runs, `Connected` on
/// success and `Disconnected` after any failure. There is no retry.
///
/// # Arguments
///
/// * `transport` - Pipe to the meter
/// * `state` - Connection state to drive
/// * `write_timeout` - Timeout of each command write
/// * `read_timeout` - Timeout of each response read
///
/// # Errors
///
/// Returns `HandshakeFailed` carrying the first transport error, including a
/// response read that timed out.
pub async fn connect<T: Transport + ?Sized>(
    transport: &mut T,
    state: &mut ConnectionState,
    write_timeout: Duration,
    read_timeout: Duration,
) -> Result<ConnectionState> {
    *state = ConnectionState::HandshakeInProgress;

    for (step, frame) in HANDSHAKE_SEQUENCE.iter().enumerate() {
        debug!(
            "Handshake step {}/{}: command 0x{:02x}",
            step + 1,
            HANDSHAKE_SEQUENCE.len(),
            frame[PACKET_TYPE_OFFSET]
        );

        let outcome = match transport.write(frame, write_timeout).await {
            Ok(()) => transport.read(read_timeout).await.map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            warn!("Handshake failed at step {}: {}", step + 1, e);
            *state = ConnectionState::Disconnected;
            return Err(MeterError::HandshakeFailed(e));
        }
    }

    *state = ConnectionState::Connected;
    info!("FNB58 handshake complete");
    Ok(*state)
}
