//! Trait abstraction for the meter's HID pipe to enable testing

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;
use crate::fnb58::protocol::Frame;

/// Request/response byte pipe to the meter
///
/// One frame out, one frame in, each bounded by its own timeout. A read that
/// sees no data in time must return [`TransportError::Timeout`] so callers can
/// tell "buffer empty" apart from a failed transfer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Write one frame to the OUT endpoint
    async fn write(&mut self, frame: &Frame, timeout: Duration) -> Result<(), TransportError>;

    /// Read one frame from the IN endpoint
    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, frame: &Frame, timeout: Duration) -> Result<(), TransportError> {
        (**self).write(frame, timeout).await
    }

    async fn read(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).read(timeout).await
    }
}
