//! Steady-state polling cycle
//!
//! The meter buffers telemetry between requests. One cycle sends a data
//! request, waits generously for the first frame, then keeps reading with a
//! short timeout until the buffer is empty. The short timeout expiring is the
//! normal end of a burst, not an error.

use tracing::{debug, warn};

use super::{CycleReport, PollSettings};
use crate::error::{MeterError, Phase, Result, TransportError};
use crate::fnb58::decoder::{decode_frame, verify_checksum, Packet};
use crate::fnb58::encoder::DATA_REQUEST_FRAME;
use crate::telemetry::Session;
use crate::transport::Transport;

fn steady_state(source: TransportError) -> MeterError {
    MeterError::Transport {
        phase: Phase::SteadyState,
        source,
    }
}

/// Request and drain one burst of frames into `session`
///
/// Telemetry frames are integrated in read order; housekeeping frames are
/// counted and skipped. At most `settings.max_frames_per_cycle` frames are
/// read, anything left stays buffered for the next cycle.
///
/// # Errors
///
/// - `NoData`: the first read timed out
/// - `Transport` (steady-state phase): the write failed, or a read failed with
///   anything other than a timeout
pub async fn poll_cycle<T: Transport + ?Sized>(
    transport: &mut T,
    session: &mut Session,
    settings: &PollSettings,
) -> Result<CycleReport> {
    transport
        .write(&DATA_REQUEST_FRAME, settings.write_timeout)
        .await
        .map_err(steady_state)?;

    let mut report = CycleReport::default();

    loop {
        if report.frames_read >= settings.max_frames_per_cycle {
            warn!(
                "Frame cap of {} reached, leaving the rest for the next cycle",
                settings.max_frames_per_cycle
            );
            report.capped = true;
            break;
        }

        let timeout = if report.frames_read == 0 {
            settings.first_read_timeout
        } else {
            settings.drain_read_timeout
        };

        let frame = match transport.read(timeout).await {
            Ok(frame) => frame,
            Err(TransportError::Timeout) if report.frames_read == 0 => {
                return Err(MeterError::NoData);
            }
            // Buffer empty
            Err(TransportError::Timeout) => break,
            Err(e) => return Err(steady_state(e)),
        };
        report.frames_read += 1;

        match decode_frame(&frame) {
            Packet::Telemetry(samples) => {
                if settings.verify_checksum && !verify_checksum(&frame) {
                    debug!("Dropping telemetry frame with bad checksum");
                    report.checksum_failures += 1;
                    continue;
                }
                report.telemetry_frames += 1;
                report.samples += session.ingest_frame(&samples);
            }
            Packet::NotTelemetry => {
                debug!(
                    "Skipping non-telemetry frame (len {}, type {:02x?})",
                    frame.len(),
                    frame.get(1)
                );
                report.ignored_frames += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fnb58::encoder::{encode_telemetry_frame, INIT_2_FRAME};
    use crate::fnb58::protocol::{RawSample, CHECKSUM_OFFSET};
    use crate::transport::port_trait::mocks::ScriptedTransport;
    use std::time::Duration;

    fn raw(voltage: u32, current: u32) -> RawSample {
        RawSample {
            voltage,
            current,
            dp: 600,
            dm: 600,
            temperature: 250,
        }
    }

    fn frame_with(voltages: [u32; 4]) -> Vec<u8> {
        encode_telemetry_frame(&voltages.map(|v| raw(v, 200_000))).to_vec()
    }

    #[tokio::test]
    async fn test_two_frames_then_timeout() {
        let transport = ScriptedTransport::new();
        transport.push_frame(&frame_with([500_000; 4]));
        transport.push_frame(&frame_with([500_000, 500_000, 500_000, 900_000]));
        transport.push_error(TransportError::Timeout);

        let mut port = transport.clone();
        let mut session = Session::new();
        let report = poll_cycle(&mut port, &mut session, &PollSettings::default())
            .await
            .unwrap();

        assert_eq!(report.frames_read, 2);
        assert_eq!(report.telemetry_frames, 2);
        assert_eq!(report.samples, 8);
        assert!(!report.capped);
        assert_eq!(session.samples_processed(), 8);

        // Displayed reading is the last sample of the cycle
        assert_eq!(session.latest().unwrap().voltage_v, 9.0);

        // Stats see one value per frame: 5.0 then 9.0
        let voltage = session.statistics().voltage.summary().unwrap();
        assert_eq!(voltage.min, 5.0);
        assert_eq!(voltage.max, 9.0);
        assert_eq!(session.statistics().voltage.count(), 2);
    }

    #[tokio::test]
    async fn test_writes_data_request_first() {
        let transport = ScriptedTransport::new();
        transport.push_frame(&frame_with([500_000; 4]));

        let mut port = transport.clone();
        let mut session = Session::new();
        poll_cycle(&mut port, &mut session, &PollSettings::default())
            .await
            .unwrap();

        assert_eq!(transport.get_written_frames(), vec![DATA_REQUEST_FRAME]);
    }

    #[tokio::test]
    async fn test_read_timeouts_long_then_short() {
        let transport = ScriptedTransport::new();
        transport.push_frame(&frame_with([500_000; 4]));
        transport.push_frame(&frame_with([500_000; 4]));

        let settings = PollSettings::default();
        let mut port = transport.clone();
        let mut session = Session::new();
        poll_cycle(&mut port, &mut session, &settings).await.unwrap();

        assert_eq!(
            transport.get_read_timeouts(),
            vec![
                settings.first_read_timeout,
                settings.drain_read_timeout,
                settings.drain_read_timeout,
            ]
        );
    }

    #[tokio::test]
    async fn test_first_read_timeout_is_no_data() {
        let mut port = ScriptedTransport::new();
        let mut session = Session::new();

        let result = poll_cycle(&mut port, &mut session, &PollSettings::default()).await;
        assert!(matches!(result, Err(MeterError::NoData)));
        assert_eq!(session.samples_processed(), 0);
    }

    #[tokio::test]
    async fn test_io_error_is_steady_state_failure() {
        let transport = ScriptedTransport::new();
        transport.push_frame(&frame_with([500_000; 4]));
        transport.push_error(TransportError::Io("no such device".to_string()));

        let mut port = transport.clone();
        let mut session = Session::new();
        let result = poll_cycle(&mut port, &mut session, &PollSettings::default()).await;

        match result {
            Err(MeterError::Transport { phase, source }) => {
                assert_eq!(phase, Phase::SteadyState);
                assert_eq!(source, TransportError::Io("no such device".to_string()));
            }
            other => panic!("Expected Transport error, got: {:?}", other),
        }

        // Frames read before the failure stay integrated
        assert_eq!(session.samples_processed(), 4);
    }

    #[tokio::test]
    async fn test_write_failure_is_steady_state_failure() {
        let transport = ScriptedTransport::new();
        transport.set_write_error(TransportError::Timeout);

        let mut port = transport.clone();
        let mut session = Session::new();
        let result = poll_cycle(&mut port, &mut session, &PollSettings::default()).await;

        assert!(matches!(
            result,
            Err(MeterError::Transport { phase: Phase::SteadyState, .. })
        ));
    }

    #[tokio::test]
    async fn test_non_telemetry_frames_skipped() {
        let transport = ScriptedTransport::new();
        transport.push_frame(&INIT_2_FRAME);
        transport.push_frame(&frame_with([500_000; 4]));
        transport.push_frame(&[0xAA, 0x04, 0x00]);

        let mut port = transport.clone();
        let mut session = Session::new();
        let report = poll_cycle(&mut port, &mut session, &PollSettings::default())
            .await
            .unwrap();

        assert_eq!(report.frames_read, 3);
        assert_eq!(report.ignored_frames, 2);
        assert_eq!(report.telemetry_frames, 1);
        assert_eq!(session.samples_processed(), 4);
    }

    #[tokio::test]
    async fn test_only_housekeeping_is_not_an_error() {
        let transport = ScriptedTransport::new();
        transport.push_frame(&INIT_2_FRAME);

        let mut port = transport.clone();
        let mut session = Session::new();
        let report = poll_cycle(&mut port, &mut session, &PollSettings::default())
            .await
            .unwrap();

        assert_eq!(report.samples, 0);
        assert!(session.latest().is_none());
    }

    #[tokio::test]
    async fn test_frame_cap_leaves_rest_buffered() {
        let transport = ScriptedTransport::new();
        for _ in 0..5 {
            transport.push_frame(&frame_with([500_000; 4]));
        }

        let settings = PollSettings {
            max_frames_per_cycle: 3,
            ..PollSettings::default()
        };
        let mut port = transport.clone();
        let mut session = Session::new();

        let report = poll_cycle(&mut port, &mut session, &settings).await.unwrap();
        assert!(report.capped);
        assert_eq!(report.frames_read, 3);
        assert_eq!(transport.pending_reads(), 2);

        let report = poll_cycle(&mut port, &mut session, &settings).await.unwrap();
        assert!(!report.capped);
        assert_eq!(report.frames_read, 2);
        assert_eq!(session.samples_processed(), 20);
    }

    #[tokio::test]
    async fn test_bad_checksum_dropped_when_verifying() {
        let mut corrupted = frame_with([500_000; 4]);
        corrupted[CHECKSUM_OFFSET] ^= 0xFF;

        let transport = ScriptedTransport::new();
        transport.push_frame(&corrupted);
        transport.push_frame(&frame_with([500_000; 4]));

        let settings = PollSettings {
            verify_checksum: true,
            ..PollSettings::default()
        };
        let mut port = transport.clone();
        let mut session = Session::new();
        let report = poll_cycle(&mut port, &mut session, &settings).await.unwrap();

        assert_eq!(report.checksum_failures, 1);
        assert_eq!(report.telemetry_frames, 1);
        assert_eq!(session.samples_processed(), 4);
    }

    #[tokio::test]
    async fn test_bad_checksum_accepted_by_default() {
        let mut corrupted = frame_with([500_000; 4]);
        corrupted[CHECKSUM_OFFSET] ^= 0xFF;

        let transport = ScriptedTransport::new();
        transport.push_frame(&corrupted);

        let mut port = transport.clone();
        let mut session = Session::new();
        let report = poll_cycle(&mut port, &mut session, &PollSettings::default())
            .await
            .unwrap();

        assert_eq!(report.checksum_failures, 0);
        assert_eq!(report.samples, 4);
    }

    #[tokio::test]
    async fn test_works_through_boxed_transport() {
        let transport = ScriptedTransport::new();
        transport.push_frame(&frame_with([500_000; 4]));

        let mut boxed: Box<dyn Transport> = Box::new(transport.clone());
        let mut session = Session::new();
        let report = poll_cycle(&mut boxed, &mut session, &PollSettings::default())
            .await
            .unwrap();

        assert_eq!(report.samples, 4);
        assert_eq!(transport.get_read_timeouts()[0], Duration::from_millis(1000));
    }
}
