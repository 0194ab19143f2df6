use time::OffsetDateTime;

use crate::core::time::{to_instant, truncate_to_minute};
use crate::services::backend::ExamBackend;

/// The current instant as this client is allowed to know it.
///
/// `authoritative` is false when the reading came from the local device clock
/// instead of the server; callers presenting schedule decisions to a human
/// must surface that, since a skewed device clock is precisely what the
/// server reading exists to defend against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClockReading {
    pub(crate) now: OffsetDateTime,
    pub(crate) authoritative: bool,
}

impl ClockReading {
    pub(crate) fn local_fallback() -> Self {
        Self { now: truncate_to_minute(OffsetDateTime::now_utc()), authoritative: false }
    }
}

/// Resolves "now" from the backend's Istanbul clock endpoint, falling back to
/// the device clock (truncated to the minute, flagged non-authoritative) when
/// the server is unreachable or returns garbage.
pub(crate) async fn read(backend: &ExamBackend) -> ClockReading {
    match backend.istanbul_now().await {
        Ok(naive) => match to_instant(&naive) {
            Ok(now) => ClockReading { now, authoritative: true },
            Err(err) => {
                metrics::counter!("examport_clock_fallbacks_total").increment(1);
                tracing::warn!(error = %err, "Server clock returned a malformed timestamp; using the device clock");
                ClockReading::local_fallback()
            }
        },
        Err(err) => {
            metrics::counter!("examport_clock_fallbacks_total").increment(1);
            tracing::warn!(error = %err, "Server clock unreachable; using the device clock");
            ClockReading::local_fallback()
        }
    }
}
