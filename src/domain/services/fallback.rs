#[cfg(test)]
#[path = "fallback_test.rs"]
mod tests;

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::models::Document;
use crate::domain::models::DocumentKind;
use crate::domain::models::SessionState;

/// Linear deadline in the document size, clamped per document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlinePolicy {
    pub base_ms: u64,
    pub per_mb_ms: u64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DeadlinePolicy {
    pub fn for_kind(kind: DocumentKind) -> DeadlinePolicy {
        if kind == DocumentKind::Pdf {
            return DeadlinePolicy {
                base_ms: 15_000,
                per_mb_ms: 2_000,
                min_ms: 20_000,
                max_ms: 120_000,
            };
        }

        return DeadlinePolicy {
            base_ms: 5_000,
            per_mb_ms: 1_000,
            min_ms: 8_000,
            max_ms: 30_000,
        };
    }

    pub fn deadline(&self, size_bytes: u64) -> Duration {
        let mb = size_bytes as f64 / 1024.0 / 1024.0;
        let ms = (mb * self.per_mb_ms as f64).floor() as u64 + self.base_ms;

        return Duration::from_millis(ms.clamp(self.min_ms, self.max_ms));
    }
}

/// How long to wait for the first frame before giving up on the stream.
/// `override_ms` replaces the computed value when set.
pub fn fallback_deadline(document: &Document, override_ms: Option<u64>) -> Duration {
    if let Some(ms) = override_ms {
        return Duration::from_millis(ms);
    }

    return DeadlinePolicy::for_kind(document.kind).deadline(document.size_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arm {
    Armed(Instant),
    Disarmed,
    Fired,
}

/// Watches for streams that open but never produce a frame. Arming, the
/// first frame and the deadline all go through `&mut self`, so disarming and
/// firing can never both win.
#[derive(Debug)]
pub struct FallbackSupervisor {
    arm: Arm,
}

impl FallbackSupervisor {
    pub fn arm(timeout: Duration) -> FallbackSupervisor {
        return FallbackSupervisor {
            arm: Arm::Armed(Instant::now() + timeout),
        };
    }

    pub fn deadline(&self) -> Option<Instant> {
        if let Arm::Armed(deadline) = self.arm {
            return Some(deadline);
        }

        return None;
    }

    pub fn is_armed(&self) -> bool {
        return matches!(self.arm, Arm::Armed(_));
    }

    pub fn has_fired(&self) -> bool {
        return self.arm == Arm::Fired;
    }

    /// Records a decoded frame. Returns false when the fallback has already
    /// claimed the session and the frame must be dropped.
    pub fn observe_frame(&mut self) -> bool {
        return match self.arm {
            Arm::Fired => false,
            Arm::Armed(_) => {
                tracing::debug!("First frame received, disarming fallback");
                self.arm = Arm::Disarmed;
                true
            }
            Arm::Disarmed => true,
        };
    }

    pub fn disarm(&mut self) {
        if self.is_armed() {
            self.arm = Arm::Disarmed;
        }
    }

    /// Claims the session for the synchronous fallback. Only succeeds while
    /// armed, before any frame moved the session out of `Idle`, and when the
    /// user has not asked to cancel.
    pub fn try_fire(&mut self, state: SessionState, cancel_requested: bool) -> bool {
        if !self.is_armed() {
            return false;
        }

        if cancel_requested || state != SessionState::Idle {
            self.arm = Arm::Disarmed;
            return false;
        }

        tracing::info!("No frames received before the deadline, falling back");
        self.arm = Arm::Fired;
        return true;
    }
}
