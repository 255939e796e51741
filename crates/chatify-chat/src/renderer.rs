use chatify_core::estimate::tokens_per_second;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// What the live display shows after an update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderUpdate {
    /// Everything received so far
    pub text: String,
    /// Absent while the rate is undefined
    pub tokens_per_second: Option<f64>,
    pub is_final: bool,
}

/// Rate-limits display updates for a growing response.
///
/// Text is accumulated on every fragment, but an update is only produced when
/// at least `interval` has passed since the previous one. [`finish`] always
/// produces an update with the complete text.
///
/// [`finish`]: ThrottledRenderer::finish
#[derive(Debug)]
pub struct ThrottledRenderer {
    interval: Duration,
    started_at: Instant,
    last_render: Option<Instant>,
    text: String,
}

impl ThrottledRenderer {
    pub fn new(interval: Duration, started_at: Instant) -> Self {
        Self {
            interval,
            started_at,
            last_render: None,
            text: String::new(),
        }
    }

    pub fn push(&mut self, fragment: &str, now: Instant) -> Option<RenderUpdate> {
        self.text.push_str(fragment);

        if let Some(last) = self.last_render {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_render = Some(now);
        Some(self.update(now, false))
    }

    pub fn finish(&mut self, now: Instant) -> RenderUpdate {
        self.last_render = Some(now);
        self.update(now, true)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn update(&self, now: Instant, is_final: bool) -> RenderUpdate {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        RenderUpdate {
            text: self.text.clone(),
            tokens_per_second: tokens_per_second(&self.text, elapsed),
            is_final,
        }
    }
}
