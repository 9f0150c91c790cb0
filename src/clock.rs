use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic milliseconds, relative to the first call in this process.
pub fn now_ms() -> u64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Paces frame presentation to the stream framerate by sleeping away the
/// remainder of each frame interval, measured from the previous frame's
/// render end.
pub struct PacingClock {
    target_ms: u64,
    last_ms: Option<u64>,
}

impl PacingClock {
    pub fn new(framerate: u32) -> PacingClock {
        let framerate = framerate.max(1);
        PacingClock {
            target_ms: (1000 / framerate) as u64,
            last_ms: None,
        }
    }

    /// Sleeps until the frame deadline, if the previous frame finished less
    /// than one interval ago.
    pub fn wait_frame(&self) {
        if let Some(last) = self.last_ms {
            let elapsed = now_ms().saturating_sub(last);
            if elapsed < self.target_ms {
                thread::sleep(Duration::from_millis(self.target_ms - elapsed));
            }
        }
    }

    /// Stamps the end of the current frame's render.
    pub fn mark(&mut self) {
        self.last_ms = Some(now_ms());
    }
}
