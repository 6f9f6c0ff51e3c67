use super::{Cue, NotificationChannel, OffloadEvent};
use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;

const BEL: &[u8] = b"\x07";

/// Rings the terminal bell: one beep to start, two for success, three for an alert.
pub struct BellNotifier {
    gap: Duration,
}

impl BellNotifier {
    pub fn stderr() -> Self {
        Self {
            gap: Duration::from_millis(150),
        }
    }

    pub fn beeps(cue: Cue) -> usize {
        match cue {
            Cue::Start => 1,
            Cue::Success => 2,
            Cue::Alert => 3,
        }
    }
}

#[async_trait]
impl NotificationChannel for BellNotifier {
    async fn notify(&self, event: OffloadEvent) -> Result<()> {
        let beeps = Self::beeps(event.cue());
        for n in 0..beeps {
            if n > 0 {
                tokio::time::sleep(self.gap).await;
            }
            let mut err = std::io::stderr().lock();
            err.write_all(BEL)?;
            err.flush()?;
        }
        Ok(())
    }
}
