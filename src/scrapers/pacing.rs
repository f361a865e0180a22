use crate::scrapers::traits::Pacer;
use crate::scrapers::types::Pause;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::debug;

/// Human-looking pauses: fixed waits around navigation and consent, a
/// randomized wait for every scroll round.
pub struct HumanPacer {
    rng: StdRng,
    settle: Duration,
    after_consent: Duration,
    scroll_ms: RangeInclusive<u64>,
}

impl HumanPacer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            settle: Duration::from_secs(2),
            after_consent: Duration::from_secs(1),
            scroll_ms: 1200..=2500,
        }
    }

    /// Length of the next pause of the given kind
    pub fn next_delay(&mut self, pause: Pause) -> Duration {
        match pause {
            Pause::Settle => self.settle,
            Pause::AfterConsent => self.after_consent,
            Pause::ScrollRound => {
                Duration::from_millis(self.rng.random_range(self.scroll_ms.clone()))
            }
        }
    }
}

impl Default for HumanPacer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Pacer for HumanPacer {
    async fn pause(&mut self, pause: Pause) {
        let delay = self.next_delay(pause);
        debug!(?pause, delay_ms = delay.as_millis() as u64, "pause");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_pauses_stay_within_bounds() {
        let mut pacer = HumanPacer::with_rng(StdRng::seed_from_u64(7));
        for _ in 0..200 {
            let delay = pacer.next_delay(Pause::ScrollRound);
            assert!(delay >= Duration::from_millis(1200), "{delay:?}");
            assert!(delay <= Duration::from_millis(2500), "{delay:?}");
        }
    }

    #[test]
    fn scroll_pauses_are_not_fixed() {
        let mut pacer = HumanPacer::with_rng(StdRng::seed_from_u64(7));
        let first = pacer.next_delay(Pause::ScrollRound);
        assert!((0..50).any(|_| pacer.next_delay(Pause::ScrollRound) != first));
    }

    #[test]
    fn settle_and_consent_pauses_are_fixed() {
        let mut pacer = HumanPacer::with_rng(StdRng::seed_from_u64(1));
        assert_eq!(pacer.next_delay(Pause::Settle), Duration::from_secs(2));
        assert_eq!(pacer.next_delay(Pause::AfterConsent), Duration::from_secs(1));
    }
}
