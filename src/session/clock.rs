use time::OffsetDateTime;

/// One reading of the countdown. `expired_now` is true exactly once per
/// session, the first time remaining reaches zero while the clock runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockUpdate {
    pub remaining_seconds: u64,
    pub expired_now: bool,
}

/// Countdown over an absolute end timestamp. Remaining time is always derived
/// from `end_at`, never from counting ticks, so a suspended caller (tab in the
/// background) resumes with the correct value instead of drifting.
#[derive(Debug, Clone)]
pub struct SessionClock {
    duration_seconds: u64,
    started_at: Option<OffsetDateTime>,
    end_at: Option<OffsetDateTime>,
    running: bool,
    expired: bool,
    frozen_remaining: u64,
}

impl SessionClock {
    pub fn new(duration_seconds: u64) -> Self {
        Self {
            duration_seconds,
            started_at: None,
            end_at: None,
            running: false,
            expired: false,
            frozen_remaining: duration_seconds,
        }
    }

    /// Sets the absolute end timestamp. Called once per session; there is no
    /// pause/resume.
    pub fn start(&mut self, now: OffsetDateTime) {
        self.started_at = Some(now);
        self.end_at = Some(now + time::Duration::seconds(self.duration_seconds as i64));
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_expired(&self) -> bool {
        self.expired
    }

    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    /// Remaining whole seconds at `now`, clamped at zero. After `stop` the
    /// value is frozen at whatever remained when the clock stopped.
    pub fn remaining_at(&self, now: OffsetDateTime) -> u64 {
        if !self.running {
            return self.frozen_remaining;
        }
        match self.end_at {
            Some(end_at) => (end_at - now).whole_seconds().max(0) as u64,
            None => self.duration_seconds,
        }
    }

    /// Advances the clock's view of time. Expiry is latched: the update that
    /// first observes zero carries `expired_now = true`, stops the clock
    /// permanently, and no later observation fires it again.
    pub fn observe(&mut self, now: OffsetDateTime) -> ClockUpdate {
        if !self.running {
            return ClockUpdate { remaining_seconds: self.frozen_remaining, expired_now: false };
        }

        let remaining = self.remaining_at(now);
        if remaining == 0 && !self.expired {
            self.expired = true;
            self.running = false;
            self.frozen_remaining = 0;
            return ClockUpdate { remaining_seconds: 0, expired_now: true };
        }

        ClockUpdate { remaining_seconds: remaining, expired_now: false }
    }

    /// Freezes the countdown (submission started). Idempotent; a stopped
    /// clock never fires expiry.
    pub fn stop(&mut self, now: OffsetDateTime) {
        if self.running {
            self.frozen_remaining = self.remaining_at(now);
            self.running = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000 + seconds).expect("timestamp")
    }

    #[test]
    fn remaining_derives_from_absolute_end() {
        let mut clock = SessionClock::new(600);
        clock.start(at(0));

        assert_eq!(clock.remaining_at(at(1)), 599);
        // A long suspension does not drift: the next read is still exact.
        assert_eq!(clock.remaining_at(at(480)), 120);
    }

    #[test]
    fn remaining_never_negative() {
        let mut clock = SessionClock::new(60);
        clock.start(at(0));

        assert_eq!(clock.remaining_at(at(90)), 0);
    }

    #[test]
    fn expiry_fires_exactly_once() {
        let mut clock = SessionClock::new(60);
        clock.start(at(0));

        assert!(!clock.observe(at(59)).expired_now);

        let first = clock.observe(at(61));
        assert!(first.expired_now);
        assert_eq!(first.remaining_seconds, 0);
        assert!(clock.has_expired());
        assert!(!clock.is_running());

        let second = clock.observe(at(62));
        assert!(!second.expired_now);
        assert_eq!(second.remaining_seconds, 0);
    }

    #[test]
    fn stop_freezes_remaining_and_suppresses_expiry() {
        let mut clock = SessionClock::new(600);
        clock.start(at(0));
        clock.stop(at(220));

        assert_eq!(clock.remaining_at(at(400)), 380);
        assert!(!clock.observe(at(10_000)).expired_now);
        assert!(!clock.has_expired());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut clock = SessionClock::new(600);
        clock.start(at(0));
        clock.stop(at(100));
        clock.stop(at(300));

        assert_eq!(clock.remaining_at(at(300)), 500);
    }
}
