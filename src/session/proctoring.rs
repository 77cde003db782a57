use std::sync::Arc;

use time::OffsetDateTime;

use crate::core::config::ProctoringSettings;

/// Raw signals delivered by the host environment (browser shell, desktop
/// wrapper). The monitor maps them to violations; it never interprets them as
/// anything stronger than a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentSignal {
    VisibilityHidden,
    FullscreenExited,
    ScreenshotKey,
    ContextMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    TabSwitch,
    FullscreenExit,
    ScreenshotAttempt,
    ContextMenu,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::FullscreenExit => "fullscreen_exit",
            ViolationKind::ScreenshotAttempt => "screenshot_attempt",
            ViolationKind::ContextMenu => "context_menu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub at: OffsetDateTime,
}

/// Append-only, chronologically ordered record of observed violations.
#[derive(Debug, Default)]
pub struct ViolationLog {
    entries: Vec<Violation>,
}

impl ViolationLog {
    fn append(&mut self, violation: Violation) {
        self.entries.push(violation);
    }

    pub fn entries(&self) -> &[Violation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_of(&self, kind: ViolationKind) -> usize {
        self.entries.iter().filter(|violation| violation.kind == kind).count()
    }
}

/// Host-side controls the monitor may exercise. Implemented by the embedding
/// UI shell; every call is best-effort.
pub trait EnvironmentControl: Send + Sync {
    /// Asks the host to (re-)enter fullscreen. Returns false when the host
    /// denies the request, e.g. without a user gesture available.
    fn request_fullscreen(&self) -> bool;
}

/// Advisory warning surfaced to the UI for a toast. `suppress` tells the host
/// to swallow the originating input event where it can.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProctorWarning {
    pub kind: ViolationKind,
    pub count: usize,
    pub suppress: bool,
}

/// Observes environment signals during a session and logs them as advisory
/// violations. Never blocks or ends the session; while enforcing it re-asserts
/// fullscreen and asks the host to suppress screenshot/context-menu inputs.
pub struct ProctoringMonitor {
    log: ViolationLog,
    enforcing: bool,
    reassert_fullscreen: bool,
    suppress_shortcuts: bool,
    environment: Arc<dyn EnvironmentControl>,
}

impl ProctoringMonitor {
    pub fn new(environment: Arc<dyn EnvironmentControl>, settings: &ProctoringSettings) -> Self {
        Self {
            log: ViolationLog::default(),
            enforcing: false,
            reassert_fullscreen: settings.reassert_fullscreen,
            suppress_shortcuts: settings.suppress_shortcuts,
            environment,
        }
    }

    /// Session entered `InProgress`: start enforcing and request fullscreen
    /// once, best-effort.
    pub fn begin_enforcement(&mut self) {
        self.enforcing = true;
        if self.reassert_fullscreen && !self.environment.request_fullscreen() {
            tracing::debug!("Initial fullscreen request denied by the environment");
        }
    }

    /// Session left `InProgress`: keep logging, stop re-asserting and
    /// suppressing.
    pub fn set_enforcing(&mut self, enforcing: bool) {
        self.enforcing = enforcing;
    }

    pub fn is_enforcing(&self) -> bool {
        self.enforcing
    }

    pub fn observe(&mut self, signal: EnvironmentSignal, now: OffsetDateTime) -> ProctorWarning {
        let kind = match signal {
            EnvironmentSignal::VisibilityHidden => ViolationKind::TabSwitch,
            EnvironmentSignal::FullscreenExited => ViolationKind::FullscreenExit,
            EnvironmentSignal::ScreenshotKey => ViolationKind::ScreenshotAttempt,
            EnvironmentSignal::ContextMenu => ViolationKind::ContextMenu,
        };

        self.log.append(Violation { kind, at: now });
        let count = self.log.count_of(kind);
        metrics::counter!("proctoring_violations_total", "kind" => kind.as_str()).increment(1);

        if self.enforcing && self.reassert_fullscreen && kind == ViolationKind::FullscreenExit {
            if !self.environment.request_fullscreen() {
                tracing::debug!("Fullscreen re-entry denied by the environment");
            }
        }

        let suppress = self.enforcing
            && self.suppress_shortcuts
            && matches!(kind, ViolationKind::ScreenshotAttempt | ViolationKind::ContextMenu);

        tracing::warn!(kind = kind.as_str(), count, "Proctoring violation observed");

        ProctorWarning { kind, count, suppress }
    }

    pub fn log(&self) -> &ViolationLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{proctoring_settings, MockEnvironmentControl};

    fn monitor(env: Arc<MockEnvironmentControl>) -> ProctoringMonitor {
        ProctoringMonitor::new(env, &proctoring_settings())
    }

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000 + seconds).expect("timestamp")
    }

    #[test]
    fn tab_switches_are_logged_in_order_with_running_count() {
        let env = Arc::new(MockEnvironmentControl::allowing());
        let mut monitor = monitor(env);
        monitor.begin_enforcement();

        for offset in 0..3 {
            let warning = monitor.observe(EnvironmentSignal::VisibilityHidden, at(offset));
            assert_eq!(warning.kind, ViolationKind::TabSwitch);
            assert_eq!(warning.count, offset as usize + 1);
            assert!(!warning.suppress);
        }

        let entries = monitor.log().entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|pair| pair[0].at <= pair[1].at));
        assert_eq!(monitor.log().count_of(ViolationKind::TabSwitch), 3);
    }

    #[test]
    fn fullscreen_exit_reasserts_while_enforcing() {
        let env = Arc::new(MockEnvironmentControl::allowing());
        let mut monitor = monitor(env.clone());
        monitor.begin_enforcement();
        let baseline = env.fullscreen_requests.load(Ordering::SeqCst);

        monitor.observe(EnvironmentSignal::FullscreenExited, at(5));
        assert_eq!(env.fullscreen_requests.load(Ordering::SeqCst), baseline + 1);

        monitor.set_enforcing(false);
        monitor.observe(EnvironmentSignal::FullscreenExited, at(6));
        assert_eq!(env.fullscreen_requests.load(Ordering::SeqCst), baseline + 1);
        // Still logged after enforcement stops.
        assert_eq!(monitor.log().count_of(ViolationKind::FullscreenExit), 2);
    }

    #[test]
    fn denied_fullscreen_request_is_not_an_error() {
        let env = Arc::new(MockEnvironmentControl::denying());
        let mut monitor = monitor(env);
        monitor.begin_enforcement();

        let warning = monitor.observe(EnvironmentSignal::FullscreenExited, at(1));
        assert_eq!(warning.kind, ViolationKind::FullscreenExit);
        assert_eq!(warning.count, 1);
    }

    #[test]
    fn shortcut_suppression_follows_enforcement() {
        let env = Arc::new(MockEnvironmentControl::allowing());
        let mut monitor = monitor(env);
        monitor.begin_enforcement();

        assert!(monitor.observe(EnvironmentSignal::ScreenshotKey, at(1)).suppress);
        assert!(monitor.observe(EnvironmentSignal::ContextMenu, at(2)).suppress);

        monitor.set_enforcing(false);
        assert!(!monitor.observe(EnvironmentSignal::ScreenshotKey, at(3)).suppress);
    }
}
