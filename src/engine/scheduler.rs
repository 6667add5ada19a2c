use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::control::ControlChannel;
use crate::db::Database;
use crate::models::{EnginePhase, SearchResult, WatchedCourse};
use crate::notify::{chime, Mailer, SoundThrottle};
use crate::registrar::Registrar;

use super::check::{CheckExecutor, CheckOutcome};
use super::session::{SessionError, SessionManager};

/// Knobs for the control loop. Defaults match the production behavior;
/// tests shrink the pauses they care about.
#[derive(Debug, Clone)]
pub struct EngineTuning {
    pub max_login_attempts: u32,
    /// Whole-batch failed cycles tolerated before the session is presumed
    /// silently expired.
    pub failure_threshold: u32,
    /// Pause after every individual check, bounding the request rate
    /// against the registration site.
    pub check_pause: Duration,
    /// Granularity of interval sleeps; a stop request is honored within
    /// one slice rather than after a full interval.
    pub sleep_slice: Duration,
    pub login_retry_pause: Duration,
    pub session_close_pause: Duration,
    pub sound_cooldown_minutes: i64,
    /// Whether stopping also closes the registrar session. Off by default:
    /// the session is deliberately left alive so a subsequent start skips
    /// the slow login dance.
    pub close_session_on_stop: bool,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            failure_threshold: 3,
            check_pause: Duration::from_secs(3),
            sleep_slice: Duration::from_secs(5),
            login_retry_pause: Duration::from_secs(3),
            session_close_pause: Duration::from_secs(2),
            sound_cooldown_minutes: SoundThrottle::DEFAULT_WINDOW_MINUTES,
            close_session_on_stop: false,
        }
    }
}

/// Why the engine returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// A stop request (or process shutdown) was honored.
    Stopped,
    /// Login attempts were exhausted; the session could never be
    /// established. Terminal — the caller should not restart blindly.
    LoginFailed,
}

enum LoopState {
    LoggingIn,
    Running,
    Stopping,
}

/// The monitoring control loop. One sequential worker: courses are checked
/// one at a time over a single logged-in session, with the stop request
/// re-evaluated between items and inside every sleep.
pub struct Engine {
    db: Database,
    control: Arc<dyn ControlChannel>,
    mailer: Arc<dyn Mailer>,
    session: SessionManager,
    executor: CheckExecutor,
    throttle: SoundThrottle,
    tuning: EngineTuning,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        db: Database,
        registrar: Box<dyn Registrar>,
        control: Arc<dyn ControlChannel>,
        mailer: Arc<dyn Mailer>,
        tuning: EngineTuning,
    ) -> Self {
        let session = SessionManager::new(
            registrar,
            tuning.max_login_attempts,
            tuning.login_retry_pause,
            tuning.session_close_pause,
        );
        let throttle = SoundThrottle::with_window(
            db.clone(),
            chrono::Duration::minutes(tuning.sound_cooldown_minutes),
        );

        Self {
            executor: CheckExecutor::new(db.clone()),
            db,
            control,
            mailer,
            session,
            throttle,
            tuning,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for process-level shutdown (e.g. ctrl-c); behaves like a stop
    /// request that never needs consuming.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the state machine to a terminal state. An `Err` is a course
    /// store failure; everything the registrar or the mail transport does
    /// wrong is absorbed into the loop's own recovery.
    pub async fn run(mut self) -> Result<EngineExit> {
        let mut state = LoopState::LoggingIn;
        let mut consecutive_failures: u32 = 0;
        let mut iteration: u64 = 0;

        loop {
            match state {
                LoopState::LoggingIn => {
                    self.control
                        .publish_status(EnginePhase::Starting, "Logging in...");

                    match self.session.acquire(&self.db).await {
                        Ok(()) => {
                            consecutive_failures = 0;
                            self.control
                                .publish_status(EnginePhase::Running, "Monitor active");
                            state = LoopState::Running;
                        }
                        Err(SessionError::AttemptsExhausted(attempts)) => {
                            error!("All {attempts} login attempts failed; giving up");
                            self.control
                                .publish_status(EnginePhase::Error, "Login failed");
                            return Ok(EngineExit::LoginFailed);
                        }
                        Err(SessionError::Store(err)) => return Err(err),
                    }
                }
                LoopState::Running => {
                    if self.stop_requested() {
                        state = LoopState::Stopping;
                        continue;
                    }

                    // Interval read once per iteration; an external change
                    // applies from the next iteration, never mid-sleep.
                    let interval = Duration::from_secs(self.control.read_config().interval);

                    iteration += 1;
                    self.control
                        .publish_status(EnginePhase::Running, &format!("Check #{iteration}"));

                    let courses = self.db.list_active_courses().await?;
                    if courses.is_empty() {
                        info!("No active courses to check");
                        if self.sleep_watching_stop(interval).await {
                            state = LoopState::Stopping;
                        }
                        continue;
                    }

                    info!("Check #{iteration}: {} course(s)", courses.len());

                    let mut any_success = false;
                    let mut attempted: u32 = 0;
                    let mut stop_seen = false;

                    for course in &courses {
                        if self.stop_requested() {
                            stop_seen = true;
                            break;
                        }

                        attempted += 1;
                        match self.executor.check(self.session.registrar(), course).await {
                            Ok(outcome) => {
                                if outcome.is_success() {
                                    any_success = true;
                                    consecutive_failures = 0;
                                }
                                self.report_outcome(course, outcome).await;
                            }
                            Err(err) => {
                                error!("[{}] check errored: {err:#}", course.label());
                            }
                        }

                        if self.sleep_watching_stop(self.tuning.check_pause).await {
                            stop_seen = true;
                            break;
                        }
                    }

                    if stop_seen {
                        state = LoopState::Stopping;
                        continue;
                    }

                    if !any_success && attempted > 0 {
                        consecutive_failures += 1;
                        warn!(
                            "No successful checks this cycle (failure {}/{})",
                            consecutive_failures, self.tuning.failure_threshold
                        );

                        if consecutive_failures >= self.tuning.failure_threshold {
                            warn!("Too many failed cycles; session probably expired, restarting");
                            self.control.publish_status(
                                EnginePhase::Restarting,
                                "Session expired, restarting...",
                            );
                            self.session.release().await;
                            consecutive_failures = 0;
                            state = LoopState::LoggingIn;
                            continue;
                        }
                    }

                    if self.sleep_watching_stop(interval).await {
                        state = LoopState::Stopping;
                    }
                }
                LoopState::Stopping => {
                    if self.tuning.close_session_on_stop {
                        self.session.release().await;
                    } else {
                        info!("Leaving registrar session open for a faster restart");
                    }
                    self.control
                        .publish_status(EnginePhase::Stopped, "Monitor stopped");
                    info!("Monitor stopped");
                    return Ok(EngineExit::Stopped);
                }
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.control.take_stop_signal() || self.cancel.is_cancelled()
    }

    async fn report_outcome(&self, course: &WatchedCourse, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Available(result) => {
                info!(
                    "[{}] {} seats available!",
                    course.label(),
                    result.total_available
                );
                if let Err(err) = self.notify_availability(course, &result).await {
                    error!("[{}] notification handling failed: {err:#}", course.label());
                }
            }
            CheckOutcome::NoSeats(_) => {
                info!("[{}] no seats available", course.label());
            }
            CheckOutcome::NothingUsable => {
                warn!("[{}] could not get results", course.label());
            }
            CheckOutcome::Failed(reason) => {
                error!("[{}] check failed: {reason}", course.label());
            }
        }
    }

    /// Fire the notification channels for an open course. Sound respects the
    /// per-course cooldown; email always goes out, and only a confirmed send
    /// becomes a notification record.
    async fn notify_availability(
        &self,
        course: &WatchedCourse,
        result: &SearchResult,
    ) -> Result<()> {
        match self.throttle.should_sound(course.id).await {
            Ok(true) => {
                chime::play_alert();
                self.throttle.mark_sound(course.id).await?;
            }
            Ok(false) => {
                info!("[{}] sound skipped (played recently)", course.label());
            }
            Err(err) => {
                warn!("[{}] sound throttle check failed: {err:#}", course.label());
            }
        }

        match self.mailer.send_alert(course, result).await {
            Ok(true) => {
                self.db
                    .record_notification(
                        course.id,
                        result.total_available,
                        result.total_seats(),
                        Utc::now(),
                    )
                    .await?;
            }
            Ok(false) => {
                info!("[{}] email skipped", course.label());
            }
            Err(err) => {
                warn!("[{}] email failed: {err:#}", course.label());
            }
        }

        Ok(())
    }

    /// Sleep `total` in slices, consuming a stop request as soon as one
    /// appears. Returns true if the engine should stop.
    async fn sleep_watching_stop(&self, total: Duration) -> bool {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if self.stop_requested() {
                return true;
            }

            let slice = remaining.min(self.tuning.sleep_slice);
            tokio::select! {
                _ = tokio::time::sleep(slice) => {}
                _ = self.cancel.cancelled() => return true,
            }
            remaining = remaining.saturating_sub(slice);
        }
        self.stop_requested()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::control::MemoryControlChannel;
    use crate::db::test_support::temp_db;
    use crate::models::{EngineConfig, Section};
    use crate::registrar::RegistrarError;

    fn seats(available: u32, total: u32) -> SearchResult {
        SearchResult::from_sections(vec![Section { available, total }])
    }

    #[derive(Default)]
    struct FakeState {
        /// Scripted search outcomes, consumed front-first; when empty,
        /// `default_response` repeats forever.
        responses: Mutex<VecDeque<Option<SearchResult>>>,
        default_response: Mutex<Option<SearchResult>>,
        /// Login calls that should fail before logins start succeeding.
        login_failures: AtomicU32,
        logins: AtomicU32,
        searches: AtomicU32,
        closes: AtomicU32,
        search_times: Mutex<Vec<Instant>>,
        /// After this many searches, request a stop through the control
        /// channel (0 = never).
        stop_after_searches: AtomicU32,
        /// After (n) searches, set the poll interval to (secs).
        set_config_after: Mutex<Option<(u32, u64)>>,
    }

    struct FakeRegistrar {
        state: Arc<FakeState>,
        control: Arc<MemoryControlChannel>,
    }

    impl FakeRegistrar {
        fn new(control: Arc<MemoryControlChannel>) -> (Self, Arc<FakeState>) {
            let state = Arc::new(FakeState::default());
            (
                Self {
                    state: state.clone(),
                    control,
                },
                state,
            )
        }
    }

    #[async_trait]
    impl Registrar for FakeRegistrar {
        async fn login(&mut self) -> Result<(), RegistrarError> {
            self.state.logins.fetch_add(1, Ordering::SeqCst);
            let remaining = self.state.login_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.state.login_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(RegistrarError::Auth("bad cookie".into()));
            }
            Ok(())
        }

        async fn search(
            &self,
            _subject: &str,
            _course_num: &str,
        ) -> Result<Option<SearchResult>, RegistrarError> {
            let n = self.state.searches.fetch_add(1, Ordering::SeqCst) + 1;
            self.state.search_times.lock().unwrap().push(Instant::now());

            if let Some((after, secs)) = *self.state.set_config_after.lock().unwrap() {
                if n == after {
                    self.control.set_config(EngineConfig { interval: secs });
                }
            }

            let stop_after = self.state.stop_after_searches.load(Ordering::SeqCst);
            if stop_after > 0 && n >= stop_after {
                self.control.request_stop();
            }

            let scripted = self.state.responses.lock().unwrap().pop_front();
            Ok(match scripted {
                Some(response) => response,
                None => self.state.default_response.lock().unwrap().clone(),
            })
        }

        async fn close(&mut self) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    enum MailMode {
        Accept,
        Unconfigured,
        Fail,
    }

    struct FakeMailer {
        mode: MailMode,
        sends_attempted: AtomicU32,
    }

    impl FakeMailer {
        fn new(mode: MailMode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                sends_attempted: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send_alert(
            &self,
            _course: &WatchedCourse,
            _result: &SearchResult,
        ) -> Result<bool> {
            self.sends_attempted.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                MailMode::Accept => Ok(true),
                MailMode::Unconfigured => Ok(false),
                MailMode::Fail => Err(anyhow::anyhow!("smtp unreachable")),
            }
        }
    }

    struct Fixture {
        db: Database,
        _dir: tempfile::TempDir,
        control: Arc<MemoryControlChannel>,
        registrar_state: Arc<FakeState>,
        mailer: Arc<FakeMailer>,
        engine: Engine,
    }

    async fn fixture(mail: MailMode) -> Fixture {
        let (dir, db) = temp_db();
        let control = Arc::new(MemoryControlChannel::new());
        let (registrar, registrar_state) = FakeRegistrar::new(control.clone());
        let mailer = FakeMailer::new(mail);

        let engine = Engine::new(
            db.clone(),
            Box::new(registrar),
            control.clone(),
            mailer.clone(),
            EngineTuning::default(),
        );

        Fixture {
            db,
            _dir: dir,
            control,
            registrar_state,
            mailer,
            engine,
        }
    }

    fn script(state: &FakeState, responses: Vec<Option<SearchResult>>) {
        *state.responses.lock().unwrap() = responses.into();
    }

    fn set_default(state: &FakeState, response: Option<SearchResult>) {
        *state.default_response.lock().unwrap() = response;
    }

    #[tokio::test(start_paused = true)]
    async fn login_failure_exhaustion_is_terminal_error() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        fx.registrar_state.login_failures.store(5, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::LoginFailed);

        assert_eq!(fx.registrar_state.logins.load(Ordering::SeqCst), 5);
        assert_eq!(fx.registrar_state.searches.load(Ordering::SeqCst), 0);
        let phases = fx.control.phases();
        assert_eq!(phases.first(), Some(&EnginePhase::Starting));
        assert_eq!(phases.last(), Some(&EnginePhase::Error));
        assert!(!phases.contains(&EnginePhase::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn unverifiable_login_counts_as_failed_attempt() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        // Logins succeed but every verification search comes back empty.
        set_default(&fx.registrar_state, None);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::LoginFailed);
        assert_eq!(fx.registrar_state.logins.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn bare_login_accepted_when_watch_list_is_empty() {
        let fx = fixture(MailMode::Accept).await;
        // No courses: nothing to verify against, and nothing to check.
        fx.control.request_stop();

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);
        assert_eq!(fx.registrar_state.logins.load(Ordering::SeqCst), 1);
        assert_eq!(fx.registrar_state.searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_below_threshold_do_not_recreate_session() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        // Verification succeeds, then two failed cycles, then recovery.
        script(
            &fx.registrar_state,
            vec![Some(seats(0, 30)), None, None, Some(seats(0, 30))],
        );
        set_default(&fx.registrar_state, Some(seats(0, 30)));
        fx.registrar_state.stop_after_searches.store(5, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        // One login, no session teardown, no restart phase.
        assert_eq!(fx.registrar_state.logins.load(Ordering::SeqCst), 1);
        assert_eq!(fx.registrar_state.closes.load(Ordering::SeqCst), 0);
        assert!(!fx.control.phases().contains(&EnginePhase::Restarting));
    }

    #[tokio::test(start_paused = true)]
    async fn threshold_failures_trigger_exactly_one_restart() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        // Verification works once, then every check fails: three failed
        // cycles reach the threshold, and the relogin can no longer verify.
        script(&fx.registrar_state, vec![Some(seats(0, 30))]);
        set_default(&fx.registrar_state, None);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::LoginFailed);

        let phases = fx.control.phases();
        let restarts = phases
            .iter()
            .filter(|p| **p == EnginePhase::Restarting)
            .count();
        assert_eq!(restarts, 1);

        // Restarting must lead back into LoggingIn (a Starting publish).
        let restart_idx = phases
            .iter()
            .position(|p| *p == EnginePhase::Restarting)
            .unwrap();
        assert_eq!(phases[restart_idx + 1], EnginePhase::Starting);

        // The dead session was released before relogin.
        assert!(fx.registrar_state.closes.load(Ordering::SeqCst) >= 1);
        assert!(fx.registrar_state.logins.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_seats_records_history_but_sends_nothing() {
        let fx = fixture(MailMode::Accept).await;
        let course = fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        set_default(&fx.registrar_state, Some(seats(0, 30)));
        // Verification search + first check, then stop.
        fx.registrar_state.stop_after_searches.store(2, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        let checks = fx.db.recent_checks(course.id, 10).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].available_seats, 0);

        assert_eq!(fx.mailer.sends_attempted.load(Ordering::SeqCst), 0);
        assert_eq!(fx.db.count_notifications(course.id).await.unwrap(), 0);
        assert!(!fx
            .db
            .sound_played_within(course.id, chrono::Duration::hours(2), Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn open_seats_fire_sound_email_and_notification_record() {
        let fx = fixture(MailMode::Accept).await;
        let course = fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        script(&fx.registrar_state, vec![Some(seats(0, 30))]);
        set_default(&fx.registrar_state, Some(seats(5, 30)));
        fx.registrar_state.stop_after_searches.store(2, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        let checks = fx.db.recent_checks(course.id, 10).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].available_seats, 5);

        assert_eq!(fx.mailer.sends_attempted.load(Ordering::SeqCst), 1);
        let notifications = fx.db.recent_notifications(10).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].available_seats, 5);
        assert_eq!(notifications[0].total_seats, 30);

        // Sound fired (first time for this course).
        assert!(fx
            .db
            .sound_played_within(course.id, chrono::Duration::hours(2), Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn email_fires_every_cycle_while_sound_is_throttled() {
        let fx = fixture(MailMode::Accept).await;
        let course = fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        script(&fx.registrar_state, vec![Some(seats(0, 30))]);
        set_default(&fx.registrar_state, Some(seats(5, 30)));
        // Verification + two availability cycles.
        fx.registrar_state.stop_after_searches.store(3, Ordering::SeqCst);
        fx.control.set_config(EngineConfig { interval: 60 });

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        // Email attempted both cycles, notification recorded both times.
        assert_eq!(fx.mailer.sends_attempted.load(Ordering::SeqCst), 2);
        assert_eq!(fx.db.count_notifications(course.id).await.unwrap(), 2);

        // Sound fired at most once inside the cooldown window.
        let sounds = fx
            .db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sound_played WHERE course_id = ?1",
                    rusqlite::params![course.id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .unwrap();
        assert_eq!(sounds, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_email_send_records_no_notification() {
        let fx = fixture(MailMode::Fail).await;
        let course = fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        script(&fx.registrar_state, vec![Some(seats(0, 30))]);
        set_default(&fx.registrar_state, Some(seats(5, 30)));
        fx.registrar_state.stop_after_searches.store(2, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        assert_eq!(fx.mailer.sends_attempted.load(Ordering::SeqCst), 1);
        assert_eq!(fx.db.count_notifications(course.id).await.unwrap(), 0);
        // The check itself still went into history.
        assert_eq!(fx.db.recent_checks(course.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_mailer_skips_quietly() {
        let fx = fixture(MailMode::Unconfigured).await;
        let course = fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        script(&fx.registrar_state, vec![Some(seats(0, 30))]);
        set_default(&fx.registrar_state, Some(seats(5, 30)));
        fx.registrar_state.stop_after_searches.store(2, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);
        assert_eq!(fx.db.count_notifications(course.id).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_batch_checks_no_items_and_consumes_marker() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        fx.db.insert_course("MATH", "20B", "b@x.com").await.unwrap();
        script(&fx.registrar_state, vec![Some(seats(0, 30))]);
        set_default(&fx.registrar_state, Some(seats(0, 30)));
        fx.control.request_stop();

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        // Only the verification search ran; the batch never started.
        assert_eq!(fx.registrar_state.searches.load(Ordering::SeqCst), 1);
        // Marker is gone: consumed exactly once.
        assert!(!fx.control.stop_pending());
        assert_eq!(fx.control.last_phase(), Some(EnginePhase::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_batch_abandons_remaining_items() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        fx.db.insert_course("MATH", "20B", "b@x.com").await.unwrap();
        set_default(&fx.registrar_state, Some(seats(0, 30)));
        // Stop request appears during the first item's check.
        fx.registrar_state.stop_after_searches.store(2, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        // Verification + first course only; MATH 20B was never searched.
        assert_eq!(fx.registrar_state.searches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn session_left_open_on_stop_by_default() {
        let fx = fixture(MailMode::Accept).await;
        fx.control.request_stop();

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);
        assert_eq!(fx.registrar_state.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_on_stop_policy_releases_session() {
        let (_dir, db) = temp_db();
        let control = Arc::new(MemoryControlChannel::new());
        let (registrar, registrar_state) = FakeRegistrar::new(control.clone());
        let tuning = EngineTuning {
            close_session_on_stop: true,
            ..EngineTuning::default()
        };
        let engine = Engine::new(
            db,
            Box::new(registrar),
            control.clone(),
            FakeMailer::new(MailMode::Accept),
            tuning,
        );
        control.request_stop();

        let exit = engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);
        assert_eq!(registrar_state.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_token_stops_the_engine() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        set_default(&fx.registrar_state, Some(seats(0, 30)));

        let cancel = fx.engine.cancel_token();
        let handle = tokio::spawn(fx.engine.run());

        // Let the engine get into its first interval sleep, then cancel.
        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();

        let exit = handle.await.unwrap().unwrap();
        assert_eq!(exit, EngineExit::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_change_applies_on_the_following_iteration() {
        let fx = fixture(MailMode::Accept).await;
        fx.db.insert_course("CSE", "101", "a@x.com").await.unwrap();
        set_default(&fx.registrar_state, Some(seats(0, 30)));
        // During check #1 (search 2) the config drops to 60s; the cycle in
        // flight still sleeps the 3600s it read at its own start.
        *fx.registrar_state.set_config_after.lock().unwrap() = Some((2, 60));
        fx.registrar_state.stop_after_searches.store(4, Ordering::SeqCst);

        let exit = fx.engine.run().await.unwrap();
        assert_eq!(exit, EngineExit::Stopped);

        let times = fx.registrar_state.search_times.lock().unwrap().clone();
        assert_eq!(times.len(), 4);

        // Gap between check #1 and check #2: old 3600s interval (+ pauses).
        let first_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_secs(3600));
        assert!(first_gap < Duration::from_secs(3700));

        // Gap between check #2 and check #3: new 60s interval (+ pauses).
        let second_gap = times[3] - times[2];
        assert!(second_gap >= Duration::from_secs(60));
        assert!(second_gap < Duration::from_secs(160));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_watch_list_sleeps_without_searching() {
        let fx = fixture(MailMode::Accept).await;
        // Stop arrives while sleeping through the first empty iteration.
        let control = fx.control.clone();
        let handle = tokio::spawn(fx.engine.run());

        tokio::time::sleep(Duration::from_secs(30)).await;
        control.request_stop();

        let exit = handle.await.unwrap().unwrap();
        assert_eq!(exit, EngineExit::Stopped);
        assert_eq!(fx.registrar_state.searches.load(Ordering::SeqCst), 0);
    }
}
