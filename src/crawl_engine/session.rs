//! Site-visit session: drives one browser through one task.
//!
//! `Init → Launching → Connecting → Visiting → Completing → Closed`
//!
//! The session always returns a `RawResult`; a failed attempt is encoded in
//! its summary and in the task's failure fields. Only an environment that
//! cannot host a visit at all (no working directory) is an error.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tokio_util::sync::CancellationToken;

use super::cleanup::{CleanupResult, shutdown_browser};
use super::consumers::spawn_consumers;
use super::post_load::PostLoad;
use crate::browser::{BrowserProcess, BrowserTransport, LaunchConfig, event_channels};
use crate::config::PipelineConfig;
use crate::error::{CancelReason, EnvironmentError, NavigationError, SessionError};
use crate::result::RawResult;
use crate::task::{CompletionCondition, SanitizedTask, TaskLog};
use crate::utils::MAX_SITE_VISIT_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Launching,
    Connecting,
    Visiting,
    Completing,
    Closed,
}

/// Mutable context of one running session
struct Session<'a> {
    shared: Arc<Mutex<RawResult>>,
    log: TaskLog,
    config: &'a PipelineConfig,
    cancel: &'a CancellationToken,
    children: CancellationToken,
    consumers: JoinSet<()>,
    post_load: Option<JoinHandle<()>>,
    state: SessionState,
}

impl Session<'_> {
    fn enter(&mut self, state: SessionState) {
        log::trace!(target: "mida::session", "{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn stamp_close(&self) {
        self.shared.lock().summary.timing.browser_close = Some(Utc::now());
    }

    /// Graceful close bounded by the grace period, then kill
    async fn shut_down(&self, process: &dyn BrowserProcess) {
        if let CleanupResult::PartialFailure(errors) =
            shutdown_browser(process, self.config.shutdown_grace()).await
        {
            self.log.error(format!(
                "failed to close browser gracefully, so we had to force it ({})",
                errors.join("; ")
            ));
        }
    }

    /// Stop every child task and wait for it, then hand out the result
    async fn close(mut self) -> RawResult {
        self.enter(SessionState::Closed);
        self.children.cancel();

        if let Some(post_load) = self.post_load.take()
            && let Err(e) = post_load.await
        {
            self.log.warn(format!("post-load task ended abnormally: {e}"));
        }
        while let Some(joined) = self.consumers.join_next().await {
            if let Err(e) = joined {
                self.log.warn(format!("event consumer ended abnormally: {e}"));
            }
        }
        self.log.debug("finished waiting on background tasks, site visit concluded");
        self.log.flush().await;

        match Arc::try_unwrap(self.shared) {
            Ok(raw) => raw.into_inner(),
            Err(shared) => shared.lock().clone(),
        }
    }

    async fn fail(self, err: SessionError) -> RawResult {
        self.shared.lock().fail(err.to_string());
        self.close().await
    }
}

/// Visit `task.url` once.
///
/// # Errors
///
/// Returns `EnvironmentError` when the working directory cannot be created.
pub async fn visit(
    task: SanitizedTask,
    transport: &dyn BrowserTransport,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> Result<RawResult, EnvironmentError> {
    tokio::fs::create_dir_all(&task.working_dir)
        .await
        .map_err(|source| EnvironmentError {
            path: task.working_dir.clone(),
            source,
        })?;

    let log = task.log();
    log.info(format!(
        "starting site visit (attempt {} of {})",
        task.current_attempt, task.max_attempts
    ));

    let completion = task.completion;
    let data = task.data;
    let url = task.url.clone();
    let working_dir = task.working_dir.clone();
    let launch_config = LaunchConfig::for_task(&task, config.navigation_timeout(), &log);

    let shared = Arc::new(Mutex::new(RawResult::new(task)));
    let children = cancel.child_token();
    let (router, queues) = event_channels(config.event_queue_capacity());
    let (loaded_tx, mut loaded_rx) = oneshot::channel();
    let consumers = spawn_consumers(queues, &shared, &children, loaded_tx);

    let mut session = Session {
        shared,
        log,
        config,
        cancel,
        children,
        consumers,
        post_load: None,
        state: SessionState::Init,
    };

    // Launching
    session.enter(SessionState::Launching);
    session.shared.lock().summary.timing.browser_open = Some(Utc::now());
    // Bounded so the addition cannot overflow for tasks built by hand.
    let deadline =
        Instant::now() + completion.timeout.min(Duration::from_secs(MAX_SITE_VISIT_SECS));

    let process = match timeout_at(deadline, transport.launch(&launch_config)).await {
        Ok(Ok(process)) => process,
        Ok(Err(e)) => {
            session.log.error(format!("failed to launch browser: {e}"));
            return Ok(session.fail(SessionError::Launch(e.to_string())).await);
        }
        Err(_) => {
            let err = SessionError::Launch("browser did not start before the site visit timeout".into());
            session.log.error(err.to_string());
            return Ok(session.fail(err).await);
        }
    };

    let enabled = match process.subscribe(router).await {
        Ok(()) => process.enable_domains().await,
        Err(e) => Err(e),
    };
    match enabled {
        Ok(info) => session.shared.lock().summary.crawler_info = info,
        Err(e) => {
            session.log.error(format!("failed to enable DevTools domains: {e}"));
            process.kill().await;
            session.stamp_close();
            return Ok(session.fail(SessionError::DomainEnable(e.to_string())).await);
        }
    }

    // Connecting
    session.enter(SessionState::Connecting);
    let navigation: Result<(), SessionError> = tokio::select! {
        res = process.navigate(&url) => res.map_err(SessionError::from),
        () = sleep(config.navigation_timeout()) => Err(NavigationError::Timeout.into()),
        () = sleep_until(deadline) => Err(SessionError::Cancelled(CancelReason::OverallTimeout)),
        () = process.exited() => Err(SessionError::Cancelled(CancelReason::ProcessExited)),
        () = session.cancel.cancelled() => Err(SessionError::Cancelled(CancelReason::Cancelled)),
    };

    if let Err(err) = navigation {
        session.log.error(format!("failed to navigate to site: {err}"));
        session.shut_down(process.as_ref()).await;
        session.stamp_close();
        return Ok(session.fail(err).await);
    }
    {
        let mut raw = session.shared.lock();
        let timing = &mut raw.summary.timing;
        let connected = Utc::now();
        timing.connection_established = Some(connected);
        // A load reported before the navigate reply is stamped no earlier than the connection.
        if timing.load_event.is_some_and(|load| load < connected) {
            timing.load_event = Some(connected);
        }
    }
    session.log.debug("connection established");

    // Visiting
    session.enter(SessionState::Visiting);
    let start_post_load = |session: &Session<'_>| {
        let actions = PostLoad {
            process: Arc::clone(&process),
            shared: Arc::clone(&session.shared),
            data,
            working_dir: working_dir.clone(),
            log: session.log.clone(),
        };
        tokio::spawn(actions.run(session.children.clone()))
    };

    let cancelled = tokio::select! {
        () = process.exited() => {
            session.log.warn("browser crashed, closed manually, or we lost connection");
            false
        }
        Ok(()) = &mut loaded_rx => match completion.condition {
            CompletionCondition::LoadEvent => {
                session.log.debug("got load event so we are concluding site visit");
                false
            }
            CompletionCondition::TimeoutOnly => {
                session.post_load = Some(start_post_load(&session));
                tokio::select! {
                    () = process.exited() => {
                        session.log.warn("browser crashed, closed manually, or we lost connection (after load event)");
                        false
                    }
                    () = sleep_until(deadline) => {
                        session.log.debug("hit general timeout");
                        false
                    }
                    () = session.cancel.cancelled() => {
                        session.log.warn("site visit cancelled after load event");
                        true
                    }
                }
            }
            CompletionCondition::TimeAfterLoad => {
                session.post_load = Some(start_post_load(&session));
                tokio::select! {
                    () = process.exited() => {
                        session.log.warn("browser crashed, closed manually, or we lost connection (after load event)");
                        false
                    }
                    () = sleep_until(deadline) => {
                        session.log.debug("general timeout hit before time after load");
                        false
                    }
                    () = sleep(completion.time_after_load) => {
                        session.log.debug("hit time after load");
                        false
                    }
                    () = session.cancel.cancelled() => {
                        session.log.warn("site visit cancelled after load event");
                        true
                    }
                }
            }
        },
        () = sleep_until(deadline) => {
            session.log.debug("general timeout before load event fired");
            false
        }
        () = session.cancel.cancelled() => {
            session.log.warn("site visit cancelled before load event");
            true
        }
    };

    // Completing
    session.enter(SessionState::Completing);
    session.log.debug("closing browser");
    session.shut_down(process.as_ref()).await;
    session.stamp_close();
    session.log.debug("browser is now closed");
    drop(process);

    // Outside cancellation fails the attempt even after a load.
    if cancelled {
        return Ok(session.fail(SessionError::Cancelled(CancelReason::Cancelled)).await);
    }
    session.shared.lock().summary.success = true;
    Ok(session.close().await)
}
