//! Batch job submission and completion polling.
//!
//! [`PollSchedule`] owns the timeout and interval contract. The async and
//! blocking drivers only fetch, feed the observed status in, and sleep for
//! whatever the schedule hands back, so both modes behave identically for the
//! same job history.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use vendi_common::{
    BatchJob, BatchJobStatus, CreateBatchJobRequest, ModelParameters, ValidationError,
};

use crate::error::{Result, VendiError};
use crate::http::{BlockingHttpClient, HttpClient};

const BATCH_PATH: &str = "/api/v1/providers/batch";

/// Blocking waits check the cancellation token at least this often.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { interval, timeout }
    }

    /// A zero interval would poll the server back to back.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.interval.is_zero() {
            return Err(ValidationError::InvalidField {
                field: "poll_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// The job reached `COMPLETED` or `FAILED`.
    Done,
    /// Sleep this long, then poll again.
    Sleep(Duration),
    TimedOut { elapsed: Duration },
}

/// Deadline bookkeeping for one wait.
///
/// Callers pass the time elapsed since just before their first poll, measured
/// on whatever clock their sleeps use. Sleeps are clipped to the remaining
/// budget so the last poll lands on the deadline instead of overshooting it by
/// up to one interval.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    policy: PollPolicy,
    polls: u32,
}

impl PollSchedule {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy, polls: 0 }
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Feed in the status seen by a poll made `elapsed` into the wait.
    pub fn observe(&mut self, status: BatchJobStatus, elapsed: Duration) -> PollStep {
        self.polls += 1;
        if status.is_terminal() {
            return PollStep::Done;
        }
        if elapsed >= self.policy.timeout {
            return PollStep::TimedOut { elapsed };
        }
        PollStep::Sleep(self.policy.interval.min(self.policy.timeout - elapsed))
    }
}

/// Poll with `fetch` until the job is terminal, sleeping cooperatively in between.
///
/// The token is raced against both the status request and the sleep.
pub async fn poll_until_terminal<F, Fut>(
    job_id: &str,
    policy: PollPolicy,
    cancel: Option<&CancellationToken>,
    mut fetch: F,
) -> Result<BatchJob>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<BatchJob>>,
{
    policy.validate()?;
    let mut schedule = PollSchedule::new(policy);
    let started = tokio::time::Instant::now();
    loop {
        let job = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled(job_id)),
                    job = fetch() => job?,
                }
            }
            None => fetch().await?,
        };
        let elapsed = started.elapsed();
        match schedule.observe(job.status, elapsed) {
            PollStep::Done => return Ok(finished(job, &schedule, elapsed)),
            PollStep::TimedOut { elapsed } => return Err(timed_out(job_id, elapsed)),
            PollStep::Sleep(delay) => {
                tracing::debug!(job_id, status = %job.status, ?delay, "batch job not finished");
                match cancel {
                    Some(token) => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return Err(cancelled(job_id)),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
            }
        }
    }
}

/// Blocking counterpart of [`poll_until_terminal`]; the calling thread sleeps between polls.
///
/// A status request already in flight is not interrupted by the token.
pub fn poll_until_terminal_blocking<F>(
    job_id: &str,
    policy: PollPolicy,
    cancel: Option<&CancellationToken>,
    mut fetch: F,
) -> Result<BatchJob>
where
    F: FnMut() -> Result<BatchJob>,
{
    policy.validate()?;
    let mut schedule = PollSchedule::new(policy);
    let started = Instant::now();
    loop {
        if cancel.is_some_and(|t| t.is_cancelled()) {
            return Err(cancelled(job_id));
        }
        let job = fetch()?;
        let elapsed = started.elapsed();
        match schedule.observe(job.status, elapsed) {
            PollStep::Done => return Ok(finished(job, &schedule, elapsed)),
            PollStep::TimedOut { elapsed } => return Err(timed_out(job_id, elapsed)),
            PollStep::Sleep(delay) => {
                tracing::debug!(job_id, status = %job.status, ?delay, "batch job not finished");
                if sleep_blocking(delay, cancel) {
                    return Err(cancelled(job_id));
                }
            }
        }
    }
}

/// Returns `true` if the token fired before `delay` elapsed.
fn sleep_blocking(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    let Some(token) = cancel else {
        std::thread::sleep(delay);
        return false;
    };
    // `None` means the deadline is past what `Instant` can represent.
    let deadline = Instant::now().checked_add(delay);
    loop {
        if token.is_cancelled() {
            return true;
        }
        let slice = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                CANCEL_CHECK_SLICE.min(deadline - now)
            }
            None => CANCEL_CHECK_SLICE,
        };
        std::thread::sleep(slice);
    }
}

fn finished(job: BatchJob, schedule: &PollSchedule, elapsed: Duration) -> BatchJob {
    if job.status == BatchJobStatus::Failed {
        tracing::warn!(job_id = %job.id, polls = schedule.polls(), ?elapsed, "batch job failed");
    } else {
        tracing::info!(
            job_id = %job.id,
            output_dataset_id = job.output_dataset_id.as_deref().unwrap_or(""),
            polls = schedule.polls(),
            ?elapsed,
            "batch job completed"
        );
    }
    job
}

fn timed_out(job_id: &str, elapsed: Duration) -> VendiError {
    tracing::warn!(job_id, ?elapsed, "gave up waiting for batch job");
    VendiError::PollTimeout {
        job_id: job_id.to_string(),
        elapsed,
    }
}

fn cancelled(job_id: &str) -> VendiError {
    tracing::info!(job_id, "stopped waiting for batch job");
    VendiError::Cancelled {
        job_id: job_id.to_string(),
    }
}

fn build_request(dataset_id: &str, model_parameters: Vec<ModelParameters>) -> Result<CreateBatchJobRequest> {
    let request = CreateBatchJobRequest {
        dataset_id: dataset_id.to_string(),
        model_parameters,
    };
    request.validate()?;
    Ok(request)
}

fn job_path(job_id: &str) -> String {
    format!("{BATCH_PATH}/{job_id}")
}

/// Batch jobs over the async client.
#[derive(Debug, Clone)]
pub struct Batches {
    http: HttpClient,
    defaults: PollPolicy,
}

impl Batches {
    pub(crate) fn new(http: HttpClient, defaults: PollPolicy) -> Self {
        Self { http, defaults }
    }

    /// Submit a batch inference job over `dataset_id`, one run per parameter record.
    pub async fn submit(
        &self,
        dataset_id: &str,
        model_parameters: Vec<ModelParameters>,
    ) -> Result<BatchJob> {
        let request = build_request(dataset_id, model_parameters)?;
        let span = tracing::info_span!("vendi.batch.submit", dataset_id, models = request.model_parameters.len());
        async {
            let job: BatchJob = self.http.post(BATCH_PATH, &request).await?;
            tracing::info!(job_id = %job.id, status = %job.status, "batch job submitted");
            Ok(job)
        }
        .instrument(span)
        .await
    }

    pub async fn status(&self, job_id: &str) -> Result<BatchJob> {
        self.http.get(&job_path(job_id)).await
    }

    pub async fn status_of(&self, job_id: &str) -> Result<BatchJobStatus> {
        self.status(job_id).await.map(|j| j.status)
    }

    /// Poll until the job is `COMPLETED` or `FAILED`, or `timeout` passes.
    ///
    /// A `FAILED` job is returned as `Ok`. A job that is already terminal is
    /// returned without polling.
    pub async fn await_completion(
        &self,
        job: &BatchJob,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<BatchJob> {
        self.wait(job, PollPolicy::new(timeout, poll_interval), None)
            .await
    }

    /// [`Batches::await_completion`] with the configured timeout and interval.
    pub async fn await_completion_default(&self, job: &BatchJob) -> Result<BatchJob> {
        self.wait(job, self.defaults, None).await
    }

    /// Like [`Batches::await_completion`], but returns `Cancelled` as soon as `token` fires.
    pub async fn await_completion_with_cancel(
        &self,
        job: &BatchJob,
        policy: PollPolicy,
        token: &CancellationToken,
    ) -> Result<BatchJob> {
        self.wait(job, policy, Some(token)).await
    }

    async fn wait(
        &self,
        job: &BatchJob,
        policy: PollPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchJob> {
        policy.validate()?;
        if job.is_terminal() {
            return Ok(job.clone());
        }
        let span = tracing::info_span!("vendi.batch.await", job_id = %job.id);
        poll_until_terminal(&job.id, policy, cancel, || self.status(&job.id))
            .instrument(span)
            .await
    }

    /// Submit, then wait with the configured defaults when `wait` is set.
    pub async fn run_batch_job(
        &self,
        dataset_id: &str,
        model_parameters: Vec<ModelParameters>,
        wait: bool,
    ) -> Result<BatchJob> {
        let job = self.submit(dataset_id, model_parameters).await?;
        if !wait {
            return Ok(job);
        }
        self.await_completion_default(&job).await
    }
}

/// Batch jobs over the blocking client.
#[derive(Debug, Clone)]
pub struct BlockingBatches {
    http: BlockingHttpClient,
    defaults: PollPolicy,
}

impl BlockingBatches {
    pub(crate) fn new(http: BlockingHttpClient, defaults: PollPolicy) -> Self {
        Self { http, defaults }
    }

    pub fn submit(&self, dataset_id: &str, model_parameters: Vec<ModelParameters>) -> Result<BatchJob> {
        let request = build_request(dataset_id, model_parameters)?;
        let _span = tracing::info_span!("vendi.batch.submit", dataset_id, models = request.model_parameters.len())
            .entered();
        let job: BatchJob = self.http.post(BATCH_PATH, &request)?;
        tracing::info!(job_id = %job.id, status = %job.status, "batch job submitted");
        Ok(job)
    }

    pub fn status(&self, job_id: &str) -> Result<BatchJob> {
        self.http.get(&job_path(job_id))
    }

    pub fn status_of(&self, job_id: &str) -> Result<BatchJobStatus> {
        self.status(job_id).map(|j| j.status)
    }

    pub fn await_completion(
        &self,
        job: &BatchJob,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<BatchJob> {
        self.wait(job, PollPolicy::new(timeout, poll_interval), None)
    }

    pub fn await_completion_default(&self, job: &BatchJob) -> Result<BatchJob> {
        self.wait(job, self.defaults, None)
    }

    pub fn await_completion_with_cancel(
        &self,
        job: &BatchJob,
        policy: PollPolicy,
        token: &CancellationToken,
    ) -> Result<BatchJob> {
        self.wait(job, policy, Some(token))
    }

    fn wait(
        &self,
        job: &BatchJob,
        policy: PollPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchJob> {
        policy.validate()?;
        if job.is_terminal() {
            return Ok(job.clone());
        }
        let _span = tracing::info_span!("vendi.batch.await", job_id = %job.id).entered();
        poll_until_terminal_blocking(&job.id, policy, cancel, || self.status(&job.id))
    }

    pub fn run_batch_job(
        &self,
        dataset_id: &str,
        model_parameters: Vec<ModelParameters>,
        wait: bool,
    ) -> Result<BatchJob> {
        let job = self.submit(dataset_id, model_parameters)?;
        if !wait {
            return Ok(job);
        }
        self.await_completion_default(&job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::error::TransportError;

    fn job(status: BatchJobStatus) -> BatchJob {
        BatchJob {
            id: "job-1".to_string(),
            dataset_id: "ds-1".to_string(),
            model_parameters: vec![],
            status,
            output_dataset_id: (status == BatchJobStatus::Completed).then(|| "out-1".to_string()),
        }
    }

    /// Returns `running` non-terminal polls, then `last` forever.
    #[derive(Clone)]
    struct Script {
        queue: Arc<Mutex<VecDeque<BatchJobStatus>>>,
        last: BatchJobStatus,
        calls: Arc<Mutex<u32>>,
    }

    impl Script {
        fn new(running: usize, last: BatchJobStatus) -> Self {
            let mut queue = VecDeque::new();
            queue.push_back(BatchJobStatus::Pending);
            for _ in 1..running {
                queue.push_back(BatchJobStatus::Running);
            }
            if running == 0 {
                queue.clear();
            }
            Self {
                queue: Arc::new(Mutex::new(queue)),
                last,
                calls: Arc::new(Mutex::new(0)),
            }
        }

        fn next(&self) -> Result<BatchJob> {
            *self.calls.lock().unwrap() += 1;
            let status = self.queue.lock().unwrap().pop_front().unwrap_or(self.last);
            Ok(job(status))
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_schedule_sleeps_for_interval() {
        let mut s = PollSchedule::new(PollPolicy::new(secs(5), secs(1)));
        assert_eq!(s.observe(BatchJobStatus::Pending, secs(0)), PollStep::Sleep(secs(1)));
        assert_eq!(s.observe(BatchJobStatus::Running, secs(1)), PollStep::Sleep(secs(1)));
        assert_eq!(s.observe(BatchJobStatus::Completed, secs(2)), PollStep::Done);
        assert_eq!(s.polls(), 3);
    }

    #[test]
    fn test_schedule_clips_last_sleep_to_deadline() {
        let mut s = PollSchedule::new(PollPolicy::new(secs(5), secs(2)));
        assert_eq!(s.observe(BatchJobStatus::Running, secs(4)), PollStep::Sleep(secs(1)));
        assert_eq!(
            s.observe(BatchJobStatus::Running, secs(5)),
            PollStep::TimedOut { elapsed: secs(5) }
        );
    }

    #[test]
    fn test_schedule_terminal_wins_past_deadline() {
        let mut s = PollSchedule::new(PollPolicy::new(secs(1), secs(1)));
        assert_eq!(s.observe(BatchJobStatus::Failed, secs(10)), PollStep::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_three_polls_within_budget() {
        let script = Script::new(3, BatchJobStatus::Completed);
        let start = tokio::time::Instant::now();
        let done = poll_until_terminal("job-1", PollPolicy::new(secs(5), secs(1)), None, || {
            let s = script.clone();
            async move { s.next() }
        })
        .await
        .unwrap();
        let elapsed = start.elapsed();
        assert_eq!(done.status, BatchJobStatus::Completed);
        assert_eq!(done.output_dataset_id.as_deref(), Some("out-1"));
        assert!(elapsed >= secs(3));
        assert!(elapsed < secs(5));
        assert_eq!(script.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_terminal_times_out_with_job_id() {
        let script = Script::new(1000, BatchJobStatus::Running);
        let start = tokio::time::Instant::now();
        let err = poll_until_terminal("job-1", PollPolicy::new(secs(5), secs(1)), None, || {
            let s = script.clone();
            async move { s.next() }
        })
        .await
        .unwrap_err();
        match err {
            VendiError::PollTimeout { job_id, elapsed } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(elapsed, secs(5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(start.elapsed(), secs(5));
        // polls at t = 0, 1, 2, 3, 4, 5
        assert_eq!(script.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_is_ok() {
        let script = Script::new(1, BatchJobStatus::Failed);
        let done = poll_until_terminal("job-1", PollPolicy::new(secs(5), secs(1)), None, || {
            let s = script.clone();
            async move { s.next() }
        })
        .await
        .unwrap();
        assert_eq!(done.status, BatchJobStatus::Failed);
        assert!(done.output_dataset_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_not_retried() {
        let mut calls = 0;
        let err = poll_until_terminal("job-1", PollPolicy::new(secs(5), secs(1)), None, || {
            calls += 1;
            async { Err(TransportError::status("http://x", 502, "bad gateway").into()) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.http_status(), Some(502));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_returns_promptly() {
        let script = Script::new(1000, BatchJobStatus::Running);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let start = tokio::time::Instant::now();
        let err = poll_until_terminal("job-1", PollPolicy::new(secs(60), secs(10)), Some(&token), || {
            let s = script.clone();
            async move { s.next() }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, VendiError::Cancelled { ref job_id } if job_id == "job-1"));
        assert!(start.elapsed() < secs(10));
        assert_eq!(script.calls(), 1);
    }

    #[test]
    fn test_blocking_cancel_during_sleep_returns_promptly() {
        let script = Script::new(1000, BatchJobStatus::Running);
        let token = CancellationToken::new();
        let trigger = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });
        let start = Instant::now();
        let err = poll_until_terminal_blocking(
            "job-1",
            PollPolicy::new(secs(60), secs(10)),
            Some(&token),
            || script.next(),
        )
        .unwrap_err();
        assert!(matches!(err, VendiError::Cancelled { .. }));
        assert!(start.elapsed() < secs(2));
    }

    #[test]
    fn test_blocking_and_async_agree() {
        let policy = PollPolicy::new(Duration::from_millis(500), Duration::from_millis(20));
        for (running, last) in [
            (3, BatchJobStatus::Completed),
            (2, BatchJobStatus::Failed),
            (0, BatchJobStatus::Completed),
            (10_000, BatchJobStatus::Running),
        ] {
            let blocking_script = Script::new(running, last);
            let blocking = poll_until_terminal_blocking("job-1", policy, None, || blocking_script.next());

            let async_script = Script::new(running, last);
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            let non_blocking = rt.block_on(poll_until_terminal("job-1", policy, None, || {
                let s = async_script.clone();
                async move { s.next() }
            }));

            match (blocking, non_blocking) {
                (Ok(a), Ok(b)) => {
                    assert_eq!(a, b);
                    assert_eq!(blocking_script.calls(), async_script.calls());
                }
                (Err(VendiError::PollTimeout { job_id: a, .. }), Err(VendiError::PollTimeout { job_id: b, .. })) => {
                    assert_eq!(a, b)
                }
                (a, b) => panic!("modes disagree: {a:?} vs {b:?}"),
            }
        }
    }

    #[test]
    fn test_empty_parameters_rejected() {
        let err = build_request("ds-1", vec![]).unwrap_err();
        assert!(matches!(
            err,
            VendiError::Validation(ValidationError::EmptyModelParameters)
        ));
    }

    #[test]
    fn test_conflicting_structured_output_rejected() {
        let params = ModelParameters::new("openai/gpt-4")
            .with_json_schema(serde_json::json!({"type": "object"}))
            .with_regex("a+");
        let err = build_request("ds-1", vec![params]).unwrap_err();
        assert!(matches!(
            err,
            VendiError::Validation(ValidationError::StructuredOutputConflict)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_slow_status_request() {
        let script = Script::new(1000, BatchJobStatus::Running);
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let start = tokio::time::Instant::now();
        let err = poll_until_terminal("job-1", PollPolicy::new(secs(60), secs(1)), Some(&token), || {
            let s = script.clone();
            async move {
                tokio::time::sleep(secs(2)).await;
                s.next()
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, VendiError::Cancelled { .. }));
        assert!(start.elapsed() < secs(1));
        assert_eq!(script.calls(), 0);
    }

    #[test]
    fn test_unbounded_policy_waits_in_both_modes() {
        let policy = PollPolicy::new(Duration::MAX, Duration::MAX);

        let script = Script::new(1000, BatchJobStatus::Running);
        let token = CancellationToken::new();
        let trigger = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });
        let blocking = poll_until_terminal_blocking("job-1", policy, Some(&token), || script.next());
        assert!(matches!(blocking, Err(VendiError::Cancelled { .. })));

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let script = Script::new(1000, BatchJobStatus::Running);
        let non_blocking = rt.block_on(async {
            let token = CancellationToken::new();
            let trigger = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.cancel();
            });
            poll_until_terminal("job-1", policy, Some(&token), || {
                let s = script.clone();
                async move { s.next() }
            })
            .await
        });
        assert!(matches!(non_blocking, Err(VendiError::Cancelled { .. })));

        let script = Script::new(0, BatchJobStatus::Completed);
        let done = poll_until_terminal_blocking("job-1", policy, None, || script.next()).unwrap();
        assert_eq!(done.status, BatchJobStatus::Completed);
    }

    #[test]
    fn test_blocking_driver_ignores_paused_tokio_clock() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let result = rt.block_on(async {
            tokio::task::spawn_blocking(|| {
                let script = Script::new(1000, BatchJobStatus::Running);
                let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_millis(20));
                poll_until_terminal_blocking("job-1", policy, None, || script.next())
            })
            .await
            .unwrap()
        });
        assert!(matches!(result, Err(VendiError::PollTimeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_rejected_in_both_modes() {
        let policy = PollPolicy::new(secs(1), Duration::ZERO);
        let script = Script::new(1000, BatchJobStatus::Running);

        let err = poll_until_terminal("job-1", policy, None, || {
            let s = script.clone();
            async move { s.next() }
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            VendiError::Validation(ValidationError::InvalidField { field: "poll_interval", .. })
        ));

        let err = poll_until_terminal_blocking("job-1", policy, None, || script.next()).unwrap_err();
        assert!(matches!(err, VendiError::Validation(_)));
        assert_eq!(script.calls(), 0);
    }
}
