use infercast_common::{
    CompletionRequest, CompletionResponse, Endpoint, HttpTransport, InfercastError, Result,
    Transport,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::collector::{Assignment, ResultCollector, ResultMap};
use crate::config::DispatchConfig;
use crate::prober::{ExcludedEndpoint, LivenessProber, ProbeConfig, ProbeReport};
use crate::queue::WorkQueue;
use crate::retry::RetryPolicy;
use crate::selector::EndpointSelector;
use crate::stats::{DispatchStats, StatsSnapshot};

/// Everything one batch produced.
#[derive(Debug)]
pub struct DispatchReport {
    /// Prompt → response for every prompt that succeeded within its budget
    pub results: ResultMap,
    /// Endpoints that received work, in round-robin order
    pub live: Vec<Endpoint>,
    /// Candidates left out by the liveness probe
    pub excluded: Vec<ExcludedEndpoint>,
    /// Prompts whose every attempt failed
    pub exhausted: Vec<String>,
    /// Endpoint and attempt count for every processed prompt
    pub assignments: HashMap<String, Assignment>,
    pub stats: StatsSnapshot,
}

impl DispatchReport {
    pub fn result(&self, prompt: &str) -> Option<&CompletionResponse> {
        self.results.get(prompt)
    }

    pub fn into_results(self) -> ResultMap {
        self.results
    }
}

/// State shared by every worker of one batch.
struct WorkerContext<T: Transport> {
    transport: Arc<T>,
    queue: Arc<WorkQueue>,
    selector: Arc<EndpointSelector>,
    collector: Arc<ResultCollector>,
    stats: Arc<DispatchStats>,
    policy: RetryPolicy,
}

impl<T: Transport> Clone for WorkerContext<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            queue: Arc::clone(&self.queue),
            selector: Arc::clone(&self.selector),
            collector: Arc::clone(&self.collector),
            stats: Arc::clone(&self.stats),
            policy: self.policy.clone(),
        }
    }
}

/// Batch dispatcher for a cluster of inference endpoints.
///
/// Each [`dispatch`](Self::dispatch) call runs one self-contained batch:
///
/// 1. **Liveness probing**: every configured endpoint is probed once, in parallel
/// 2. **Round-robin selection**: the live set is wrapped in an [`EndpointSelector`]
/// 3. **Worker pool**: exactly `concurrency` workers drain a shared FIFO queue
/// 4. **Retry**: each request is retried against the endpoint it was assigned
/// 5. **Collection**: successful responses are gathered into one map
///
/// The worker count is the concurrency budget; there is no separate
/// semaphore. A request holds its worker for its whole attempt sequence.
///
/// # Example
/// ```no_run
/// # use infercast_dispatcher::{DispatchConfig, Dispatcher};
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DispatchConfig::new(vec!["10.0.0.1".into(), "10.0.0.2".into()])
///     .with_concurrency(16);
/// let dispatcher = Dispatcher::new(config)?;
///
/// let report = dispatcher
///     .dispatch(vec!["The capital of France is ".to_string()])
///     .await?;
/// for (prompt, response) in &report.results {
///     println!("{prompt:?} -> {:?}", response.text());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<T: Transport = HttpTransport> {
    transport: Arc<T>,
    config: DispatchConfig,
}

impl Dispatcher<HttpTransport> {
    /// Creates a dispatcher talking HTTP to the configured cluster.
    pub fn new(config: DispatchConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.transport_config());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher over an arbitrary [`Transport`].
    pub fn with_transport(config: DispatchConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Probes the configured endpoints without dispatching anything.
    pub async fn probe(&self) -> ProbeReport {
        let prober = LivenessProber::new(
            self.transport.as_ref(),
            ProbeConfig {
                port: self.config.port,
                timeout: self.config.probe_timeout,
            },
        );
        prober.probe_all(&self.config.endpoints).await
    }

    /// Runs one batch to completion.
    ///
    /// # Returns
    /// - `Ok(report)` - Batch drained; `report.results` may be partial
    /// - `Err(InfercastError::NoLiveEndpoints)` - No endpoint answered the
    ///   probe; nothing was sent
    pub async fn dispatch<I, S>(&self, prompts: I) -> Result<DispatchReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompts: Vec<String> = prompts.into_iter().map(Into::into).collect();
        let start_time = Instant::now();

        let probe = self.probe().await;
        if probe.live.is_empty() {
            warn!(
                "All {} configured endpoints were excluded, aborting batch",
                self.config.endpoints.len()
            );
            return Err(InfercastError::NoLiveEndpoints);
        }

        let selector = Arc::new(probe.selector()?);
        let workers = self.config.concurrency;
        info!(
            "Dispatching {} prompts to {} live endpoints with {} workers",
            prompts.len(),
            selector.len(),
            workers
        );

        let queue = Arc::new(WorkQueue::new(prompts.len(), workers));
        for prompt in prompts {
            queue
                .put(CompletionRequest::new(prompt, self.config.max_tokens))
                .await?;
        }

        let context = WorkerContext {
            transport: Arc::clone(&self.transport),
            queue: Arc::clone(&queue),
            selector,
            collector: Arc::new(ResultCollector::new()),
            stats: Arc::new(DispatchStats::new(&probe.live)),
            policy: RetryPolicy::new(self.config.retry.clone(), self.config.request_timeout),
        };

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            pool.spawn(Self::run_worker(worker_id, context.clone()));
        }

        // Every item completed, not merely dequeued. A worker only exits
        // early by failing; a replacement keeps the pool at its configured size.
        let mut next_worker_id = workers;
        loop {
            tokio::select! {
                _ = queue.join() => break,
                Some(result) = pool.join_next() => {
                    if let Err(e) = result {
                        warn!("Worker task failed: {}, starting a replacement", e);
                        pool.spawn(Self::run_worker(next_worker_id, context.clone()));
                        next_worker_id += 1;
                    }
                }
            }
        }
        queue.close(workers).await?;

        while let Some(result) = pool.join_next().await {
            if let Err(e) = result {
                warn!("Worker task failed: {}", e);
            }
        }

        let WorkerContext {
            collector, stats, ..
        } = context;
        let collector = Arc::try_unwrap(collector).map_err(|_| {
            InfercastError::Internal("result collector still shared after shutdown".to_string())
        })?;
        let collected = collector.into_results();
        let stats = stats.snapshot();
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            completed = collected.results.len(),
            exhausted = collected.exhausted.len(),
            attempts = stats.attempts,
            elapsed_ms,
            "Batch finished"
        );

        Ok(DispatchReport {
            results: collected.results,
            live: probe.live,
            excluded: probe.excluded,
            exhausted: collected.exhausted,
            assignments: collected.assignments,
            stats,
        })
    }

    /// Worker loop: dequeue, pick endpoint, send with retry, record, repeat.
    ///
    /// Returns the number of requests this worker processed.
    async fn run_worker(worker_id: usize, ctx: WorkerContext<T>) -> usize {
        let mut processed = 0;

        while let Some((request, endpoint)) = ctx.queue.next_with(|| ctx.selector.next()).await {
            let _done = ctx.queue.task_guard();
            ctx.stats.record_selection(&endpoint);

            let outcome = ctx
                .policy
                .execute(ctx.transport.as_ref(), endpoint, request, &ctx.stats)
                .await;
            ctx.collector.record(outcome).await;
            processed += 1;
        }

        debug!(worker_id, processed, "worker exiting");
        processed
    }
}
