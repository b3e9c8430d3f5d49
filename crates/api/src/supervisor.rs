//! Lifecycle of the HTTP server and the background worker.
//!
//! Both run as sibling tasks under one [`CancellationToken`]. Whichever
//! fails first cancels the token, the other one observes it and stops, and
//! the first error is what the supervisor reports.

use std::any::Any;
use std::future::Future;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use pipeline::{OrderProcessor, Worker, WorkerError, channel};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::{create_app, create_state, server};

/// Errors that terminate the process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("http server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

/// A set of tasks sharing one cancellation scope.
///
/// The first task to return an error (or panic) cancels the scope.
pub struct TaskGroup {
    token: CancellationToken,
    tasks: JoinSet<(&'static str, Result<(), SupervisorError>)>,
}

impl TaskGroup {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            tasks: JoinSet::new(),
        }
    }

    /// The shared cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), SupervisorError>> + Send + 'static,
    {
        let guard = self.token.clone().drop_guard();
        self.tasks.spawn(async move {
            let result = task.await;
            match &result {
                Ok(()) => {
                    guard.disarm();
                    tracing::info!(task = name, "task stopped");
                }
                Err(e) => {
                    tracing::error!(task = name, error = %e, "task failed, cancelling siblings");
                    drop(guard);
                }
            }
            (name, result)
        });
    }

    /// Waits for every task and returns the first error, in completion order.
    pub async fn wait(mut self) -> Result<(), SupervisorError> {
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            let result = match joined {
                Ok((_, result)) => result,
                Err(e) => {
                    let err = SupervisorError::TaskPanicked(join_error_message(e));
                    tracing::error!(error = %err, "task aborted");
                    Err(err)
                }
            };

            if let Err(e) = result
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    panic_message(err.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send + 'static>) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Wires the store, channel, HTTP server and worker together.
pub struct Supervisor {
    config: Config,
    metrics: PrometheusHandle,
}

impl Supervisor {
    pub fn new(config: Config, metrics: PrometheusHandle) -> Self {
        Self { config, metrics }
    }

    /// Runs the server and the worker until `shutdown` fires or one of them
    /// fails.
    ///
    /// The supervisor keeps a sender alive for the whole run, so the worker
    /// never sees the channel close underneath it.
    pub async fn run<S, P>(
        self,
        listener: TcpListener,
        store: S,
        processor: P,
        shutdown: CancellationToken,
    ) -> Result<(), SupervisorError>
    where
        S: OrderStore + 'static,
        P: OrderProcessor + 'static,
    {
        let (events, receiver) = channel(self.config.event_channel_capacity);

        let state = create_state(store, events.clone(), shutdown.clone());
        let app = create_app(state, self.metrics, self.config.request_timeout);

        let mut group = TaskGroup::new(shutdown);

        let token = group.token();
        let grace = self.config.graceful_shutdown_timeout;
        group.spawn("http-server", server::serve(listener, app, token, grace));

        let token = group.token();
        let worker = Worker::new(receiver, processor);
        group.spawn("worker", async move {
            worker.run(token).await.map_err(SupervisorError::from)
        });

        tracing::info!(
            capacity = self.config.event_channel_capacity,
            "supervisor started"
        );
        let result = group.wait().await;
        drop(events);

        match &result {
            Ok(()) => tracing::info!("supervisor stopped cleanly"),
            Err(e) => tracing::error!(error = %e, "supervisor stopped with error"),
        }
        result
    }
}
