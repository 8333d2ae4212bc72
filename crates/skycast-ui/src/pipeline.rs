//! Debounced, switch-latest request pipeline.
//!
//! One task per pipeline owns the pending event, the debounce deadline and at
//! most one in-flight request. A new event drops the in-flight request and
//! restarts the deadline; when the deadline passes quietly the latest event
//! becomes the next request. Results are applied on the same task, so only
//! the most recently started request can ever reach `apply`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

pub(crate) type BoxRequest<R> = Pin<Box<dyn Future<Output = R> + Send>>;

/// Sending half of a running pipeline.
pub(crate) struct Pipeline<E> {
    events: mpsc::UnboundedSender<E>,
    task: JoinHandle<()>,
}

impl<E: Send + 'static> Pipeline<E> {
    /// Start the pipeline task. It runs until `shutdown` is cancelled or
    /// every sender is gone.
    pub(crate) fn spawn<R, Req, Apply>(
        name: &'static str,
        window: Duration,
        shutdown: CancellationToken,
        request: Req,
        apply: Apply,
    ) -> Self
    where
        R: Send + 'static,
        Req: Fn(E) -> BoxRequest<R> + Send + 'static,
        Apply: FnMut(R) + Send + 'static,
    {
        let (events, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(name, window, shutdown, rx, request, apply));
        Self { events, task }
    }

    /// Queue an event. Returns `false` once the pipeline has stopped.
    pub(crate) fn send(&self, event: E) -> bool {
        self.events.send(event).is_ok()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run<E, R, Req, Apply>(
    name: &'static str,
    window: Duration,
    shutdown: CancellationToken,
    mut events: mpsc::UnboundedReceiver<E>,
    request: Req,
    mut apply: Apply,
) where
    Req: Fn(E) -> BoxRequest<R>,
    Apply: FnMut(R),
{
    let mut pending: Option<E> = None;
    let mut in_flight: Option<BoxRequest<R>> = None;
    let deadline = sleep(window);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                tracing::debug!(pipeline = name, "Pipeline shut down");
                break;
            }

            event = events.recv() => {
                let Some(event) = event else {
                    tracing::debug!(pipeline = name, "Pipeline input closed");
                    break;
                };
                if in_flight.take().is_some() {
                    tracing::debug!(pipeline = name, "Superseded in-flight request");
                }
                pending = Some(event);
                deadline.as_mut().reset(Instant::now() + window);
            }

            _ = &mut deadline, if pending.is_some() => {
                if let Some(event) = pending.take() {
                    tracing::debug!(pipeline = name, "Debounce window elapsed, dispatching");
                    in_flight = Some(request(event));
                }
            }

            result = in_flight_result(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                apply(result);
            }
        }
    }
}

async fn in_flight_result<R>(slot: &mut Option<BoxRequest<R>>) -> R {
    match slot {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}
