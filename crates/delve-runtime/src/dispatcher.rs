//! # Request Dispatcher
//!
//! A single-consumer queue that serializes every network request of a
//! session. Producers (the orchestrator and the explorer threads) append
//! requests; one tokio task pops them in submission order, executes the API
//! call outside any lock, and hands the decoded response to the registered
//! [`ResponseListener`] before taking the next one.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use delve_api::{ApiClient, ApiRequest, ApiResponse};
use delve_core::DelveError;

/// A queued request tagged with the session epoch it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub epoch: u64,
    pub request: ApiRequest,
}

impl Dispatch {
    pub fn new(epoch: u64, request: ApiRequest) -> Self {
        Self { epoch, request }
    }
}

/// Receives the outcome of every dispatched request, one at a time, on the
/// consumer task.
pub trait ResponseListener: Send + Sync {
    fn on_response(&self, dispatch: &Dispatch, response: ApiResponse);

    /// The call itself failed (transport or decode). The request is abandoned.
    fn on_request_error(&self, dispatch: &Dispatch, error: DelveError);
}

#[derive(Default)]
struct Queue {
    requests: VecDeque<Dispatch>,
    consumer_started: bool,
    stopped: bool,
}

struct Inner {
    client: Arc<dyn ApiClient>,
    handle: Handle,
    queue: Mutex<Queue>,
    wakeup: Notify,
    listener: Mutex<Option<Weak<dyn ResponseListener>>>,
}

/// Cheap to clone; all clones feed the same consumer.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// The consumer is spawned on `handle` when the first request arrives.
    pub fn new(client: Arc<dyn ApiClient>, handle: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                handle,
                queue: Mutex::new(Queue::default()),
                wakeup: Notify::new(),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Register the single listener. Replaces any previous one.
    pub fn set_listener(&self, listener: Weak<dyn ResponseListener>) {
        *self.inner.listener.lock() = Some(listener);
    }

    /// Queue a request. Returns `false` once the dispatcher is stopped.
    pub fn submit(&self, dispatch: Dispatch) -> bool {
        let spawn_consumer = {
            let mut queue = self.inner.queue.lock();
            if queue.stopped {
                debug!(request = dispatch.request.label(), "dispatcher stopped, request dropped");
                return false;
            }
            queue.requests.push_back(dispatch);
            !std::mem::replace(&mut queue.consumer_started, true)
        };

        if spawn_consumer {
            debug!(client = self.inner.client.name(), "starting request consumer");
            self.inner.handle.spawn(consume(Arc::clone(&self.inner)));
        }
        self.inner.wakeup.notify_one();
        true
    }

    /// Drop every queued request that has not started yet. The request in
    /// flight, if any, still completes and is delivered.
    pub fn reset(&self) -> usize {
        let mut queue = self.inner.queue.lock();
        let dropped = queue.requests.len();
        queue.requests.clear();
        if dropped > 0 {
            debug!(dropped, "dispatcher queue reset");
        }
        dropped
    }

    /// Stop the consumer for good. Later submits return `false`.
    pub fn stop(&self) {
        {
            let mut queue = self.inner.queue.lock();
            if queue.stopped {
                return;
            }
            queue.stopped = true;
            queue.requests.clear();
        }
        self.inner.wakeup.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.queue.lock().stopped
    }

    /// Requests waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().requests.len()
    }
}

async fn consume(inner: Arc<Inner>) {
    loop {
        let dispatch = loop {
            let woken = inner.wakeup.notified();
            {
                let mut queue = inner.queue.lock();
                if queue.stopped {
                    debug!("request consumer exiting");
                    return;
                }
                if let Some(dispatch) = queue.requests.pop_front() {
                    break dispatch;
                }
            }
            woken.await;
        };

        debug!(
            request = dispatch.request.label(),
            epoch = dispatch.epoch,
            "executing request"
        );
        let result = inner.client.execute(&dispatch.request).await;

        let listener = inner.listener.lock().as_ref().and_then(Weak::upgrade);
        let Some(listener) = listener else {
            warn!(
                request = dispatch.request.label(),
                "no response listener, result dropped"
            );
            continue;
        };

        match result {
            Ok(response) => listener.on_response(&dispatch, response),
            Err(e) => {
                error!(request = dispatch.request.label(), error = %e, "request failed");
                listener.on_request_error(&dispatch, e);
            }
        }
    }
}
