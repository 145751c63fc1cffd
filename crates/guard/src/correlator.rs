use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use metron_bus::{BusError, MessageBus, topic};
use metron_core::{AccessRequest, AccessResponse};

/// Default decision deadline before a check fails closed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Matches asynchronous access responses to their originating requests.
///
/// One subscription on the response topic serves every in-flight request.
/// Each `send` registers a waiter keyed by `request_id`; the listener
/// task resolves the matching waiter when a response arrives and
/// discards responses nobody is waiting on (they belong to other calls
/// or arrived after their deadline). One correlation entry exists per
/// in-flight request and is removed on every exit path, so neither a
/// lost response nor a lost request leaks an entry.
pub struct RequestReplyCorrelator {
    bus: Arc<dyn MessageBus>,
    pending: Arc<DashMap<Uuid, oneshot::Sender<AccessResponse>>>,
    timeout: Duration,
    listener: JoinHandle<()>,
}

impl RequestReplyCorrelator {
    /// Subscribe to the response topic and start the reply listener.
    pub async fn start(bus: Arc<dyn MessageBus>, timeout: Duration) -> Result<Self, BusError> {
        let mut subscription = bus.subscribe(topic::ACCESS_RESPONSE).await?;
        let pending: Arc<DashMap<Uuid, oneshot::Sender<AccessResponse>>> =
            Arc::new(DashMap::new());

        let listener = tokio::spawn({
            let pending = Arc::clone(&pending);
            async move {
                while let Some(payload) = subscription.recv().await {
                    match serde_json::from_slice::<AccessResponse>(&payload) {
                        Ok(response) => {
                            if let Some((_, waiter)) = pending.remove(&response.request_id) {
                                // The waiter may have timed out between the
                                // removal and this send; the response is
                                // dropped in that case, which is correct.
                                let _ = waiter.send(response);
                            } else {
                                debug!(
                                    request_id = %response.request_id,
                                    "discarding unmatched access response"
                                );
                            }
                        }
                        Err(e) => warn!(error = %e, "malformed access response on bus"),
                    }
                }
            }
        });

        Ok(Self {
            bus,
            pending,
            timeout,
            listener,
        })
    }

    /// The decision deadline applied to every round trip.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of requests currently awaiting a response.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Perform one request/response round trip.
    ///
    /// Publishes the request, suspends until the matching response
    /// arrives or the deadline elapses. There is no automatic retry;
    /// retrying is the caller's concern, and a retry must carry a fresh
    /// `request_id`.
    ///
    /// Every failure mode — publish error, deadline, dropped waiter —
    /// resolves to the synthesized `"service unavailable"` denial.
    /// Unreachability of the authority denies access; it never grants it.
    pub async fn send(&self, request: AccessRequest) -> AccessResponse {
        let request_id = request.request_id;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        let payload = match serde_json::to_vec(&request) {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                error!(error = %e, %request_id, "failed to encode access request");
                self.pending.remove(&request_id);
                return AccessResponse::service_unavailable(request_id);
            }
        };

        if let Err(e) = self.bus.publish(topic::ACCESS_REQUEST, payload).await {
            warn!(error = %e, %request_id, "access request publish failed (fail-closed)");
            self.pending.remove(&request_id);
            return AccessResponse::service_unavailable(request_id);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                // Listener shut down while we were waiting.
                self.pending.remove(&request_id);
                AccessResponse::service_unavailable(request_id)
            }
            Err(_) => {
                warn!(
                    %request_id,
                    timeout = ?self.timeout,
                    "no decision within deadline (fail-closed)"
                );
                self.pending.remove(&request_id);
                AccessResponse::service_unavailable(request_id)
            }
        }
    }
}

impl Drop for RequestReplyCorrelator {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl std::fmt::Debug for RequestReplyCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestReplyCorrelator")
            .field("in_flight", &self.pending.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
