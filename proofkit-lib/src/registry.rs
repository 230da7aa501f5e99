//! Correlation registries.
//!
//! Three keyed tables tie an exchange together: own private keys by
//! identity, issued requests by id, and responses by id with awaitable
//! pending-result handles. They are built once per process and injected
//! where needed — never reached as ambient globals — which keeps them
//! resettable between test cases.
//!
//! Per-key operations are linearizable (one mutex around each map, no
//! cross-key coupling), so two concurrent exchanges never contend on each
//! other's state. Eviction and handle timeouts are tokio tasks: construct
//! the registries inside a runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::handle::ProofHandle;
use crate::identity::Identity;
use crate::request::Request;
use crate::request_id::RequestId;
use crate::response::Response;
use crate::wire;
use crate::Result;

/// Default grace window before a settled exchange's entries are dropped.
pub const DEFAULT_RESPONSE_GRACE: Duration = Duration::from_secs(15 * 60);

/// Own private identities, keyed by public-key hex.
///
/// Populated whenever a private identity mints a request; consulted when an
/// inbound encrypted response needs its matching private key.
#[derive(Default)]
pub struct KeyStore {
    inner: Mutex<HashMap<String, Identity>>,
}

impl KeyStore {
    /// Store a private identity. Public-only identities are ignored: there
    /// is nothing to decrypt with. Returns whether the identity was stored.
    pub fn adopt(&self, identity: Identity) -> bool {
        if !identity.is_private() {
            return false;
        }
        let key = identity.public_key_hex();
        self.inner
            .lock()
            .expect("key store lock poisoned")
            .insert(key, identity);
        true
    }

    /// Look up a private identity by public-key hex.
    pub fn lookup(&self, public_key_hex: &str) -> Option<Identity> {
        self.inner
            .lock()
            .expect("key store lock poisoned")
            .get(public_key_hex)
            .cloned()
    }

    fn remove(&self, public_key_hex: &str) {
        self.inner
            .lock()
            .expect("key store lock poisoned")
            .remove(public_key_hex);
    }
}

struct IssuedRequest {
    request: Request,
    bytes: Vec<u8>,
}

/// Requests this process issued, keyed by id, with their exact wire bytes.
///
/// The stored bytes are what an inbound response is byte-compared against.
#[derive(Default)]
pub struct RequestRegistry {
    inner: Mutex<HashMap<RequestId, IssuedRequest>>,
}

impl RequestRegistry {
    /// Insert or overwrite an issued request.
    pub fn register(&self, request: &Request) -> Result<()> {
        let bytes = wire::encode_request(request)?;
        self.inner
            .lock()
            .expect("request registry lock poisoned")
            .insert(
                request.id(),
                IssuedRequest {
                    request: request.clone(),
                    bytes,
                },
            );
        Ok(())
    }

    /// Look up an issued request.
    pub fn lookup(&self, id: &RequestId) -> Option<Request> {
        self.inner
            .lock()
            .expect("request registry lock poisoned")
            .get(id)
            .map(|issued| issued.request.clone())
    }

    /// The exact bytes the request was issued as.
    pub fn lookup_bytes(&self, id: &RequestId) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .expect("request registry lock poisoned")
            .get(id)
            .map(|issued| issued.bytes.clone())
    }

    fn remove(&self, id: &RequestId) {
        self.inner
            .lock()
            .expect("request registry lock poisoned")
            .remove(id);
    }
}

#[derive(Default)]
struct ResponseTable {
    responses: HashMap<RequestId, Response>,
    handles: HashMap<RequestId, Arc<ProofHandle>>,
}

/// Arrived responses and the handles awaiting them, keyed by id.
#[derive(Default)]
pub struct ResponseRegistry {
    inner: Mutex<ResponseTable>,
}

impl ResponseRegistry {
    /// Look up a stored response.
    pub fn lookup(&self, id: &RequestId) -> Option<Response> {
        self.inner
            .lock()
            .expect("response registry lock poisoned")
            .responses
            .get(id)
            .cloned()
    }
}

/// The three correlation registries behind one injectable service.
pub struct Registries {
    keys: KeyStore,
    requests: RequestRegistry,
    responses: ResponseRegistry,
    grace: Duration,
}

impl Registries {
    /// Build a fresh set of registries. `grace` bounds how long a settled
    /// exchange's entries linger before eviction.
    pub fn new(grace: Duration) -> Arc<Self> {
        Arc::new(Self {
            keys: KeyStore::default(),
            requests: RequestRegistry::default(),
            responses: ResponseRegistry::default(),
            grace,
        })
    }

    /// Registries with the default 15-minute grace window.
    pub fn with_default_grace() -> Arc<Self> {
        Self::new(DEFAULT_RESPONSE_GRACE)
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn requests(&self) -> &RequestRegistry {
        &self.requests
    }

    pub fn responses(&self) -> &ResponseRegistry {
        &self.responses
    }

    /// Register an arrived response, resolving any pending handle for its
    /// id.
    ///
    /// The first successful registration wins resolution. Later
    /// registrations for the same id are accepted into the registry — the
    /// latest value overwrites — but an already-resolved handle is never
    /// re-notified.
    pub fn register_response(self: &Arc<Self>, response: Response) {
        let id = response.id();
        {
            let mut table = self
                .responses
                .inner
                .lock()
                .expect("response registry lock poisoned");
            table.responses.insert(id, response.clone());
            if let Some(handle) = table.handles.get(&id) {
                if handle.resolve(response) {
                    debug!(id = %id, "response resolved a waiting handle");
                }
            }
        }
        // Bound memory: the exchange's entries go away once the grace window
        // after registration has passed.
        self.schedule_eviction(id);
    }

    /// The pending-result handle for an id.
    ///
    /// Repeated calls for the same id return the same handle — there are no
    /// duplicate waiters. If the response is already registered the handle
    /// comes back resolved.
    pub fn wait_for(self: &Arc<Self>, id: RequestId) -> Arc<ProofHandle> {
        self.wait_for_inner(id, None)
    }

    /// Like [`wait_for`](Self::wait_for), with a timeout that starts now.
    /// The timeout only applies if this call creates the handle; an existing
    /// handle keeps its original configuration.
    pub fn wait_for_with_timeout(self: &Arc<Self>, id: RequestId, timeout: Duration) -> Arc<ProofHandle> {
        self.wait_for_inner(id, Some(timeout))
    }

    fn wait_for_inner(self: &Arc<Self>, id: RequestId, timeout: Option<Duration>) -> Arc<ProofHandle> {
        let handle = {
            let mut table = self
                .responses
                .inner
                .lock()
                .expect("response registry lock poisoned");
            if let Some(existing) = table.handles.get(&id) {
                return Arc::clone(existing);
            }
            let handle = match timeout {
                Some(timeout) => ProofHandle::with_timeout(timeout),
                None => ProofHandle::new(),
            };
            if let Some(response) = table.responses.get(&id) {
                handle.resolve(response.clone());
            }
            table.handles.insert(id, Arc::clone(&handle));
            handle
        };

        // Watch the handle to its terminal state, then evict after the
        // grace window — covers resolution, timeout and cancellation alike.
        let registries = Arc::clone(self);
        let watched = Arc::clone(&handle);
        tokio::spawn(async move {
            let _ = watched.await_result().await;
            tokio::time::sleep(registries.grace).await;
            registries.evict(&id);
        });

        handle
    }

    /// Drop every entry for an abandoned exchange and cancel its pending
    /// handle immediately.
    pub fn abandon(&self, id: &RequestId, reason: &str) {
        let handle = self
            .responses
            .inner
            .lock()
            .expect("response registry lock poisoned")
            .handles
            .get(id)
            .cloned();
        if let Some(handle) = handle {
            handle.cancel(reason);
        }
        self.evict(id);
        debug!(id = %id, reason, "abandoned exchange");
    }

    fn schedule_eviction(self: &Arc<Self>, id: RequestId) {
        let registries = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(registries.grace).await;
            registries.evict(&id);
        });
    }

    fn evict(&self, id: &RequestId) {
        {
            let mut table = self
                .responses
                .inner
                .lock()
                .expect("response registry lock poisoned");
            table.responses.remove(id);
            table.handles.remove(id);
        }
        self.requests.remove(id);
        self.keys.remove(&hex::encode(id.public_key_bytes()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::response::ResponseData;
    use crate::ProofkitError;

    fn issue(registries: &Arc<Registries>) -> (Identity, Request) {
        let requester = Identity::generate();
        let request = Request::originate(
            registries,
            &requester,
            Query::Dummy {
                marker: "m".into(),
            },
        )
        .unwrap();
        (requester, request)
    }

    fn respond(request: &Request) -> Response {
        Response::new(
            &Identity::generate(),
            ResponseData::Dummy { text: "t".into() },
            request.clone(),
        )
    }

    #[tokio::test]
    async fn test_wait_for_returns_the_same_handle() {
        let registries = Registries::new(Duration::from_secs(900));
        let (_, request) = issue(&registries);

        let a = registries.wait_for(request.id());
        let b = registries.wait_for(request.id());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_register_resolves_waiting_handle() {
        let registries = Registries::new(Duration::from_secs(900));
        let (_, request) = issue(&registries);
        let handle = registries.wait_for(request.id());

        registries.register_response(respond(&request));

        let got = handle.await_result().await.unwrap();
        assert_eq!(got.id(), request.id());
        assert!(registries.responses().lookup(&request.id()).is_some());
    }

    #[tokio::test]
    async fn test_wait_after_registration_is_immediately_resolved() {
        let registries = Registries::new(Duration::from_secs(900));
        let (_, request) = issue(&registries);

        registries.register_response(respond(&request));

        let handle = registries.wait_for(request.id());
        assert!(handle.is_terminal());
        assert!(handle.await_result().await.is_ok());
    }

    #[tokio::test]
    async fn test_second_registration_is_accepted_but_inert() {
        let registries = Registries::new(Duration::from_secs(900));
        let (_, request) = issue(&registries);
        let handle = registries.wait_for(request.id());

        let first = respond(&request);
        registries.register_response(first.clone());
        let winner = handle.await_result().await.unwrap();

        let second = Response::new(
            &Identity::generate(),
            ResponseData::Dummy {
                text: "late".into(),
            },
            request.clone(),
        );
        registries.register_response(second.clone());

        // The handle keeps its first outcome; the registry stores the latest.
        assert_eq!(handle.await_result().await.unwrap(), winner);
        assert_eq!(
            registries.responses().lookup(&request.id()).unwrap(),
            second
        );
    }

    #[tokio::test]
    async fn test_abandon_cancels_and_drops_state() {
        let registries = Registries::new(Duration::from_secs(900));
        let (requester, request) = issue(&registries);
        let handle = registries.wait_for(request.id());

        registries.abandon(&request.id(), "caller gave up");

        assert!(matches!(
            handle.await_result().await,
            Err(ProofkitError::Cancelled(_))
        ));
        assert!(registries.requests().lookup(&request.id()).is_none());
        assert!(registries
            .keys()
            .lookup(&requester.public_key_hex())
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_evicted_after_grace_window() {
        let registries = Registries::new(Duration::from_millis(200));
        let (_, request) = issue(&registries);
        let handle = registries.wait_for(request.id());

        registries.register_response(respond(&request));
        handle.await_result().await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(registries.responses().lookup(&request.id()).is_none());
        assert!(registries.requests().lookup(&request.id()).is_none());
        // A fresh wait after eviction starts over with a pending handle.
        let fresh = registries.wait_for(request.id());
        assert!(!Arc::ptr_eq(&handle, &fresh));
        assert!(!fresh.is_terminal());
    }
}
