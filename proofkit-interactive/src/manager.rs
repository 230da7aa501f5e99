//! Proof-exchange orchestration.
//!
//! The manager owns the local private identity and the correlation
//! registries, mints and tracks intents, renders their scannable codes, and
//! handles both delivery paths: manual import, and live channels raced open
//! against every candidate address of a discovered peer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use proofkit_lib::codes::{self, ScannableCode};
use proofkit_lib::envelope;
use proofkit_lib::handle::ProofHandle;
use proofkit_lib::registry::Registries;
use proofkit_lib::request::Request;
use proofkit_lib::response::Response;
use proofkit_lib::{Identity, ProofkitError, Query, RequestId, Result};

use crate::discovery::DiscoveryEvent;
use crate::intent::{DeliveryPath, IntentState};
use crate::transport::{AckOutcome, HandshakeAuth, InboundDelivery, LiveConnection, LiveConnector, PeerAddress};
use crate::ManagerConfig;

struct IntentRecord {
    /// Signed once at origination; re-rendering the code never re-mints.
    signed_request: Vec<u8>,
    state: IntentState,
    delivered: Option<DeliveryPath>,
    handle: Arc<ProofHandle>,
}

struct PeerSession {
    supervisor: JoinHandle<()>,
}

/// Orchestrates outstanding exchanges and their delivery channels.
pub struct ProofExchangeManager {
    config: ManagerConfig,
    identity: Identity,
    registries: Arc<Registries>,
    connector: Arc<dyn LiveConnector>,
    intents: Mutex<HashMap<RequestId, IntentRecord>>,
    peers: Mutex<HashMap<String, PeerSession>>,
    deliveries: mpsc::Sender<(String, InboundDelivery)>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ProofExchangeManager {
    /// Build a manager around a private identity and injected registries.
    pub fn new(
        config: ManagerConfig,
        identity: Identity,
        registries: Arc<Registries>,
        connector: Arc<dyn LiveConnector>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        if !identity.is_private() {
            return Err(ProofkitError::InvalidKeyMaterial(
                "the manager needs a private identity".into(),
            ));
        }

        let (deliveries, inbound) = mpsc::channel(64);
        let manager = Arc::new(Self {
            config,
            identity,
            registries,
            connector,
            intents: Mutex::new(HashMap::new()),
            peers: Mutex::new(HashMap::new()),
            deliveries,
            dispatcher: Mutex::new(None),
        });

        let dispatcher = tokio::spawn(Self::dispatch(Arc::downgrade(&manager), inbound));
        *manager
            .dispatcher
            .lock()
            .expect("dispatcher slot lock poisoned") = Some(dispatcher);
        Ok(manager)
    }

    /// The public half of the manager's identity.
    pub fn public_identity(&self) -> Identity {
        self.identity.to_public()
    }

    /// Mint and register a new request; returns its correlation id.
    ///
    /// The request is signed once here; the pending handle (with the
    /// configured timeout, if any) is registered immediately so a response
    /// arriving before the first `await_proof` still resolves it.
    pub fn request_proof(&self, query: Query) -> Result<RequestId> {
        let request = Request::originate(&self.registries, &self.identity, query)?;
        let signed = envelope::sign_request(&self.identity, &request)?;
        let handle = match self.config.proof_timeout {
            Some(timeout) => self
                .registries
                .wait_for_with_timeout(request.id(), timeout),
            None => self.registries.wait_for(request.id()),
        };

        self.intents
            .lock()
            .expect("intent table lock poisoned")
            .insert(
                request.id(),
                IntentRecord {
                    signed_request: signed,
                    state: IntentState::Created,
                    delivered: None,
                    handle,
                },
            );
        info!(id = %request.id(), "issued proof request");
        Ok(request.id())
    }

    /// Render the scannable code for an outstanding intent.
    ///
    /// Idempotent: repeated calls re-render the same signed bytes.
    pub fn scannable_code(&self, id: &RequestId) -> Result<ScannableCode> {
        let mut intents = self.intents.lock().expect("intent table lock poisoned");
        let record = intents
            .get_mut(id)
            .ok_or_else(|| ProofkitError::UnknownRequest(id.to_hex()))?;
        let code = ScannableCode::for_request(&record.signed_request, &self.config.app_identifier)?;
        record.state = record.state.advance(IntentState::CodeIssued);
        Ok(code)
    }

    /// Await the response for an intent.
    pub async fn await_proof(&self, id: &RequestId) -> Result<Response> {
        let handle = self
            .intents
            .lock()
            .expect("intent table lock poisoned")
            .get(id)
            .map(|record| Arc::clone(&record.handle))
            .ok_or_else(|| ProofkitError::UnknownRequest(id.to_hex()))?;
        handle.await_result().await
    }

    /// Current lifecycle state of an intent, reconciled with its handle.
    pub fn intent_state(&self, id: &RequestId) -> Option<IntentState> {
        let intents = self.intents.lock().expect("intent table lock poisoned");
        let record = intents.get(id)?;
        let state = match record.handle.try_result() {
            None => record.state,
            Some(Ok(_)) => record.state.advance(IntentState::Resolved),
            Some(Err(ProofkitError::Timeout)) => record.state.advance(IntentState::TimedOut),
            Some(Err(_)) => record.state.advance(IntentState::Cancelled),
        };
        Some(state)
    }

    /// How the response for an intent arrived, once one has.
    pub fn delivery_path(&self, id: &RequestId) -> Option<DeliveryPath> {
        self.intents
            .lock()
            .expect("intent table lock poisoned")
            .get(id)
            .and_then(|record| record.delivered)
    }

    /// Import an encrypted response obtained from a file or the clipboard.
    pub fn import_response(&self, bytes: &[u8]) -> Result<Response> {
        self.accept_delivery(bytes, DeliveryPath::ManualImport)
    }

    /// Import a manual-transfer hex string.
    pub fn import_response_hex(&self, text: &str) -> Result<Response> {
        let bytes = codes::from_transfer_hex(text)?;
        self.import_response(&bytes)
    }

    /// Cancel an outstanding intent and drop its registry state.
    pub fn cancel(&self, id: &RequestId, reason: &str) {
        if let Some(record) = self
            .intents
            .lock()
            .expect("intent table lock poisoned")
            .get_mut(id)
        {
            record.handle.cancel(reason);
            record.state = record.state.advance(IntentState::Cancelled);
        }
        self.registries.abandon(id, reason);
    }

    /// Consume one discovery event from the external collaborator.
    ///
    /// The orchestrator never initiates discovery itself.
    pub fn observe_discovery(self: &Arc<Self>, event: DiscoveryEvent) {
        match event {
            DiscoveryEvent::PeerFound { name, addresses } => self.peer_found(name, addresses),
            DiscoveryEvent::PeerLost { name } => self.peer_lost(&name),
        }
    }

    /// Drive discovery from a channel of events until it closes.
    pub fn drive_discovery(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<DiscoveryEvent>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(manager) = weak.upgrade() else { break };
                manager.observe_discovery(event);
            }
        })
    }

    /// Cancel every outstanding handle, then close all connections.
    ///
    /// Handles go first so no caller is left hanging on a connection that
    /// is about to disappear.
    pub fn shutdown(&self) {
        let mut intents = self.intents.lock().expect("intent table lock poisoned");
        for (id, record) in intents.iter_mut() {
            if record.handle.cancel("manager shutdown") {
                record.state = record.state.advance(IntentState::Cancelled);
                debug!(id = %id, "cancelled outstanding intent");
            }
        }
        drop(intents);

        let mut peers = self.peers.lock().expect("peer table lock poisoned");
        for (name, session) in peers.drain() {
            session.supervisor.abort();
            debug!(peer = %name, "closed peer session");
        }
        drop(peers);

        if let Some(dispatcher) = self
            .dispatcher
            .lock()
            .expect("dispatcher slot lock poisoned")
            .take()
        {
            dispatcher.abort();
        }
    }

    /// The single accept path for both delivery channels.
    fn accept_delivery(&self, payload: &[u8], path: DeliveryPath) -> Result<Response> {
        let response = envelope::receive_response(payload, &self.registries)?;
        let id = response.id();
        if let Some(record) = self
            .intents
            .lock()
            .expect("intent table lock poisoned")
            .get_mut(&id)
        {
            record.delivered.get_or_insert(path);
            record.state = record.state.advance(IntentState::Delivered(path));
            record.state = record.state.advance(IntentState::Resolved);
        }
        Ok(response)
    }

    /// Dispatcher: drains inbound deliveries from every live connection and
    /// answers their acknowledgements. Nothing thrown past this boundary.
    async fn dispatch(weak: Weak<Self>, mut inbound: mpsc::Receiver<(String, InboundDelivery)>) {
        while let Some((peer, delivery)) = inbound.recv().await {
            let Some(manager) = weak.upgrade() else { break };
            let outcome =
                match manager.accept_delivery(&delivery.payload, DeliveryPath::LiveChannel) {
                    Ok(response) => {
                        debug!(peer = %peer, id = %response.id(), "proof delivered over live channel");
                        AckOutcome::Accepted
                    }
                    Err(error) => {
                        warn!(peer = %peer, error = %error, "rejected inbound proof event");
                        AckOutcome::Failed(error.to_string())
                    }
                };
            let _ = delivery.ack.send(outcome);
        }
    }

    fn peer_found(self: &Arc<Self>, name: String, addresses: Vec<PeerAddress>) {
        if addresses.is_empty() {
            debug!(peer = %name, "discovered peer carries no addresses");
            return;
        }
        let mut peers = self.peers.lock().expect("peer table lock poisoned");
        if peers.contains_key(&name) {
            return;
        }

        debug!(peer = %name, candidates = addresses.len(), "discovered peer, racing connections");
        let weak = Arc::downgrade(self);
        let connector = Arc::clone(&self.connector);
        let identity = self.identity.clone();
        let origin = self.config.display_name.clone();
        let deliveries = self.deliveries.clone();
        let peer = name.clone();

        let supervisor = tokio::spawn(async move {
            let Some(mut connection) =
                race_connections(connector, &identity, &peer, &origin, addresses).await
            else {
                warn!(peer = %peer, "no candidate address produced an authenticated channel");
                if let Some(manager) = weak.upgrade() {
                    manager
                        .peers
                        .lock()
                        .expect("peer table lock poisoned")
                        .remove(&peer);
                }
                return;
            };

            // Forward deliveries into the dispatcher until the channel dies.
            loop {
                match connection.next_delivery().await {
                    Ok(Some(delivery)) => {
                        if deliveries.send((peer.clone(), delivery)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(peer = %peer, "live channel closed by peer");
                        break;
                    }
                    Err(error) => {
                        warn!(peer = %peer, error = %error, "live channel failed");
                        break;
                    }
                }
            }
            connection.close().await;
            if let Some(manager) = weak.upgrade() {
                manager
                    .peers
                    .lock()
                    .expect("peer table lock poisoned")
                    .remove(&peer);
            }
        });
        peers.insert(name, PeerSession { supervisor });
    }

    fn peer_lost(&self, name: &str) {
        if let Some(session) = self
            .peers
            .lock()
            .expect("peer table lock poisoned")
            .remove(name)
        {
            session.supervisor.abort();
            debug!(peer = %name, "tore down connection for lost peer");
        }
    }
}

impl Drop for ProofExchangeManager {
    fn drop(&mut self) {
        // Tasks hold only weak references; aborting here just hurries them.
        if let Some(dispatcher) = self
            .dispatcher
            .lock()
            .expect("dispatcher slot lock poisoned")
            .take()
        {
            dispatcher.abort();
        }
    }
}

/// Open one connection per candidate address concurrently and keep the
/// first that completes the signed handshake; the rest are aborted.
async fn race_connections(
    connector: Arc<dyn LiveConnector>,
    identity: &Identity,
    peer: &str,
    origin: &str,
    addresses: Vec<PeerAddress>,
) -> Option<Box<dyn LiveConnection>> {
    let mut attempts = JoinSet::new();
    for address in addresses {
        let connector = Arc::clone(&connector);
        let identity = identity.clone();
        let peer = peer.to_string();
        let origin = origin.to_string();
        attempts.spawn(async move {
            let mut connection = connector.connect(&peer, &address).await?;
            let auth = HandshakeAuth::sign(&identity, &peer, &origin)?;
            connection.authenticate(auth).await?;
            debug!(peer = %peer, address = %address, "live channel authenticated");
            Ok::<_, ProofkitError>(connection)
        });
    }

    let mut winner = None;
    while let Some(joined) = attempts.join_next().await {
        match joined {
            Ok(Ok(connection)) => {
                winner = Some(connection);
                break;
            }
            Ok(Err(error)) => debug!(error = %error, "connection attempt failed"),
            Err(error) => debug!(error = %error, "connection attempt aborted"),
        }
    }
    attempts.abort_all();
    winner
}
