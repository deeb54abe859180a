// SPDX-License-Identifier: Apache-2.0
//! Request/response correlator.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use portway_proto::{wire::decode_envelope, AppInfo, InboundEnvelope, PortAddress};
use serde_json::Value;
use tracing::{debug, warn};

use crate::broadcast::BroadcastEmitter;
use crate::handler::{Handler, HandlerError, Outcome, SenderContext, SenderTab};
use crate::registry::PortRegistry;
use crate::reply::Reply;
use crate::transport::{Inbound, TabDirectory, Transport};

/// How [`Router::handle_inbound`] disposed of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Undecodable; dropped without a reply.
    Dropped,
    /// Claimed by the handler registered for the logical port.
    Port,
    /// Claimed by the default handler.
    Default,
    /// Nobody claimed it; an empty reply went out if one was expected.
    Unknown,
}

struct Unclaimed;

impl Handler for Unclaimed {
    fn handle(
        &self,
        _payload: &Value,
        _sender: &SenderContext,
        _reply: Reply,
    ) -> Result<Outcome, HandlerError> {
        Ok(Outcome::Unhandled)
    }
}

/// The coordinator's message router.
///
/// Owned by whoever drives dispatch; handlers are registered through
/// `&mut self` during setup and only read while dispatching.
pub struct Router {
    app: AppInfo,
    transport: Arc<dyn Transport>,
    tabs: Arc<dyn TabDirectory>,
    registry: PortRegistry,
    emitter: BroadcastEmitter,
}

impl Router {
    /// Router for `app`, replying through `transport` and resolving sender
    /// tabs through `tabs`.
    pub fn new(app: AppInfo, transport: Arc<dyn Transport>, tabs: Arc<dyn TabDirectory>) -> Self {
        let emitter = BroadcastEmitter::new(Arc::clone(&transport), app.broadcast_channel());
        Self {
            app,
            transport,
            tabs,
            registry: PortRegistry::new(),
            emitter,
        }
    }

    /// Application identity.
    pub fn app(&self) -> &AppInfo {
        &self.app
    }

    /// Channel the transport should feed into [`Router::handle_inbound`].
    pub fn background_channel(&self) -> String {
        self.app.background_channel()
    }

    /// Register `handler` for a logical port (last registration wins).
    pub fn listen(&mut self, port: impl Into<String>, handler: impl Handler + 'static) {
        self.registry.register(port, Box::new(handler));
    }

    /// Remove the handler for a logical port.
    pub fn unlisten(&mut self, port: &str) {
        self.registry.unregister(port);
    }

    /// Install the default handler and mark the router active.
    ///
    /// Without a handler, an always-unhandled default is installed. Returns
    /// `false` (and changes nothing) if the router is already set up.
    pub fn setup(&mut self, default: Option<Box<dyn Handler>>) -> bool {
        if self.registry.has_default() {
            debug!("router already set up");
            return false;
        }
        let default = default.unwrap_or_else(|| Box::new(Unclaimed) as Box<dyn Handler>);
        self.registry.set_default_handler(default)
    }

    /// Tear down every handler so the router can be set up again.
    pub fn unload(&mut self) {
        self.registry.clear();
        debug!("router unloaded");
    }

    /// Whether [`Router::setup`] has run since the last unload.
    pub fn is_active(&self) -> bool {
        self.registry.has_default()
    }

    /// Read access to the handler table.
    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// A broadcast emitter sharing this router's transport.
    pub fn emitter(&self) -> BroadcastEmitter {
        self.emitter.clone()
    }

    /// Fire-and-forget fan-out to every peer.
    pub fn broadcast(&self, payload: &Value) {
        self.emitter.broadcast(payload);
    }

    /// Decode, dispatch, and answer one inbound message.
    ///
    /// Never panics on peer input or handler failure. Every envelope carrying
    /// a request id gets exactly one reply; envelopes without one get none.
    pub fn handle_inbound(&self, inbound: &Inbound) -> Dispatch {
        let InboundEnvelope {
            address: PortAddress {
                channel_id,
                logical_port,
            },
            request_id,
            payload,
        } = match decode_envelope(&inbound.data) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(peer = inbound.peer, ?err, "dropping malformed envelope");
                return Dispatch::Dropped;
            }
        };

        debug!(
            peer = inbound.peer,
            channel = %channel_id,
            port = ?logical_port,
            request_id = ?request_id,
            "dispatching envelope"
        );

        let reply = Reply::new(
            inbound.peer,
            channel_id.clone(),
            request_id.clone(),
            logical_port.clone(),
            Arc::clone(&self.transport),
        );
        let sender = SenderContext {
            peer: inbound.peer,
            tab: SenderTab {
                id: self.tabs.resolve_tab_id(inbound.peer),
            },
        };

        if let Some(handler) = logical_port
            .as_deref()
            .and_then(|port| self.registry.lookup(port))
        {
            if run_stage("port", handler, &payload, &sender, &reply) {
                return Dispatch::Port;
            }
        }

        if let Some(handler) = self.registry.default_handler() {
            if run_stage("default", handler, &payload, &sender, &reply) {
                return Dispatch::Default;
            }
        }

        warn!(
            peer = inbound.peer,
            channel = %channel_id,
            port = ?logical_port,
            request_id = ?request_id,
            payload = %payload,
            "unknown request"
        );
        // The caller may be waiting on an answer; never leave it pending.
        reply.send_empty();
        Dispatch::Unknown
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("app", &self.app.clean_name)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

// Returns true when the handler claimed the envelope.
fn run_stage(
    stage: &'static str,
    handler: &dyn Handler,
    payload: &Value,
    sender: &SenderContext,
    reply: &Reply,
) -> bool {
    let result = catch_unwind(AssertUnwindSafe(|| {
        handler.handle(payload, sender, reply.share())
    }));
    match result {
        Ok(Ok(Outcome::Respond(value))) => {
            reply.share().send(value);
            true
        }
        Ok(Ok(Outcome::Handled)) => true,
        Ok(Ok(Outcome::Unhandled)) => false,
        Ok(Err(err)) => {
            warn!(stage, %err, "handler fault; treating envelope as unhandled");
            false
        }
        Err(panic) => {
            warn!(
                stage,
                reason = panic_reason(panic.as_ref()),
                "handler panicked; treating envelope as unhandled"
            );
            false
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::transport::{PeerId, TransportError};
    use portway_proto::{TabId, PORTWAY_APP};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(PeerId, String, String)>>,
    }

    impl Outbox {
        fn take(&self) -> Vec<(PeerId, String, String)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Transport for Outbox {
        fn send_to(
            &self,
            peer: PeerId,
            channel: &str,
            bytes: Vec<u8>,
        ) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push((
                peer,
                channel.to_owned(),
                String::from_utf8(bytes).unwrap(),
            ));
            Ok(())
        }

        fn send_to_all(&self, _channel: &str, _bytes: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct Tabs;

    impl TabDirectory for Tabs {
        fn resolve_tab_id(&self, peer: PeerId) -> Option<TabId> {
            (peer != 0).then(|| TabId(format!("tab-{peer}")))
        }

        fn current_windows(&self) -> Vec<PeerId> {
            vec![1, 2]
        }
    }

    fn router() -> (Router, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let router = Router::new(PORTWAY_APP, outbox.clone(), Arc::new(Tabs));
        (router, outbox)
    }

    fn inbound(peer: PeerId, json: &str) -> Inbound {
        Inbound {
            peer,
            data: json.as_bytes().to_vec(),
        }
    }

    #[test]
    fn port_handler_response_is_correlated() {
        let (mut router, outbox) = router();
        router.listen(
            "echo",
            handler_fn(|payload, _, _| {
                assert_eq!(payload, &json!("hi"));
                Ok(Outcome::Respond(json!("hi-back")))
            }),
        );
        router.setup(None);

        let d = router.handle_inbound(&inbound(
            1,
            r#"{"requestId":"r1","portName":"peerA|echo","msg":"hi"}"#,
        ));
        assert_eq!(d, Dispatch::Port);
        assert_eq!(
            outbox.take(),
            vec![(
                1,
                "peerA".to_owned(),
                r#"{"requestId":"r1","portName":"echo","msg":"hi-back"}"#.to_owned()
            )]
        );
    }

    #[test]
    fn fire_and_forget_produces_no_outbound() {
        let (mut router, outbox) = router();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        router.listen(
            "fire",
            handler_fn(move |payload, _, _| {
                assert_eq!(payload, &json!({"x": 1}));
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::Respond(json!("ignored")))
            }),
        );
        router.setup(None);

        let d = router.handle_inbound(&inbound(2, r#"{"portName":"peerB|fire","msg":{"x":1}}"#));
        assert_eq!(d, Dispatch::Port);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outbox.take().is_empty());
    }

    #[test]
    fn unknown_request_still_gets_empty_reply() {
        let (mut router, outbox) = router();
        router.setup(None);
        let d = router.handle_inbound(&inbound(1, r#"{"requestId":5,"portName":"c|nope"}"#));
        assert_eq!(d, Dispatch::Unknown);
        assert_eq!(
            outbox.take(),
            vec![(
                1,
                "c".to_owned(),
                r#"{"requestId":5,"portName":"nope","msg":null}"#.to_owned()
            )]
        );
    }

    #[test]
    fn unknown_request_is_answered_even_before_setup() {
        let (router, outbox) = router();
        let d = router.handle_inbound(&inbound(1, r#"{"requestId":"q","portName":"c|p"}"#));
        assert_eq!(d, Dispatch::Unknown);
        assert_eq!(outbox.take().len(), 1);
    }

    #[test]
    fn default_handler_sees_declined_envelopes() {
        let (mut router, outbox) = router();
        router.listen("p", handler_fn(|_, _, _| Ok(Outcome::Unhandled)));
        router.setup(Some(Box::new(handler_fn(|_, sender, _| {
            Ok(Outcome::Respond(serde_json::to_value(sender)?))
        }))));

        let d = router.handle_inbound(&inbound(4, r#"{"requestId":"r","portName":"c|p"}"#));
        assert_eq!(d, Dispatch::Default);
        assert_eq!(
            outbox.take()[0].2,
            r#"{"requestId":"r","portName":"p","msg":{"tab":{"id":"tab-4"}}}"#
        );
    }

    #[test]
    fn default_handler_not_called_when_port_claims() {
        let (mut router, _outbox) = router();
        let default_calls = Arc::new(AtomicUsize::new(0));
        let counter = default_calls.clone();
        router.listen("p", handler_fn(|_, _, _| Ok(Outcome::Respond(json!(1)))));
        router.setup(Some(Box::new(handler_fn(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Handled)
        }))));

        router.handle_inbound(&inbound(1, r#"{"requestId":"r","portName":"c|p"}"#));
        assert_eq!(default_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn faulting_handler_falls_through_and_reply_fires_once() {
        let (mut router, outbox) = router();
        router.listen(
            "err",
            handler_fn(|_, _, _| Err(HandlerError::new("boom"))),
        );
        router.listen("panic", handler_fn(|_, _, _| panic!("handler exploded")));
        router.setup(None);

        assert_eq!(
            router.handle_inbound(&inbound(1, r#"{"requestId":"a","portName":"c|err"}"#)),
            Dispatch::Unknown
        );
        assert_eq!(
            router.handle_inbound(&inbound(1, r#"{"requestId":"b","portName":"c|panic"}"#)),
            Dispatch::Unknown
        );
        let sent = outbox.take();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].2.contains(r#""requestId":"a""#));
        assert!(sent[1].2.contains(r#""requestId":"b""#));
    }

    #[test]
    fn handled_without_answer_is_discharged_at_end_of_dispatch() {
        let (mut router, outbox) = router();
        router.listen("quiet", handler_fn(|_, _, _| Ok(Outcome::Handled)));
        router.setup(None);
        router.handle_inbound(&inbound(1, r#"{"requestId":"r","portName":"c|quiet"}"#));
        assert_eq!(
            outbox.take()[0].2,
            r#"{"requestId":"r","portName":"quiet","msg":null}"#
        );
    }

    #[test]
    fn deferred_reply_is_sent_later_exactly_once() {
        let (mut router, outbox) = router();
        let parked: Arc<Mutex<Option<Reply>>> = Arc::new(Mutex::new(None));
        let stash = parked.clone();
        router.listen(
            "slow",
            handler_fn(move |_, _, reply| {
                *stash.lock().unwrap() = Some(reply);
                Ok(Outcome::Handled)
            }),
        );
        router.setup(None);

        router.handle_inbound(&inbound(1, r#"{"requestId":"r","portName":"c|slow"}"#));
        assert!(outbox.take().is_empty());

        let reply = parked.lock().unwrap().take().unwrap();
        assert!(reply.send(json!("done")));
        let sent = outbox.take();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2.contains(r#""msg":"done""#));
    }

    #[test]
    fn malformed_envelope_is_dropped_silently() {
        let (mut router, outbox) = router();
        router.setup(None);
        assert_eq!(
            router.handle_inbound(&inbound(1, "{\"requestId\":\"r\"")),
            Dispatch::Dropped
        );
        assert!(outbox.take().is_empty());
    }

    #[test]
    fn setup_is_once_until_unload() {
        let (mut router, _) = router();
        assert!(!router.is_active());
        assert!(router.setup(None));
        assert!(!router.setup(None));
        router.listen("p", handler_fn(|_, _, _| Ok(Outcome::Handled)));
        router.unload();
        assert!(!router.is_active());
        assert!(router.registry().lookup("p").is_none());
        assert!(router.setup(None));
    }
}
