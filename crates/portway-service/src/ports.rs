// SPDX-License-Identifier: Apache-2.0
//! Built-in ports served by the coordinator.

use std::sync::Arc;

use portway_router::{handler_fn, Outcome, Reply, Router, SenderContext, TabDirectory};
use serde_json::{json, Value};
use tracing::debug;

/// Replies with the request payload.
pub(crate) const ECHO: &str = "echo";
/// Replies with the ids of currently open windows.
pub(crate) const PEERS: &str = "peers";
/// Re-broadcasts the payload to every peer; the requester gets `null`.
pub(crate) const BROADCAST: &str = "broadcast";

/// Register the built-in ports on `router`.
pub(crate) fn install(router: &mut Router, tabs: Arc<dyn TabDirectory>) {
    router.listen(
        ECHO,
        handler_fn(|payload: &Value, _: &SenderContext, _: Reply| {
            Ok(Outcome::Respond(payload.clone()))
        }),
    );

    router.listen(
        PEERS,
        handler_fn(move |_: &Value, sender: &SenderContext, _: Reply| {
            Ok(Outcome::Respond(json!({
                "self": sender.tab.id,
                "windows": tabs.current_windows(),
            })))
        }),
    );

    let emitter = router.emitter();
    router.listen(
        BROADCAST,
        handler_fn(move |payload: &Value, sender: &SenderContext, _: Reply| {
            debug!(peer = sender.peer, "relaying broadcast");
            emitter.broadcast(payload);
            Ok(Outcome::Handled)
        }),
    );
}
