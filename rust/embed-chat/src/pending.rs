use std::collections::HashMap;

use embed_chat_protocol::{CommandId, GuestResult};
use tokio::sync::oneshot;

use crate::EmbedError;

/// Resolves a single Host-issued request.
pub type ResultSender = oneshot::Sender<Result<GuestResult, EmbedError>>;

struct Pending {
    acknowledged: bool,
    sender: ResultSender,
}

/// Host commands awaiting a `result` from the Guest, keyed by id.
#[derive(Default)]
pub struct PendingRequests {
    entries: HashMap<CommandId, Pending>,
}

impl PendingRequests {
    /// Track a request that was just sent with `id`. Entries whose caller
    /// stopped waiting are dropped first.
    pub fn register(&mut self, id: CommandId, sender: ResultSender) {
        self.entries.retain(|_, pending| !pending.sender.is_closed());
        self.entries.insert(
            id,
            Pending {
                acknowledged: false,
                sender,
            },
        );
    }

    /// Mark `id` as acknowledged. Returns false if nothing is waiting on it.
    pub fn acknowledge(&mut self, id: CommandId) -> bool {
        match self.entries.get_mut(&id) {
            Some(pending) => {
                pending.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Whether the Guest has acknowledged `id`
    pub fn is_acknowledged(&self, id: CommandId) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|pending| pending.acknowledged)
    }

    /// Complete the request the result answers. Returns false if nothing
    /// was waiting on it.
    pub fn resolve(&mut self, result: GuestResult) -> bool {
        match self.entries.remove(&result.id) {
            Some(pending) => {
                // The receiver may have been dropped; nothing to do then.
                let _ = pending.sender.send(Ok(result));
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding request with [`EmbedError::TornDown`]
    pub fn fail_all(&mut self) {
        for (_, pending) in self.entries.drain() {
            let _ = pending.sender.send(Err(EmbedError::TornDown));
        }
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(id: u64) -> GuestResult {
        GuestResult {
            id: CommandId::new(id),
            status: Some("success".into()),
            data: json!({ "ok": true }),
            envelope: json!({ "type": "result", "id": id }),
        }
    }

    #[test]
    fn it_resolves_the_matching_request() {
        let mut pending = PendingRequests::default();
        let (sender, mut receiver) = oneshot::channel();
        pending.register(CommandId::new(4), sender);

        assert!(pending.acknowledge(CommandId::new(4)));
        assert!(pending.is_acknowledged(CommandId::new(4)));
        assert!(!pending.resolve(result(5)));
        assert!(pending.resolve(result(4)));

        let resolved = receiver.try_recv().unwrap().unwrap();
        assert_eq!(resolved.id, CommandId::new(4));
        assert!(pending.is_empty());
    }

    #[test]
    fn it_fails_outstanding_requests_on_teardown() {
        let mut pending = PendingRequests::default();
        let (sender, mut receiver) = oneshot::channel();
        pending.register(CommandId::new(1), sender);

        pending.fail_all();

        assert!(matches!(
            receiver.try_recv().unwrap(),
            Err(EmbedError::TornDown)
        ));
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn it_forgets_requests_nobody_is_waiting_on() {
        let mut pending = PendingRequests::default();
        let (abandoned, receiver) = oneshot::channel();
        pending.register(CommandId::new(1), abandoned);
        drop(receiver);

        let (sender, _receiver) = oneshot::channel();
        pending.register(CommandId::new(2), sender);

        assert_eq!(pending.len(), 1);
        assert!(!pending.acknowledge(CommandId::new(1)));
        assert!(pending.acknowledge(CommandId::new(2)));
    }

    #[test]
    fn it_ignores_acknowledgements_for_unknown_ids() {
        let mut pending = PendingRequests::default();
        assert!(!pending.acknowledge(CommandId::new(9)));
    }
}
