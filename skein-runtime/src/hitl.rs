//! The HITL Coordinator — correlates `input:requested` with
//! `input:received`, blocking cooperatively without assuming arrival
//! order.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::Value;
use skein_core::InteractionId;
use tokio::sync::oneshot;

/// A resolved HITL answer.
#[derive(Debug, Clone)]
pub struct InteractionResponse {
    pub value: Value,
    pub approved: Option<bool>,
}

enum Slot {
    /// An `await` is parked waiting for a response.
    Waiting(oneshot::Sender<InteractionResponse>),
    /// A `respond` arrived before anyone `await`ed it.
    Buffered(InteractionResponse),
}

/// Unbounded, order-independent request/response correlation for
/// human-in-the-loop interactions.
///
/// `respond` before `await` is valid: the response is buffered and
/// handed to the very next `await` for that id. Responses never
/// expire and are matched strictly by id, never by arrival order.
pub struct HitlCoordinator {
    slots: Mutex<HashMap<InteractionId, Slot>>,
    /// Responses delivered through `respond_any`, by a caller that does
    /// not yet know which `interactionId` the scheduler will mint (the
    /// execution handle's `respond(value)` convenience, used before the
    /// caller has consumed any events). Matched in FIFO order against
    /// whichever interaction asks next — a separate channel from
    /// `slots` because it is keyed by nothing at all.
    anonymous: Mutex<VecDeque<InteractionResponse>>,
}

impl HitlCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            anonymous: Mutex::new(VecDeque::new()),
        }
    }

    /// Suspend until a response for `interaction_id` arrives (or
    /// return immediately if one is already buffered, whether keyed by
    /// this id or left anonymously by `respond_any`).
    ///
    /// Returns `None` if the coordinator was dropped while waiting
    /// (the owning session ended) rather than panicking.
    pub async fn await_response(&self, interaction_id: &InteractionId) -> Option<InteractionResponse> {
        let rx = {
            let mut slots = self.slots.lock().unwrap();
            if let Some(Slot::Buffered(response)) = slots.remove(interaction_id) {
                return Some(response);
            }
            let mut anonymous = self.anonymous.lock().unwrap();
            if let Some(response) = anonymous.pop_front() {
                return Some(response);
            }
            drop(anonymous);

            let (tx, rx) = oneshot::channel();
            slots.insert(interaction_id.clone(), Slot::Waiting(tx));
            rx
        };
        rx.await.ok()
    }

    /// Deliver a response for `interaction_id`. If an `await` is
    /// already parked for this id, it is woken immediately; otherwise
    /// the response is buffered for the next `await_response` call.
    pub fn respond(&self, interaction_id: InteractionId, response: InteractionResponse) {
        let mut slots = self.slots.lock().unwrap();
        match slots.remove(&interaction_id) {
            Some(Slot::Waiting(tx)) => {
                // Ignore a dropped receiver: the awaiter gave up (e.g.
                // workflow aborted), which is not this call's problem.
                let _ = tx.send(response);
            }
            _ => {
                slots.insert(interaction_id, Slot::Buffered(response));
            }
        }
    }

    /// Deliver a response without naming which interaction it answers.
    /// Wakes whichever `await` is currently parked, if exactly one is;
    /// otherwise buffers the response anonymously for the next
    /// `await_response` call to claim, regardless of its id. This
    /// backs the execution handle's `respond(value)` convenience for
    /// the common single-pending-interaction workflow, where the
    /// caller answers before ever having seen the `input:requested`
    /// event that carries the interaction id.
    pub fn respond_any(&self, response: InteractionResponse) {
        let mut slots = self.slots.lock().unwrap();
        let waiting_id = slots
            .iter()
            .find(|(_, slot)| matches!(slot, Slot::Waiting(_)))
            .map(|(id, _)| id.clone());
        if let Some(id) = waiting_id {
            if let Some(Slot::Waiting(tx)) = slots.remove(&id) {
                let _ = tx.send(response);
                return;
            }
        }
        drop(slots);
        self.anonymous.lock().unwrap().push_back(response);
    }

    /// Whether a response for `interaction_id` is currently buffered or
    /// awaited (i.e. the interaction is known to this coordinator).
    pub fn is_pending(&self, interaction_id: &InteractionId) -> bool {
        self.slots.lock().unwrap().contains_key(interaction_id)
    }
}

impl Default for HitlCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Given a session's full event list, compute the set of
/// `input:requested` interaction ids with no matching
/// `input:received`.
pub fn find_pending_interactions(events: &[skein_core::Event]) -> Vec<InteractionId> {
    use skein_core::EventPayload;

    let mut requested = Vec::new();
    let mut received = std::collections::HashSet::new();

    for event in events {
        match &event.payload {
            EventPayload::InputRequested { id, .. } => requested.push(id.clone()),
            EventPayload::InputReceived { id, .. } => {
                received.insert(id.clone());
            }
            _ => {}
        }
    }

    requested
        .into_iter()
        .filter(|id| !received.contains(id))
        .collect()
}
