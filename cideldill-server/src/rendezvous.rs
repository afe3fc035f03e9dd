use std::{collections::HashMap, sync::Arc, time::Duration};

use cideldill_proto::{actions::Action, calls::CallId};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// One paused call's cell: the slot the operator's decision lands in, and
/// the signal that wakes the poll holding the line.
#[derive(Default)]
struct Rendezvous {
    pending: Mutex<Option<Action>>,
    notify: Notify,
}

/// Rejection of an action delivered for a call that is not paused.
#[derive(Debug, PartialEq)]
pub struct NotPaused;

/// What one poll request learned.
#[derive(Debug, PartialEq)]
pub enum PollOutcome {
    /// Still no decision; the client should poll again after its interval.
    Waiting,
    /// The operator decided. Returning this consumed the rendezvous.
    Ready(Action),
}

/// Server-side suspension of specific calls.
///
/// Each paused call owns an isolated cell keyed by its identifier; many
/// calls can be paused at once without interacting. A cell lives from the
/// moment the server answers `poll` on `call/start` until the poll that
/// fetches the delivered action.
#[derive(Default)]
pub struct PauseController {
    cells: Mutex<HashMap<CallId, Arc<Rendezvous>>>,
}

impl PauseController {
    /// Creates the rendezvous for a call the server has decided to pause.
    pub fn pause(&self, call_id: CallId) {
        self.cells.lock().insert(call_id, Arc::default());
    }

    /// Hands the operator's decision to a paused call and wakes its
    /// poller. A later delivery before the poll fetches replaces the
    /// earlier one; either way the action is consumed exactly once.
    ///
    /// Delivery to an unknown call is rejected, never buffered.
    pub fn deliver(&self, call_id: &CallId, action: Action) -> Result<(), NotPaused> {
        let cell = self.cells.lock().get(call_id).cloned().ok_or(NotPaused)?;

        *cell.pending.lock() = Some(action);
        cell.notify.notify_one();

        Ok(())
    }

    /// Answers one poll, holding the request open up to `wait` for a
    /// decision to land. `None` means no such rendezvous exists.
    pub async fn poll(&self, call_id: &CallId, wait: Duration) -> Option<PollOutcome> {
        let cell = self.cells.lock().get(call_id).cloned()?;

        if let Some(action) = cell.pending.lock().take() {
            self.cells.lock().remove(call_id);
            return Some(PollOutcome::Ready(action));
        }

        // notify_one leaves a permit behind, so a delivery racing this
        // request between the check above and the await below still wakes
        // us rather than costing a full interval
        if tokio::time::timeout(wait, cell.notify.notified())
            .await
            .is_err()
        {
            return Some(PollOutcome::Waiting);
        }

        let outcome = cell.pending.lock().take();
        match outcome {
            Some(action) => {
                self.cells.lock().remove(call_id);
                Some(PollOutcome::Ready(action))
            }
            None => Some(PollOutcome::Waiting),
        }
    }

    pub fn is_paused(&self, call_id: &CallId) -> bool {
        self.cells.lock().contains_key(call_id)
    }
}
