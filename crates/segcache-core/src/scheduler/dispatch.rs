//! The single task that owns a scheduler's listener.

use tokio::sync::mpsc;

use super::listener::SchedulerListener;
use super::operation::{Envelope, OpEvent};
use super::{lock, OperationState, Shared};

/// Deliver operation events to `listener` one at a time until every sender
/// (the scheduler and its operations) is gone.
pub(super) async fn run_dispatcher<R, L>(
    shared: Shared<R>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    mut listener: L,
) where
    R: Clone + Send + 'static,
    L: SchedulerListener<R>,
{
    while let Some(Envelope { id, event }) = rx.recv().await {
        match event {
            OpEvent::Begin => {
                let request = {
                    let mut reg = lock(&shared);
                    let Some(slot) = reg.active.get(&id) else { continue };
                    let request = slot.request.clone();
                    reg.states.insert(id, OperationState::Running);
                    request
                };
                listener.will_begin_request(&request);
            }
            OpEvent::ContentLength(len) => {
                let Some(request) = active_request(&shared, id) else { continue };
                listener.did_receive_content_length(len, &request);
            }
            OpEvent::Data(bytes) => {
                let Some(request) = active_request(&shared, id) else { continue };
                listener.did_receive(&bytes, &request);
            }
            OpEvent::Finish(error) => {
                let request = {
                    let mut reg = lock(&shared);
                    let request = match reg.active.remove(&id) {
                        Some(slot) => Some(slot.request),
                        None => reg.draining.remove(&id),
                    };
                    if request.is_some() {
                        let state = match &error {
                            None => OperationState::Completed,
                            Some(e) if e.is_cancelled() => OperationState::Cancelled,
                            Some(_) => OperationState::Failed,
                        };
                        reg.record_terminal(id, state);
                    }
                    request
                };
                if let Some(request) = request {
                    listener.did_finish_request(&request, error.as_ref());
                }
            }
        }
    }
    tracing::trace!("scheduler dispatcher stopped");
}

fn active_request<R: Clone>(shared: &Shared<R>, id: super::OperationId) -> Option<R> {
    lock(shared).active.get(&id).map(|slot| slot.request.clone())
}
