//! The single-context event loop.
//!
//! Connection events, user actions and request deadlines are multiplexed on
//! one task; the controller is only ever touched from here.

use codebox_proto::ReturnCode;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::session::{Controller, UserAction};
use crate::surface::{Editor, Surface};
use crate::transport::{ConnectionEvent, FailureCause, FrameSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopWhen {
    /// Run until the action source closes.
    ActionsClosed,
    /// Run until the first run result arrives.
    RunFinished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeOutcome {
    ActionsClosed,
    RunFinished(ReturnCode),
    RunTimedOut,
    ConnectionFailed(FailureCause),
    /// The connection dropped its event sender without reporting failure.
    EventsClosed,
}

/// Drives `controller` until `stop` is satisfied or the connection fails.
///
/// User actions are held back until the connection opens, so nothing is
/// rejected as "not connected" while the socket is still coming up.
pub async fn run_session<S, E, K>(
    controller: &mut Controller<S, E, K>,
    events: &mut UnboundedReceiver<ConnectionEvent>,
    actions: &mut UnboundedReceiver<UserAction>,
    stop: StopWhen,
) -> RuntimeOutcome
where
    S: Surface,
    E: Editor,
    K: FrameSink,
{
    let runs_at_start = controller.session().runs_completed();
    let mut opened = false;
    let mut actions_open = true;

    loop {
        let deadline = controller.next_deadline();

        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else {
                    debug!(target: "codebox::runtime", "connection event stream ended");
                    return RuntimeOutcome::EventsClosed;
                };
                if event == ConnectionEvent::Opened {
                    opened = true;
                }
                let failure = match &event {
                    ConnectionEvent::Failed(cause) => Some(cause.clone()),
                    _ => None,
                };
                controller.handle_connection_event(event);
                if let Some(cause) = failure {
                    return RuntimeOutcome::ConnectionFailed(cause);
                }
                if stop == StopWhen::RunFinished
                    && controller.session().runs_completed() > runs_at_start
                {
                    let code = controller
                        .session()
                        .last_return_code()
                        .copied()
                        .unwrap_or(ReturnCode::Unknown(None));
                    info!(target: "codebox::runtime", code = ?code.code(), "run complete");
                    return RuntimeOutcome::RunFinished(code);
                }
            }

            action = actions.recv(), if opened && actions_open => {
                match action {
                    Some(action) => {
                        // Rejections are already reported to the surface.
                        let _ = controller.handle_action(action, Instant::now());
                    }
                    None if stop == StopWhen::ActionsClosed => {
                        debug!(target: "codebox::runtime", "action source closed");
                        return RuntimeOutcome::ActionsClosed;
                    }
                    None => actions_open = false,
                }
            }

            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                let expired = controller.expire_requests(Instant::now());
                if expired && stop == StopWhen::RunFinished && !controller.session().pending_run() {
                    return RuntimeOutcome::RunTimedOut;
                }
            }
        }
    }
}
