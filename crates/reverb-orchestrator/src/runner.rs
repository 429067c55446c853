//! Event runner with channel-based intake.
//!
//! The `EventRunner` owns an mpsc channel of received events and starts one
//! execution per function whose triggering event matches.

use std::sync::Arc;

use reverb_function::ReceivedEvent;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::orchestrator::Orchestrator;

/// A function and the name of the event that triggers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
  pub function: String,
  pub event: String,
}

impl Trigger {
  pub fn new(function: impl Into<String>, event: impl Into<String>) -> Self {
    Self {
      function: function.into(),
      event: event.into(),
    }
  }
}

/// A runner that starts executions in response to received events.
///
/// # Usage
///
/// ```ignore
/// let runner = EventRunner::new(orchestrator, triggers);
///
/// // Hand the sender to the ingress
/// let sender = runner.sender();
///
/// // Start the intake loop
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await;
/// ```
pub struct EventRunner<N: ExecutionNotifier = NoopNotifier> {
  sender: mpsc::Sender<ReceivedEvent>,
  receiver: mpsc::Receiver<ReceivedEvent>,
  orchestrator: Arc<Orchestrator<N>>,
  triggers: Vec<Trigger>,
}

impl<N: ExecutionNotifier + 'static> EventRunner<N> {
  pub fn new(orchestrator: Arc<Orchestrator<N>>, triggers: Vec<Trigger>) -> Self {
    Self::with_buffer_size(orchestrator, triggers, 100)
  }

  pub fn with_buffer_size(
    orchestrator: Arc<Orchestrator<N>>,
    triggers: Vec<Trigger>,
    buffer_size: usize,
  ) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      orchestrator,
      triggers,
    }
  }

  /// Get a sender handle for submitting events.
  pub fn sender(&self) -> mpsc::Sender<ReceivedEvent> {
    self.sender.clone()
  }

  /// Functions triggered by `event_name`, in registration order.
  pub fn matching(&self, event_name: &str) -> Vec<&str> {
    matching(&self.triggers, event_name)
  }

  /// Run the intake loop until `cancel` fires or every sender is dropped.
  ///
  /// Executions started by the loop are cancelled with it; the loop waits
  /// for them to wind down before returning.
  pub async fn start(self, cancel: CancellationToken) {
    let Self {
      sender,
      mut receiver,
      orchestrator,
      triggers,
    } = self;
    // Only handed-out senders keep the channel open.
    drop(sender);

    info!(triggers = triggers.len(), "event_runner_started");
    let mut executions = JoinSet::new();

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("event_runner_cancelled");
          break;
        }
        Some(_) = executions.join_next(), if !executions.is_empty() => {}
        received = receiver.recv() => {
          match received {
            Some(received) => {
              dispatch(&orchestrator, &triggers, received, &mut executions, &cancel);
            }
            None => {
              info!("event_runner_channel_closed");
              break;
            }
          }
        }
      }
    }

    while executions.join_next().await.is_some() {}
  }
}

fn matching<'a>(triggers: &'a [Trigger], event_name: &str) -> Vec<&'a str> {
  triggers
    .iter()
    .filter(|t| t.event == event_name)
    .map(|t| t.function.as_str())
    .collect()
}

fn dispatch<N: ExecutionNotifier + 'static>(
  orchestrator: &Arc<Orchestrator<N>>,
  triggers: &[Trigger],
  received: ReceivedEvent,
  executions: &mut JoinSet<()>,
  cancel: &CancellationToken,
) {
  let functions = matching(triggers, &received.event.name);
  if functions.is_empty() {
    debug!(event_id = %received.event_id, event = %received.event.name, "event_unmatched");
    return;
  }

  info!(
    event_id = %received.event_id,
    event = %received.event.name,
    functions = functions.len(),
    "event_dispatched"
  );

  for function in functions {
    let orchestrator = orchestrator.clone();
    let function = function.to_string();
    let event = received.event.clone();
    let event_id = received.event_id.clone();
    let exec_cancel = cancel.child_token();

    executions.spawn(async move {
      let result = orchestrator
        .execute(&function, event, Some(&event_id), exec_cancel)
        .await;
      if let Err(e) = result {
        if !e.is_cancelled() {
          error!(function = %function, event_id = %event_id, error = %e, "triggered_execution_failed");
        }
      }
    });
  }
}
