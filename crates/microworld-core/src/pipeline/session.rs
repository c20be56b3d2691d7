//! Consumer-side handle of a running deployment.

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::DeploymentEvent;

/// Receives the events of one deployment session.
///
/// Dropping the handle disconnects the consumer; the session notices at its
/// next emit and shuts down, taking the reasoning process with it.
pub struct DeploymentSession {
    session_id: String,
    events: mpsc::Receiver<DeploymentEvent>,
    task: JoinHandle<()>,
}

impl DeploymentSession {
    pub(crate) fn new(
        session_id: String,
        events: mpsc::Receiver<DeploymentEvent>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            session_id,
            events,
            task,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event, `None` once the session has ended.
    pub async fn next_event(&mut self) -> Option<DeploymentEvent> {
        self.events.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = DeploymentEvent> + Send {
        futures::stream::unfold(self, |mut session| async move {
            let event = session.next_event().await?;
            Some((event, session))
        })
    }

    /// Drain every event and wait for the session task to finish.
    pub async fn collect(mut self) -> Vec<DeploymentEvent> {
        let mut out = Vec::new();
        while let Some(event) = self.events.recv().await {
            out.push(event);
        }
        if let Err(e) = self.task.await {
            tracing::error!(session_id = %self.session_id, error = %e, "Deployment task aborted");
        }
        out
    }
}
