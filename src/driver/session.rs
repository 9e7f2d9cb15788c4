use std::sync::Arc;
use tracing::{debug, error};

use super::policy::DeliveryPolicy;
use crate::client::{ClientResult, Connection, MessagingClient, Session};
use crate::error::Result;

/// Connection and session owned by a single worker
///
/// Closed with [`WorkerSession::close`] on every exit path; close failures
/// are logged and swallowed.
pub struct WorkerSession {
    connection: Box<dyn Connection>,
    session: Arc<dyn Session>,
    worker_id: usize,
}

impl WorkerSession {
    /// Connect, apply the client id, optionally start delivery, and open a session
    pub async fn open(
        client: &dyn MessagingClient,
        policy: &DeliveryPolicy,
        worker_id: usize,
        start_delivery: bool,
    ) -> Result<Self> {
        let connection = client.connect(&policy.connection_factory).await?;

        match Self::open_session(connection.as_ref(), policy, start_delivery).await {
            Ok(session) => {
                debug!(
                    worker = worker_id,
                    transacted = policy.transacted,
                    ack_mode = %policy.ack_mode,
                    "session opened"
                );
                Ok(Self {
                    connection,
                    session,
                    worker_id,
                })
            }
            Err(err) => {
                log_close(worker_id, "connection", connection.close().await);
                Err(err.into())
            }
        }
    }

    async fn open_session(
        connection: &dyn Connection,
        policy: &DeliveryPolicy,
        start_delivery: bool,
    ) -> ClientResult<Arc<dyn Session>> {
        if let Some(client_id) = &policy.client_id {
            connection.set_client_id(client_id).await?;
        }
        if start_delivery {
            connection.start().await?;
        }
        connection
            .open_session(policy.transacted, policy.ack_mode)
            .await
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    pub async fn close(self) {
        log_close(self.worker_id, "session", self.session.close().await);
        log_close(self.worker_id, "connection", self.connection.close().await);
    }
}

/// Log the outcome of closing a resource without propagating it
pub(crate) fn log_close(worker_id: usize, resource: &str, result: ClientResult<()>) {
    if let Err(err) = result {
        error!(worker = worker_id, resource, error = %err, "error closing {resource}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AckMode, MemoryBroker};
    use crate::error::Error;

    #[tokio::test]
    async fn test_open_and_close_counts_sessions() {
        let broker = MemoryBroker::new();
        let policy = DeliveryPolicy::queue("Q");

        let session = WorkerSession::open(&broker, &policy, 0, true).await.unwrap();
        assert_eq!(broker.stats().sessions_opened, 1);

        session.close().await;
        assert_eq!(broker.stats().sessions_closed, 1);
    }

    #[tokio::test]
    async fn test_unknown_factory_is_transport_error() {
        let broker = MemoryBroker::new();
        let policy = DeliveryPolicy::queue("Q").with_connection_factory("nope");

        let result = WorkerSession::open(&broker, &policy, 0, true).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(broker.stats().sessions_opened, 0);
    }

    #[tokio::test]
    async fn test_duplicate_client_id_releases_connection() {
        let broker = MemoryBroker::new();
        let policy = DeliveryPolicy::topic("T")
            .with_client_id("client-1")
            .with_ack_mode(AckMode::Auto);

        let first = WorkerSession::open(&broker, &policy, 0, true).await.unwrap();
        assert!(WorkerSession::open(&broker, &policy, 1, true).await.is_err());

        first.close().await;
        let again = WorkerSession::open(&broker, &policy, 2, true).await.unwrap();
        again.close().await;
    }
}
