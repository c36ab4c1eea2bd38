//! Ordered background delivery of presence writes.

use std::sync::Arc;

use pbl_core::error::{PblError, Result};
use pbl_core::presence::PresenceStore;
use pbl_core::step::Step;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum BeaconCommand {
    Upsert {
        visitor_id: String,
        name: String,
        team_id: u32,
        team_name: String,
        step: Step,
        done: oneshot::Sender<Result<()>>,
    },
    UpdateStep {
        visitor_id: String,
        step: Step,
    },
    Flush(oneshot::Sender<()>),
}

/// Sends presence writes of one client to the store in the order they were
/// issued.
///
/// A single worker task drains the queue, so a step update issued after a
/// join never overtakes it, and two quick step updates land in order.
/// Step updates are fire-and-forget; their failures are only logged.
pub(crate) struct PresenceBeacon {
    commands: mpsc::UnboundedSender<BeaconCommand>,
}

impl PresenceBeacon {
    /// Spawns the worker. It stops once the beacon is dropped and the queue
    /// is drained.
    pub(crate) fn spawn(presence: Arc<dyn PresenceStore>) -> Self {
        let (commands, mut queue) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(command) = queue.recv().await {
                match command {
                    BeaconCommand::Upsert {
                        visitor_id,
                        name,
                        team_id,
                        team_name,
                        step,
                        done,
                    } => {
                        let result = presence
                            .upsert(&visitor_id, &name, team_id, &team_name, step)
                            .await;
                        // The joiner may have given up waiting.
                        let _ = done.send(result);
                    }
                    BeaconCommand::UpdateStep { visitor_id, step } => {
                        match presence.update_step(&visitor_id, step).await {
                            Ok(()) => debug!(
                                visitor_id = %visitor_id,
                                step = %step,
                                "Presence step updated"
                            ),
                            Err(e) => warn!(
                                visitor_id = %visitor_id,
                                step = %step,
                                error = %e,
                                "Presence step update failed"
                            ),
                        }
                    }
                    BeaconCommand::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            debug!("Presence beacon stopped");
        });

        Self { commands }
    }

    /// Queues an upsert and waits for the store's answer.
    pub(crate) async fn upsert(
        &self,
        visitor_id: &str,
        name: &str,
        team_id: u32,
        team_name: &str,
        step: Step,
    ) -> Result<()> {
        let (done, answer) = oneshot::channel();
        self.send(BeaconCommand::Upsert {
            visitor_id: visitor_id.to_string(),
            name: name.to_string(),
            team_id,
            team_name: team_name.to_string(),
            step,
            done,
        })?;
        answer
            .await
            .map_err(|_| PblError::internal("Presence beacon stopped"))?
    }

    /// Queues a step update without waiting for it.
    pub(crate) fn update_step(&self, visitor_id: &str, step: Step) {
        let command = BeaconCommand::UpdateStep {
            visitor_id: visitor_id.to_string(),
            step,
        };
        if let Err(e) = self.send(command) {
            warn!(
                visitor_id = %visitor_id,
                step = %step,
                error = %e,
                "Presence step update dropped"
            );
        }
    }

    /// Resolves once every write queued before this call has been attempted.
    pub(crate) async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.send(BeaconCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    fn send(&self, command: BeaconCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PblError::internal("Presence beacon stopped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pbl_core::presence::{LearnerRecord, PresenceListener};
    use pbl_core::subscription::Subscription;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Records calls and fails step updates for unknown visitors.
    #[derive(Default)]
    struct RecordingPresence {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PresenceStore for RecordingPresence {
        async fn upsert(
            &self,
            visitor_id: &str,
            _: &str,
            _: u32,
            _: &str,
            step: Step,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(format!("upsert {} {}", visitor_id, step));
            Ok(())
        }

        async fn update_step(&self, visitor_id: &str, step: Step) -> Result<()> {
            // Yield so a racing worker would have a chance to reorder.
            tokio::task::yield_now().await;
            self.calls.lock().unwrap().push(format!("step {} {}", visitor_id, step));
            if visitor_id == "ghost" {
                return Err(PblError::not_found("LearnerRecord", visitor_id));
            }
            Ok(())
        }

        async fn subscribe_all(&self, _: PresenceListener) -> Subscription {
            Subscription::new(CancellationToken::new())
        }

        async fn clear_all(&self) -> Result<()> {
            Ok(())
        }

        async fn list_all(&self) -> Vec<LearnerRecord> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_writes_keep_issue_order() {
        let presence = Arc::new(RecordingPresence::default());
        let beacon = PresenceBeacon::spawn(presence.clone());

        beacon.upsert("v1", "Kim", 1, "1조", Step::Situation).await.unwrap();
        beacon.update_step("v1", Step::ProblemDefinition);
        beacon.update_step("ghost", Step::Report);
        beacon.update_step("v1", Step::AnalysisWhy);
        beacon.flush().await;

        let calls = presence.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "upsert v1 SITUATION",
                "step v1 PROBLEM_DEFINITION",
                "step ghost REPORT",
                "step v1 ANALYSIS_WHY",
            ]
        );
    }
}
