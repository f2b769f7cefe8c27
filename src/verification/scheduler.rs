use std::sync::Arc;
use std::time::Duration;

use teloxide::types::MessageId;
use tokio::task::AbortHandle;

use super::controller::VerificationController;
use super::registry::PendingKey;

/// Spawns one delayed eviction task per pending member.
///
/// The returned handle is stored in the registry and aborted when the
/// member verifies first. A task that still wakes up after resolution
/// finds nothing in the registry for its challenge message and exits.
pub struct EvictionScheduler {
    delay: Duration,
}

impl EvictionScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn schedule(
        &self,
        controller: Arc<VerificationController>,
        key: PendingKey,
        challenge_message_id: MessageId
    ) -> AbortHandle {
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.evict(key, challenge_message_id).await;
        });
        task.abort_handle()
    }
}
