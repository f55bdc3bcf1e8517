//! ============================================================================
//! Message Subscription - Near-real-time delivery for one conversation
//! ============================================================================
//! A background tokio task re-fetches the newest page every `interval` and
//! forwards messages it has not delivered before through a channel. When a
//! burst overflows one page it keeps paging back until it reaches a message
//! it already has, so a message arrives at most one interval after the
//! backend has it. Fetch failures are
//! logged and retried on the next tick. `stop()` or dropping the
//! subscription cancels the task.
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::MessageThread;
use crate::backend::{BackendError, MarketplaceBackend, DEFAULT_MESSAGE_PAGE};
use crate::types::{Message, Session};

/// How often the newest page is re-fetched
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const CHANNEL_CAPACITY: usize = 64;

/// Upper bound on pages fetched back in one tick
const MAX_CATCH_UP_PAGES: usize = 50;

pub struct MessageSubscription {
    conversation_id: String,
    receiver: mpsc::Receiver<Message>,
    handle: JoinHandle<()>,
    stopped: bool,
}

impl MessageSubscription {
    /// Start delivering messages of `thread`'s conversation. Messages already
    /// in `thread` are treated as delivered.
    pub fn start(
        backend: Arc<dyn MarketplaceBackend>,
        session: Session,
        thread: MessageThread,
        interval: Duration,
    ) -> Self {
        let conversation_id = thread.conversation_id().to_string();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        info!(
            "Subscribing to conversation {} every {:?}",
            conversation_id, interval
        );
        let handle = tokio::spawn(poll_loop(backend, session, thread, interval, sender));

        Self {
            conversation_id,
            receiver,
            handle,
            stopped: false,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Next undelivered message; `None` once the subscription has stopped
    /// and the buffer is drained
    pub async fn next(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            debug!("Stopping subscription to {}", self.conversation_id);
            self.stopped = true;
            self.handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stopped && !self.handle.is_finished()
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn poll_loop(
    backend: Arc<dyn MarketplaceBackend>,
    session: Session,
    mut thread: MessageThread,
    interval: Duration,
    sender: mpsc::Sender<Message>,
) {
    let conversation_id = thread.conversation_id().to_string();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let page = match fetch_unseen(backend.as_ref(), &session, &thread).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Polling {} failed, retrying next tick: {}", conversation_id, e);
                continue;
            }
        };

        for message in thread.merge(page) {
            if sender.send(message).await.is_err() {
                debug!("Subscriber for {} went away", conversation_id);
                return;
            }
        }
    }
}

/// Newest page, plus older pages while every message on the last one is
/// unknown to `thread`. An empty thread only takes the newest page.
async fn fetch_unseen(
    backend: &dyn MarketplaceBackend,
    session: &Session,
    thread: &MessageThread,
) -> Result<Vec<Message>, BackendError> {
    let conversation_id = thread.conversation_id();
    let mut collected = Vec::new();
    let mut before = None;

    for _ in 0..MAX_CATCH_UP_PAGES {
        let page = backend
            .load_messages(session, conversation_id, before, DEFAULT_MESSAGE_PAGE)
            .await?;

        let full = page.len() >= DEFAULT_MESSAGE_PAGE;
        let reached_known = page.iter().any(|m| thread.contains(&m.id));
        let oldest = page.iter().map(|m| m.timestamp).min();
        collected.extend(page);

        if !full || reached_known || thread.is_empty() {
            return Ok(collected);
        }
        match oldest {
            Some(oldest) => before = Some(oldest),
            None => return Ok(collected),
        }
    }

    warn!(
        "Conversation {} still behind after {} pages",
        conversation_id, MAX_CATCH_UP_PAGES
    );
    Ok(collected)
}
