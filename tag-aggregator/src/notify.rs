use crate::types::{AggregatorError, Destination, Notifier, Result, Subscription};
use async_trait::async_trait;
use tracing::info;

/// Header plus one line per new item.
pub fn update_lines(query: &str, new_items: &[String]) -> Vec<String> {
    let mut lines = Vec::with_capacity(new_items.len() + 1);
    lines.push(format!("Subscription update for [{}]!", query));
    lines.extend(new_items.iter().cloned());
    lines
}

/// Split into consecutive groups of at most `max_lines`.
pub fn chunk_lines(lines: &[String], max_lines: usize) -> Vec<Vec<String>> {
    lines.chunks(max_lines.max(1)).map(<[String]>::to_vec).collect()
}

/// Deliver new items for `subscription`, one message per chunk, in order.
/// Returns the number of messages sent; stops at the first failed delivery.
pub async fn send_update(
    notifier: &dyn Notifier,
    subscription: &Subscription,
    new_items: &[String],
    max_reply_lines: usize,
) -> Result<usize> {
    if new_items.is_empty() {
        return Ok(0);
    }

    let chunks = chunk_lines(&update_lines(&subscription.query, new_items), max_reply_lines);
    for chunk in &chunks {
        notifier
            .deliver(&subscription.destination, chunk)
            .await
            .map_err(AggregatorError::Notify)?;
    }

    info!(
        "Sent {} new items for [{}] to {} in {} messages",
        new_items.len(),
        subscription.query,
        subscription.scope_key,
        chunks.len()
    );
    Ok(chunks.len())
}

/// Writes deliveries to the log instead of a chat platform.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, destination: &Destination, lines: &[String]) -> anyhow::Result<()> {
        info!("Delivering to {}:\n{}", destination.scope_key(), lines.join("\n"));
        Ok(())
    }
}
