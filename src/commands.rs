use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use common_types::{Notifier, SubscriberScope};
use tg_publisher::{
    format_filter_added, format_filter_list, format_filter_removed, parse_command, Command,
    TgUpdates,
};

use crate::registry::SubscriptionRegistry;

/// Long-poll loop wiring chat commands to the registry. Parse failures
/// are ignored silently (group chats are noisy); transport failures
/// back off and retry forever.
pub async fn run_command_loop(
    mut updates: TgUpdates,
    registry: Arc<SubscriptionRegistry>,
    notifier: Arc<dyn Notifier>,
) {
    loop {
        let incoming = match updates.poll().await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(?e, "getUpdates failed, retrying");
                sleep(Duration::from_secs(2)).await;
                continue;
            }
        };
        for msg in incoming {
            let Some(command) = parse_command(&msg.text) else {
                continue;
            };
            debug!(chat = msg.scope.chat_id, ?command, "chat command");
            let reply = apply(&registry, &msg.scope, command);
            if let Err(e) = notifier.send(&msg.scope, &reply, false).await {
                warn!(?e, chat = msg.scope.chat_id, "command reply failed");
            }
        }
    }
}

fn apply(registry: &SubscriptionRegistry, scope: &SubscriberScope, command: Command) -> String {
    match command {
        Command::Add(req) => {
            let sub = req.clone().into_subscription();
            let count = registry.add_filter(*scope, req);
            format_filter_added(&sub, count)
        }
        Command::Remove(req) => {
            let sub = req.clone().into_subscription();
            let found = registry.remove_filter(scope, req);
            format_filter_removed(&sub, found)
        }
        Command::List => format_filter_list(&registry.list(scope)),
    }
}
