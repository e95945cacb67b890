use tracing::{info, warn};

use crate::outcome::ItemOutcome;
use crate::platform::{GuildApi, LiveGuild};

/// Delete every role except the default role. Failures are logged and recorded.
pub async fn purge_roles(api: &dyn GuildApi, guild: &LiveGuild) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::new();
    for role in guild.custom_roles() {
        let result = api.delete_role(&guild.id, &role.id).await;
        if let Err(e) = &result {
            warn!(guild_id = %guild.id, role = %role.name, error = %e, "failed to delete role");
        }
        outcomes.push(ItemOutcome::from_result(&role.name, &result));
    }
    info!(guild_id = %guild.id, count = outcomes.len(), "purged roles");
    outcomes
}

/// Delete every channel of the guild. Failures are logged and recorded.
pub async fn purge_channels(api: &dyn GuildApi, guild: &LiveGuild) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::new();
    for channel in &guild.channels {
        let result = api.delete_channel(&channel.id).await;
        if let Err(e) = &result {
            warn!(guild_id = %guild.id, channel = %channel.name, error = %e, "failed to delete channel");
        }
        outcomes.push(ItemOutcome::from_result(&channel.name, &result));
    }
    info!(guild_id = %guild.id, count = outcomes.len(), "purged channels");
    outcomes
}
