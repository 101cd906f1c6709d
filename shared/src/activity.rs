use crate::auth::AuthorizationContext;
use crate::errors::ApiError;
use crate::ids::{EntityId, EntityKind};
use crate::store::{decode_items, values, ItemBuilder, ACCOUNT_INDEX};
use crate::types::Activity;
use crate::AppState;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

/// Append an event to the account's activity feed.
///
/// Never fails the calling request; a lost event is only logged.
pub async fn record_activity(
    state: &AppState,
    ctx: &AuthorizationContext,
    activity_type: &str,
    message: &str,
    subject: Option<&str>,
) {
    let id = EntityId::generate(EntityKind::Activity);
    let item = ItemBuilder::new()
        .s("id", id.key())
        .s("accountId", ctx.account_key())
        .s("type", activity_type)
        .s("message", message)
        .s("actorId", ctx.user_key())
        .opt_s("subjectId", subject)
        .s("createdAt", chrono::Utc::now().to_rfc3339())
        .build();

    if let Err(e) = state
        .store
        .put_item(&state.config.activity_table, item)
        .await
    {
        tracing::error!(
            account_id = %ctx.account_id,
            activity_type,
            "Failed to record activity: {}",
            e
        );
    }
}

/// The caller's account activity, newest first.
pub async fn list_activity(
    state: &AppState,
    ctx: &AuthorizationContext,
    activity_type: Option<&str>,
    limit: usize,
) -> Result<Vec<Activity>, ApiError> {
    let items = state
        .store
        .query_index(
            &state.config.activity_table,
            ACCOUNT_INDEX,
            "accountId = :accountId",
            values(":accountId", &ctx.account_key()),
        )
        .await?;

    let mut events: Vec<Activity> = decode_items(&items, Activity::from_item)
        .into_iter()
        .filter(|a| activity_type.map_or(true, |t| a.activity_type == t))
        .collect();
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    events.truncate(limit);

    Ok(events)
}
