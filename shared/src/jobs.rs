use crate::auth::AuthorizationContext;
use crate::connections::load_connection;
use crate::errors::ApiError;
use crate::ids::EntityKind;
use crate::store::{decode_items, values, CONNECTION_INDEX};
use crate::types::Job;
use crate::AppState;

/// GET /connections/{id}/jobs
///
/// Backup runs of one connection, newest first. Queued jobs that have not
/// started yet sort ahead of everything else.
pub async fn list_jobs(
    state: &AppState,
    ctx: &AuthorizationContext,
    connection_id: &str,
) -> Result<Vec<Job>, ApiError> {
    let connection = load_connection(state, ctx, connection_id).await?;

    let items = state
        .store
        .query_index(
            &state.config.jobs_table,
            CONNECTION_INDEX,
            "connectionId = :connectionId",
            values(
                ":connectionId",
                &EntityKind::Connection.key(&connection.id),
            ),
        )
        .await?;

    let mut jobs = decode_items(&items, Job::from_item);
    jobs.sort_by(|a, b| match (&a.started_at, &b.started_at) {
        (None, None) => a.id.cmp(&b.id),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(x),
    });
    Ok(jobs)
}
