use crate::activity::record_activity;
use crate::auth::AuthorizationContext;
use crate::errors::ApiError;
use crate::ids::{EntityId, EntityKind};
use crate::platforms::{list_sources, load_platform};
use crate::request::{parse_body, required};
use crate::store::{decode_items, id_key, merge_item, values, Item, ACCOUNT_INDEX};
use crate::types::{Connection, CreateConnectionRequest, UpdateConnectionRequest};
use crate::AppState;

/// Statuses a caller may set directly. The sync workers own the rest.
const SETTABLE_STATUSES: [&str; 2] = ["active", "paused"];

/// A connection owned by the caller's account, with its raw stored item.
async fn fetch(
    state: &AppState,
    ctx: &AuthorizationContext,
    connection_id: &str,
) -> Result<(Connection, Item), ApiError> {
    let item = state
        .store
        .get_item(
            &state.config.connections_table,
            id_key(&EntityKind::Connection.key(connection_id)),
        )
        .await
        .map_err(|e| e.or_missing("Connection"))?;
    let connection = Connection::from_item(&item)?;
    ctx.ensure_account_access(&connection.account_id)?;
    Ok((connection, item))
}

/// A connection owned by the caller's account.
pub async fn load_connection(
    state: &AppState,
    ctx: &AuthorizationContext,
    connection_id: &str,
) -> Result<Connection, ApiError> {
    Ok(fetch(state, ctx, connection_id).await?.0)
}

/// Attributes the sync workers keep on the row survive the write.
async fn save(state: &AppState, stored: Item, connection: &Connection) -> Result<(), ApiError> {
    state
        .store
        .put_item(
            &state.config.connections_table,
            merge_item(stored, connection.to_item()),
        )
        .await?;
    Ok(())
}

/// GET /connections
pub async fn list_connections(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<Vec<Connection>, ApiError> {
    let items = state
        .store
        .query_index(
            &state.config.connections_table,
            ACCOUNT_INDEX,
            "accountId = :accountId",
            values(":accountId", &ctx.account_key()),
        )
        .await?;

    let mut connections = decode_items(&items, Connection::from_item);
    connections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(connections)
}

/// GET /connections/{id}
pub async fn get_connection(
    state: &AppState,
    ctx: &AuthorizationContext,
    connection_id: &str,
) -> Result<Connection, ApiError> {
    load_connection(state, ctx, connection_id).await
}

/// POST /connections
pub async fn create_connection(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<Connection, ApiError> {
    let req: CreateConnectionRequest = parse_body(body)?;
    let platform_id = required(req.platform_id, "platformId")?;

    let platform = load_platform(state, &platform_id).await?;

    let source_id = match req.platform_source_id.filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => {
            let wanted = EntityKind::PlatformSource.external(raw.trim());
            let sources = list_sources(state, &platform.id).await?;
            if !sources.iter().any(|s| s.id == wanted) {
                return Err(ApiError::validation(format!(
                    "platformSourceId does not belong to platform {}",
                    platform.id
                )));
            }
            Some(wanted)
        }
    };

    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| platform.name.clone());

    let id = EntityId::generate(EntityKind::Connection);
    let connection = Connection {
        id: id.external().to_string(),
        account_id: EntityKind::Account.external(&ctx.account_id),
        platform_id: platform.id.clone(),
        platform_source_id: source_id,
        name,
        status: "pending".to_string(),
        created_by: Some(EntityKind::User.external(&ctx.user_id)),
        created_at: chrono::Utc::now().to_rfc3339(),
        last_sync_at: None,
        access_token: None,
        refresh_token: None,
    };
    save(state, Item::new(), &connection).await?;

    tracing::info!(
        account_id = %ctx.account_id,
        connection = %id,
        platform = %platform.id,
        "Connection created"
    );
    record_activity(
        state,
        ctx,
        "connection.created",
        &format!("Connected {}", platform.name),
        Some(id.key().as_str()),
    )
    .await;

    Ok(connection)
}

/// PATCH /connections/{id}
pub async fn update_connection(
    state: &AppState,
    ctx: &AuthorizationContext,
    connection_id: &str,
    body: &[u8],
) -> Result<Connection, ApiError> {
    let req: UpdateConnectionRequest = parse_body(body)?;
    let name = req.name.map(|n| required(Some(n), "name")).transpose()?;
    let status = match req.status.map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if !SETTABLE_STATUSES.contains(&s.as_str()) => {
            return Err(ApiError::validation("status must be one of active, paused"))
        }
        other => other,
    };

    let (mut connection, stored) = fetch(state, ctx, connection_id).await?;
    if let Some(name) = name {
        connection.name = name;
    }
    if let Some(status) = status {
        connection.status = status;
    }
    save(state, stored, &connection).await?;

    record_activity(
        state,
        ctx,
        "connection.updated",
        &format!("Updated connection {} ({})", connection.name, connection.status),
        Some(EntityKind::Connection.key(&connection.id).as_str()),
    )
    .await;

    Ok(connection)
}

/// DELETE /connections/{id}
pub async fn delete_connection(
    state: &AppState,
    ctx: &AuthorizationContext,
    connection_id: &str,
) -> Result<(), ApiError> {
    let connection = load_connection(state, ctx, connection_id).await?;
    let key = EntityKind::Connection.key(&connection.id);
    state
        .store
        .delete_item(&state.config.connections_table, id_key(&key))
        .await?;

    tracing::info!(account_id = %ctx.account_id, connection = %key, "Connection deleted");
    record_activity(
        state,
        ctx,
        "connection.deleted",
        &format!("Disconnected {}", connection.name),
        Some(key.as_str()),
    )
    .await;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::platforms::PLATFORM_INDEX;
    use crate::store::{str_attr, Item, ItemBuilder, MockKeyValueStore};
    use crate::testing;

    pub(crate) fn connection_item(id: &str, account: &str, created_at: &str) -> Item {
        ItemBuilder::new()
            .s("id", format!("connection:{}", id))
            .s("accountId", format!("account:{}", account))
            .s("platformId", "platform:google")
            .s("name", format!("conn {}", id))
            .s("status", "active")
            .s("createdAt", created_at)
            .s("accessToken", "ya29.secret")
            .s("refreshToken", "1//refresh")
            .s("credentials", "enc-blob")
            .build()
    }

    /// Store holding connection `c1` of account `a1` and `c2` of account `a2`.
    pub(crate) fn store_with_connections() -> MockKeyValueStore {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get_item()
            .withf(|table, _| table == "cloudkeep-connections")
            .returning(|_, key| match str_attr(&key, "id").as_deref() {
                Some("connection:c1") => Ok(connection_item("c1", "a1", "2024-01-01T00:00:00Z")),
                Some("connection:c2") => Ok(connection_item("c2", "a2", "2024-01-01T00:00:00Z")),
                _ => Err(StoreError::NotFound),
            });
        store
    }

    fn ctx() -> AuthorizationContext {
        AuthorizationContext::new("user:u1", "account:a1")
    }

    fn with_google(store: &mut MockKeyValueStore, enabled: bool) {
        store
            .expect_get_item()
            .withf(|table, _| table == "cloudkeep-platforms")
            .returning(move |_, key| {
                if str_attr(&key, "id").as_deref() != Some("platform:google") {
                    return Err(StoreError::NotFound);
                }
                Ok(ItemBuilder::new()
                    .s("id", "platform:google")
                    .s("name", "Google Workspace")
                    .b("enabled", enabled)
                    .build())
            });
        store
            .expect_query_index()
            .withf(|table, index, _, _| {
                table == "cloudkeep-platform-sources" && index == PLATFORM_INDEX
            })
            .returning(|_, _, _, _| {
                Ok(vec![ItemBuilder::new()
                    .s("id", "platform-source:gmail")
                    .s("platformId", "platform:google")
                    .s("name", "Gmail")
                    .build()])
            });
    }

    #[tokio::test]
    async fn test_get_connection_hides_credentials() {
        let state = testing::state(store_with_connections());
        let conn = get_connection(&state, &ctx(), "c1").await.unwrap();
        let body = serde_json::to_value(&conn).unwrap();
        assert_eq!(body["id"], "c1");
        assert_eq!(body["platformId"], "google");
        assert!(body.get("accessToken").is_none());
        assert!(body.get("refreshToken").is_none());
    }

    #[tokio::test]
    async fn test_foreign_connection_is_denied() {
        let state = testing::state(store_with_connections());
        let err = get_connection(&state, &ctx(), "connection:c2").await.unwrap_err();
        assert_eq!(err.status(), 403);
        let err = get_connection(&state, &ctx(), "c3").await.unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_list_connections_newest_first() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_query_index()
            .withf(|table, index, _, vals| {
                table == "cloudkeep-connections"
                    && index == ACCOUNT_INDEX
                    && str_attr(vals, ":accountId").as_deref() == Some("account:a1")
            })
            .returning(|_, _, _, _| {
                Ok(vec![
                    connection_item("old", "a1", "2024-01-01T00:00:00Z"),
                    connection_item("new", "a1", "2024-03-01T00:00:00Z"),
                ])
            });
        let state = testing::state(store);

        let list = list_connections(&state, &ctx()).await.unwrap();
        assert_eq!(list[0].id, "new");
        assert_eq!(list[1].id, "old");
    }

    #[tokio::test]
    async fn test_create_connection_pending_with_source() {
        let mut store = MockKeyValueStore::new();
        with_google(&mut store, true);
        store
            .expect_put_item()
            .withf(|table, item| {
                table == "cloudkeep-connections"
                    && str_attr(item, "status").as_deref() == Some("pending")
                    && str_attr(item, "platformId").as_deref() == Some("platform:google")
                    && str_attr(item, "platformSourceId").as_deref()
                        == Some("platform-source:gmail")
                    && str_attr(item, "createdBy").as_deref() == Some("user:u1")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_put_item()
            .withf(|table, _| table == "cloudkeep-activity")
            .times(1)
            .returning(|_, _| Ok(()));
        let state = testing::state(store);

        let conn = create_connection(
            &state,
            &ctx(),
            br#"{"platformId":"google","platformSourceId":"platform-source:gmail"}"#,
        )
        .await
        .unwrap();
        assert_eq!(conn.name, "Google Workspace");
        assert_eq!(conn.platform_source_id.as_deref(), Some("gmail"));
    }

    #[tokio::test]
    async fn test_create_connection_rejects_unknown_platform_or_source() {
        let mut store = MockKeyValueStore::new();
        with_google(&mut store, true);
        let state = testing::state(store);

        let err = create_connection(&state, &ctx(), br#"{"platformId":"myspace"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);

        let err = create_connection(
            &state,
            &ctx(),
            br#"{"platformId":"google","platformSourceId":"onedrive"}"#,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), 400);

        let err = create_connection(&state, &ctx(), br#"{"name":"x"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_create_connection_on_disabled_platform_is_404() {
        let mut store = MockKeyValueStore::new();
        with_google(&mut store, false);
        let state = testing::state(store);

        let err = create_connection(&state, &ctx(), br#"{"platformId":"google"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_update_connection_status() {
        let mut store = store_with_connections();
        store
            .expect_put_item()
            .withf(|table, item| {
                table == "cloudkeep-connections"
                    && str_attr(item, "status").as_deref() == Some("paused")
                    && str_attr(item, "accessToken").as_deref() == Some("ya29.secret")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_put_item()
            .withf(|table, _| table == "cloudkeep-activity")
            .returning(|_, _| Ok(()));
        let state = testing::state(store);

        let conn = update_connection(&state, &ctx(), "c1", br#"{"status":"Paused"}"#)
            .await
            .unwrap();
        assert_eq!(conn.status, "paused");

        let err = update_connection(&state, &ctx(), "c1", br#"{"status":"error"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_update_keeps_unmodelled_attributes() {
        let mut store = store_with_connections();
        store
            .expect_put_item()
            .withf(|table, item| {
                table == "cloudkeep-connections"
                    && str_attr(item, "name").as_deref() == Some("renamed")
                    && str_attr(item, "credentials").as_deref() == Some("enc-blob")
                    && str_attr(item, "refreshToken").as_deref() == Some("1//refresh")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_put_item()
            .withf(|table, _| table == "cloudkeep-activity")
            .returning(|_, _| Ok(()));
        let state = testing::state(store);

        let conn = update_connection(&state, &ctx(), "c1", br#"{"name":"renamed"}"#)
            .await
            .unwrap();
        assert_eq!(conn.name, "renamed");
    }

    #[tokio::test]
    async fn test_delete_connection() {
        let mut store = store_with_connections();
        store
            .expect_delete_item()
            .withf(|table, key| {
                table == "cloudkeep-connections"
                    && str_attr(key, "id").as_deref() == Some("connection:c1")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_put_item().returning(|_, _| Ok(()));
        let state = testing::state(store);

        delete_connection(&state, &ctx(), "c1").await.unwrap();
        let err = delete_connection(&state, &ctx(), "c2").await.unwrap_err();
        assert_eq!(err.status(), 403);
    }
}
