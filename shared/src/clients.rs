use crate::activity::record_activity;
use crate::auth::AuthorizationContext;
use crate::errors::ApiError;
use crate::ids::{EntityId, EntityKind};
use crate::request::{parse_body, required};
use crate::store::{decode_items, id_key, values, ACCOUNT_INDEX};
use crate::types::{Client, CreateClientRequest};
use crate::AppState;

/// GET /clients
pub async fn list_clients(
    state: &AppState,
    ctx: &AuthorizationContext,
) -> Result<Vec<Client>, ApiError> {
    let items = state
        .store
        .query_index(
            &state.config.clients_table,
            ACCOUNT_INDEX,
            "accountId = :accountId",
            values(":accountId", &ctx.account_key()),
        )
        .await?;

    let mut clients = decode_items(&items, Client::from_item);
    clients.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(clients)
}

/// POST /clients
pub async fn create_client(
    state: &AppState,
    ctx: &AuthorizationContext,
    body: &[u8],
) -> Result<Client, ApiError> {
    let req: CreateClientRequest = parse_body(body)?;
    let name = required(req.name, "name")?;
    let contact_email = req
        .contact_email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    if contact_email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ApiError::validation("contactEmail is not a valid address"));
    }

    let id = EntityId::generate(EntityKind::Client);
    let client = Client {
        id: id.external().to_string(),
        account_id: EntityKind::Account.external(&ctx.account_id),
        name,
        contact_email,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    state
        .store
        .put_item(&state.config.clients_table, client.to_item())
        .await?;

    tracing::info!(account_id = %ctx.account_id, client = %id, "Client created");
    record_activity(
        state,
        ctx,
        "client.created",
        &format!("Added client {}", client.name),
        Some(id.key().as_str()),
    )
    .await;

    Ok(client)
}

/// DELETE /clients/{id}
pub async fn delete_client(
    state: &AppState,
    ctx: &AuthorizationContext,
    client_id: &str,
) -> Result<(), ApiError> {
    let key = EntityKind::Client.key(client_id);
    let item = state
        .store
        .get_item(&state.config.clients_table, id_key(&key))
        .await
        .map_err(|e| e.or_missing("Client"))?;
    let client = Client::from_item(&item)?;
    ctx.ensure_account_access(&client.account_id)?;

    state
        .store
        .delete_item(&state.config.clients_table, id_key(&key))
        .await?;

    record_activity(
        state,
        ctx,
        "client.deleted",
        &format!("Removed client {}", client.name),
        Some(key.as_str()),
    )
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::store::{str_attr, Item, ItemBuilder, MockKeyValueStore};
    use crate::testing;

    fn client_item(id: &str, account: &str, name: &str) -> Item {
        ItemBuilder::new()
            .s("id", format!("client:{}", id))
            .s("accountId", format!("account:{}", account))
            .s("name", name)
            .s("createdAt", "2024-01-01T00:00:00Z")
            .build()
    }

    fn ctx() -> AuthorizationContext {
        AuthorizationContext::new("user:u1", "account:a1")
    }

    #[tokio::test]
    async fn test_list_clients_sorted_by_name() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_query_index()
            .withf(|table, index, _, vals| {
                table == "cloudkeep-clients"
                    && index == ACCOUNT_INDEX
                    && str_attr(vals, ":accountId").as_deref() == Some("account:a1")
            })
            .returning(|_, _, _, _| {
                Ok(vec![
                    client_item("2", "a1", "zeta dental"),
                    client_item("1", "a1", "Acme Law"),
                ])
            });
        let state = testing::state(store);

        let clients = list_clients(&state, &ctx()).await.unwrap();
        let names: Vec<_> = clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Acme Law", "zeta dental"]);
        assert_eq!(clients[0].id, "1");
    }

    #[tokio::test]
    async fn test_create_client_requires_name() {
        let state = testing::state(MockKeyValueStore::new());
        let err = create_client(&state, &ctx(), br#"{"contactEmail":"a@b.io"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "name is required");
    }

    #[tokio::test]
    async fn test_create_client_stores_namespaced_ids() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_put_item()
            .withf(|table, item| {
                table == "cloudkeep-clients"
                    && str_attr(item, "id").is_some_and(|id| id.starts_with("client:"))
                    && str_attr(item, "accountId").as_deref() == Some("account:a1")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_put_item()
            .withf(|table, _| table == "cloudkeep-activity")
            .returning(|_, _| Ok(()));
        let state = testing::state(store);

        let client = create_client(&state, &ctx(), br#"{"name":"Acme Law"}"#)
            .await
            .unwrap();
        assert_eq!(client.account_id, "a1");
        assert!(client.contact_email.is_none());
    }

    #[tokio::test]
    async fn test_delete_foreign_client_is_denied() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get_item()
            .returning(|_, _| Ok(client_item("9", "a2", "Other")));
        store.expect_delete_item().never();
        let state = testing::state(store);

        let err = delete_client(&state, &ctx(), "9").await.unwrap_err();
        assert_eq!(err.status(), 403);
    }

    #[tokio::test]
    async fn test_delete_missing_client_is_404() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get_item()
            .returning(|_, _| Err(StoreError::NotFound));
        let state = testing::state(store);

        let err = delete_client(&state, &ctx(), "client:nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Client not found");
    }
}
