use crate::auth::AuthorizationContext;
use crate::connections::load_connection;
use crate::errors::ApiError;
use crate::ids::EntityKind;
use crate::store::{decode_items, id_key, values, CONNECTION_INDEX};
use crate::types::File;
use crate::AppState;

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

/// GET /connections/{id}/files
///
/// Backed-up files of one connection, ordered by path.
pub async fn list_files(
    state: &AppState,
    ctx: &AuthorizationContext,
    connection_id: &str,
    path_prefix: Option<&str>,
    limit: usize,
) -> Result<Vec<File>, ApiError> {
    let connection = load_connection(state, ctx, connection_id).await?;

    let items = state
        .store
        .query_index(
            &state.config.files_table,
            CONNECTION_INDEX,
            "connectionId = :connectionId",
            values(
                ":connectionId",
                &EntityKind::Connection.key(&connection.id),
            ),
        )
        .await?;

    let mut files: Vec<File> = decode_items(&items, File::from_item)
        .into_iter()
        .filter(|f| f.account_id == connection.account_id)
        .filter(|f| path_prefix.map_or(true, |p| f.path.starts_with(p)))
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.truncate(limit);

    tracing::debug!(connection = %connection.id, count = files.len(), "Listed files");
    Ok(files)
}

/// GET /files/{id}
pub async fn get_file(
    state: &AppState,
    ctx: &AuthorizationContext,
    file_id: &str,
) -> Result<File, ApiError> {
    let item = state
        .store
        .get_item(&state.config.files_table, id_key(&EntityKind::File.key(file_id)))
        .await
        .map_err(|e| e.or_missing("File"))?;
    let file = File::from_item(&item)?;
    ctx.ensure_account_access(&file.account_id)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::tests::store_with_connections;
    use crate::store::{str_attr, Item, ItemBuilder};
    use crate::testing;

    fn file_item(id: &str, account: &str, path: &str) -> Item {
        ItemBuilder::new()
            .s("id", format!("file:{}", id))
            .s("connectionId", "connection:c1")
            .s("accountId", format!("account:{}", account))
            .s("name", path.rsplit('/').next().unwrap_or(path))
            .s("path", path)
            .n("size", 1024)
            .build()
    }

    fn ctx() -> AuthorizationContext {
        AuthorizationContext::new("user:u1", "account:a1")
    }

    fn store_with_files() -> crate::store::MockKeyValueStore {
        let mut store = store_with_connections();
        store
            .expect_query_index()
            .withf(|table, index, _, vals| {
                table == "cloudkeep-files"
                    && index == CONNECTION_INDEX
                    && str_attr(vals, ":connectionId").as_deref() == Some("connection:c1")
            })
            .returning(|_, _, _, _| {
                Ok(vec![
                    file_item("3", "a1", "/mail/inbox/b.eml"),
                    file_item("1", "a1", "/drive/report.pdf"),
                    file_item("2", "a1", "/mail/inbox/a.eml"),
                    file_item("4", "a2", "/mail/inbox/leak.eml"),
                ])
            });
        store
            .expect_get_item()
            .withf(|table, _| table == "cloudkeep-files")
            .returning(|_, key| match str_attr(&key, "id").as_deref() {
                Some("file:1") => Ok(file_item("1", "a1", "/drive/report.pdf")),
                Some("file:4") => Ok(file_item("4", "a2", "/mail/inbox/leak.eml")),
                _ => Err(crate::errors::StoreError::NotFound),
            });
        store
    }

    #[tokio::test]
    async fn test_list_files_sorted_filtered_limited() {
        let state = testing::state(store_with_files());

        let files = list_files(&state, &ctx(), "c1", None, DEFAULT_LIMIT).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/drive/report.pdf", "/mail/inbox/a.eml", "/mail/inbox/b.eml"]
        );

        let files = list_files(&state, &ctx(), "c1", Some("/mail/"), 1).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "2");
        assert_eq!(files[0].connection_id, "c1");
    }

    #[tokio::test]
    async fn test_list_files_of_foreign_connection_is_denied() {
        let state = testing::state(store_with_files());
        let err = list_files(&state, &ctx(), "c2", None, DEFAULT_LIMIT)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 403);
    }

    #[tokio::test]
    async fn test_get_file_checks_account() {
        let state = testing::state(store_with_files());
        let file = get_file(&state, &ctx(), "1").await.unwrap();
        assert_eq!(file.size, 1024);
        assert_eq!(file.name, "report.pdf");

        let err = get_file(&state, &ctx(), "file:4").await.unwrap_err();
        assert_eq!(err.status(), 403);
        let err = get_file(&state, &ctx(), "5").await.unwrap_err();
        assert_eq!(err.to_string(), "File not found");
    }
}
