use crate::errors::StoreError;
use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use std::collections::HashMap;
use std::str::FromStr;

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

pub type Item = HashMap<String, AttributeValue>;

/// GSI on `accountId` shared by every account-scoped table.
pub const ACCOUNT_INDEX: &str = "accountId-index";
/// GSI on `connectionId` for files and jobs.
pub const CONNECTION_INDEX: &str = "connectionId-index";

/// The key-value store every handler reads and writes through.
///
/// Keys and attribute values arrive already namespaced.
#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, table: &str, key: Item) -> Result<Item, StoreError>;
    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError>;
    async fn delete_item(&self, table: &str, key: Item) -> Result<(), StoreError>;
    async fn query(
        &self,
        table: &str,
        key_condition: &str,
        values: Item,
    ) -> Result<Vec<Item>, StoreError>;
    async fn query_index(
        &self,
        table: &str,
        index: &str,
        key_condition: &str,
        values: Item,
    ) -> Result<Vec<Item>, StoreError>;
    async fn scan(&self, table: &str) -> Result<Vec<Item>, StoreError>;
}

/// DynamoDB-backed store. Every table is keyed on a single `id` attribute.
pub struct DynamoStore {
    client: DynamoClient,
}

impl DynamoStore {
    pub fn new(client: DynamoClient) -> Self {
        Self { client }
    }

    async fn query_pages(
        &self,
        table: &str,
        index: Option<&str>,
        key_condition: &str,
        values: Item,
    ) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let resp = self
                .client
                .query()
                .table_name(table)
                .set_index_name(index.map(str::to_string))
                .key_condition_expression(key_condition)
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    tracing::error!("DynamoDB query on {} failed: {:?}", table, e);
                    StoreError::Backend(format!("query on {} failed", table))
                })?;

            items.extend(resp.items.unwrap_or_default());
            match resp.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl KeyValueStore for DynamoStore {
    async fn get_item(&self, table: &str, key: Item) -> Result<Item, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("DynamoDB get_item on {} failed: {:?}", table, e);
                StoreError::Backend(format!("get_item on {} failed", table))
            })?;

        result.item.ok_or(StoreError::NotFound)
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("DynamoDB put_item on {} failed: {:?}", table, e);
                StoreError::Backend(format!("put_item on {} failed", table))
            })?;
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("DynamoDB delete_item on {} failed: {:?}", table, e);
                StoreError::Backend(format!("delete_item on {} failed", table))
            })?;
        Ok(())
    }

    async fn query(
        &self,
        table: &str,
        key_condition: &str,
        values: Item,
    ) -> Result<Vec<Item>, StoreError> {
        self.query_pages(table, None, key_condition, values).await
    }

    async fn query_index(
        &self,
        table: &str,
        index: &str,
        key_condition: &str,
        values: Item,
    ) -> Result<Vec<Item>, StoreError> {
        self.query_pages(table, Some(index), key_condition, values).await
    }

    async fn scan(&self, table: &str) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let resp = self
                .client
                .scan()
                .table_name(table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    tracing::error!("DynamoDB scan on {} failed: {:?}", table, e);
                    StoreError::Backend(format!("scan on {} failed", table))
                })?;

            items.extend(resp.items.unwrap_or_default());
            match resp.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }
}

// ---------- item helpers ----------

/// `{id: <key>}` primary key.
pub fn id_key(id: &str) -> Item {
    HashMap::from([("id".to_string(), AttributeValue::S(id.to_string()))])
}

/// Single-value expression map, e.g. `values(":accountId", "account:1")`.
pub fn values(name: &str, value: &str) -> Item {
    HashMap::from([(name.to_string(), AttributeValue::S(value.to_string()))])
}

pub fn str_attr(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

pub fn num_attr<T: FromStr>(item: &Item, name: &str) -> Option<T> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<T>().ok())
}

pub fn bool_attr(item: &Item, name: &str) -> Option<bool> {
    item.get(name).and_then(|v| v.as_bool().ok()).copied()
}

/// String list stored either as `L` of `S` or as a string set.
pub fn str_list_attr(item: &Item, name: &str) -> Vec<String> {
    match item.get(name) {
        Some(AttributeValue::L(list)) => list
            .iter()
            .filter_map(|v| v.as_s().ok().map(|s| s.to_string()))
            .collect(),
        Some(AttributeValue::Ss(set)) => set.clone(),
        _ => Vec::new(),
    }
}

/// Decode every item, skipping (and logging) rows that do not fit `T`.
pub fn decode_items<T>(
    items: &[Item],
    decode: impl Fn(&Item) -> Result<T, StoreError>,
) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match decode(item) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Skipping malformed item: {}", e);
                None
            }
        })
        .collect()
}

pub fn required_str(item: &Item, name: &str) -> Result<String, StoreError> {
    str_attr(item, name).ok_or_else(|| StoreError::Malformed(format!("missing {}", name)))
}

/// Overlay `changes` on a stored item. Attributes missing from `changes`
/// keep their stored value.
pub fn merge_item(mut stored: Item, changes: Item) -> Item {
    stored.extend(changes);
    stored
}

/// Incremental item builder; `None` values are left out entirely.
#[derive(Default)]
pub struct ItemBuilder {
    item: Item,
}

impl ItemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn s(mut self, name: &str, value: impl Into<String>) -> Self {
        self.item
            .insert(name.to_string(), AttributeValue::S(value.into()));
        self
    }

    pub fn opt_s(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.s(name, v),
            None => self,
        }
    }

    pub fn n(mut self, name: &str, value: impl ToString) -> Self {
        self.item
            .insert(name.to_string(), AttributeValue::N(value.to_string()));
        self
    }

    pub fn b(mut self, name: &str, value: bool) -> Self {
        self.item.insert(name.to_string(), AttributeValue::Bool(value));
        self
    }

    pub fn str_list(mut self, name: &str, values: &[String]) -> Self {
        self.item.insert(
            name.to_string(),
            AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect()),
        );
        self
    }

    pub fn build(self) -> Item {
        self.item
    }
}
