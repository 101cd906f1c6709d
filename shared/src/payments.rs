use crate::errors::PaymentsError;
use crate::types::Subscription;
use async_trait::async_trait;
use serde_json::Value;

#[cfg(any(test, feature = "mocks"))]
use mockall::automock;

/// Billing operations the API needs from the payments provider.
#[cfg_attr(any(test, feature = "mocks"), automock)]
#[async_trait]
pub trait PaymentsProvider: Send + Sync {
    /// Returns the new customer id.
    async fn create_customer(&self, email: &str, account_id: &str)
        -> Result<String, PaymentsError>;
    /// Returns the hosted checkout URL.
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        account_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, PaymentsError>;
    /// Returns the hosted billing portal URL.
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, PaymentsError>;
    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, PaymentsError>;
    /// Cancels at the end of the current period.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentsError>;
}

/// Stripe REST client (form-encoded requests, bearer secret key).
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_form(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, PaymentsError> {
        let resp = self
            .http
            .post(format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentsError::Request(e.to_string()))?;
        Self::read(resp).await
    }

    async fn get(&self, path: &str) -> Result<Value, PaymentsError> {
        let resp = self
            .http
            .get(format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaymentsError::Request(e.to_string()))?;
        Self::read(resp).await
    }

    async fn read(resp: reqwest::Response) -> Result<Value, PaymentsError> {
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| PaymentsError::Decode(e.to_string()))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            tracing::error!("Stripe returned {}: {}", status, message);
            return Err(PaymentsError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}

fn string_field(body: &Value, name: &str) -> Result<String, PaymentsError> {
    body[name]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| PaymentsError::Decode(format!("missing {}", name)))
}

fn subscription_from_json(body: &Value) -> Result<Subscription, PaymentsError> {
    Ok(Subscription {
        id: string_field(body, "id")?,
        status: string_field(body, "status")?,
        current_period_end: body["current_period_end"].as_i64(),
        cancel_at_period_end: body["cancel_at_period_end"].as_bool().unwrap_or(false),
    })
}

#[async_trait]
impl PaymentsProvider for StripeClient {
    async fn create_customer(
        &self,
        email: &str,
        account_id: &str,
    ) -> Result<String, PaymentsError> {
        let body = self
            .post_form(
                "customers",
                &[("email", email), ("metadata[accountId]", account_id)],
            )
            .await?;
        string_field(&body, "id")
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        account_id: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, PaymentsError> {
        let body = self
            .post_form(
                "checkout/sessions",
                &[
                    ("mode", "subscription"),
                    ("customer", customer_id),
                    ("line_items[0][price]", price_id),
                    ("line_items[0][quantity]", "1"),
                    ("client_reference_id", account_id),
                    ("metadata[accountId]", account_id),
                    ("success_url", success_url),
                    ("cancel_url", cancel_url),
                ],
            )
            .await?;
        string_field(&body, "url")
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, PaymentsError> {
        let body = self
            .post_form(
                "billing_portal/sessions",
                &[("customer", customer_id), ("return_url", return_url)],
            )
            .await?;
        string_field(&body, "url")
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<Subscription, PaymentsError> {
        let body = self.get(&format!("subscriptions/{}", subscription_id)).await?;
        subscription_from_json(&body)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, PaymentsError> {
        let body = self
            .post_form(
                &format!("subscriptions/{}", subscription_id),
                &[("cancel_at_period_end", "true")],
            )
            .await?;
        subscription_from_json(&body)
    }
}
