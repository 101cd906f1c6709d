use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use cloudkeep_shared::config::Config;
use cloudkeep_shared::logos::S3LogoStorage;
use cloudkeep_shared::payments::StripeClient;
use cloudkeep_shared::store::DynamoStore;
use cloudkeep_shared::AppState;
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::load().map_err(|e| Error::from(format!("invalid configuration: {}", e)))?;
    if config.stripe_secret_key.is_empty() {
        tracing::warn!("APP_STRIPE_SECRET_KEY is not set; billing calls will fail");
    }

    // AWS clients are built once per container and reused across invocations
    let aws = aws_config::load_from_env().await;
    let store = DynamoStore::new(DynamoClient::new(&aws));
    let logos = S3LogoStorage::new(S3Client::new(&aws), config.logo_bucket.clone());
    let payments = StripeClient::new(
        config.stripe_secret_key.clone(),
        config.stripe_api_base.clone(),
    );

    let state = AppState::new(config, Arc::new(store), Arc::new(payments), Arc::new(logos));

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
