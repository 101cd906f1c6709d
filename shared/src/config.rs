use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Runtime configuration. Every field can be overridden with an `APP_`
/// prefixed environment variable, e.g. `APP_USERS_TABLE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub accounts_table: String,
    pub users_table: String,
    pub clients_table: String,
    pub plans_table: String,
    pub platforms_table: String,
    pub platform_sources_table: String,
    pub connections_table: String,
    pub files_table: String,
    pub activity_table: String,
    pub jobs_table: String,
    pub branding_table: String,
    pub logo_bucket: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub frontend_url: String,
    pub custom_domain_target: String,
    pub allow_identity_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts_table: "cloudkeep-accounts".to_string(),
            users_table: "cloudkeep-users".to_string(),
            clients_table: "cloudkeep-clients".to_string(),
            plans_table: "cloudkeep-plans".to_string(),
            platforms_table: "cloudkeep-platforms".to_string(),
            platform_sources_table: "cloudkeep-platform-sources".to_string(),
            connections_table: "cloudkeep-connections".to_string(),
            files_table: "cloudkeep-files".to_string(),
            activity_table: "cloudkeep-activity".to_string(),
            jobs_table: "cloudkeep-jobs".to_string(),
            branding_table: "cloudkeep-branding".to_string(),
            logo_bucket: "cloudkeep-branding-logos".to_string(),
            stripe_secret_key: String::new(),
            stripe_api_base: "https://api.stripe.com/v1".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            custom_domain_target: "domains.cloudkeep.app".to_string(),
            allow_identity_headers: false,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("APP_"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}
