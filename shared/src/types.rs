use crate::errors::StoreError;
use crate::ids::EntityKind;
use crate::store::{
    bool_attr, num_attr, required_str, str_attr, str_list_attr, Item, ItemBuilder,
};
use serde::{Deserialize, Serialize};

// Domain records hold bare ids. `from_item` strips namespacing when reading a
// row, `to_item` puts it back when writing.

// ========== ACCOUNT ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub billing_email: Option<String>,
    pub plan_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_subscription_id: Option<String>,
    pub created_at: String,
}

impl Account {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::Account.external(&required_str(item, "id")?),
            name: str_attr(item, "name").unwrap_or_default(),
            owner_id: EntityKind::User.external(&str_attr(item, "ownerId").unwrap_or_default()),
            billing_email: str_attr(item, "billingEmail"),
            plan_id: str_attr(item, "planId"),
            stripe_customer_id: str_attr(item, "stripeCustomerId"),
            stripe_subscription_id: str_attr(item, "stripeSubscriptionId"),
            created_at: str_attr(item, "createdAt").unwrap_or_default(),
        })
    }

    pub fn to_item(&self) -> Item {
        ItemBuilder::new()
            .s("id", EntityKind::Account.key(&self.id))
            .s("name", &self.name)
            .s("ownerId", EntityKind::User.key(&self.owner_id))
            .opt_s("billingEmail", self.billing_email.as_deref())
            .opt_s("planId", self.plan_id.as_deref())
            .opt_s("stripeCustomerId", self.stripe_customer_id.as_deref())
            .opt_s("stripeSubscriptionId", self.stripe_subscription_id.as_deref())
            .s("createdAt", &self.created_at)
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub billing_email: Option<String>,
}

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "member" => Some(Role::Member),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    pub fn can_manage(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub account_id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub status: String, // active | invited
    pub invited_by: Option<String>,
    pub created_at: String,
}

impl User {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::User.external(&required_str(item, "id")?),
            account_id: EntityKind::Account.external(&required_str(item, "accountId")?),
            email: str_attr(item, "email").unwrap_or_default(),
            name: str_attr(item, "name"),
            role: str_attr(item, "role")
                .and_then(|r| Role::parse(&r))
                .unwrap_or(Role::Member),
            status: str_attr(item, "status").unwrap_or_else(|| "active".to_string()),
            invited_by: str_attr(item, "invitedBy").map(|u| EntityKind::User.external(&u)),
            created_at: str_attr(item, "createdAt").unwrap_or_default(),
        })
    }

    pub fn to_item(&self) -> Item {
        ItemBuilder::new()
            .s("id", EntityKind::User.key(&self.id))
            .s("accountId", EntityKind::Account.key(&self.account_id))
            .s("email", &self.email)
            .opt_s("name", self.name.as_deref())
            .s("role", self.role.as_str())
            .s("status", &self.status)
            .opt_s("invitedBy", self.invited_by.as_ref().map(|u| EntityKind::User.key(u)))
            .s("createdAt", &self.created_at)
            .build()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteMemberRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: Option<String>,
}

// ========== CLIENT ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub contact_email: Option<String>,
    pub created_at: String,
}

impl Client {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::Client.external(&required_str(item, "id")?),
            account_id: EntityKind::Account.external(&required_str(item, "accountId")?),
            name: str_attr(item, "name").unwrap_or_default(),
            contact_email: str_attr(item, "contactEmail"),
            created_at: str_attr(item, "createdAt").unwrap_or_default(),
        })
    }

    pub fn to_item(&self) -> Item {
        ItemBuilder::new()
            .s("id", EntityKind::Client.key(&self.id))
            .s("accountId", EntityKind::Account.key(&self.account_id))
            .s("name", &self.name)
            .opt_s("contactEmail", self.contact_email.as_deref())
            .s("createdAt", &self.created_at)
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
}

// ========== PLAN ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub price_monthly: i64, // minor units
    pub currency: String,
    pub features: Vec<String>,
    pub active: bool,
    #[serde(skip_serializing)]
    pub stripe_price_id: Option<String>,
}

impl Plan {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: required_str(item, "id")?,
            name: str_attr(item, "name").unwrap_or_default(),
            price_monthly: num_attr(item, "priceMonthly").unwrap_or(0),
            currency: str_attr(item, "currency").unwrap_or_else(|| "usd".to_string()),
            features: str_list_attr(item, "features"),
            active: bool_attr(item, "active").unwrap_or(false),
            stripe_price_id: str_attr(item, "stripePriceId"),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub plan_id: Option<String>,
}

/// Subscription state as reported by the payments provider.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub plan_id: Option<String>,
    pub status: String,
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RedirectUrl {
    pub url: String,
}

// ========== BRANDING ==========
#[derive(Debug, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    pub account_id: String,
    pub company_name: Option<String>,
    pub primary_color: Option<String>,
    pub custom_domain: Option<String>,
    pub domain_status: Option<String>, // pending | verified
    pub logo_key: Option<String>,
    pub updated_at: Option<String>,
}

impl Branding {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            account_id: EntityKind::Account.external(&required_str(item, "id")?),
            company_name: str_attr(item, "companyName"),
            primary_color: str_attr(item, "primaryColor"),
            custom_domain: str_attr(item, "customDomain"),
            domain_status: str_attr(item, "domainStatus"),
            logo_key: str_attr(item, "logoKey"),
            updated_at: str_attr(item, "updatedAt"),
        })
    }

    pub fn to_item(&self) -> Item {
        ItemBuilder::new()
            .s("id", EntityKind::Account.key(&self.account_id))
            .opt_s("companyName", self.company_name.as_deref())
            .opt_s("primaryColor", self.primary_color.as_deref())
            .opt_s("customDomain", self.custom_domain.as_deref())
            .opt_s("domainStatus", self.domain_status.as_deref())
            .opt_s("logoKey", self.logo_key.as_deref())
            .opt_s("updatedAt", self.updated_at.as_deref())
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBrandingRequest {
    pub company_name: Option<String>,
    pub primary_color: Option<String>,
    pub custom_domain: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoUploadRequest {
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogoUpload {
    pub upload_url: String,
    pub logo_key: String,
    pub method: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    pub record_type: String,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DnsInstructions {
    pub domain: String,
    pub status: String,
    pub records: Vec<DnsRecord>,
    pub instructions: Vec<String>,
}

// ========== PLATFORM ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub auth_type: Option<String>,
    pub enabled: bool,
}

impl Platform {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::Platform.external(&required_str(item, "id")?),
            name: str_attr(item, "name").unwrap_or_default(),
            category: str_attr(item, "category"),
            description: str_attr(item, "description"),
            auth_type: str_attr(item, "authType"),
            enabled: bool_attr(item, "enabled").unwrap_or(true),
        })
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSource {
    pub id: String,
    pub platform_id: String,
    pub name: String,
    pub description: Option<String>,
}

impl PlatformSource {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::PlatformSource.external(&required_str(item, "id")?),
            platform_id: EntityKind::Platform.external(&required_str(item, "platformId")?),
            name: str_attr(item, "name").unwrap_or_default(),
            description: str_attr(item, "description"),
        })
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDetail {
    #[serde(flatten)]
    pub platform: Platform,
    pub sources: Vec<PlatformSource>,
}

// ========== CONNECTION ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub account_id: String,
    pub platform_id: String,
    pub platform_source_id: Option<String>,
    pub name: String,
    pub status: String, // pending | active | paused | error
    pub created_by: Option<String>,
    pub created_at: String,
    pub last_sync_at: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
}

impl Connection {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::Connection.external(&required_str(item, "id")?),
            account_id: EntityKind::Account.external(&required_str(item, "accountId")?),
            platform_id: EntityKind::Platform.external(&required_str(item, "platformId")?),
            platform_source_id: str_attr(item, "platformSourceId")
                .map(|s| EntityKind::PlatformSource.external(&s)),
            name: str_attr(item, "name").unwrap_or_default(),
            status: str_attr(item, "status").unwrap_or_else(|| "pending".to_string()),
            created_by: str_attr(item, "createdBy").map(|u| EntityKind::User.external(&u)),
            created_at: str_attr(item, "createdAt").unwrap_or_default(),
            last_sync_at: str_attr(item, "lastSyncAt"),
            access_token: str_attr(item, "accessToken"),
            refresh_token: str_attr(item, "refreshToken"),
        })
    }

    pub fn to_item(&self) -> Item {
        ItemBuilder::new()
            .s("id", EntityKind::Connection.key(&self.id))
            .s("accountId", EntityKind::Account.key(&self.account_id))
            .s("platformId", EntityKind::Platform.key(&self.platform_id))
            .opt_s(
                "platformSourceId",
                self.platform_source_id
                    .as_ref()
                    .map(|s| EntityKind::PlatformSource.key(s)),
            )
            .s("name", &self.name)
            .s("status", &self.status)
            .opt_s("createdBy", self.created_by.as_ref().map(|u| EntityKind::User.key(u)))
            .s("createdAt", &self.created_at)
            .opt_s("lastSyncAt", self.last_sync_at.as_deref())
            .opt_s("accessToken", self.access_token.as_deref())
            .opt_s("refreshToken", self.refresh_token.as_deref())
            .build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    pub platform_id: Option<String>,
    pub platform_source_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConnectionRequest {
    pub name: Option<String>,
    pub status: Option<String>,
}

// ========== FILE ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    pub connection_id: String,
    pub account_id: String,
    pub name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub modified_at: Option<String>,
    pub backed_up_at: Option<String>,
}

impl File {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::File.external(&required_str(item, "id")?),
            connection_id: EntityKind::Connection.external(&required_str(item, "connectionId")?),
            account_id: EntityKind::Account.external(&required_str(item, "accountId")?),
            name: str_attr(item, "name").unwrap_or_default(),
            path: str_attr(item, "path").unwrap_or_default(),
            size: num_attr(item, "size").unwrap_or(0),
            mime_type: str_attr(item, "mimeType"),
            modified_at: str_attr(item, "modifiedAt"),
            backed_up_at: str_attr(item, "backedUpAt"),
        })
    }
}

// ========== ACTIVITY ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub account_id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub message: String,
    pub actor_id: Option<String>,
    pub subject_id: Option<String>,
    pub subject_type: Option<String>,
    pub created_at: String,
}

impl Activity {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        // subjects can be any entity; strip whichever namespace they carry
        let subject = str_attr(item, "subjectId");
        let subject_kind = subject.as_deref().and_then(EntityKind::of);
        Ok(Self {
            id: EntityKind::Activity.external(&required_str(item, "id")?),
            account_id: EntityKind::Account.external(&required_str(item, "accountId")?),
            activity_type: str_attr(item, "type").unwrap_or_default(),
            message: str_attr(item, "message").unwrap_or_default(),
            actor_id: str_attr(item, "actorId").map(|u| EntityKind::User.external(&u)),
            subject_id: match (subject, subject_kind) {
                (Some(s), Some(kind)) => Some(kind.external(&s)),
                (s, _) => s,
            },
            subject_type: subject_kind.map(|k| k.prefix().trim_end_matches(':').to_string()),
            created_at: str_attr(item, "createdAt").unwrap_or_default(),
        })
    }
}

// ========== JOB ==========
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub account_id: String,
    pub connection_id: String,
    pub status: String, // queued | running | succeeded | failed
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub files_processed: i64,
    pub bytes_processed: i64,
    pub error: Option<String>,
}

impl Job {
    pub fn from_item(item: &Item) -> Result<Self, StoreError> {
        Ok(Self {
            id: EntityKind::Job.external(&required_str(item, "id")?),
            account_id: EntityKind::Account.external(&required_str(item, "accountId")?),
            connection_id: EntityKind::Connection.external(&required_str(item, "connectionId")?),
            status: str_attr(item, "status").unwrap_or_else(|| "queued".to_string()),
            started_at: str_attr(item, "startedAt"),
            finished_at: str_attr(item, "finishedAt"),
            files_processed: num_attr(item, "filesProcessed").unwrap_or(0),
            bytes_processed: num_attr(item, "bytesProcessed").unwrap_or(0),
            error: str_attr(item, "error"),
        })
    }
}
