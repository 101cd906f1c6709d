use std::fmt;

/// Add `prefix` to `id` unless it is already there.
///
/// The check is exact and case-sensitive (the trailing colon is part of the
/// prefix). Safe on ids shorter than the prefix.
pub fn ensure_prefix(id: &str, prefix: &str) -> String {
    if id.starts_with(prefix) {
        id.to_string()
    } else {
        format!("{}{}", prefix, id)
    }
}

/// Remove `prefix` from `id` if present, otherwise return `id` unchanged.
pub fn strip_prefix(id: &str, prefix: &str) -> String {
    id.strip_prefix(prefix).unwrap_or(id).to_string()
}

/// Every entity type that lives behind a namespaced id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    User,
    Platform,
    PlatformSource,
    Connection,
    File,
    Activity,
    Job,
    Client,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Account,
        EntityKind::User,
        EntityKind::Platform,
        EntityKind::PlatformSource,
        EntityKind::Connection,
        EntityKind::File,
        EntityKind::Activity,
        EntityKind::Job,
        EntityKind::Client,
    ];

    /// Kind whose prefix `id` carries, if any.
    pub fn of(id: &str) -> Option<EntityKind> {
        Self::ALL.into_iter().find(|kind| id.starts_with(kind.prefix()))
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            EntityKind::Account => "account:",
            EntityKind::User => "user:",
            EntityKind::Platform => "platform:",
            EntityKind::PlatformSource => "platform-source:",
            EntityKind::Connection => "connection:",
            EntityKind::File => "file:",
            EntityKind::Activity => "activity:",
            EntityKind::Job => "job:",
            EntityKind::Client => "client:",
        }
    }

    /// Canonical storage form of `raw` for this kind.
    pub fn key(self, raw: &str) -> String {
        ensure_prefix(raw, self.prefix())
    }

    /// API-facing form of `raw` for this kind.
    pub fn external(self, raw: &str) -> String {
        strip_prefix(raw, self.prefix())
    }
}

/// A typed identifier: entity kind plus the bare opaque id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    kind: EntityKind,
    id: String,
}

impl EntityId {
    /// Accepts either the prefixed or the bare form.
    pub fn new(kind: EntityKind, raw: &str) -> Self {
        Self {
            kind,
            id: strip_prefix(raw, kind.prefix()),
        }
    }

    /// Fresh random id of the given kind.
    pub fn generate(kind: EntityKind) -> Self {
        Self {
            kind,
            id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Prefixed form, used for every storage key and attribute.
    pub fn key(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.id)
    }

    /// Bare form, used across the API boundary.
    pub fn external(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id)
    }
}
