//! Common types used throughout the login queue service

use serde::{Deserialize, Serialize};

/// Stable identifier of a client (the character GUID)
pub type ClientId = u32;

/// Privilege tier of the account a client logs in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Normal,
    Tutor,
    SeniorTutor,
    GameMaster,
    CommunityManager,
    God,
}

impl AccountType {
    /// Lowest account type that is never placed on the waiting list
    pub const ADMINISTRATIVE_THRESHOLD: AccountType = AccountType::GameMaster;

    /// Whether this tier is at or above the administrative threshold
    pub fn is_administrative(self) -> bool {
        self >= Self::ADMINISTRATIVE_THRESHOLD
    }
}

impl Default for AccountType {
    fn default() -> Self {
        AccountType::Normal
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Normal => write!(f, "Normal"),
            AccountType::Tutor => write!(f, "Tutor"),
            AccountType::SeniorTutor => write!(f, "SeniorTutor"),
            AccountType::GameMaster => write!(f, "GameMaster"),
            AccountType::CommunityManager => write!(f, "CommunityManager"),
            AccountType::God => write!(f, "God"),
        }
    }
}

/// What the admission queue needs to know about a connecting client
pub trait ClientDescriptor {
    /// Stable identity used for waiting list lookups
    fn client_id(&self) -> ClientId;

    /// Capability that skips the waiting list entirely
    fn can_always_login(&self) -> bool;

    /// Privilege tier of the client's account
    fn account_type(&self) -> AccountType;

    /// Whether the client holds the priority (premium) tier
    fn is_premium(&self) -> bool;
}

/// Plain-data client descriptor, as handed over by the connection handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginClient {
    pub id: ClientId,
    pub name: String,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub can_always_login: bool,
}

impl LoginClient {
    /// Ordinary client without premium status
    pub fn normal(id: ClientId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            account_type: AccountType::Normal,
            premium: false,
            can_always_login: false,
        }
    }

    /// Client holding the priority tier
    pub fn premium(id: ClientId, name: impl Into<String>) -> Self {
        Self {
            premium: true,
            ..Self::normal(id, name)
        }
    }

    /// Client with the given account type
    pub fn with_account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = account_type;
        self
    }

    /// Client with the bypass capability
    pub fn with_bypass(mut self) -> Self {
        self.can_always_login = true;
        self
    }
}

impl ClientDescriptor for LoginClient {
    fn client_id(&self) -> ClientId {
        self.id
    }

    fn can_always_login(&self) -> bool {
        self.can_always_login
    }

    fn account_type(&self) -> AccountType {
        self.account_type
    }

    fn is_premium(&self) -> bool {
        self.premium
    }
}
