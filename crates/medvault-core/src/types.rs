//! Strong type definitions for MedVault.
//!
//! All identifiers are newtypes to prevent mixing a subject id with a
//! document id at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume into the inner string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// The patient who owns documents and grants access to them.
    SubjectId
}

string_id! {
    /// A medical document identifier.
    DocumentId
}

string_id! {
    /// Identifier of an issued credential (access token or emergency envelope).
    TokenId
}

string_id! {
    /// Identifier of a grant recorded on the ledger.
    GrantId
}

impl DocumentId {
    /// Generate a fresh random document id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl TokenId {
    /// Generate a fresh random token id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// What kind of medical information a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentCategory {
    Allergies,
    Medications,
    Conditions,
    BloodType,
    EmergencyContacts,
    Vaccinations,
    LabResults,
    Imaging,
    Prescriptions,
    Insurance,
    Other,
}

impl DocumentCategory {
    /// Every category, in declaration order.
    pub const ALL: [DocumentCategory; 11] = [
        DocumentCategory::Allergies,
        DocumentCategory::Medications,
        DocumentCategory::Conditions,
        DocumentCategory::BloodType,
        DocumentCategory::EmergencyContacts,
        DocumentCategory::Vaccinations,
        DocumentCategory::LabResults,
        DocumentCategory::Imaging,
        DocumentCategory::Prescriptions,
        DocumentCategory::Insurance,
        DocumentCategory::Other,
    ];

    /// Categories a first responder may see.
    pub const EMERGENCY: [DocumentCategory; 6] = [
        DocumentCategory::Allergies,
        DocumentCategory::Medications,
        DocumentCategory::Conditions,
        DocumentCategory::BloodType,
        DocumentCategory::EmergencyContacts,
        DocumentCategory::Vaccinations,
    ];

    /// Stable string form, used in storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Allergies => "ALLERGIES",
            DocumentCategory::Medications => "MEDICATIONS",
            DocumentCategory::Conditions => "CONDITIONS",
            DocumentCategory::BloodType => "BLOOD_TYPE",
            DocumentCategory::EmergencyContacts => "EMERGENCY_CONTACTS",
            DocumentCategory::Vaccinations => "VACCINATIONS",
            DocumentCategory::LabResults => "LAB_RESULTS",
            DocumentCategory::Imaging => "IMAGING",
            DocumentCategory::Prescriptions => "PRESCRIPTIONS",
            DocumentCategory::Insurance => "INSURANCE",
            DocumentCategory::Other => "OTHER",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    /// Whether responders may see this category in an emergency.
    pub fn is_emergency(&self) -> bool {
        Self::EMERGENCY.contains(self)
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The access category a credential is issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessCategory {
    /// Life-critical disclosure to a first responder.
    Emergency,
    /// Routine sharing with a researcher or clinician.
    Share,
}

impl AccessCategory {
    /// Document categories a credential of this category authorizes.
    pub fn authorized_categories(&self) -> &'static [DocumentCategory] {
        match self {
            AccessCategory::Emergency => &DocumentCategory::EMERGENCY,
            AccessCategory::Share => &DocumentCategory::ALL,
        }
    }

    /// Stable string form, used in storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessCategory::Emergency => "EMERGENCY",
            AccessCategory::Share => "SHARE",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EMERGENCY" => Some(AccessCategory::Emergency),
            "SHARE" => Some(AccessCategory::Share),
            _ => None,
        }
    }
}

impl fmt::Display for AccessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking for a disclosure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderMeta {
    /// Display name of the responder.
    pub name: String,

    /// Hospital, ambulance service, research group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Professional license or badge number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,

    /// On-chain address the grant is issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,

    /// Free-form location of the access event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ResponderMeta {
    /// Responder with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Set the wallet address.
    pub fn with_wallet_address(mut self, address: impl Into<String>) -> Self {
        self.wallet_address = Some(address.into());
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
