//! Pipeline message names.
//!
//! The host reports the triggering operation as a plain string. Filters parse
//! it against this enum with an exact, case-sensitive match; names outside
//! the enum (custom actions, for instance) do not parse.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Business operation that triggered a pipeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageName {
    Create,
    Update,
    Delete,
    Retrieve,
    RetrieveMultiple,
    Associate,
    Disassociate,
    SetState,
    SetStateDynamicEntity,
    Assign,
    GrantAccess,
    ModifyAccess,
    RevokeAccess,
    Merge,
    AddToQueue,
    Close,
    Win,
    Lose,
    QualifyLead,
    Send,
}

impl MessageName {
    /// All known messages, in declaration order.
    pub const ALL: [MessageName; 20] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::Retrieve,
        Self::RetrieveMultiple,
        Self::Associate,
        Self::Disassociate,
        Self::SetState,
        Self::SetStateDynamicEntity,
        Self::Assign,
        Self::GrantAccess,
        Self::ModifyAccess,
        Self::RevokeAccess,
        Self::Merge,
        Self::AddToQueue,
        Self::Close,
        Self::Win,
        Self::Lose,
        Self::QualifyLead,
        Self::Send,
    ];

    /// The name exactly as the host reports it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Retrieve => "Retrieve",
            Self::RetrieveMultiple => "RetrieveMultiple",
            Self::Associate => "Associate",
            Self::Disassociate => "Disassociate",
            Self::SetState => "SetState",
            Self::SetStateDynamicEntity => "SetStateDynamicEntity",
            Self::Assign => "Assign",
            Self::GrantAccess => "GrantAccess",
            Self::ModifyAccess => "ModifyAccess",
            Self::RevokeAccess => "RevokeAccess",
            Self::Merge => "Merge",
            Self::AddToQueue => "AddToQueue",
            Self::Close => "Close",
            Self::Win => "Win",
            Self::Lose => "Lose",
            Self::QualifyLead => "QualifyLead",
            Self::Send => "Send",
        }
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageName {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|message| message.as_str() == s)
            .ok_or_else(|| TypesError::UnknownMessage(s.to_string()))
    }
}
