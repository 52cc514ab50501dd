//! Pipeline processing stages.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in the pipeline at which a step runs. The discriminants are the
/// numeric codes the host reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum ProcessingStage {
    Prevalidation = 10,
    Preoperation = 20,
    Postoperation = 40,
}

impl ProcessingStage {
    /// Returns the numeric code reported by the host.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Maps a numeric code to a known stage. Unknown codes return `None`.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(Self::Prevalidation),
            20 => Some(Self::Preoperation),
            40 => Some(Self::Postoperation),
            _ => None,
        }
    }
}

impl TryFrom<i32> for ProcessingStage {
    type Error = TypesError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(TypesError::UnknownStage(code))
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prevalidation => "Prevalidation",
            Self::Preoperation => "Preoperation",
            Self::Postoperation => "Postoperation",
        };
        write!(f, "{name} ({})", self.code())
    }
}
