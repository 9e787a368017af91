//! Client interfaces
//!
//! Each interface is an independently deployed client surface with its own
//! live content bundle.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Logical client interface owning one "current" content bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    /// Mobile application
    Mobile,
    /// Web application for financers
    WebFinancer,
    /// Web application for beneficiaries
    WebBeneficiary,
}

impl Interface {
    /// Every interface, in declaration order
    pub const ALL: [Interface; 3] = [
        Interface::Mobile,
        Interface::WebFinancer,
        Interface::WebBeneficiary,
    ];

    /// Stable wire name, also used as the storage namespace
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Interface::Mobile => "mobile",
            Interface::WebFinancer => "web_financer",
            Interface::WebBeneficiary => "web_beneficiary",
        }
    }
}

impl Display for Interface {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interface {
    type Err = UnknownInterface;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interface::ALL
            .into_iter()
            .find(|interface| interface.as_str() == s)
            .ok_or_else(|| UnknownInterface(s.to_string()))
    }
}

/// Returned when parsing a name outside the closed interface set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interface '{0}' (expected one of: mobile, web_financer, web_beneficiary)")]
pub struct UnknownInterface(pub String);
