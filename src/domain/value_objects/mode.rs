//! Deployment execution mode

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the tree walk turns decisions into remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Every remote call happens on the walking thread, depth first.
    Direct,
    /// Directory operations happen on the walking thread; file transfers and
    /// deletes are queued for the transfer workers.
    #[default]
    Queued,
}

impl DeployMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployMode::Direct => "direct",
            DeployMode::Queued => "queued",
        }
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "sync" | "recursive" => Ok(DeployMode::Direct),
            "queued" | "parallel" => Ok(DeployMode::Queued),
            other => Err(format!(
                "unknown deploy mode '{}' (expected 'direct' or 'queued')",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("direct".parse::<DeployMode>(), Ok(DeployMode::Direct));
        assert_eq!("Recursive".parse::<DeployMode>(), Ok(DeployMode::Direct));
        assert_eq!("parallel".parse::<DeployMode>(), Ok(DeployMode::Queued));
        assert!("bogus".parse::<DeployMode>().is_err());
    }

    #[test]
    fn default_is_queued() {
        assert_eq!(DeployMode::default(), DeployMode::Queued);
    }
}
