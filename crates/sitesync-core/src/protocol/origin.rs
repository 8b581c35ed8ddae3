//! Origin checks for the cross-context channel.
//!
//! By default the page accepts messages from any origin and addresses its own
//! messages to any origin (`*`).  Deployments that know their editor's origin
//! can narrow both with an allow-list and an explicit target origin.

/// Which origins may send messages to the page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Accept every sender, including ones that declare no origin.
    #[default]
    AllowAny,
    /// Accept only senders whose origin is listed exactly.
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Builds a policy from a list of origins; an empty list means
    /// [`OriginPolicy::AllowAny`].
    pub fn from_origins(origins: Vec<String>) -> Self {
        if origins.is_empty() {
            OriginPolicy::AllowAny
        } else {
            OriginPolicy::AllowList(origins)
        }
    }

    /// Returns `true` when a message from `origin` should be processed.
    pub fn permits(&self, origin: Option<&str>) -> bool {
        match self {
            OriginPolicy::AllowAny => true,
            OriginPolicy::AllowList(allowed) => {
                origin.is_some_and(|o| allowed.iter().any(|a| a == o))
            }
        }
    }
}

/// Which receivers the page's outbound messages are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetOrigin {
    /// `*`: deliver to whoever is hosting the page.
    #[default]
    Any,
    /// Deliver only to a host with exactly this origin.
    Exact(String),
}

impl TargetOrigin {
    pub fn parse(raw: &str) -> Self {
        if raw == "*" {
            TargetOrigin::Any
        } else {
            TargetOrigin::Exact(raw.to_string())
        }
    }

    pub fn matches(&self, host_origin: Option<&str>) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(expected) => host_origin == Some(expected.as_str()),
        }
    }
}
