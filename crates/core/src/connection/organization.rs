//! Organization URL parsing
//!
//! Accepted shapes: `https://dev.azure.com/{org}[/...]` and
//! `https://{org}.visualstudio.com[/...]`. Anything else is rejected so tenant
//! discovery can fail fast without touching the network.

use url::Url;
use workbridge_domain::constants::{DEV_AZURE_HOST, VISUALSTUDIO_HOST_SUFFIX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizationHost {
    DevAzure,
    VisualStudio,
}

/// Organization named by a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationRef {
    pub name: String,
    pub host: OrganizationHost,
}

impl OrganizationRef {
    /// Canonical organization root, without project or API segments.
    #[must_use]
    pub fn base_url(&self) -> String {
        match self.host {
            OrganizationHost::DevAzure => format!("https://{DEV_AZURE_HOST}/{}", self.name),
            OrganizationHost::VisualStudio => {
                format!("https://{}{VISUALSTUDIO_HOST_SUFFIX}", self.name)
            }
        }
    }
}

/// Extract the organization from one of the two supported URL shapes.
#[must_use]
pub fn parse_organization(raw: &str) -> Option<OrganizationRef> {
    let url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();

    if host == DEV_AZURE_HOST {
        let name = url.path_segments()?.next().filter(|s| !s.is_empty())?;
        return Some(OrganizationRef { name: name.to_string(), host: OrganizationHost::DevAzure });
    }

    let name = host.strip_suffix(VISUALSTUDIO_HOST_SUFFIX)?;
    if name.is_empty() || name.contains('.') {
        return None;
    }
    Some(OrganizationRef { name: name.to_string(), host: OrganizationHost::VisualStudio })
}
