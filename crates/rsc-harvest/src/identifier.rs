//! Article identifiers: validation and filesystem-safe keys.

use crate::config::PortalConfig;
use crate::error::{HarvestError, HarvestResult};

/// Directory key for an identifier: its last `/` segment with every `.`
/// removed.
pub fn sanitize(identifier: &str) -> String {
    identifier
        .rsplit('/')
        .next()
        .unwrap_or(identifier)
        .replace('.', "")
}

/// The registrant prefix, i.e. everything before the first `/`.
pub fn registrant(identifier: &str) -> &str {
    identifier.split('/').next().unwrap_or(identifier)
}

/// A validated request for one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRequest {
    identifier: String,
    url: String,
    key: String,
}

impl ArticleRequest {
    /// Validate `identifier` against the portal and derive its URL and key.
    pub fn parse(identifier: &str, portal: &PortalConfig) -> HarvestResult<Self> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(HarvestError::Validation("identifier is empty".into()));
        }

        let Some((prefix, suffix)) = identifier.split_once('/') else {
            return Err(HarvestError::Validation(format!(
                "'{identifier}' has no registrant prefix"
            )));
        };
        if prefix != portal.registrant {
            return Err(HarvestError::Validation(format!(
                "'{identifier}' has registrant {prefix}, expected {}",
                portal.registrant
            )));
        }
        if suffix.trim_matches('/').is_empty() {
            return Err(HarvestError::Validation(format!(
                "'{identifier}' has an empty suffix"
            )));
        }

        let key = sanitize(identifier);
        if key.is_empty() {
            return Err(HarvestError::Validation(format!(
                "'{identifier}' sanitizes to an empty key"
            )));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HarvestError::Validation(format!(
                "'{identifier}' yields unsafe directory name '{key}'"
            )));
        }

        Ok(Self {
            url: format!("{}{identifier}", portal.resolver_base),
            identifier: identifier.to_string(),
            key,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Resolvable article landing URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sanitized directory key.
    pub fn key(&self) -> &str {
        &self.key
    }
}
