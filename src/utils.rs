//! src/utils.rs

use url::Url;

/// Builds links into the frontend application from its configured origin.
#[derive(Debug, Clone)]
pub struct FrontendUrl {
    base: Url,
}

impl FrontendUrl {
    /// parse base url; only scheme, host and port are kept when building links
    pub fn parse(base_url: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() || !base.has_host() {
            return Err(url::ParseError::EmptyHost);
        }
        Ok(Self { base })
    }

    pub fn build(
        &self,
        path: &str,
        query: Option<&[(&str, &str)]>,
        fragment: Option<&str>,
    ) -> String {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(None);
        if let Some(pairs) = query.filter(|pairs| !pairs.is_empty()) {
            url.query_pairs_mut().extend_pairs(pairs.iter());
        }
        url.set_fragment(fragment);
        url.into()
    }
}
