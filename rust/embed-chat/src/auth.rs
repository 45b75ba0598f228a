//! Collaborators the launch sequence calls out to.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::{ContainerId, EmbedError};

/// Graph endpoint used by [`GraphSiteResolver`] unless told otherwise.
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0/";

/// Supplies the hostname the chat is served from and the access token it
/// is opened with.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait AuthProvider {
    /// Hostname (or origin) of the site hosting the chat surface
    fn hostname(&self) -> &str;

    /// A fresh access token for that site
    async fn get_token(&self) -> Result<String, EmbedError>;
}

/// Finds the site a storage container lives on.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait SiteResolver {
    /// The site URL for `container`, authenticated with `token`
    async fn resolve_site_url(
        &self,
        container: &ContainerId,
        token: &str,
    ) -> Result<Url, EmbedError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Drive {
    web_url: String,
}

/// Resolves container sites through the Graph `fileStorage` API.
///
/// The container's drive reports a `webUrl` pointing at its document
/// library; the site is that URL with the library segment removed.
#[derive(Clone, Debug)]
pub struct GraphSiteResolver {
    client: Client,
    endpoint: String,
}

impl Default for GraphSiteResolver {
    fn default() -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
        }
    }
}

impl GraphSiteResolver {
    /// Resolve against a different Graph endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn drive_url(&self, container: &ContainerId) -> Result<Url, EmbedError> {
        let mut base = Url::parse(&self.endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(&format!(
            "storage/fileStorage/containers/{container}/drive"
        ))?)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl SiteResolver for GraphSiteResolver {
    async fn resolve_site_url(
        &self,
        container: &ContainerId,
        token: &str,
    ) -> Result<Url, EmbedError> {
        let failed = |reason: String| EmbedError::SiteResolution {
            container: container.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.drive_url(container)?)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let drive: Drive = response.json().await?;
        let web_url = Url::parse(&drive.web_url)
            .map_err(|error| failed(format!("Invalid webUrl {:?}: {error}", drive.web_url)))?;

        site_of_library(web_url).ok_or_else(|| failed("webUrl has no library segment".into()))
    }
}

/// Drop the trailing document-library segment from a drive's `webUrl`.
pub fn site_of_library(mut web_url: Url) -> Option<Url> {
    let has_library = web_url
        .path_segments()
        .is_some_and(|segments| segments.filter(|segment| !segment.is_empty()).count() > 0);
    if !has_library {
        return None;
    }

    web_url.set_query(None);
    web_url.set_fragment(None);
    {
        let mut segments = web_url.path_segments_mut().ok()?;
        segments.pop_if_empty().pop();
    }
    Some(web_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_strips_the_library_segment() -> anyhow::Result<()> {
        let web_url =
            Url::parse("https://contoso.sharepoint.com/contentstorage/CSP_1234/Document%20Library")?;
        let site = site_of_library(web_url).unwrap();

        assert_eq!(
            site.as_str(),
            "https://contoso.sharepoint.com/contentstorage/CSP_1234"
        );
        Ok(())
    }

    #[test]
    fn it_refuses_urls_without_a_library() -> anyhow::Result<()> {
        assert_eq!(site_of_library(Url::parse("https://contoso.sharepoint.com/")?), None);
        Ok(())
    }

    #[test]
    fn it_addresses_the_container_drive() -> anyhow::Result<()> {
        let resolver = GraphSiteResolver::default();
        let container = ContainerId::parse("b!abc-123")?;

        assert_eq!(
            resolver.drive_url(&container)?.as_str(),
            "https://graph.microsoft.com/v1.0/storage/fileStorage/containers/b!abc-123/drive"
        );
        Ok(())
    }
}
