//! Everything needed to point the Guest window at the chat surface.

use std::fmt::Display;

use embed_chat_protocol::ChannelId;
use serde::Serialize;
use url::Url;

use crate::EmbedError;

/// Path of the chat surface, relative to the site it is served from.
pub const CHAT_PATH: &str = "_layouts/15/chat.aspx";

/// Form field that carries the access token.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";

/// A storage container identifier of the form `b!<url-safe id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    /// Validate `value`; fails unless it is `b!` followed by one or more
    /// of `[A-Za-z0-9_-]`.
    pub fn parse(value: &str) -> Result<Self, EmbedError> {
        let valid = value.strip_prefix("b!").is_some_and(|rest| {
            !rest.is_empty()
                && rest
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });

        if valid {
            Ok(Self(value.to_owned()))
        } else {
            Err(EmbedError::InvalidContainerId(value.to_owned()))
        }
    }

    #[allow(missing_docs)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol settings passed to the Guest in the launch URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolConfig {
    /// Always `postMessage`
    pub transport: &'static str,
    /// Protocol revision
    pub version: &'static str,
    /// Channel the Host will listen on
    pub channel_id: ChannelId,
}

impl ProtocolConfig {
    /// Settings for a session on `channel_id`
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            transport: "postMessage",
            version: "1.0",
            channel_id,
        }
    }
}

/// An HTML form, submitted with `POST`, that navigates the Guest window.
///
/// The token travels in the body so it never shows up in history or in
/// a `Referer` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchForm {
    /// Where the form is submitted
    pub action: Url,
    /// Hidden inputs, in order
    pub fields: Vec<(String, String)>,
}

impl LaunchForm {
    /// Submission method
    pub const METHOD: &'static str = "POST";

    /// A form posting `access_token` to `action`
    pub fn new(action: Url, access_token: &str) -> Self {
        Self {
            action,
            fields: vec![(ACCESS_TOKEN_FIELD.to_owned(), access_token.to_owned())],
        }
    }

    /// Value of the named field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Base URL for a bare hostname (`contoso.sharepoint.com`) or a full
/// origin (`https://contoso.sharepoint.com`).
pub fn host_url(hostname: &str) -> Result<Url, EmbedError> {
    if hostname.contains("://") {
        Ok(Url::parse(hostname)?)
    } else {
        Ok(Url::parse(&format!("https://{hostname}"))?)
    }
}

/// The chat surface under `site`, carrying `protocol` as the `p` query
/// parameter.
pub fn launch_url(site: &Url, protocol: &ProtocolConfig) -> Result<Url, EmbedError> {
    let mut base = site.clone();
    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let mut url = base.join(CHAT_PATH)?;
    url.query_pairs_mut()
        .append_pair("app", "embedded")
        .append_pair("p", &serde_json::to_string(protocol)?);

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_well_formed_container_ids() {
        assert!(ContainerId::parse("b!abc-123").is_ok());
        assert!(ContainerId::parse("b!A_b-9").is_ok());
    }

    #[test]
    fn it_rejects_malformed_container_ids() {
        for value in ["not-valid", "b!", "", "b!has space", "B!abc", "b!abc/def"] {
            assert!(
                matches!(ContainerId::parse(value), Err(EmbedError::InvalidContainerId(_))),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn it_builds_the_launch_url_from_a_bare_hostname() -> anyhow::Result<()> {
        let site = host_url("contoso.sharepoint.com")?;
        let url = launch_url(&site, &ProtocolConfig::new(ChannelId::from("c-1")))?;

        assert_eq!(url.host_str(), Some("contoso.sharepoint.com"));
        assert_eq!(url.path(), "/_layouts/15/chat.aspx");

        let protocol = url
            .query_pairs()
            .find(|(key, _)| key == "p")
            .map(|(_, value)| value.into_owned())
            .unwrap();
        let protocol: serde_json::Value = serde_json::from_str(&protocol)?;
        assert_eq!(protocol["channelId"], "c-1");
        assert_eq!(protocol["transport"], "postMessage");
        Ok(())
    }

    #[test]
    fn it_keeps_the_site_path_of_container_sites() -> anyhow::Result<()> {
        let site = Url::parse("https://contoso.sharepoint.com/contentstorage/CSP_1234")?;
        let url = launch_url(&site, &ProtocolConfig::new(ChannelId::from("c-1")))?;

        assert_eq!(url.path(), "/contentstorage/CSP_1234/_layouts/15/chat.aspx");
        Ok(())
    }

    #[test]
    fn it_never_puts_the_token_in_the_url() -> anyhow::Result<()> {
        let site = host_url("https://contoso.sharepoint.com")?;
        let url = launch_url(&site, &ProtocolConfig::new(ChannelId::from("c-1")))?;
        let form = LaunchForm::new(url, "secret-token");

        assert_eq!(form.field(ACCESS_TOKEN_FIELD), Some("secret-token"));
        assert!(!form.action.as_str().contains("secret-token"));
        Ok(())
    }
}
