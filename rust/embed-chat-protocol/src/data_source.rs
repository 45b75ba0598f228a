use serde::{Deserialize, Serialize};

/// Content the chat is grounded on.
///
/// On the wire each source is `{ type: "<Variant>", value: { .. } }`, e.g.
/// `{ type: "Folder", value: { name: "Reports", url: "https://x/Reports" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DataSource {
    /// A single document
    File(FileSource),
    /// A folder and everything below it
    Folder(FolderSource),
    /// A whole document library
    DocumentLibrary(DocumentLibrarySource),
    /// A site
    Site(SiteSource),
    /// The user's working set of recently used content
    WorkingSet(WorkingSetSource),
    /// A meeting and its recap material
    Meeting(MeetingSource),
}

/// Identifies a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct FileSource {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

/// Identifies a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct FolderSource {
    pub name: String,
    pub url: String,
}

/// Identifies a document library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct DocumentLibrarySource {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
}

/// Identifies a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SiteSource {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

/// Identifies a working set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct WorkingSetSource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Identifies a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct MeetingSource {
    pub meeting_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn it_reads_the_tagged_wire_shape() -> anyhow::Result<()> {
        let source: DataSource = serde_json::from_value(json!({
            "type": "Folder",
            "value": { "name": "Reports", "url": "https://x/Reports" }
        }))?;

        assert_eq!(
            source,
            DataSource::Folder(FolderSource {
                name: "Reports".into(),
                url: "https://x/Reports".into(),
            })
        );
        Ok(())
    }

    #[test]
    fn it_omits_unset_identifiers() -> anyhow::Result<()> {
        let source = DataSource::Meeting(MeetingSource {
            meeting_id: "m-1".into(),
            title: None,
            join_url: None,
        });

        assert_eq!(
            serde_json::to_value(&source)?,
            json!({ "type": "Meeting", "value": { "meetingId": "m-1" } })
        );
        Ok(())
    }

    #[test]
    fn it_rejects_unknown_variants() {
        let result = serde_json::from_value::<DataSource>(json!({
            "type": "Mailbox",
            "value": { "name": "inbox" }
        }));
        assert!(result.is_err());
    }
}
