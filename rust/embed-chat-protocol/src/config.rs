use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChatTheme, CustomTheme, DataSource};

/// Prompts offered before the user has typed anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZeroQueryPrompts {
    /// Text shown above the suggestions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,
    /// The suggestions themselves
    pub prompt_suggestion_list: Vec<PromptSuggestion>,
}

/// One zero-query suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSuggestion {
    /// The text inserted when the suggestion is picked
    pub suggestion_text: String,
}

impl From<&str> for PromptSuggestion {
    fn from(value: &str) -> Self {
        Self {
            suggestion_text: value.to_owned(),
        }
    }
}

/// Everything the Host tracks about how the Guest's chat should look and
/// behave.
///
/// Host setters mutate this snapshot at any time. The whole snapshot goes
/// to the Guest once, in the `configure` command sent at handshake; later
/// changes go out as single-field commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfigState {
    /// Title shown in the chat header
    pub header: Option<String>,
    /// Simplified theme
    pub theme: ChatTheme,
    /// Full design-system theme snapshot, already reduced to plain JSON
    pub theme_v8: Option<Value>,
    /// Suggestions shown before the first query
    pub zero_query_prompts: Option<ZeroQueryPrompts>,
    /// Suggestions shown alongside the conversation
    pub suggested_prompts: Option<Vec<String>>,
    /// Extra instruction given to the assistant
    pub instruction: Option<String>,
    /// Content the chat is grounded on
    pub data_sources: Option<Vec<DataSource>>,
    /// BCP-47 locale for the chat surface
    pub locale: Option<String>,
    /// Placeholder text in the chat input
    pub chat_input_placeholder: Option<String>,
    /// Text pre-filled into the chat input
    pub prompt: Option<String>,
}

impl ChatConfigState {
    /// The payload of the one-shot `configure` command.
    pub fn configure_options(&self) -> ConfigureOptions {
        ConfigureOptions {
            chat_config: ChatConfig {
                header: self.header.clone(),
                instruction: self.instruction.clone(),
                locale: self.locale.clone(),
                chat_input_placeholder: self.chat_input_placeholder.clone(),
                data_sources: self.data_sources.clone(),
                prompt: self.prompt.clone(),
                custom_prompts: CustomPrompts {
                    zero_query_prompts: self.zero_query_prompts.clone(),
                    suggested_prompts: self.suggested_prompts.clone(),
                },
            },
            theme: self.theme.resolve(),
            theme_v8: self.theme_v8.clone(),
        }
    }
}

/// `data.options` of a `configure` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct ConfigureOptions {
    pub chat_config: ChatConfig,
    pub theme: CustomTheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_v8: Option<Value>,
}

/// `data.options.chatConfig` of a `configure` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct ChatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_input_placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_sources: Option<Vec<DataSource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub custom_prompts: CustomPrompts,
}

/// Prompt suggestions bundled in `chatConfig.customPrompts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct CustomPrompts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zero_query_prompts: Option<ZeroQueryPrompts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_prompts: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FolderSource;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn it_bundles_the_whole_state_into_configure_options() -> anyhow::Result<()> {
        let state = ChatConfigState {
            header: Some("Contoso".into()),
            instruction: Some("Answer briefly".into()),
            locale: Some("en-US".into()),
            suggested_prompts: Some(vec!["Summarize".into()]),
            data_sources: Some(vec![DataSource::Folder(FolderSource {
                name: "Reports".into(),
                url: "https://x/Reports".into(),
            })]),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(state.configure_options())?,
            json!({
                "chatConfig": {
                    "header": "Contoso",
                    "instruction": "Answer briefly",
                    "locale": "en-US",
                    "dataSources": [
                        { "type": "Folder", "value": { "name": "Reports", "url": "https://x/Reports" } }
                    ],
                    "customPrompts": { "suggestedPrompts": ["Summarize"] }
                },
                "theme": { "isDarkModeEnabled": false }
            })
        );
        Ok(())
    }

    #[test]
    fn it_includes_the_design_system_snapshot_when_present() -> anyhow::Result<()> {
        let state = ChatConfigState {
            theme_v8: Some(json!({ "palette": { "themePrimary": "#123456" } })),
            ..Default::default()
        };

        let options = serde_json::to_value(state.configure_options())?;
        assert_eq!(options["themeV8"]["palette"]["themePrimary"], "#123456");
        Ok(())
    }
}
