//! Keeps the Guest's chat configuration in step with the Host's.
//!
//! Every setter updates the local [`ChatConfigState`] and returns the
//! single-field command that reflects the change. Whether that command is
//! sent depends on whether a port is live, which is the caller's business:
//! changes made before the handshake are simply carried by the full
//! `configure` push.

use embed_chat_protocol::{
    ChatConfigState, ChatTheme, DataSource, HostCommand, ZeroQueryPrompts,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration applied when the chat is opened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchConfig {
    /// Title shown in the chat header
    pub header: Option<String>,
    /// Theme
    pub theme: Option<ChatTheme>,
    /// Extra instruction given to the assistant
    pub instruction: Option<String>,
    /// BCP-47 locale
    pub locale: Option<String>,
    /// Placeholder text in the chat input
    pub chat_input_placeholder: Option<String>,
    /// Suggestions shown before the first query
    pub zero_query_prompts: Option<ZeroQueryPrompts>,
    /// Suggestions shown alongside the conversation
    pub suggested_prompts: Option<Vec<String>>,
    /// Content the chat is grounded on
    pub data_sources: Option<Vec<DataSource>>,
}

/// Owner of the Host-side [`ChatConfigState`].
#[derive(Debug, Clone, Default)]
pub struct ConfigPusher {
    state: ChatConfigState,
}

impl ConfigPusher {
    /// Start from an existing snapshot
    pub fn new(state: ChatConfigState) -> Self {
        Self { state }
    }

    /// The current snapshot
    pub fn state(&self) -> &ChatConfigState {
        &self.state
    }

    /// Fold a launch configuration into the snapshot. Only fields present
    /// in `launch` are applied; the header falls back to `default_header`
    /// if it is still unset afterwards.
    pub fn apply_launch(&mut self, launch: LaunchConfig, default_header: &str) {
        let LaunchConfig {
            header,
            theme,
            instruction,
            locale,
            chat_input_placeholder,
            zero_query_prompts,
            suggested_prompts,
            data_sources,
        } = launch;

        let state = &mut self.state;
        if header.is_some() {
            state.header = header;
        }
        if let Some(theme) = theme {
            state.theme = theme;
        }
        if instruction.is_some() {
            state.instruction = instruction;
        }
        if locale.is_some() {
            state.locale = locale;
        }
        if chat_input_placeholder.is_some() {
            state.chat_input_placeholder = chat_input_placeholder;
        }
        if zero_query_prompts.is_some() {
            state.zero_query_prompts = zero_query_prompts;
        }
        if suggested_prompts.is_some() {
            state.suggested_prompts = suggested_prompts;
        }
        if data_sources.is_some() {
            state.data_sources = data_sources;
        }

        if state.header.is_none() {
            state.header = Some(default_header.to_owned());
        }
    }

    /// Record the design-system theme snapshot
    pub fn set_theme_v8(&mut self, theme: Option<Value>) {
        self.state.theme_v8 = theme;
    }

    /// The one-shot full push
    pub fn configure(&self) -> HostCommand {
        HostCommand::Configure {
            options: self.state.configure_options(),
        }
    }

    /// Replace the instruction given to the assistant
    pub fn set_instruction(&mut self, instruction: String) -> HostCommand {
        self.state.instruction = Some(instruction.clone());
        HostCommand::UpdateInstruction {
            instruction: Some(instruction),
        }
    }

    /// Pre-fill the chat input
    pub fn set_prompt(&mut self, prompt: String) -> HostCommand {
        self.state.prompt = Some(prompt.clone());
        HostCommand::SetPrompt { prompt }
    }

    /// `None` clears any previously set data sources
    pub fn set_data_sources(&mut self, data_sources: Option<Vec<DataSource>>) -> HostCommand {
        self.state.data_sources = data_sources.clone();
        HostCommand::UpdateDataSources { data_sources }
    }

    /// `None` clears any previously set prompts
    pub fn set_zero_query_prompts(&mut self, prompts: Option<ZeroQueryPrompts>) -> HostCommand {
        self.state.zero_query_prompts = prompts.clone();
        HostCommand::SetZeroQueryPrompts {
            zero_query_prompts: prompts,
        }
    }

    /// `None` clears any previously set prompts
    pub fn set_suggested_prompts(&mut self, prompts: Option<Vec<String>>) -> HostCommand {
        self.state.suggested_prompts = prompts.clone();
        HostCommand::SetSuggestedPrompts {
            suggested_prompts: prompts,
        }
    }

    /// Replace the theme; the command carries the resolved palette
    pub fn set_theme(&mut self, theme: ChatTheme) -> HostCommand {
        let resolved = theme.resolve();
        self.state.theme = theme;
        HostCommand::SetTheme { theme: resolved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_chat_protocol::{CustomTheme, FolderSource};

    fn reports() -> DataSource {
        DataSource::Folder(FolderSource {
            name: "Reports".into(),
            url: "https://x/Reports".into(),
        })
    }

    #[test]
    fn it_falls_back_to_the_default_header() {
        let mut pusher = ConfigPusher::default();
        pusher.apply_launch(LaunchConfig::default(), "Chat");
        assert_eq!(pusher.state().header.as_deref(), Some("Chat"));

        pusher.apply_launch(
            LaunchConfig {
                header: Some("Contoso".into()),
                ..Default::default()
            },
            "Chat",
        );
        assert_eq!(pusher.state().header.as_deref(), Some("Contoso"));
    }

    #[test]
    fn it_keeps_setter_values_that_the_launch_config_leaves_unset() {
        let mut pusher = ConfigPusher::default();
        pusher.set_data_sources(Some(vec![reports()]));
        pusher.apply_launch(
            LaunchConfig {
                locale: Some("fr-FR".into()),
                ..Default::default()
            },
            "Chat",
        );

        assert_eq!(pusher.state().data_sources, Some(vec![reports()]));
        assert_eq!(pusher.state().locale.as_deref(), Some("fr-FR"));
    }

    #[test]
    fn it_is_idempotent_on_the_data_when_a_setter_repeats() {
        let mut pusher = ConfigPusher::default();
        let first = pusher.set_data_sources(Some(vec![reports()]));
        let after_first = pusher.state().clone();
        let second = pusher.set_data_sources(Some(vec![reports()]));

        assert_eq!(first, second);
        assert_eq!(pusher.state(), &after_first);
    }

    #[test]
    fn it_clears_prompts_and_sources_with_none() {
        let mut pusher = ConfigPusher::default();
        pusher.set_suggested_prompts(Some(vec!["Summarize".into()]));
        pusher.set_data_sources(Some(vec![reports()]));

        pusher.set_suggested_prompts(None);
        pusher.set_data_sources(None);

        assert_eq!(pusher.state().suggested_prompts, None);
        assert_eq!(pusher.state().data_sources, None);
    }

    #[test]
    fn it_sends_the_resolved_theme() {
        let mut pusher = ConfigPusher::default();
        let command = pusher.set_theme(ChatTheme {
            use_dark_mode: true,
            custom_theme: Some(CustomTheme {
                theme_primary: Some("#123456".into()),
                ..Default::default()
            }),
        });

        let HostCommand::SetTheme { theme } = command else {
            panic!("expected setTheme");
        };
        assert_eq!(theme.is_dark_mode_enabled, Some(true));
        assert_eq!(theme.theme_primary.as_deref(), Some("#123456"));
        assert!(pusher.state().theme.use_dark_mode);
    }
}
