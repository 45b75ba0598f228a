use serde::{Deserialize, Serialize};

/// Theme settings as the Host application expresses them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatTheme {
    /// Render the chat surface in dark mode
    pub use_dark_mode: bool,
    /// Explicit palette overrides
    pub custom_theme: Option<CustomTheme>,
}

impl ChatTheme {
    /// The simplified theme sent to the Guest.
    ///
    /// `use_dark_mode` becomes `isDarkModeEnabled`; any field set on
    /// `custom_theme` (including `is_dark_mode_enabled` itself) wins.
    pub fn resolve(&self) -> CustomTheme {
        let base = CustomTheme {
            is_dark_mode_enabled: Some(self.use_dark_mode),
            ..Default::default()
        };

        match &self.custom_theme {
            Some(custom) => base.overlay(custom),
            None => base,
        }
    }
}

/// A palette in the form the Guest consumes. Every field is optional;
/// unset fields keep the Guest's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct CustomTheme {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dark_mode_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_secondary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_tertiary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_light: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_lighter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_lighter_alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_dark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_dark_alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_darker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl CustomTheme {
    /// Layer `other` on top of `self`, field by field.
    pub fn overlay(self, other: &CustomTheme) -> CustomTheme {
        fn pick<T: Clone>(over: &Option<T>, under: Option<T>) -> Option<T> {
            over.clone().or(under)
        }

        CustomTheme {
            is_dark_mode_enabled: pick(&other.is_dark_mode_enabled, self.is_dark_mode_enabled),
            theme_primary: pick(&other.theme_primary, self.theme_primary),
            theme_secondary: pick(&other.theme_secondary, self.theme_secondary),
            theme_tertiary: pick(&other.theme_tertiary, self.theme_tertiary),
            theme_light: pick(&other.theme_light, self.theme_light),
            theme_lighter: pick(&other.theme_lighter, self.theme_lighter),
            theme_lighter_alt: pick(&other.theme_lighter_alt, self.theme_lighter_alt),
            theme_dark: pick(&other.theme_dark, self.theme_dark),
            theme_dark_alt: pick(&other.theme_dark_alt, self.theme_dark_alt),
            theme_darker: pick(&other.theme_darker, self.theme_darker),
            font_family: pick(&other.font_family, self.font_family),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_maps_dark_mode_onto_the_resolved_theme() {
        let theme = ChatTheme {
            use_dark_mode: true,
            custom_theme: None,
        };

        assert_eq!(
            serde_json::to_value(theme.resolve()).unwrap(),
            serde_json::json!({ "isDarkModeEnabled": true })
        );
    }

    #[test]
    fn it_lets_custom_fields_override_the_dark_mode_flag() {
        let theme = ChatTheme {
            use_dark_mode: true,
            custom_theme: Some(CustomTheme {
                is_dark_mode_enabled: Some(false),
                theme_primary: Some("#0f6cbd".into()),
                ..Default::default()
            }),
        };

        let resolved = theme.resolve();
        assert_eq!(resolved.is_dark_mode_enabled, Some(false));
        assert_eq!(resolved.theme_primary.as_deref(), Some("#0f6cbd"));
    }
}
