//! Presentation options chosen by the submitter: theme, detail level and
//! target audience.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

macro_rules! define_choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $value)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            pub fn from_name(name: &str) -> Result<Self, CoreError> {
                match name {
                    $($value => Ok($name::$variant),)+
                    other => Err(CoreError::Validation(format!(
                        "Invalid {}: {}. Supported values are: {}",
                        $label,
                        other,
                        Self::names().join(", ")
                    ))),
                }
            }

            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_choice_enum! {
    /// Named visual style for the rendered deck.
    Theme ("theme") {
        Default = "default",
        Beam = "beam",
        RosePine = "rose_pine",
        Gaia = "gaia",
        Uncover = "uncover",
        GraphPaper = "graph_paper",
    }
}

define_choice_enum! {
    /// How much content goes on each slide.
    DetailLevel ("slideDetail") {
        Minimal = "minimal",
        Medium = "medium",
        Detailed = "detailed",
    }
}

define_choice_enum! {
    /// Who the deck is written for.
    Audience ("audience") {
        General = "general",
        Academic = "academic",
        Technical = "technical",
        Professional = "professional",
        Executive = "executive",
    }
}

/// Validated generation settings. `None` means "no instruction".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_detail: Option<DetailLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<Audience>,
}

/// Validated submission options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideOptions {
    pub theme: Theme,
    pub settings: SlideSettings,
}

// ---------------------------------------------------------------------------
// Wire request
// ---------------------------------------------------------------------------

/// The JSON document carried in the `data` form field of a submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideRequest {
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub settings: RawSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    #[serde(default)]
    pub slide_detail: String,
    #[serde(default)]
    pub audience: String,
}

impl SlideRequest {
    pub fn parse(data: &str) -> Result<Self, CoreError> {
        serde_json::from_str(data)
            .map_err(|e| CoreError::Validation(format!("Invalid request format: {e}")))
    }

    /// Check every field against its closed set. Empty detail or audience
    /// is accepted as "unspecified"; an empty theme is not.
    pub fn validate(&self) -> Result<SlideOptions, CoreError> {
        let theme = Theme::from_name(&self.theme)?;
        let slide_detail = optional(&self.settings.slide_detail, DetailLevel::from_name)?;
        let audience = optional(&self.settings.audience, Audience::from_name)?;
        Ok(SlideOptions {
            theme,
            settings: SlideSettings {
                slide_detail,
                audience,
            },
        })
    }
}

fn optional<T>(
    value: &str,
    parse: impl Fn(&str) -> Result<T, CoreError>,
) -> Result<Option<T>, CoreError> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn all_themes_parse() {
        for name in ["default", "beam", "rose_pine", "gaia", "uncover", "graph_paper"] {
            assert_eq!(Theme::from_name(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn unknown_theme_lists_supported_values() {
        let err = Theme::from_name("neon").unwrap_err();
        let CoreError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.starts_with("Invalid theme: neon."));
        assert!(msg.contains("rose_pine"));
    }

    #[test]
    fn parses_full_request() {
        let req = SlideRequest::parse(
            r#"{"theme":"gaia","settings":{"slideDetail":"detailed","audience":"executive"}}"#,
        )
        .unwrap();
        let opts = req.validate().unwrap();
        assert_eq!(opts.theme, Theme::Gaia);
        assert_eq!(opts.settings.slide_detail, Some(DetailLevel::Detailed));
        assert_eq!(opts.settings.audience, Some(Audience::Executive));
    }

    #[test]
    fn empty_settings_mean_unspecified() {
        let opts = SlideRequest::parse(r#"{"theme":"beam","settings":{"audience":""}}"#)
            .unwrap()
            .validate()
            .unwrap();
        assert_eq!(opts.settings, SlideSettings::default());
    }

    #[test]
    fn missing_theme_is_rejected() {
        let req = SlideRequest::parse(r#"{"settings":{}}"#).unwrap();
        assert_matches!(req.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn bad_audience_is_rejected() {
        let req = SlideRequest::parse(r#"{"theme":"default","settings":{"audience":"kids"}}"#)
            .unwrap();
        assert_matches!(req.validate(), Err(CoreError::Validation(m)) if m.contains("audience"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert_matches!(
            SlideRequest::parse("{not json"),
            Err(CoreError::Validation(m)) if m.starts_with("Invalid request format")
        );
    }

    #[test]
    fn settings_serialize_camel_case() {
        let settings = SlideSettings {
            slide_detail: Some(DetailLevel::Minimal),
            audience: None,
        };
        let json = serde_json::to_value(settings).unwrap();
        assert_eq!(json["slideDetail"], "minimal");
        assert!(json.get("audience").is_none());
    }
}
