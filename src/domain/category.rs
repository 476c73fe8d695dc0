//! Event categories used for segmentation in the analytics console

use serde::Serialize;

/// Category of a structured analytics event
///
/// Wire labels match the ones used by the iOS client so both platforms
/// segment into the same buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventCategory {
    #[serde(rename = "app_settings")]
    AppSettings,
    #[serde(rename = "ui_action")]
    UiAction,
    #[serde(rename = "submit")]
    Submit,
    #[serde(rename = "stop_metrics")]
    StopAction,
    #[serde(rename = "accessibility")]
    Accessibility,
}

impl EventCategory {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::AppSettings => "app_settings",
            EventCategory::UiAction => "ui_action",
            EventCategory::Submit => "submit",
            EventCategory::StopAction => "stop_metrics",
            EventCategory::Accessibility => "accessibility",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "app_settings" => EventCategory::AppSettings,
            "ui_action" => EventCategory::UiAction,
            "submit" => EventCategory::Submit,
            "stop_metrics" => EventCategory::StopAction,
            "accessibility" => EventCategory::Accessibility,
            other => anyhow::bail!("unknown event category '{}'", other),
        })
    }
}
