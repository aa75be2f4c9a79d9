use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::error::RecorderError;

/// Which kind of event configuration a [`ConfigurationSpec`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationKind {
    Predefined,
    FileContent,
    EventSettings,
}

impl fmt::Display for ConfigurationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Predefined => "predefined",
            Self::FileContent => "file content",
            Self::EventSettings => "event settings",
        };
        f.write_str(name)
    }
}

/// What events a recording captures.
///
/// Each variant knows the remote setter that applies it. Construct through
/// the checked constructors; an empty payload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ConfigurationSpec {
    /// Named profile supplied by the target, e.g. `"default"` or `"profile"`.
    Predefined(String),
    /// Verbatim settings-file content.
    FileContent(String),
    /// Per-event settings such as `"jdk.CPULoad#enabled" = "true"`.
    EventSettings(BTreeMap<String, String>),
}

impl ConfigurationSpec {
    /// The target's baseline low-overhead profile.
    pub fn default_profile() -> Self {
        Self::Predefined("default".to_string())
    }

    /// The target's detailed profiling profile.
    pub fn profile() -> Self {
        Self::Predefined("profile".to_string())
    }

    pub fn predefined(name: impl Into<String>) -> Result<Self, RecorderError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(RecorderError::Validation("predefined configuration name is empty".into()));
        }
        Ok(Self::Predefined(name))
    }

    pub fn file_content(content: impl Into<String>) -> Result<Self, RecorderError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(RecorderError::Validation("configuration file content is empty".into()));
        }
        Ok(Self::FileContent(content))
    }

    /// Read settings-file content from `reader` and forward it unparsed.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, RecorderError> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| RecorderError::Validation(format!("failed to read configuration: {e}")))?;
        Self::file_content(content)
    }

    pub fn event_settings<K, V>(settings: impl IntoIterator<Item = (K, V)>) -> Result<Self, RecorderError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let settings: BTreeMap<String, String> = settings
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if settings.is_empty() {
            return Err(RecorderError::Validation("event settings map is empty".into()));
        }
        Ok(Self::EventSettings(settings))
    }

    pub fn kind(&self) -> ConfigurationKind {
        match self {
            Self::Predefined(_) => ConfigurationKind::Predefined,
            Self::FileContent(_) => ConfigurationKind::FileContent,
            Self::EventSettings(_) => ConfigurationKind::EventSettings,
        }
    }

    /// Remote operation that applies this configuration.
    pub fn setter_operation(&self) -> &'static str {
        match self {
            Self::Predefined(_) => "setPredefinedConfiguration",
            Self::FileContent(_) => "setConfiguration",
            Self::EventSettings(_) => "setRecordingSettings",
        }
    }
}
