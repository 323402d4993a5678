//! Profile (chatbot persona) model.

use serde::{Deserialize, Deserializer, Serialize};

use crate::validate::{clamp_response_count, RESPONSE_COUNT_DEFAULT};

/// Id of the distinguished profile that always exists.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// Display name of the synthesized default profile.
pub const DEFAULT_PROFILE_NAME: &str = "Default";

const DEFAULT_PROFILE_DESCRIPTION: &str = "A warm, curious companion for daily reflection";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a supportive journaling companion. \
Ask open questions about the user's day, reflect back what you hear, \
and help them notice what mattered.";

/// A persona used to run the journaling conversation.
///
/// `is_current` is not stored per record: it is derived from the per-user
/// current-profile pointer whenever profiles are read from the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub system_prompt: String,

    /// Clamped to `RESPONSE_COUNT_MIN..=RESPONSE_COUNT_MAX`
    #[serde(
        default = "default_response_count",
        deserialize_with = "deserialize_response_count"
    )]
    pub response_count: u8,

    /// Creation timestamp (Unix milliseconds)
    #[serde(default)]
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    #[serde(default)]
    pub updated_at: i64,

    /// Derived from the current-profile pointer
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_current: bool,
}

fn default_response_count() -> u8 {
    RESPONSE_COUNT_DEFAULT
}

/// Stored documents may carry any integer; out-of-range counts are clamped.
fn deserialize_response_count<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    i64::deserialize(deserializer).map(clamp_response_count)
}

impl Profile {
    /// Create a new profile with a generated id.
    #[must_use]
    pub fn new(name: String, description: String, system_prompt: String, response_count: i64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("prof_{}", &uuid::Uuid::new_v4().to_string()[..12]);

        Self {
            id,
            name,
            description,
            system_prompt,
            response_count: clamp_response_count(response_count),
            created_at: now,
            updated_at: now,
            is_current: false,
        }
    }

    /// The built-in default profile.
    ///
    /// Timestamps are fixed at zero so that a synthesized default compares
    /// equal across sync passes.
    #[must_use]
    pub fn default_profile() -> Self {
        Self {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: DEFAULT_PROFILE_NAME.to_string(),
            description: DEFAULT_PROFILE_DESCRIPTION.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            response_count: RESPONSE_COUNT_DEFAULT,
            created_at: 0,
            updated_at: 0,
            is_current: false,
        }
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_PROFILE_ID
    }

    /// Return a copy with `is_current` set.
    #[must_use]
    pub fn with_current(mut self, is_current: bool) -> Self {
        self.is_current = is_current;
        self
    }

    /// Re-apply the response-count bounds after deserializing foreign data.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.response_count = clamp_response_count(i64::from(self.response_count));
        self
    }
}

/// Resolve a current-profile pointer against a profile set.
///
/// Falls back to the default profile when the pointer is absent, empty, or
/// names a profile that is not in the set.
#[must_use]
pub fn resolve_current_id(profiles: &[Profile], pointer: Option<&str>) -> String {
    pointer
        .filter(|id| !id.is_empty())
        .filter(|id| profiles.iter().any(|p| p.id == *id))
        .unwrap_or(DEFAULT_PROFILE_ID)
        .to_string()
}

/// Set `is_current` on every profile from the resolved pointer.
pub fn mark_current(profiles: &mut [Profile], current_id: &str) {
    for profile in profiles {
        profile.is_current = profile.id == current_id;
    }
}
