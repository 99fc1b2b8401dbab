//! The seven profile cards. Each is stored as its own document under
//! `users/{uid}/profile_data/{card}`.
//!
//! Every field defaults to empty and unknown fields are dropped, so a card
//! saved by an older client version still loads. The web client sends some
//! fields in camelCase; those spellings are accepted as aliases.

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CardKind {
    IdentityStatus,
    TechnicalProfile,
    LearningStyle,
    CareerVision,
    ProjectExperience,
    Networking,
    PersonalBrand,
}

#[derive(Debug, Error)]
#[error("unknown profile card '{0}'")]
pub struct UnknownCard(pub String);

impl CardKind {
    /// Order in which cards are shown to the model.
    pub const ALL: [CardKind; 7] = [
        CardKind::IdentityStatus,
        CardKind::TechnicalProfile,
        CardKind::LearningStyle,
        CardKind::CareerVision,
        CardKind::ProjectExperience,
        CardKind::Networking,
        CardKind::PersonalBrand,
    ];

    pub fn doc_id(self) -> &'static str {
        match self {
            CardKind::IdentityStatus => "identity-status",
            CardKind::TechnicalProfile => "technical-profile",
            CardKind::LearningStyle => "learning-style",
            CardKind::CareerVision => "career-vision",
            CardKind::ProjectExperience => "project-experience",
            CardKind::Networking => "networking",
            CardKind::PersonalBrand => "personal-brand",
        }
    }

    /// Passes a raw body through the card's schema: aliases resolved,
    /// missing fields filled with defaults, unknown fields dropped.
    pub fn normalize(self, raw: Value) -> Result<Value, serde_json::Error> {
        match self {
            CardKind::IdentityStatus => normalize_as::<IdentityStatus>(raw),
            CardKind::TechnicalProfile => normalize_as::<TechnicalProfile>(raw),
            CardKind::LearningStyle => normalize_as::<LearningStyle>(raw),
            CardKind::CareerVision => normalize_as::<CareerVision>(raw),
            CardKind::ProjectExperience => normalize_as::<ProjectExperience>(raw),
            CardKind::Networking => normalize_as::<Networking>(raw),
            CardKind::PersonalBrand => normalize_as::<PersonalBrand>(raw),
        }
    }

    /// The all-empty record returned for a card that was never saved.
    pub fn empty(self) -> Value {
        // An empty object always satisfies a schema whose fields all default.
        self.normalize(Value::Object(Default::default()))
            .unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.doc_id())
    }
}

impl FromStr for CardKind {
    type Err = UnknownCard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardKind::ALL
            .into_iter()
            .find(|kind| kind.doc_id() == s)
            .ok_or_else(|| UnknownCard(s.to_string()))
    }
}

/// A typed card schema tied to its storage id.
pub trait Card: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    const KIND: CardKind;
}

fn normalize_as<C: Card>(raw: Value) -> Result<Value, serde_json::Error> {
    let card: C = serde_json::from_value(raw)?;
    serde_json::to_value(card)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityStatus {
    pub story: String,
    pub motivations: Vec<String>,
    #[serde(alias = "customMotivation")]
    pub custom_motivation: String,
    pub impact: String,
    pub clarity: i64,
}

impl Card for IdentityStatus {
    const KIND: CardKind = CardKind::IdentityStatus;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalProfile {
    pub skills: Vec<String>,
    #[serde(alias = "highlightSkill", alias = "highlight")]
    pub highlight_skill: String,
    #[serde(alias = "learningApproach")]
    pub learning_approach: String,
    pub confidence: i64,
}

impl Card for TechnicalProfile {
    const KIND: CardKind = CardKind::TechnicalProfile;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningStyle {
    pub preference: String,
    #[serde(alias = "customPreference")]
    pub custom_preference: String,
    pub resources: Vec<String>,
    #[serde(alias = "customResource")]
    pub custom_resource: String,
    pub motivation: String,
    #[serde(alias = "barrier")]
    pub barriers: String,
}

impl Card for LearningStyle {
    const KIND: CardKind = CardKind::LearningStyle;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareerVision {
    #[serde(alias = "shortTermGoal", alias = "shortTerm")]
    pub short_term_goal: String,
    #[serde(alias = "longTermGoal", alias = "longTerm")]
    pub long_term_goal: String,
    pub priorities: Vec<String>,
    #[serde(alias = "customPriority")]
    pub custom_priority: String,
    pub progress: i64,
}

impl Card for CareerVision {
    const KIND: CardKind = CardKind::CareerVision;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectExperience {
    #[serde(alias = "pastProjects")]
    pub past_projects: String,
    pub technologies: Vec<String>,
    #[serde(alias = "futureProject", alias = "futureGoal")]
    pub future_project: String,
    pub challenges: String,
}

impl Card for ProjectExperience {
    const KIND: CardKind = CardKind::ProjectExperience;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Networking {
    #[serde(alias = "mentorshipNeed")]
    pub mentorship_need: String,
    #[serde(alias = "currentConnections", alias = "connections")]
    pub current_connections: Vec<String>,
    #[serde(alias = "networkingGoal", alias = "goal")]
    pub networking_goal: String,
    #[serde(alias = "networkingChallenges", alias = "challenges")]
    pub networking_challenges: String,
}

impl Card for Networking {
    const KIND: CardKind = CardKind::Networking;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalBrand {
    #[serde(alias = "currentProfiles", alias = "platforms")]
    pub current_profiles: Vec<String>,
    #[serde(alias = "brandGoal")]
    pub brand_goal: String,
    #[serde(alias = "contentTypes", alias = "contents")]
    pub content_types: Vec<String>,
    #[serde(alias = "brandChallenges")]
    pub brand_challenges: String,
    #[serde(alias = "lastUpdated")]
    pub last_updated: String,
}

impl Card for PersonalBrand {
    const KIND: CardKind = CardKind::PersonalBrand;
}
