use serde::{Deserialize, Serialize};

/// Intake record written at registration and replaced wholesale on `PUT`.
/// Wire format is the web client's camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub birth_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub education: Education,
    #[serde(default)]
    pub work_experience: WorkExperience,
    #[serde(default)]
    pub skills: Skills,
    #[serde(default)]
    pub interests_and_goals: InterestsAndGoals,
    #[serde(default)]
    pub working_style_and_motivation: WorkingStyleAndMotivation,
    #[serde(default)]
    pub self_assessment: SelfAssessment,
    #[serde(default)]
    pub learning_preferences: LearningPreferences,
    #[serde(default)]
    pub consents: Consents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserData {
    /// Field-level checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), String> {
        if self.uid.trim().is_empty() {
            return Err("uid must not be empty".into());
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("firstName and lastName are required".into());
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(format!("'{email}' is not a valid email address")),
        }
        if !(1900..=2100).contains(&self.birth_year) {
            return Err(format!("birthYear {} is out of range", self.birth_year));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub city: String,
    pub country: String,
    pub living_area_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Education {
    pub highest_degree: String,
    pub major: String,
    pub currently_student: bool,
    pub strong_subjects: Vec<String>,
    pub certificates: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkExperience {
    pub currently_working: bool,
    pub years_experience: String,
    pub sectors_worked: Vec<String>,
    pub positions: Vec<String>,
    pub managerial_experience: bool,
    pub freelance_experience: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Skills {
    pub technical_skills: Vec<String>,
    pub social_skills: Vec<String>,
    pub problem_solving: i64,
    pub english_level: String,
    pub other_languages: Vec<String>,
    pub highlighted_skill: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterestsAndGoals {
    pub interested_sectors: Vec<String>,
    pub interested_roles: Vec<String>,
    #[serde(rename = "careerGoal1Year")]
    pub career_goal_1_year: String,
    #[serde(rename = "careerGoal5Year")]
    pub career_goal_5_year: String,
    pub entrepreneurship_interest: bool,
    pub startup_culture_interest: bool,
    pub international_career_goal: bool,
    pub desired_impact_area: Option<String>,
    pub career_goals_clarity: Option<i64>,
    pub career_priorities: Option<Vec<String>>,
    pub custom_career_priority: Option<String>,
    pub career_progress: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkingStyleAndMotivation {
    pub work_preference: String,
    pub working_location_preference: String,
    pub working_hours_preference: String,
    pub preferred_company_size: String,
    pub project_type_preference: String,
    pub main_motivation: Vec<String>,
    pub custom_motivation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelfAssessment {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub life_challenges: String,
    pub stress_handling: String,
    pub learning_desire: i64,
    pub identity_story: Option<String>,
    pub technical_confidence: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LearningPreferences {
    pub learning_style: Vec<String>,
    pub custom_learning_style: Option<String>,
    pub online_learning_frequency: String,
    pub mentorship_interest: bool,
    pub learning_resources: Vec<String>,
    pub custom_learning_resource: Option<String>,
    pub learning_motivation: Option<String>,
    pub learning_barriers: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Consents {
    pub data_processing_consent: bool,
    pub ai_career_advice_consent: bool,
}

/// Body of `POST /users/auth/register`: the user record plus an optional
/// password. Users without a password can only sign in through Firebase.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub user: UserData,
    #[serde(default)]
    pub password: Option<String>,
}
