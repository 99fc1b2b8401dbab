//! Canonical document locations.

use super::{validate_segment, DocPath, StoreError};

pub const USERS: &str = "users";
pub const ANALYSIS_REPORT_DOC: &str = "analysis_report";

pub fn user(uid: &str) -> Result<DocPath, StoreError> {
    DocPath::new(USERS, uid)
}

pub fn profile_collection(uid: &str) -> Result<String, StoreError> {
    validate_segment(uid)?;
    Ok(format!("{USERS}/{uid}/profile_data"))
}

pub fn card(uid: &str, card_id: &str) -> Result<DocPath, StoreError> {
    DocPath::new(profile_collection(uid)?, card_id)
}

pub fn analysis_report(uid: &str) -> Result<DocPath, StoreError> {
    DocPath::new(profile_collection(uid)?, ANALYSIS_REPORT_DOC)
}

pub fn history_collection(uid: &str) -> Result<String, StoreError> {
    validate_segment(uid)?;
    Ok(format!("{USERS}/{uid}/analysis_history"))
}

pub fn history_entry(uid: &str, entry_id: &str) -> Result<DocPath, StoreError> {
    DocPath::new(history_collection(uid)?, entry_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_path_nests_under_user() {
        let path = card("u1", "career-vision").unwrap();
        assert_eq!(path.to_string(), "users/u1/profile_data/career-vision");
    }

    #[test]
    fn test_report_lives_beside_cards() {
        let path = analysis_report("u1").unwrap();
        assert_eq!(path.collection(), profile_collection("u1").unwrap());
        assert_eq!(path.id(), ANALYSIS_REPORT_DOC);
    }

    #[test]
    fn test_user_id_with_separator_is_rejected() {
        assert!(matches!(user("a/b"), Err(StoreError::InvalidPath(_))));
        assert!(matches!(card("a/b", "networking"), Err(StoreError::InvalidPath(_))));
        assert!(matches!(history_collection(""), Err(StoreError::InvalidPath(_))));
    }
}
