use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "poll_type")]
pub enum PollType {
    #[serde(rename = "yesno")]
    #[sqlx(rename = "yesno")]
    YesNo,
    #[serde(rename = "single choice")]
    #[sqlx(rename = "single choice")]
    SingleChoice,
    #[serde(rename = "rating")]
    #[sqlx(rename = "rating")]
    Rating,
    #[serde(rename = "imagebased")]
    #[sqlx(rename = "imagebased")]
    ImageBased,
    #[serde(rename = "open ended")]
    #[sqlx(rename = "open ended")]
    OpenEnded,
}

impl PollType {
    /// Poll types that collect votes through an option index.
    pub fn has_options(&self) -> bool {
        matches!(self, PollType::YesNo | PollType::SingleChoice | PollType::Rating)
    }
}

impl FromStr for PollType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yesno" => Ok(PollType::YesNo),
            "single choice" => Ok(PollType::SingleChoice),
            "rating" => Ok(PollType::Rating),
            "imagebased" => Ok(PollType::ImageBased),
            "open ended" => Ok(PollType::OpenEnded),
            _ => Err(Error::Validation(format!("invalid poll type ({})", s))),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub poll_type: PollType,
    pub images: Vec<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PollOption {
    pub text: String,
    pub votes: i64,
}

#[derive(Debug, Serialize)]
pub struct PollComment {
    pub user: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: i64,
    pub username: String,
    pub profile_image_url: String,
}

/// Document view of a poll as it goes over the wire: options, images,
/// voters and comments embedded, plus the creator's public identity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDetail {
    pub id: i64,
    pub question: String,
    pub poll_type: PollType,
    pub options: Vec<PollOption>,
    pub images: Vec<String>,
    pub created_by: Creator,
    pub voters: Vec<i64>,
    pub comments: Vec<PollComment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_poll_type_labels_round_trip() {
        for (label, ty) in [
            ("yesno", PollType::YesNo),
            ("single choice", PollType::SingleChoice),
            ("rating", PollType::Rating),
            ("imagebased", PollType::ImageBased),
            ("open ended", PollType::OpenEnded),
        ] {
            assert_eq!(PollType::from_str(label).unwrap(), ty);
            assert_eq!(serde_json::to_string(&ty).unwrap(), format!("\"{}\"", label));
        }
    }

    #[test]
    fn test_unknown_poll_type_is_rejected() {
        assert!(PollType::from_str("ranked").is_err());
    }

    #[test]
    fn test_only_choice_types_carry_options() {
        assert!(PollType::YesNo.has_options());
        assert!(PollType::SingleChoice.has_options());
        assert!(PollType::Rating.has_options());
        assert!(!PollType::ImageBased.has_options());
        assert!(!PollType::OpenEnded.has_options());
    }
}
