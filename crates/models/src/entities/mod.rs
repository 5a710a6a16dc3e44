//! Table entities and the enums they store.
//!
//! Entities serialize with PascalCase property names; enums are stored by
//! their camelCase API names.

mod activity_log;
mod award;
mod cron_job;
mod enrollment;
mod experiment;
mod hackathon;
mod hackathon_admin;
mod judge;
mod organizer;
mod rating;
mod team;
mod template_repo;
mod user;

pub use activity_log::{ActivityLogCategory, ActivityLogEntity};
pub use award::{AwardAssignmentEntity, AwardEntity, AwardTarget};
pub use cron_job::CronJobEntity;
pub use enrollment::{EnrollmentEntity, EnrollmentStatus};
pub use experiment::{ExperimentEntity, IngressProtocol, TemplateEntity, VncSettings};
pub use hackathon::{HackathonEntity, HackathonStatus};
pub use hackathon_admin::HackathonAdminEntity;
pub use judge::JudgeEntity;
pub use organizer::{AnnouncementEntity, OrganizerEntity, OrganizerType, QuestionnaireEntity};
pub use rating::{RatingEntity, RatingKindEntity};
pub use team::{TeamEntity, TeamMemberEntity, TeamMemberRole, TeamMemberStatus, TeamWorkEntity, TeamWorkType};
pub use template_repo::TemplateRepoEntity;
pub use user::{Identity, TopUserEntity, UserEntity, UserTokenEntity};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Adds `as_str` and `Display` to a fieldless enum using its serde names.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self { $(Self::$variant => $name),+ }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
        }

        impl std::str::FromStr for $ty {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(_ if s.eq_ignore_ascii_case($name) => Ok(Self::$variant),)+
                    _ => Err(format!("unknown {}: {}", stringify!($ty), s)),
                }
            }
        }
    };
}
pub(crate) use string_enum;

/// Image shown for hackathon banners, award pictures and organizer logos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PictureInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub uri: String,
}

/// Free-form name/value pair attached to enrollments and questionnaires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Extension {
    pub name: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableEntity;

    #[test]
    fn enums_use_camel_case_names() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_value(HackathonStatus::PendingApproval)?, "pendingApproval");
        assert_eq!(HackathonStatus::PendingApproval.as_str(), "pendingApproval");
        assert_eq!("ONLINE".parse::<HackathonStatus>(), Ok(HackathonStatus::Online));
        assert!("bogus".parse::<TeamMemberRole>().is_err());
        Ok(())
    }

    #[test]
    fn entity_row_uses_pascal_case() -> anyhow::Result<()> {
        let e = EnrollmentEntity {
            partition_key: "hack".into(),
            row_key: "u1".into(),
            status: EnrollmentStatus::Approved,
            ..Default::default()
        };
        let row = e.to_row()?;
        assert_eq!(row.properties.get("Status"), Some(&serde_json::json!("approved")));
        assert!(row.properties.contains_key("CreatedAt"));
        assert!(!row.properties.contains_key("Extensions"));
        let back = EnrollmentEntity::from_row(row)?;
        assert_eq!(back.hackathon_name(), "hack");
        assert_eq!(back.user_id(), "u1");
        Ok(())
    }
}
