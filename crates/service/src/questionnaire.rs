//! Enrollment questionnaire, one per hackathon.

use chrono::Utc;
use models::entities::{Extension, QuestionnaireEntity};
use tracing::info;

use crate::context::ManagementContext;
use crate::errors::ServiceResult;

#[derive(Clone)]
pub struct QuestionnaireManagement {
    ctx: ManagementContext,
}

impl QuestionnaireManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    pub async fn create_questionnaire(&self, hackathon_name: &str, extensions: Vec<Extension>) -> ServiceResult<QuestionnaireEntity> {
        let entity = QuestionnaireEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: String::new(),
            created_at: Utc::now(),
            extensions,
            ..Default::default()
        };
        let saved = self.ctx.storage.questionnaires.insert_or_replace(&entity).await?;
        info!(hackathon = %hackathon_name, "questionnaire_created");
        Ok(saved)
    }

    pub async fn update_questionnaire(&self, existing: &QuestionnaireEntity, extensions: Vec<Extension>) -> ServiceResult<QuestionnaireEntity> {
        let mut entity = existing.clone();
        entity.extensions = extensions;
        Ok(self.ctx.storage.questionnaires.merge(&entity).await?)
    }

    pub async fn get_questionnaire(&self, hackathon_name: &str) -> ServiceResult<Option<QuestionnaireEntity>> {
        if hackathon_name.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.questionnaires.retrieve(&hackathon_name.to_lowercase(), "").await?)
    }

    pub async fn delete_questionnaire(&self, hackathon_name: &str) -> ServiceResult<()> {
        self.ctx.storage.questionnaires.delete(&hackathon_name.to_lowercase(), "").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn questionnaire_crud() -> anyhow::Result<()> {
        let mgmt = QuestionnaireManagement::new(ManagementContext::in_memory());
        let ext = vec![Extension { name: "shirt".into(), value: "M".into() }];
        let q = mgmt.create_questionnaire("Hack", ext).await?;
        assert_eq!(q.hackathon_name(), "hack");

        let q = mgmt.update_questionnaire(&q, Vec::new()).await?;
        assert!(q.extensions.is_empty());
        assert!(mgmt.get_questionnaire("hack").await?.is_some());
        mgmt.delete_questionnaire("hack").await?;
        assert!(mgmt.get_questionnaire("hack").await?.is_none());
        Ok(())
    }
}
