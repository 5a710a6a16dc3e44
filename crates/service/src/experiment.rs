//! Templates and per-user experiments backed by cluster resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use common::digest::string_to_guid;
use models::entities::{ExperimentEntity, IngressProtocol, TemplateEntity, VncSettings};
use models::query::partition_key_filter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::context::ManagementContext;
use crate::errors::ServiceResult;
use crate::kubernetes::{
    build_experiment_resource, build_template_resource, experiment_resource_name, template_resource_name, ExperimentRuntime,
    KubernetesCluster, ResourceStatus,
};

pub const DEFAULT_INGRESS_PORT: i32 = 5901;
const DEFAULT_TEMPLATE_NAME: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRequest {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub image: Option<String>,
    pub commands: Option<Vec<String>>,
    pub environment_variables: Option<BTreeMap<String, String>>,
    pub ingress_protocol: Option<IngressProtocol>,
    pub ingress_port: Option<i32>,
    pub vnc: Option<VncSettings>,
}

#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub template: TemplateEntity,
    pub status: ResourceStatus,
}

#[derive(Debug, Clone)]
pub struct ExperimentContext {
    pub experiment: ExperimentEntity,
    pub status: ResourceStatus,
    pub runtime: Option<ExperimentRuntime>,
}

/// Row key of a user's experiment on a template.
pub fn experiment_id(user_id: &str, template_id: &str) -> String {
    string_to_guid(&format!("{user_id}-{template_id}").to_lowercase()).to_string()
}

#[derive(Clone)]
pub struct ExperimentManagement {
    ctx: ManagementContext,
    cluster: Arc<dyn KubernetesCluster>,
    namespace: String,
}

impl ExperimentManagement {
    pub fn new(ctx: ManagementContext, cluster: Arc<dyn KubernetesCluster>, namespace: impl Into<String>) -> Self {
        Self { ctx, cluster, namespace: namespace.into() }
    }

    /// Store the template, then push it to the cluster. Cluster failures are
    /// reported in the returned status.
    #[instrument(skip(self, request), fields(hackathon = %hackathon_name))]
    pub async fn create_or_update_template(&self, hackathon_name: &str, request: &TemplateRequest) -> ServiceResult<TemplateContext> {
        let hackathon_name = hackathon_name.to_lowercase();
        let id = request.id.clone().filter(|i| !i.trim().is_empty()).unwrap_or_else(|| Uuid::new_v4().to_string()).to_lowercase();
        let template = match self.ctx.storage.templates.retrieve(&hackathon_name, &id).await? {
            None => {
                let entity = TemplateEntity {
                    partition_key: hackathon_name.clone(),
                    row_key: id.clone(),
                    created_at: Utc::now(),
                    display_name: request.display_name.clone().unwrap_or_else(|| DEFAULT_TEMPLATE_NAME.to_string()),
                    image: request.image.clone().unwrap_or_default(),
                    commands: request.commands.clone().unwrap_or_default(),
                    environment_variables: request.environment_variables.clone().unwrap_or_default(),
                    ingress_protocol: request.ingress_protocol.unwrap_or_default(),
                    ingress_port: request.ingress_port.unwrap_or(DEFAULT_INGRESS_PORT),
                    vnc: request.vnc.clone(),
                    ..Default::default()
                };
                self.ctx.storage.templates.insert(&entity).await?
            }
            Some(mut entity) => {
                if let Some(v) = &request.display_name {
                    entity.display_name = v.clone();
                }
                if let Some(v) = &request.image {
                    entity.image = v.clone();
                }
                if let Some(v) = &request.commands {
                    entity.commands = v.clone();
                }
                if let Some(v) = &request.environment_variables {
                    entity.environment_variables = v.clone();
                }
                if let Some(v) = request.ingress_protocol {
                    entity.ingress_protocol = v;
                }
                if let Some(v) = request.ingress_port {
                    entity.ingress_port = v;
                }
                if let Some(vnc) = &request.vnc {
                    let mut merged = entity.vnc.take().unwrap_or_default();
                    if !vnc.user_name.is_empty() {
                        merged.user_name = vnc.user_name.clone();
                    }
                    if !vnc.password.is_empty() {
                        merged.password = vnc.password.clone();
                    }
                    entity.vnc = Some(merged);
                }
                self.ctx.storage.templates.merge(&entity).await?
            }
        };

        let resource = build_template_resource(&template, &self.namespace);
        let status = match self.cluster.create_or_update_template(&resource).await {
            Ok(status) => status,
            Err(e) => {
                warn!(template_id = %id, error = %e, "template_push_failed");
                e.into_status()
            }
        };
        info!(template_id = %id, code = status.code, "template_saved");
        Ok(TemplateContext { template, status })
    }

    pub async fn get_template(&self, hackathon_name: &str, template_id: &str) -> ServiceResult<Option<TemplateContext>> {
        let hackathon_name = hackathon_name.to_lowercase();
        let Some(template) = self.ctx.storage.templates.retrieve(&hackathon_name, &template_id.to_lowercase()).await? else {
            return Ok(None);
        };
        let status = match self.cluster.get_template(&template_resource_name(&hackathon_name, template.id())).await {
            Ok(_) => ResourceStatus::success(200),
            Err(e) => e.into_status(),
        };
        Ok(Some(TemplateContext { template, status }))
    }

    /// Stored templates with their presence on the cluster.
    pub async fn list_templates(&self, hackathon_name: &str) -> ServiceResult<Vec<TemplateContext>> {
        let hackathon_name = hackathon_name.to_lowercase();
        let templates = self.ctx.storage.templates.query_entities(Some(&partition_key_filter(&hackathon_name))).await?;
        let deployed = self.cluster.list_templates(&hackathon_name).await;
        Ok(templates
            .into_iter()
            .map(|template| {
                let status = match &deployed {
                    Ok(resources) => {
                        let name = template_resource_name(&hackathon_name, template.id());
                        if resources.iter().any(|r| r.metadata.name == name) {
                            ResourceStatus::success(200)
                        } else {
                            ResourceStatus { code: 404, reason: Some("NotFound".into()), ..Default::default() }
                        }
                    }
                    Err(e) => e.clone().into_status(),
                };
                TemplateContext { template, status }
            })
            .collect())
    }

    #[instrument(skip(self), fields(hackathon = %hackathon_name, template_id = %template_id))]
    pub async fn delete_template(&self, hackathon_name: &str, template_id: &str) -> ServiceResult<Option<TemplateContext>> {
        let hackathon_name = hackathon_name.to_lowercase();
        let Some(template) = self.ctx.storage.templates.retrieve(&hackathon_name, &template_id.to_lowercase()).await? else {
            return Ok(None);
        };
        let status = match self.cluster.delete_template(&template_resource_name(&hackathon_name, template.id())).await {
            Ok(status) => status,
            Err(e) => e.into_status(),
        };
        if status.is_success() {
            self.ctx.storage.templates.delete(&hackathon_name, template.id()).await?;
            info!("template_deleted");
        }
        Ok(Some(TemplateContext { template, status }))
    }

    #[instrument(skip(self), fields(hackathon = %hackathon_name, template_id = %template_id, user_id = %user_id))]
    pub async fn create_experiment(&self, hackathon_name: &str, template_id: &str, user_id: &str) -> ServiceResult<ExperimentContext> {
        let entity = ExperimentEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: experiment_id(user_id, template_id),
            created_at: Utc::now(),
            template_id: template_id.to_lowercase(),
            user_id: user_id.to_string(),
            paused: false,
            ..Default::default()
        };
        let experiment = self.ctx.storage.experiments.insert_or_replace(&entity).await?;
        let resource = build_experiment_resource(&experiment, &self.namespace);
        let status = match self.cluster.create_or_update_experiment(&resource).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "experiment_push_failed");
                e.into_status()
            }
        };
        info!(experiment_id = %experiment.id(), code = status.code, "experiment_created");
        Ok(ExperimentContext { experiment, status, runtime: None })
    }

    pub async fn get_experiment(&self, hackathon_name: &str, experiment_id: &str) -> ServiceResult<Option<ExperimentContext>> {
        let hackathon_name = hackathon_name.to_lowercase();
        let Some(experiment) = self.ctx.storage.experiments.retrieve(&hackathon_name, experiment_id).await? else {
            return Ok(None);
        };
        let ctx = match self.cluster.get_experiment(&experiment_resource_name(&hackathon_name, experiment.id())).await {
            Ok(resource) => ExperimentContext { experiment, status: ResourceStatus::success(200), runtime: resource.status },
            Err(e) => ExperimentContext { experiment, status: e.into_status(), runtime: None },
        };
        Ok(Some(ctx))
    }

    pub async fn list_experiments(&self, hackathon_name: &str) -> ServiceResult<Vec<ExperimentContext>> {
        let hackathon_name = hackathon_name.to_lowercase();
        let experiments = self.ctx.storage.experiments.query_entities(Some(&partition_key_filter(&hackathon_name))).await?;
        let deployed = self.cluster.list_experiments(&hackathon_name).await;
        Ok(experiments
            .into_iter()
            .map(|experiment| match &deployed {
                Ok(resources) => {
                    let name = experiment_resource_name(&hackathon_name, experiment.id());
                    match resources.iter().find(|r| r.metadata.name == name) {
                        Some(r) => ExperimentContext { experiment, status: ResourceStatus::success(200), runtime: r.status.clone() },
                        None => ExperimentContext {
                            experiment,
                            status: ResourceStatus { code: 404, reason: Some("NotFound".into()), ..Default::default() },
                            runtime: None,
                        },
                    }
                }
                Err(e) => ExperimentContext { experiment, status: e.clone().into_status(), runtime: None },
            })
            .collect())
    }

    #[instrument(skip(self), fields(hackathon = %hackathon_name, experiment_id = %experiment_id))]
    pub async fn delete_experiment(&self, hackathon_name: &str, experiment_id: &str) -> ServiceResult<Option<ExperimentContext>> {
        let hackathon_name = hackathon_name.to_lowercase();
        let Some(experiment) = self.ctx.storage.experiments.retrieve(&hackathon_name, experiment_id).await? else {
            return Ok(None);
        };
        let status = match self.cluster.delete_experiment(&experiment_resource_name(&hackathon_name, experiment.id())).await {
            Ok(status) => status,
            Err(e) => e.into_status(),
        };
        if status.is_success() {
            self.ctx.storage.experiments.delete(&hackathon_name, experiment.id()).await?;
            info!("experiment_deleted");
        }
        Ok(Some(ExperimentContext { experiment, status, runtime: None }))
    }

    /// Delete the experiment's cluster resource and create it again from the
    /// stored row. Anything saved inside the running experiment is lost.
    #[instrument(skip(self), fields(hackathon = %hackathon_name, experiment_id = %experiment_id))]
    pub async fn reset_experiment(&self, hackathon_name: &str, experiment_id: &str) -> ServiceResult<Option<ExperimentContext>> {
        let hackathon_name = hackathon_name.to_lowercase();
        let Some(experiment) = self.ctx.storage.experiments.retrieve(&hackathon_name, experiment_id).await? else {
            return Ok(None);
        };
        let name = experiment_resource_name(&hackathon_name, experiment.id());
        match self.cluster.delete_experiment(&name).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(error = %e, "experiment_reset_delete_failed");
                return Ok(Some(ExperimentContext { experiment, status: e.into_status(), runtime: None }));
            }
        }
        let resource = build_experiment_resource(&experiment, &self.namespace);
        let status = match self.cluster.create_or_update_experiment(&resource).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "experiment_push_failed");
                e.into_status()
            }
        };
        info!(code = status.code, "experiment_reset");
        Ok(Some(ExperimentContext { experiment, status, runtime: None }))
    }

    /// Delete every experiment and template of a hackathon. Returns how many
    /// resources could not be removed from the cluster.
    #[instrument(skip(self), fields(hackathon = %hackathon_name))]
    pub async fn cleanup_hackathon_resources(&self, hackathon_name: &str) -> ServiceResult<usize> {
        let mut failures = 0;
        for ctx in self.list_experiments(hackathon_name).await? {
            let deleted = self.delete_experiment(hackathon_name, ctx.experiment.id()).await?;
            if deleted.is_some_and(|d| !d.status.is_success()) {
                failures += 1;
            }
        }
        for ctx in self.list_templates(hackathon_name).await? {
            let deleted = self.delete_template(hackathon_name, ctx.template.id()).await?;
            if deleted.is_some_and(|d| !d.status.is_success()) {
                failures += 1;
            }
        }
        info!(failures, "hackathon_resources_cleaned");
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::mock::MockKubernetesCluster;
    use crate::kubernetes::DEFAULT_NAMESPACE;

    fn mgmt() -> (ExperimentManagement, Arc<MockKubernetesCluster>) {
        let cluster = Arc::new(MockKubernetesCluster::default());
        let mgmt = ExperimentManagement::new(ManagementContext::in_memory(), cluster.clone(), DEFAULT_NAMESPACE);
        (mgmt, cluster)
    }

    #[tokio::test]
    async fn template_defaults_and_merge() -> anyhow::Result<()> {
        let (mgmt, cluster) = mgmt();
        let req = TemplateRequest { id: Some("T1".into()), image: Some("ubuntu".into()), ..Default::default() };
        let created = mgmt.create_or_update_template("Hack", &req).await?;
        assert_eq!(created.template.id(), "t1");
        assert_eq!(created.template.display_name, "default");
        assert_eq!(created.template.ingress_port, DEFAULT_INGRESS_PORT);
        assert_eq!(created.template.ingress_protocol, IngressProtocol::Vnc);
        assert_eq!(created.status.code, 201);

        let patch = TemplateRequest {
            id: Some("t1".into()),
            vnc: Some(VncSettings { user_name: "bob".into(), password: String::new() }),
            ..Default::default()
        };
        let updated = mgmt.create_or_update_template("hack", &patch).await?;
        assert_eq!(updated.template.image, "ubuntu");
        assert_eq!(updated.template.vnc.as_ref().map(|v| v.user_name.as_str()), Some("bob"));
        assert_eq!(updated.status.code, 200);
        assert_eq!(cluster.template_count(), 1);

        assert_eq!(mgmt.get_template("hack", "t1").await?.unwrap().status.code, 200);
        assert_eq!(mgmt.list_templates("hack").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn cluster_failure_is_reported() -> anyhow::Result<()> {
        let (mgmt, cluster) = mgmt();
        cluster.fail_requests(true);
        let ctx = mgmt.create_or_update_template("hack", &TemplateRequest::default()).await?;
        assert_eq!(ctx.status.code, 500);
        assert_eq!(ctx.status.reason.as_deref(), Some("Internal Server Error"));
        assert!(mgmt.get_template("hack", ctx.template.id()).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn experiments_and_cleanup() -> anyhow::Result<()> {
        let (mgmt, cluster) = mgmt();
        let t = mgmt.create_or_update_template("hack", &TemplateRequest::default()).await?;
        let e = mgmt.create_experiment("hack", t.template.id(), "alice").await?;
        assert_eq!(e.experiment.id(), experiment_id("ALICE", t.template.id()));
        let again = mgmt.create_experiment("hack", t.template.id(), "alice").await?;
        assert_eq!(again.experiment.id(), e.experiment.id());
        assert_eq!(cluster.experiment_count(), 1);

        let fetched = mgmt.get_experiment("hack", e.experiment.id()).await?.unwrap();
        assert!(fetched.status.is_success());
        assert_eq!(mgmt.list_experiments("hack").await?.len(), 1);

        let reset = mgmt.reset_experiment("hack", e.experiment.id()).await?.unwrap();
        assert_eq!(reset.status.code, 201);
        assert_eq!(reset.experiment.created_at, e.experiment.created_at);
        assert_eq!(cluster.experiment_count(), 1);
        assert!(mgmt.reset_experiment("hack", "missing").await?.is_none());
        cluster.fail_requests(true);
        assert_eq!(mgmt.reset_experiment("hack", e.experiment.id()).await?.unwrap().status.code, 500);
        cluster.fail_requests(false);

        assert_eq!(mgmt.cleanup_hackathon_resources("hack").await?, 0);
        assert_eq!(cluster.template_count(), 0);
        assert_eq!(cluster.experiment_count(), 0);
        assert!(mgmt.list_templates("hack").await?.is_empty());
        assert!(mgmt.get_experiment("hack", e.experiment.id()).await?.is_none());
        Ok(())
    }
}
