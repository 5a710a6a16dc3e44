//! Template and experiment custom resources on a Kubernetes cluster.

use std::collections::BTreeMap;

use async_trait::async_trait;
use models::entities::{ExperimentEntity, TemplateEntity};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

mod client;
pub mod mock;

pub use client::KubeCluster;

pub const GROUP: &str = "hackathon.kaiyuanshe.cn";
pub const VERSION: &str = "v1";
pub const API_VERSION: &str = "hackathon.kaiyuanshe.cn/v1";
pub const TEMPLATES: &str = "templates";
pub const EXPERIMENTS: &str = "experiments";
pub const DEFAULT_NAMESPACE: &str = "default";

pub const LABEL_HACKATHON_NAME: &str = "hackathonName";
pub const LABEL_TEMPLATE_ID: &str = "templateId";
pub const LABEL_USER_ID: &str = "userId";

const ENV_USER: &str = "USER";
const META_CLUSTER: &str = "meta-cluster";

/// Status reported by the API server, or synthesized for transport failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default)]
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResourceStatus {
    pub fn success(code: u16) -> Self {
        Self { code, status: Some("Success".into()), ..Self::default() }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self { code: 500, reason: Some("Internal Server Error".into()), message: Some(message.into()), ..Self::default() }
    }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.code) }
}

#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    #[error("kubernetes returned {}: {}", .0.code, .0.message.as_deref().unwrap_or_default())]
    Status(ResourceStatus),
    #[error("kubernetes request failed: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn into_status(self) -> ResourceStatus {
        match self {
            Self::Status(status) => status,
            Self::Transport(message) => ResourceStatus::internal_error(message),
        }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, Self::Status(s) if s.code == 404) }
}

pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VncData {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplate {
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateData {
    #[serde(rename = "type")]
    pub kind: String,
    pub pod_template: PodTemplate,
    pub ingress_protocol: String,
    pub ingress_port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnc: Option<VncData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub data: TemplateData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentSpec {
    pub pause: bool,
    pub template: String,
    pub cluster_name: String,
}

/// Runtime state the operator writes back onto an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRuntime {
    #[serde(default)]
    pub cluster: Option<String>,
    #[serde(default, rename = "ingressIPs")]
    pub ingress_ips: Option<Vec<String>>,
    #[serde(default)]
    pub ingress_port: Option<i32>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub vnc: Option<VncData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ExperimentSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExperimentRuntime>,
}

pub fn template_resource_name(hackathon_name: &str, template_id: &str) -> String {
    format!("{hackathon_name}-{template_id}")
}

pub fn experiment_resource_name(hackathon_name: &str, experiment_id: &str) -> String {
    format!("{hackathon_name}-{experiment_id}")
}

/// Custom resource for a stored template. The VNC user is exported as `USER`.
pub fn build_template_resource(template: &TemplateEntity, namespace: &str) -> TemplateResource {
    let mut env = template.environment_variables.clone();
    if let Some(vnc) = &template.vnc {
        env.insert(ENV_USER.to_string(), vnc.user_name.clone());
    }
    TemplateResource {
        api_version: API_VERSION.into(),
        kind: "Template".into(),
        metadata: ObjectMeta {
            name: template_resource_name(template.hackathon_name(), template.id()),
            namespace: Some(namespace.to_string()),
            labels: BTreeMap::from([
                (LABEL_HACKATHON_NAME.to_string(), template.hackathon_name().to_string()),
                (LABEL_TEMPLATE_ID.to_string(), template.id().to_string()),
            ]),
        },
        data: TemplateData {
            kind: "Pod".into(),
            pod_template: PodTemplate { image: template.image.clone(), command: template.commands.clone(), env },
            ingress_protocol: template.ingress_protocol.as_str().to_string(),
            ingress_port: template.ingress_port,
            vnc: template.vnc.as_ref().map(|v| VncData { username: v.user_name.clone(), password: v.password.clone() }),
        },
    }
}

pub fn build_experiment_resource(experiment: &ExperimentEntity, namespace: &str) -> ExperimentResource {
    ExperimentResource {
        api_version: API_VERSION.into(),
        kind: "Experiment".into(),
        metadata: ObjectMeta {
            name: experiment_resource_name(experiment.hackathon_name(), experiment.id()),
            namespace: Some(namespace.to_string()),
            labels: BTreeMap::from([
                (LABEL_HACKATHON_NAME.to_string(), experiment.hackathon_name().to_string()),
                (LABEL_TEMPLATE_ID.to_string(), experiment.template_id.clone()),
                (LABEL_USER_ID.to_string(), experiment.user_id.clone()),
            ]),
        },
        spec: ExperimentSpec {
            pause: experiment.paused,
            template: template_resource_name(experiment.hackathon_name(), &experiment.template_id),
            cluster_name: META_CLUSTER.into(),
        },
        status: None,
    }
}

/// Custom-object operations against one cluster.
#[async_trait]
pub trait KubernetesCluster: Send + Sync {
    /// Create when absent, merge-patch otherwise.
    async fn create_or_update_template(&self, resource: &TemplateResource) -> ClusterResult<ResourceStatus>;
    async fn get_template(&self, name: &str) -> ClusterResult<TemplateResource>;
    async fn list_templates(&self, hackathon_name: &str) -> ClusterResult<Vec<TemplateResource>>;
    /// Missing resources count as deleted.
    async fn delete_template(&self, name: &str) -> ClusterResult<ResourceStatus>;

    async fn create_or_update_experiment(&self, resource: &ExperimentResource) -> ClusterResult<ResourceStatus>;
    async fn get_experiment(&self, name: &str) -> ClusterResult<ExperimentResource>;
    async fn list_experiments(&self, hackathon_name: &str) -> ClusterResult<Vec<ExperimentResource>>;
    async fn delete_experiment(&self, name: &str) -> ClusterResult<ResourceStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::entities::VncSettings;

    #[test]
    fn template_resource_exports_vnc_user() -> anyhow::Result<()> {
        let template = TemplateEntity {
            partition_key: "hack".into(),
            row_key: "t1".into(),
            image: "ubuntu".into(),
            ingress_port: 5901,
            vnc: Some(VncSettings { user_name: "bob".into(), password: "pw".into() }),
            ..Default::default()
        };
        let resource = build_template_resource(&template, DEFAULT_NAMESPACE);
        assert_eq!(resource.metadata.name, "hack-t1");
        assert_eq!(resource.data.pod_template.env.get("USER").map(String::as_str), Some("bob"));

        let json = serde_json::to_value(&resource)?;
        assert_eq!(json["apiVersion"], API_VERSION);
        assert_eq!(json["data"]["type"], "Pod");
        assert_eq!(json["data"]["ingressProtocol"], "vnc");
        assert_eq!(json["metadata"]["labels"]["templateId"], "t1");
        Ok(())
    }

    #[test]
    fn status_parses_api_errors() -> anyhow::Result<()> {
        let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
        let status: ResourceStatus = serde_json::from_str(body)?;
        assert_eq!(status.code, 404);
        assert!(ClusterError::Status(status).is_not_found());
        assert_eq!(ClusterError::Transport("boom".into()).into_status().code, 500);
        Ok(())
    }
}
