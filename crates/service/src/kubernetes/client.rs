use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::{Client, Config};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::*;
use crate::errors::{ServiceError, ServiceResult};

impl From<kube::Error> for ClusterError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) => Self::Status(ResourceStatus {
                code: resp.code,
                status: Some(resp.status).filter(|s| !s.is_empty()),
                reason: Some(resp.reason).filter(|r| !r.is_empty()),
                message: Some(resp.message).filter(|m| !m.is_empty()),
            }),
            other => Self::Transport(other.to_string()),
        }
    }
}

fn convert<T: Serialize, U: DeserializeOwned>(value: &T) -> ClusterResult<U> {
    serde_json::to_value(value)
        .and_then(serde_json::from_value)
        .map_err(|e| ClusterError::Transport(format!("resource conversion failed: {e}")))
}

/// Template and experiment custom objects through a `kube` client.
pub struct KubeCluster {
    templates: Api<DynamicObject>,
    experiments: Api<DynamicObject>,
    namespace: String,
}

impl KubeCluster {
    /// Builds the client; must be called inside a tokio runtime.
    pub fn new(cfg: &configs::KubernetesConfig) -> ServiceResult<Self> {
        if cfg.api_server.trim().is_empty() {
            return Err(ServiceError::Validation("kubernetes.api_server is empty".into()));
        }
        let namespace = if cfg.namespace.trim().is_empty() { DEFAULT_NAMESPACE.to_string() } else { cfg.namespace.clone() };
        let url = cfg
            .api_server
            .trim_end_matches('/')
            .parse()
            .map_err(|e| ServiceError::Validation(format!("kubernetes.api_server: {e}")))?;
        let mut config = Config::new(url);
        config.default_namespace = namespace.clone();
        config.accept_invalid_certs = cfg.accept_invalid_certs;
        if let Some(token) = cfg.token.clone().filter(|t| !t.trim().is_empty()) {
            config.auth_info.token = Some(SecretString::new(token));
        }
        let client = Client::try_from(config).map_err(|e| ServiceError::Upstream(e.to_string()))?;
        Ok(Self {
            templates: Api::namespaced_with(client.clone(), &namespace, &api_resource("Template", TEMPLATES)),
            experiments: Api::namespaced_with(client, &namespace, &api_resource("Experiment", EXPERIMENTS)),
            namespace,
        })
    }

    pub fn namespace(&self) -> &str { &self.namespace }
}

pub(crate) fn api_resource(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(GROUP, VERSION, kind), plural)
}

fn hackathon_selector(hackathon_name: &str) -> ListParams {
    ListParams::default().labels(&format!("{LABEL_HACKATHON_NAME}={hackathon_name}"))
}

async fn get<T: DeserializeOwned>(api: &Api<DynamicObject>, name: &str) -> ClusterResult<T> {
    convert(&api.get(name).await?)
}

async fn list<T: DeserializeOwned>(api: &Api<DynamicObject>, hackathon_name: &str) -> ClusterResult<Vec<T>> {
    api.list(&hackathon_selector(hackathon_name)).await?.items.iter().map(|o| convert(o)).collect()
}

async fn create_or_update<T: Serialize>(api: &Api<DynamicObject>, name: &str, resource: &T) -> ClusterResult<ResourceStatus> {
    let object: DynamicObject = convert(resource)?;
    if api.get_opt(name).await?.is_some() {
        api.patch(name, &PatchParams::default(), &Patch::Merge(&object)).await?;
        debug!(name = %name, "kubernetes_resource_patched");
        Ok(ResourceStatus::success(200))
    } else {
        api.create(&PostParams::default(), &object).await?;
        debug!(name = %name, "kubernetes_resource_created");
        Ok(ResourceStatus::success(201))
    }
}

async fn delete(api: &Api<DynamicObject>, name: &str) -> ClusterResult<ResourceStatus> {
    match api.delete(name, &DeleteParams::default()).await.map_err(ClusterError::from) {
        Ok(_) => Ok(ResourceStatus::success(204)),
        Err(e) if e.is_not_found() => Ok(ResourceStatus::success(204)),
        Err(e) => {
            warn!(name = %name, error = %e, "kubernetes_delete_failed");
            Err(e)
        }
    }
}

#[async_trait]
impl KubernetesCluster for KubeCluster {
    async fn create_or_update_template(&self, resource: &TemplateResource) -> ClusterResult<ResourceStatus> {
        create_or_update(&self.templates, &resource.metadata.name, resource).await
    }

    async fn get_template(&self, name: &str) -> ClusterResult<TemplateResource> {
        get(&self.templates, name).await
    }

    async fn list_templates(&self, hackathon_name: &str) -> ClusterResult<Vec<TemplateResource>> {
        list(&self.templates, hackathon_name).await
    }

    async fn delete_template(&self, name: &str) -> ClusterResult<ResourceStatus> {
        delete(&self.templates, name).await
    }

    async fn create_or_update_experiment(&self, resource: &ExperimentResource) -> ClusterResult<ResourceStatus> {
        create_or_update(&self.experiments, &resource.metadata.name, resource).await
    }

    async fn get_experiment(&self, name: &str) -> ClusterResult<ExperimentResource> {
        get(&self.experiments, name).await
    }

    async fn list_experiments(&self, hackathon_name: &str) -> ClusterResult<Vec<ExperimentResource>> {
        list(&self.experiments, hackathon_name).await
    }

    async fn delete_experiment(&self, name: &str) -> ClusterResult<ResourceStatus> {
        delete(&self.experiments, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    #[test]
    fn custom_resources_use_hackathon_group() {
        let ar = api_resource("Template", TEMPLATES);
        assert_eq!(ar.api_version, API_VERSION);
        assert_eq!(ar.plural, "templates");
        assert_eq!(ar.kind, "Template");
    }

    #[tokio::test]
    async fn client_requires_api_server() -> anyhow::Result<()> {
        let cfg = configs::KubernetesConfig { api_server: "https://k8s:6443/".into(), ..Default::default() };
        let cluster = KubeCluster::new(&cfg)?;
        assert_eq!(cluster.namespace(), DEFAULT_NAMESPACE);
        assert!(KubeCluster::new(&configs::KubernetesConfig::default()).is_err());
        Ok(())
    }

    #[test]
    fn resources_convert_to_dynamic_objects() -> anyhow::Result<()> {
        let resource = ExperimentResource {
            api_version: API_VERSION.into(),
            kind: "Experiment".into(),
            metadata: ObjectMeta { name: "hack-e1".into(), ..Default::default() },
            spec: ExperimentSpec { template: "hack-t1".into(), ..Default::default() },
            status: None,
        };
        let object: DynamicObject = convert(&resource)?;
        assert_eq!(object.metadata.name.as_deref(), Some("hack-e1"));
        assert_eq!(object.data["spec"]["template"], "hack-t1");
        let back: ExperimentResource = convert(&object)?;
        assert_eq!(back, resource);
        Ok(())
    }

    #[test]
    fn api_errors_keep_their_status() {
        let err = ClusterError::from(kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "experiments.hackathon.kaiyuanshe.cn \"x\" not found".into(),
            reason: "NotFound".into(),
            code: 404,
        }));
        assert!(err.is_not_found());
        assert_eq!(err.into_status().reason.as_deref(), Some("NotFound"));
    }
}
