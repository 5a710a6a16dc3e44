use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::*;

/// In-process cluster keeping resources by name.
///
/// Used when no API server is configured and in tests; `fail_requests`
/// makes every call fail like an unreachable server.
#[derive(Default)]
pub struct MockKubernetesCluster {
    templates: DashMap<String, TemplateResource>,
    experiments: DashMap<String, ExperimentResource>,
    failing: AtomicBool,
}

impl MockKubernetesCluster {
    pub fn fail_requests(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }

    pub fn template_count(&self) -> usize { self.templates.len() }

    pub fn experiment_count(&self) -> usize { self.experiments.len() }

    fn check(&self) -> ClusterResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClusterError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

fn not_found(name: &str) -> ClusterError {
    ClusterError::Status(ResourceStatus {
        code: 404,
        status: Some("Failure".into()),
        reason: Some("NotFound".into()),
        message: Some(format!("{name} not found")),
    })
}

fn in_hackathon(meta: &ObjectMeta, hackathon_name: &str) -> bool {
    meta.labels.get(LABEL_HACKATHON_NAME).map(String::as_str) == Some(hackathon_name)
}

#[async_trait]
impl KubernetesCluster for MockKubernetesCluster {
    async fn create_or_update_template(&self, resource: &TemplateResource) -> ClusterResult<ResourceStatus> {
        self.check()?;
        let code = if self.templates.insert(resource.metadata.name.clone(), resource.clone()).is_some() { 200 } else { 201 };
        Ok(ResourceStatus::success(code))
    }

    async fn get_template(&self, name: &str) -> ClusterResult<TemplateResource> {
        self.check()?;
        self.templates.get(name).map(|t| t.clone()).ok_or_else(|| not_found(name))
    }

    async fn list_templates(&self, hackathon_name: &str) -> ClusterResult<Vec<TemplateResource>> {
        self.check()?;
        Ok(self.templates.iter().filter(|t| in_hackathon(&t.metadata, hackathon_name)).map(|t| t.clone()).collect())
    }

    async fn delete_template(&self, name: &str) -> ClusterResult<ResourceStatus> {
        self.check()?;
        self.templates.remove(name);
        Ok(ResourceStatus::success(204))
    }

    async fn create_or_update_experiment(&self, resource: &ExperimentResource) -> ClusterResult<ResourceStatus> {
        self.check()?;
        let code = if self.experiments.insert(resource.metadata.name.clone(), resource.clone()).is_some() { 200 } else { 201 };
        Ok(ResourceStatus::success(code))
    }

    async fn get_experiment(&self, name: &str) -> ClusterResult<ExperimentResource> {
        self.check()?;
        self.experiments.get(name).map(|e| e.clone()).ok_or_else(|| not_found(name))
    }

    async fn list_experiments(&self, hackathon_name: &str) -> ClusterResult<Vec<ExperimentResource>> {
        self.check()?;
        Ok(self.experiments.iter().filter(|e| in_hackathon(&e.metadata, hackathon_name)).map(|e| e.clone()).collect())
    }

    async fn delete_experiment(&self, name: &str) -> ClusterResult<ResourceStatus> {
        self.check()?;
        self.experiments.remove(name);
        Ok(ResourceStatus::success(204))
    }
}
