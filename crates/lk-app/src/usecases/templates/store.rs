use tokio::sync::RwLock;

use lk_core::{
    template::{ConnectionTemplate, TemplateError, TemplateInput},
    TemplateId,
};

/// Saved permission presets, in creation order.
#[derive(Default)]
pub struct TemplateStore {
    templates: RwLock<Vec<ConnectionTemplate>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, input: TemplateInput) -> ConnectionTemplate {
        let template = ConnectionTemplate::new(input);
        tracing::info!(
            template_id = %template.id,
            name = %template.name,
            "template created"
        );
        self.templates.write().await.push(template.clone());
        template
    }

    pub async fn list(&self) -> Vec<ConnectionTemplate> {
        self.templates.read().await.clone()
    }

    pub async fn get(&self, id: &TemplateId) -> Option<ConnectionTemplate> {
        self.templates
            .read()
            .await
            .iter()
            .find(|template| &template.id == id)
            .cloned()
    }

    pub async fn duplicate(&self, id: &TemplateId) -> Result<ConnectionTemplate, TemplateError> {
        let mut templates = self.templates.write().await;
        let copy = templates
            .iter()
            .find(|template| &template.id == id)
            .map(ConnectionTemplate::duplicate)
            .ok_or_else(|| TemplateError::NotFound(id.clone()))?;
        tracing::info!(source = %id, template_id = %copy.id, "template duplicated");
        templates.push(copy.clone());
        Ok(copy)
    }

    pub async fn delete(&self, id: &TemplateId) -> Result<ConnectionTemplate, TemplateError> {
        let mut templates = self.templates.write().await;
        let position = templates
            .iter()
            .position(|template| &template.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.clone()))?;
        tracing::info!(template_id = %id, "template deleted");
        Ok(templates.remove(position))
    }

    /// Counts one use of the template and returns it for applying to a flow.
    pub async fn record_use(&self, id: &TemplateId) -> Result<ConnectionTemplate, TemplateError> {
        let mut templates = self.templates.write().await;
        let template = templates
            .iter_mut()
            .find(|template| &template.id == id)
            .ok_or_else(|| TemplateError::NotFound(id.clone()))?;
        template.usage_count = template.usage_count.saturating_add(1);
        tracing::debug!(
            template_id = %id,
            usage_count = template.usage_count,
            "template used"
        );
        Ok(template.clone())
    }
}
