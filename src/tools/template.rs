use crate::{
    config::PromptSpec,
    errors::AppError,
    mcp::{
        registry::PromptSource,
        types::{PromptArgument, PromptDescriptor, RenderedPrompt},
    },
    tools::substitute,
};
use async_trait::async_trait;
use std::collections::HashMap;

pub struct TemplatePrompt {
    spec: PromptSpec,
}

impl TemplatePrompt {
    pub fn new(spec: PromptSpec) -> Self {
        Self { spec }
    }

    fn default_for(&self, name: &str) -> Option<String> {
        self.spec.arguments.iter().find(|a| a.name == name).and_then(|a| a.default.clone())
    }
}

#[async_trait]
impl PromptSource for TemplatePrompt {
    fn descriptor(&self) -> PromptDescriptor {
        PromptDescriptor {
            name: self.spec.name.clone(),
            description: self.spec.description.clone(),
            arguments: self
                .spec
                .arguments
                .iter()
                .map(|a| PromptArgument { name: a.name.clone(), description: a.description.clone(), required: a.required })
                .collect(),
        }
    }

    async fn render(&self, args: &HashMap<String, String>) -> Result<RenderedPrompt, AppError> {
        // non-empty supplied value, then declared default, then empty
        let text = substitute(&self.spec.template, |k| {
            let supplied = args.get(k).filter(|v| !v.is_empty()).cloned();
            Some(supplied.or_else(|| self.default_for(k)).unwrap_or_default())
        })
        .unwrap_or_default();
        Ok(RenderedPrompt::user(self.spec.description.clone(), text))
    }
}
