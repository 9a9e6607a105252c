use crate::{
    errors::AppError,
    mcp::types::{
        Args, InputSchema, PromptDescriptor, RenderedPrompt, ResourceContents, ResourceDescriptor,
        ToolDescriptor, ToolResult,
    },
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub type DynTool = Arc<dyn Tool + Send + Sync + 'static>;
pub type DynResource = Arc<dyn ResourceSource + Send + Sync + 'static>;
pub type DynPrompt = Arc<dyn PromptSource + Send + Sync + 'static>;

#[async_trait]
pub trait Tool {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> InputSchema;
    async fn call(&self, args: Args) -> Result<ToolResult, AppError>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Produces the content behind a registered resource descriptor.
#[async_trait]
pub trait ResourceSource {
    fn descriptor(&self) -> ResourceDescriptor;
    async fn read(&self) -> Result<ResourceContents, AppError>;
}

/// Renders the template behind a registered prompt descriptor.
#[async_trait]
pub trait PromptSource {
    fn descriptor(&self) -> PromptDescriptor;
    async fn render(&self, args: &HashMap<String, String>) -> Result<RenderedPrompt, AppError>;
}

/// Three independent keyed tables kept in insertion order. Mutated only while
/// servers register; shared read-only behind an `Arc` afterwards.
#[derive(Default, Clone)]
pub struct Registry {
    tools: Vec<(String, DynTool)>,
    resources: Vec<(ResourceDescriptor, DynResource)>,
    prompts: Vec<(PromptDescriptor, DynPrompt)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites by name. An overwrite keeps the original slot and
    /// returns the replaced tool.
    pub fn register(&mut self, tool: DynTool) -> Option<DynTool> {
        let name = tool.name().to_string();
        if let Some(slot) = self.tools.iter_mut().find(|(n, _)| *n == name) {
            warn!(tool = %name, "Tool {name} is already registered. Overwriting.");
            return Some(std::mem::replace(&mut slot.1, tool));
        }
        debug!(tool = %name, "registered tool");
        self.tools.push((name, tool));
        None
    }

    pub fn register_resource(&mut self, source: DynResource) -> Option<DynResource> {
        let descriptor = source.descriptor();
        if let Some(slot) = self.resources.iter_mut().find(|(d, _)| d.uri == descriptor.uri) {
            warn!(uri = %descriptor.uri, "Resource {} is already registered. Overwriting.", descriptor.uri);
            slot.0 = descriptor;
            return Some(std::mem::replace(&mut slot.1, source));
        }
        debug!(uri = %descriptor.uri, "registered resource");
        self.resources.push((descriptor, source));
        None
    }

    pub fn register_prompt(&mut self, source: DynPrompt) -> Option<DynPrompt> {
        let descriptor = source.descriptor();
        if let Some(slot) = self.prompts.iter_mut().find(|(d, _)| d.name == descriptor.name) {
            warn!(prompt = %descriptor.name, "Prompt {} is already registered. Overwriting.", descriptor.name);
            slot.0 = descriptor;
            return Some(std::mem::replace(&mut slot.1, source));
        }
        debug!(prompt = %descriptor.name, "registered prompt");
        self.prompts.push((descriptor, source));
        None
    }

    pub fn get(&self, name: &str) -> Option<DynTool> {
        self.tools.iter().find(|(n, _)| n == name).map(|(_, t)| t.clone())
    }

    pub fn get_resource(&self, uri: &str) -> Option<(&ResourceDescriptor, DynResource)> {
        self.resources.iter().find(|(d, _)| d.uri == uri).map(|(d, s)| (d, s.clone()))
    }

    pub fn get_prompt(&self, name: &str) -> Option<(&PromptDescriptor, DynPrompt)> {
        self.prompts.iter().find(|(d, _)| d.name == name).map(|(d, s)| (d, s.clone()))
    }

    pub fn list_names(&self) -> Vec<String> {
        self.tools.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|(_, t)| t.descriptor()).collect()
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.resources.iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.prompts.iter().map(|(d, _)| d.clone()).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mcp::types::{ParamType, PromptArgument};
    use std::io::Write;
    use std::sync::Mutex;

    pub(crate) struct Fixed {
        pub name: &'static str,
        pub reply: &'static str,
    }

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "fixed reply"
        }
        fn input_schema(&self) -> InputSchema {
            InputSchema::new().param("unused", ParamType::String, false)
        }
        async fn call(&self, _args: Args) -> Result<ToolResult, AppError> {
            Ok(ToolResult::text(self.reply))
        }
    }

    struct StaticPrompt(&'static str);

    #[async_trait]
    impl PromptSource for StaticPrompt {
        fn descriptor(&self) -> PromptDescriptor {
            PromptDescriptor {
                name: "review".into(),
                description: Some(self.0.into()),
                arguments: vec![PromptArgument { name: "focus".into(), description: None, required: false }],
            }
        }
        async fn render(&self, _args: &HashMap<String, String>) -> Result<RenderedPrompt, AppError> {
            Ok(RenderedPrompt::user(None, self.0))
        }
    }

    struct StaticResource(&'static str);

    #[async_trait]
    impl ResourceSource for StaticResource {
        fn descriptor(&self) -> ResourceDescriptor {
            ResourceDescriptor {
                uri: "docs://readme".into(),
                name: self.0.into(),
                description: None,
                mime_type: Some("text/markdown".into()),
            }
        }
        async fn read(&self) -> Result<ResourceContents, AppError> {
            Ok(ResourceContents {
                uri: "docs://readme".into(),
                mime_type: Some("text/markdown".into()),
                text: Some(self.0.into()),
                blob: None,
            })
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_warnings<F: FnOnce()>(f: F) -> String {
        let buf = Captured::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn duplicate_name_overwrites_and_warns_once() {
        let mut reg = Registry::new();
        let logs = capture_warnings(|| {
            assert!(reg.register(Arc::new(Fixed { name: "lint", reply: "first" })).is_none());
            assert!(reg.register(Arc::new(Fixed { name: "lint", reply: "second" })).is_some());
        });
        assert_eq!(logs.matches("Tool lint is already registered").count(), 1);
        assert_eq!(reg.list_tools().len(), 1);
        assert_eq!(reg.list_names(), vec!["lint".to_string()]);
    }

    #[tokio::test]
    async fn second_registration_wins() {
        let mut reg = Registry::new();
        reg.register(Arc::new(Fixed { name: "lint", reply: "first" }));
        reg.register(Arc::new(Fixed { name: "lint", reply: "second" }));
        let out = reg.get("lint").unwrap().call(Args::new()).await.unwrap();
        assert_eq!(out.content[0].as_text(), Some("second"));
    }

    #[test]
    fn listing_is_insertion_ordered_and_stable() {
        let mut reg = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            reg.register(Arc::new(Fixed { name, reply: "" }));
        }
        let first = reg.list_tools();
        let second = reg.list_tools();
        assert_eq!(first, second);
        let names: Vec<_> = first.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn prompt_overwrite_replaces_descriptor() {
        let mut reg = Registry::new();
        let logs = capture_warnings(|| {
            assert!(reg.register_prompt(Arc::new(StaticPrompt("old"))).is_none());
            assert!(reg.register_prompt(Arc::new(StaticPrompt("new"))).is_some());
        });
        assert_eq!(logs.matches("Prompt review is already registered").count(), 1);
        let prompts = reg.list_prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].description.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn resource_overwrite_warns_and_replaces_source() {
        let mut reg = Registry::new();
        let logs = capture_warnings(|| {
            assert!(reg.register_resource(Arc::new(StaticResource("old"))).is_none());
            assert!(reg.register_resource(Arc::new(StaticResource("new"))).is_some());
        });
        assert_eq!(logs.matches("Resource docs://readme is already registered").count(), 1);
        let listed = reg.list_resources();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "new");
        let (_, source) = reg.get_resource("docs://readme").unwrap();
        assert_eq!(source.read().await.unwrap().text.as_deref(), Some("new"));
    }

    #[test]
    fn lookups_signal_absence_without_error() {
        let reg = Registry::new();
        assert!(reg.get("nope").is_none());
        assert!(reg.get_resource("docs://nope").is_none());
        assert!(reg.get_prompt("nope").is_none());
    }
}
