use crate::{
    errors::ErrorRecord,
    logging::ErrorSink,
    mcp::{
        dispatcher::Dispatcher,
        registry::Registry,
        types::{
            Args, Health, PromptDescriptor, RenderedPrompt, ResourceContents, ResourceDescriptor,
            ServerInfo, ToolDescriptor, ToolResult,
        },
    },
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// A bundle of tools, resources and prompts that a server is composed from.
pub trait CapabilitySet {
    fn register_all(&self, registry: &mut Registry) -> anyhow::Result<()>;
}

pub struct HostBuilder {
    info: ServerInfo,
    registry: Registry,
}

impl HostBuilder {
    pub fn with(mut self, set: &dyn CapabilitySet) -> anyhow::Result<Self> {
        set.register_all(&mut self.registry)?;
        Ok(self)
    }

    /// Ends the registration phase; the registry is read-only from here on.
    pub fn build(self, sink: Arc<dyn ErrorSink>) -> Host {
        let registry = Arc::new(self.registry);
        Host { info: Arc::new(self.info), dispatcher: Dispatcher::new(registry, sink) }
    }
}

/// One workflow server: its identity plus a frozen registry and dispatcher.
#[derive(Clone)]
pub struct Host {
    info: Arc<ServerInfo>,
    dispatcher: Dispatcher,
}

impl Host {
    pub fn builder(info: ServerInfo) -> HostBuilder {
        HostBuilder { info, registry: Registry::new() }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn health(&self) -> Health {
        Health {
            healthy: true,
            message: format!("{} v{} is running", self.info.name, self.info.version),
        }
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.dispatcher.registry().list_tools()
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.dispatcher.registry().list_resources()
    }

    pub fn list_prompts(&self) -> Vec<PromptDescriptor> {
        self.dispatcher.registry().list_prompts()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.dispatcher.registry().list_names()
    }

    pub async fn invoke(&self, name: &str, args: Args) -> ToolResult {
        self.dispatcher.invoke(name, args).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents, ErrorRecord> {
        self.dispatcher.read_resource(uri).await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        args: &HashMap<String, String>,
    ) -> Result<RenderedPrompt, ErrorRecord> {
        self.dispatcher.get_prompt(name, args).await
    }

    pub fn shutdown(&self) {
        info!(server = %self.info.name, "Shutting down {}...", self.info.name);
    }
}
