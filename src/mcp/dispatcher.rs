use crate::{
    errors::{AppError, ErrorRecord},
    logging::ErrorSink,
    mcp::{
        registry::Registry,
        types::{Args, RenderedPrompt, ResourceContents, ToolResult},
    },
    validation,
};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Funnels every outcome of an invocation into one envelope shape.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    sink: Arc<dyn ErrorSink>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn ErrorSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Never fails: unknown tools, bad arguments, handler errors and panics
    /// all come back as an `is_error` envelope.
    pub async fn invoke(&self, name: &str, args: Args) -> ToolResult {
        match self.try_invoke(name, args).await {
            Ok(result) => result,
            Err(record) => {
                self.sink.report(name, &record);
                record.into_result()
            }
        }
    }

    async fn try_invoke(&self, name: &str, args: Args) -> Result<ToolResult, ErrorRecord> {
        let tool = self.registry.get(name).ok_or_else(|| ErrorRecord::unknown_tool(name))?;

        let schema = tool.input_schema();
        validation::validate_required(&args, &schema.required())?;
        validation::validate_types(&args, schema.types())?;

        let context = format!("Tool execution: {name}");
        match AssertUnwindSafe(tool.call(args)).catch_unwind().await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(err.into_record(&context)),
            Err(panic) => Err(panic_record(&context, panic)),
        }
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents, ErrorRecord> {
        self.try_read_resource(uri).await.map_err(|record| self.reported(uri, record))
    }

    async fn try_read_resource(&self, uri: &str) -> Result<ResourceContents, ErrorRecord> {
        let (_, source) = self.registry.get_resource(uri).ok_or_else(|| ErrorRecord::not_found(uri))?;
        let context = format!("Resource read: {uri}");
        match AssertUnwindSafe(source.read()).catch_unwind().await {
            Ok(read) => read.map_err(|e| e.into_record(&context)),
            Err(panic) => Err(panic_record(&context, panic)),
        }
    }

    /// Missing required prompt arguments are rejected before rendering.
    pub async fn get_prompt(
        &self,
        name: &str,
        args: &HashMap<String, String>,
    ) -> Result<RenderedPrompt, ErrorRecord> {
        self.try_get_prompt(name, args).await.map_err(|record| self.reported(name, record))
    }

    async fn try_get_prompt(
        &self,
        name: &str,
        args: &HashMap<String, String>,
    ) -> Result<RenderedPrompt, ErrorRecord> {
        let (descriptor, source) =
            self.registry.get_prompt(name).ok_or_else(|| ErrorRecord::unknown_prompt(name))?;
        let missing: Vec<&str> = descriptor
            .arguments
            .iter()
            .filter(|a| a.required && !args.contains_key(&a.name))
            .map(|a| a.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ErrorRecord::validation(format!(
                "Missing required parameters: {}",
                missing.join(", ")
            ))
            .with_detail("missing", missing));
        }
        let context = format!("Prompt render: {name}");
        match AssertUnwindSafe(source.render(args)).catch_unwind().await {
            Ok(rendered) => rendered.map_err(|e| e.into_record(&context)),
            Err(panic) => Err(panic_record(&context, panic)),
        }
    }

    fn reported(&self, scope: &str, record: ErrorRecord) -> ErrorRecord {
        self.sink.report(scope, &record);
        record
    }
}

fn panic_record(context: &str, panic: Box<dyn Any + Send>) -> ErrorRecord {
    let msg = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string());
    AppError::from(anyhow::anyhow!("panicked: {msg}")).into_record(context)
}
