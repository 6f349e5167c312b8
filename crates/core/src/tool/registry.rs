use std::collections::HashMap;
use std::sync::Arc;

use itinera_model::ModelTool;
use serde_json::Value;
use thiserror::Error;

use super::object::{FnTool, ToolObject, TypedTool};
use super::{Tool, ToolDescriptor, ToolOutput};

/// Errors raised while registering or looking up tools.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),
    /// No tool with this name is registered.
    #[error("tool `{0}` is not registered")]
    UnknownTool(String),
    /// The name is empty or contains characters other than ASCII letters,
    /// digits, `_` and `-`.
    #[error("invalid tool name `{0}`")]
    InvalidName(String),
    /// The tool's parameter schema cannot be turned into a descriptor.
    #[error("invalid parameter schema for tool `{tool}`: {reason}")]
    InvalidSchema {
        /// The tool being registered.
        tool: String,
        /// What is wrong with the schema.
        reason: String,
    },
}

/// A tool as stored in the registry.
pub struct RegisteredTool {
    descriptor: ToolDescriptor,
    pub(crate) object: Arc<dyn ToolObject>,
}

impl RegisteredTool {
    /// Returns the descriptor the tool was registered with.
    #[inline]
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Returns the registered callable if it is a `T`.
    ///
    /// Works for [`Tool`] implementations as well as closures registered
    /// with [`Registry::register_fn`].
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.object.as_any().downcast_ref()
    }
}

/// Maps tool names to their callables and descriptors.
///
/// Registration order is preserved, so the planner always sees the tool
/// definitions in the same order.
#[derive(Default)]
pub struct Registry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed tool. Its descriptor is derived from
    /// [`Tool::parameter_schema`].
    pub fn register<T: Tool>(
        &mut self,
        tool: T,
    ) -> Result<&ToolDescriptor, RegistryError> {
        let name = tool.name().to_owned();
        self.check_name(&name)?;
        let descriptor = ToolDescriptor::from_json_schema(
            name.as_str(),
            tool.description(),
            tool.parameter_schema(),
        )
        .map_err(|reason| RegistryError::InvalidSchema { tool: name, reason })?;
        Ok(self.insert(descriptor, Arc::new(TypedTool(tool))))
    }

    /// Registers a closure under an explicit descriptor.
    ///
    /// The closure receives the validated argument object.
    pub fn register_fn<F>(
        &mut self,
        descriptor: ToolDescriptor,
        callable: F,
    ) -> Result<&ToolDescriptor, RegistryError>
    where
        F: Fn(Value) -> ToolOutput + Send + Sync + 'static,
    {
        self.check_name(descriptor.name())?;
        Ok(self.insert(descriptor, Arc::new(FnTool(callable))))
    }

    /// Looks up a tool by name.
    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_owned()))
    }

    /// Returns `true` if a tool with this name is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(RegisteredTool::descriptor)
    }

    /// Renders every descriptor as a model tool definition.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.descriptors().map(ToolDescriptor::to_model_tool).collect()
    }

    fn check_name(&self, name: &str) -> Result<(), RegistryError> {
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(RegistryError::InvalidName(name.to_owned()));
        }
        if self.tools.contains_key(name) {
            return Err(RegistryError::DuplicateTool(name.to_owned()));
        }
        Ok(())
    }

    fn insert(
        &mut self,
        descriptor: ToolDescriptor,
        object: Arc<dyn ToolObject>,
    ) -> &ToolDescriptor {
        let name = descriptor.name().to_owned();
        trace!("registering tool: {name}");
        self.order.push(name.clone());
        let tool = self
            .tools
            .entry(name)
            .or_insert(RegisteredTool { descriptor, object });
        &tool.descriptor
    }
}
