use std::{collections::BTreeMap, fmt, future::Future, pin::Pin};

use thiserror::Error;

use crate::{OutputRunner, PipeOutput, PipeOutputError, Record, RunSummary};

/// Name [`PipeOutput`] registers under.
pub const PIPE_OUTPUT_PLUGIN: &str = "PipeOutput";

pub type PluginFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RunSummary, PipeOutputError>> + Send + 'a>>;

/// Object-safe view of an output plugin for hosts that pick plugins by name.
pub trait OutputPlugin<R: Record>: Send {
    fn name(&self) -> &'static str;

    fn init(&mut self, section: toml::Value) -> Result<(), PipeOutputError>;

    fn run<'a>(&'a mut self, runner: OutputRunner<R>) -> PluginFuture<'a>;
}

pub type PluginFactory<R> = fn() -> Box<dyn OutputPlugin<R>>;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RegistryError {
    #[error("plugin `{0}` is already registered")]
    Duplicate(String),
}

/// Name → factory table, owned and populated by the host before any plugin starts.
pub struct PluginRegistry<R> {
    factories: BTreeMap<String, PluginFactory<R>>,
}

impl<R: Record> PluginRegistry<R> {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: PluginFactory<R>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Builds a fresh, uninitialized plugin instance.
    pub fn create(&self, name: &str) -> Option<Box<dyn OutputPlugin<R>>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl<R: Record> Default for PluginRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for PluginRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub fn register_pipe_output<R: Record>(
    registry: &mut PluginRegistry<R>,
) -> Result<(), RegistryError> {
    registry.register(PIPE_OUTPUT_PLUGIN, new_pipe_output::<R>)
}

fn new_pipe_output<R: Record>() -> Box<dyn OutputPlugin<R>> {
    Box::new(PipeOutput::new())
}

impl<R: Record> OutputPlugin<R> for PipeOutput {
    fn name(&self) -> &'static str {
        PIPE_OUTPUT_PLUGIN
    }

    fn init(&mut self, section: toml::Value) -> Result<(), PipeOutputError> {
        self.init_from_toml(section)
    }

    fn run<'a>(&'a mut self, runner: OutputRunner<R>) -> PluginFuture<'a> {
        Box::pin(PipeOutput::run(self, runner))
    }
}
