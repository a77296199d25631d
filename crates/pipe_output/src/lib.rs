#![forbid(unsafe_code)]
//! Output plugin that pipes log records into a long-lived subprocess.
//!
//! [`PipeOutput`] resolves an executable on the search path, spawns it once with a piped stdin and
//! then writes every record payload it receives as `<payload>\n`. There is no escaping: a payload
//! that already contains `\n` shows up as two lines on the subprocess side.
//!
//! - Configure with [`PipeOutputConfig`] (`Path` + `Args`), either directly or decoded from a host
//!   TOML section via [`PipeOutput::init_from_toml`].
//! - Feed records through an [`OutputRunner`] built by [`output_channel`]; the bounded channel plus
//!   the awaited pipe writes give backpressure when the subprocess reads slowly.
//! - Runtime failures never surface as `Err` from [`PipeOutput::run`]; they are logged through
//!   `tracing` and summarized in [`RunSummary`]. Short writes are logged and the remainder dropped.
//! - Hosts that look plugins up by name can use [`PluginRegistry`] with [`register_pipe_output`].
//!
//! Spawning goes through `tokio::process`, so [`PipeOutput::init`] must be called from within a
//! Tokio runtime.

mod config;
mod error;
mod pipeline;
mod piper;
mod registry;
mod resolve;

pub use config::PipeOutputConfig;
pub use error::{PipeOutputError, ResolveError};
pub use pipeline::{output_channel, OutputRunner, PipelinePack, Record};
pub use piper::{LoopEnd, PipeOutput, PiperState, RunSummary};
pub use registry::{
    register_pipe_output, OutputPlugin, PluginFactory, PluginFuture, PluginRegistry,
    RegistryError, PIPE_OUTPUT_PLUGIN,
};
pub use resolve::resolve_executable;

#[cfg(test)]
mod tests;
