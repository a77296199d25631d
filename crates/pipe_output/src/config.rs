use serde::{Deserialize, Serialize};

/// Config section consumed by [`crate::PipeOutput`].
///
/// Keys follow the host's section style (`Path`, `Args`); lowercase spellings are accepted too.
/// Unknown keys such as the host's own `type` entry are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeOutputConfig {
    /// Executable to launch, resolved against `PATH` unless it contains a path separator.
    #[serde(rename = "Path", alias = "path")]
    pub path: String,
    /// Arguments passed verbatim at launch.
    #[serde(rename = "Args", alias = "args", default)]
    pub args: Vec<String>,
}

impl PipeOutputConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Decodes a host config section.
    pub fn from_toml(value: toml::Value) -> Result<Self, toml::de::Error> {
        value.try_into()
    }
}
