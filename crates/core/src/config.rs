//! Context options. All fields default, so an empty TOML table is a valid
//! configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AbortHandler, CollectHandler, ErrorHandler, IgnoreHandler, PrintHandler};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    #[default]
    Print,
    Ignore,
    Abort,
    Collect,
}

impl HandlerKind {
    /// Names accepted by the `ErrorHandler` request. `collect` is API only.
    pub fn from_request_name(name: &str) -> Option<Self> {
        match name {
            "print" => Some(HandlerKind::Print),
            "ignore" => Some(HandlerKind::Ignore),
            "abort" => Some(HandlerKind::Abort),
            _ => None,
        }
    }

    pub fn build(self) -> Box<dyn ErrorHandler> {
        match self {
            HandlerKind::Print => Box::new(PrintHandler),
            HandlerKind::Ignore => Box::new(IgnoreHandler),
            HandlerKind::Abort => Box::new(AbortHandler::default()),
            HandlerKind::Collect => Box::new(CollectHandler::new()),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandlerKind::Print => "print",
            HandlerKind::Ignore => "ignore",
            HandlerKind::Abort => "abort",
            HandlerKind::Collect => "collect",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Validate parameter cardinality against the primitive's counts.
    pub strict: bool,
    pub color_samples: usize,
    /// Extra declarations registered after the built-in ones, name to grammar.
    pub declarations: BTreeMap<String, String>,
    pub error_handler: HandlerKind,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            strict: true,
            color_samples: 3,
            declarations: BTreeMap::new(),
            error_handler: HandlerKind::Print,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_json() {
        let opts: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, Options::default());
        assert!(opts.strict);
        assert_eq!(opts.color_samples, 3);
    }

    #[test]
    fn partial_options() {
        let opts: Options = serde_json::from_str(
            r#"{"strict": false, "error_handler": "collect", "declarations": {"foo": "uniform float"}}"#,
        )
        .unwrap();
        assert!(!opts.strict);
        assert_eq!(opts.error_handler, HandlerKind::Collect);
        assert_eq!(opts.declarations["foo"], "uniform float");
    }

    #[test]
    fn request_names() {
        assert_eq!(HandlerKind::from_request_name("abort"), Some(HandlerKind::Abort));
        assert_eq!(HandlerKind::from_request_name("collect"), None);
    }
}
