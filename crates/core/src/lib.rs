#![allow(clippy::result_large_err)]
//! rib-core: decoding layer for RIB scene-description streams.
//!
//! Turns a text or binary RIB byte stream into validated, typed calls on a
//! [`Sink`]. Each [`Context`] owns its own interner, declaration registry and
//! mode stack, so independent contexts never share state.
//!
//! # Public API
//!
//! - [`Context`] -- per-context state and the dispatch path ([`Context::call`])
//! - [`Parser`] / [`parse()`] -- drive a context from a byte stream
//! - [`Call`] -- one request with its positional arguments
//! - [`Sink`], [`Recorder`] -- the downstream boundary
//! - [`TokenMap`], [`DeclarationRegistry`], [`Binder`], [`ModeStack`] -- the
//!   building blocks, usable on their own
//! - [`RibError`], [`ErrorHandler`] -- error type and pluggable reporting

pub mod call;
pub mod config;
pub mod context;
pub mod declaration;
pub mod error;
pub mod handles;
pub mod lexer;
pub mod mode;
pub mod params;
pub mod parser;
pub mod raw;
pub mod request;
pub mod sink;
pub mod token;
pub mod types;

// ── Convenience re-exports: key types ────────────────────────────────

pub use call::Call;
pub use config::{HandlerKind, Options};
pub use context::{Context, Dispatch};
pub use declaration::{Declaration, DeclarationRegistry};
pub use error::{Diagnostic, ErrorCode, ErrorHandler, RibError, Severity};
pub use mode::{Mode, ModeStack};
pub use params::{Binder, ParameterList};
pub use raw::RawParameter;
pub use request::Request;
pub use sink::{NullSink, Recorder, Sink};
pub use token::{TokenId, TokenMap};
pub use types::{Handle, ParamCounts};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use parser::{parse, ParseSummary, Parser};
