//! The downstream boundary: every accepted call is forwarded to a [`Sink`].

use serde::Serialize;

use crate::call::Call;
use crate::params::{ParamSnapshot, Values};
use crate::token::TokenId;
use crate::types::Handle;

/// Receiver of validated calls, usually a rendering backend.
///
/// Requests arrive as variants of [`Call`] so an implementation matches on the
/// kinds it cares about and ignores the rest.
pub trait Sink {
    fn call(&mut self, call: &Call, params: &ParamSnapshot<'_>, line: u32);

    /// The area light `handle` has been closed together with its scope.
    fn end_area_light(&mut self, _handle: Handle) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn call(&mut self, _call: &Call, _params: &ParamSnapshot<'_>, _line: u32) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedParam {
    pub token: TokenId,
    pub name: String,
    pub values: Values,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedCall {
    pub line: u32,
    #[serde(flatten)]
    pub call: Call,
    pub params: Vec<RecordedParam>,
}

/// Keeps an owned copy of every call; used by `rib dump` and by tests.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recorder {
    pub calls: Vec<RecordedCall>,
    pub closed_area_lights: Vec<Handle>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<crate::request::Request> {
        self.calls.iter().map(|c| c.call.request()).collect()
    }
}

impl Sink for Recorder {
    fn call(&mut self, call: &Call, params: &ParamSnapshot<'_>, line: u32) {
        let params = params
            .tokens
            .iter()
            .zip(&params.names)
            .zip(&params.values)
            .map(|((token, name), values)| RecordedParam {
                token: *token,
                name: (*name).to_owned(),
                values: values.to_values(),
            })
            .collect();
        self.calls.push(RecordedCall {
            line,
            call: call.clone(),
            params,
        });
    }

    fn end_area_light(&mut self, handle: Handle) {
        self.closed_area_lights.push(handle);
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn call(&mut self, call: &Call, params: &ParamSnapshot<'_>, line: u32) {
        (**self).call(call, params, line)
    }

    fn end_area_light(&mut self, handle: Handle) {
        (**self).end_area_light(handle)
    }
}
