//! The rendering context: all per-context state plus the dispatch path every
//! call takes on its way to the sink.

use crate::call::Call;
use crate::config::{HandlerKind, Options};
use crate::declaration::DeclarationRegistry;
use crate::error::{Diagnostic, ErrorHandler, RibError, Severity};
use crate::mode::{Mode, ModeStack};
use crate::params::{Binder, Merge, ParameterList};
use crate::raw::RawParameter;
use crate::request::Request;
use crate::sink::Sink;
use crate::token::{TokenId, TokenMap};
use crate::types::Handle;

/// Outcome of a recoverable dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Accepted,
    /// Reported through the error handler and not forwarded.
    Rejected,
}

impl Dispatch {
    pub fn is_accepted(self) -> bool {
        self == Dispatch::Accepted
    }
}

const DEFAULT_STEP: usize = 3;

pub struct Context<S: Sink> {
    tokens: TokenMap,
    registry: DeclarationRegistry,
    modes: ModeStack,
    options: Options,
    color_samples: usize,
    handler: Box<dyn ErrorHandler>,
    sink: S,
    next_handle: u32,
    /// Basis steps, saved and restored with every scope.
    basis_steps: Vec<(usize, usize)>,
    params: ParameterList,
    error_count: usize,
}

impl<S: Sink> Context<S> {
    pub fn new(sink: S) -> Result<Self, RibError> {
        Self::with_options(Options::default(), sink)
    }

    pub fn with_options(options: Options, sink: S) -> Result<Self, RibError> {
        let color_samples = options.color_samples.max(1);
        let mut tokens = TokenMap::new();
        let mut registry = DeclarationRegistry::with_defaults(&mut tokens, color_samples)?;
        for (name, grammar) in &options.declarations {
            registry.declare(&mut tokens, name, grammar, color_samples, false)?;
        }
        Ok(Context {
            tokens,
            registry,
            modes: ModeStack::new(),
            handler: options.error_handler.build(),
            options,
            color_samples,
            sink,
            next_handle: 0,
            basis_steps: vec![(DEFAULT_STEP, DEFAULT_STEP)],
            params: ParameterList::new(),
            error_count: 0,
        })
    }

    pub fn tokens(&self) -> &TokenMap {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut TokenMap {
        &mut self.tokens
    }

    pub fn registry(&self) -> &DeclarationRegistry {
        &self.registry
    }

    pub fn modes(&self) -> &ModeStack {
        &self.modes
    }

    pub fn current_mode(&self) -> Mode {
        self.modes.current_mode()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn color_samples(&self) -> usize {
        self.color_samples
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.options.strict = strict;
    }

    /// Parameters bound by the most recent accepted call.
    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn set_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.handler = handler;
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.handler.diagnostics()
    }

    /// Errors of `Error` severity or worse reported so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn should_abort(&self) -> bool {
        self.handler.should_abort()
    }

    pub fn report(&mut self, err: &RibError) {
        if err.severity() >= Severity::Error {
            self.error_count += 1;
        }
        self.handler
            .handle(err.code(), err.severity(), &err.to_string());
    }

    pub fn new_handle(&mut self) -> Handle {
        self.next_handle += 1;
        Handle(self.next_handle)
    }

    /// Register a standalone declaration.
    pub fn declare(&mut self, name: &str, grammar: &str) -> Result<TokenId, RibError> {
        self.registry.declare(
            &mut self.tokens,
            name,
            grammar,
            self.color_samples,
            false,
        )
    }

    pub fn begin(&mut self) -> Result<Dispatch, RibError> {
        self.call(Call::Begin, &[], 0)
    }

    /// Close every open scope and return to `Outside`.
    pub fn end(&mut self) -> Result<Dispatch, RibError> {
        self.finish(0)
    }

    fn finish(&mut self, line: u32) -> Result<Dispatch, RibError> {
        if self.modes.is_empty() {
            return Ok(self.reject_nesting(Request::End, line));
        }
        if let Some(light) = self.modes.clear() {
            self.sink.end_area_light(light);
        }
        self.basis_steps.truncate(1);
        self.params.clear();
        self.sink
            .call(&Call::End, &self.params.snapshot(&self.tokens), line);
        Ok(Dispatch::Accepted)
    }

    fn reject_nesting(&mut self, request: Request, line: u32) -> Dispatch {
        let err = RibError::Nesting {
            line,
            request: request.name().to_owned(),
            mode: self.modes.current_mode().to_string(),
        };
        self.report(&err);
        Dispatch::Rejected
    }

    fn reject(&mut self, err: RibError, line: u32) -> Result<Dispatch, RibError> {
        if err.is_fatal() {
            return Err(err);
        }
        self.report(&err.at_line(line));
        Ok(Dispatch::Rejected)
    }

    /// Validate `call`, bind its parameters, apply its effect on the context
    /// and forward it to the sink.
    ///
    /// Recoverable problems are reported and yield [`Dispatch::Rejected`]; the
    /// mode stack is checked before it is changed, so a rejected call leaves
    /// it untouched. `Err` means the context is no longer usable.
    pub fn call(
        &mut self,
        call: Call,
        pairs: &[(&str, &RawParameter)],
        line: u32,
    ) -> Result<Dispatch, RibError> {
        let request = call.request();
        if request == Request::End {
            return self.finish(line);
        }
        if !self.modes.is_legal(request) {
            return Ok(self.reject_nesting(request, line));
        }
        let closes = request.closes();
        if !closes.is_empty() && !closes.contains(&self.modes.current_mode()) {
            return Ok(self.reject_nesting(request, line));
        }

        let new_color_samples = match &call {
            Call::ColorSamples { n_rgb, rgb_n } => match color_sample_count(n_rgb, rgb_n) {
                Some(n) => Some(n),
                None => {
                    let err = RibError::bad(
                        line,
                        format!(
                            "ColorSamples needs two matrices of 3n values, got {} and {}",
                            n_rgb.len(),
                            rgb_n.len()
                        ),
                    );
                    return self.reject(err, line);
                }
            },
            _ => None,
        };

        let new_handler = match &call {
            Call::ErrorHandler { name } => match HandlerKind::from_request_name(name) {
                Some(kind) => Some(kind),
                None => {
                    return self.reject(
                        RibError::bad(line, format!("unknown error handler '{}'", name)),
                        line,
                    )
                }
            },
            _ => None,
        };

        if let Call::Declare { name, declaration } = &call {
            if let Err(e) = self.declare(name, declaration) {
                return self.reject(e, line);
            }
        }

        let (ustep, vstep) = self.basis_steps.last().copied().unwrap_or((DEFAULT_STEP, DEFAULT_STEP));
        let counts = match call.counts(ustep, vstep) {
            Ok(counts) => counts,
            Err(e) => return self.reject(e, line),
        };
        let mut binder = Binder {
            tokens: &mut self.tokens,
            registry: &mut self.registry,
            color_samples: self.color_samples,
            strict: self.options.strict,
        };
        let dropped = binder.bind(&mut self.params, pairs, &counts, call.bind_scope(), Merge::Set)?;
        for err in dropped {
            self.report(&err.at_line(line));
        }

        if let Some(n) = new_color_samples {
            self.color_samples = n;
        }
        if let Some(kind) = new_handler {
            self.handler = kind.build();
        }
        if let Call::Basis { ustep, vstep, .. } = &call {
            if let Some(top) = self.basis_steps.last_mut() {
                *top = (step(*ustep), step(*vstep));
            }
        }

        if !closes.is_empty() {
            let popped = self.modes.pop();
            if self.basis_steps.len() > 1 {
                self.basis_steps.pop();
            }
            if let Some(light) = popped.closed_area_light {
                self.sink.end_area_light(light);
            }
        }
        if let Some(mode) = request.opens() {
            self.modes.push(mode);
            let top = self.basis_steps.last().copied().unwrap_or((DEFAULT_STEP, DEFAULT_STEP));
            self.basis_steps.push(top);
        }
        if let Call::AreaLightSource { handle, .. } = &call {
            if let Some(previous) = self.modes.start_area_light(*handle) {
                self.sink.end_area_light(previous);
            }
        }

        self.sink
            .call(&call, &self.params.snapshot(&self.tokens), line);
        Ok(Dispatch::Accepted)
    }
}

fn color_sample_count(n_rgb: &[f32], rgb_n: &[f32]) -> Option<usize> {
    let n = n_rgb.len() / 3;
    (n > 0 && n_rgb.len() == 3 * n && rgb_n.len() == 3 * n).then_some(n)
}

fn step(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0).max(1)
}
