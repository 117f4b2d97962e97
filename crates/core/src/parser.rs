//! Stream parser and dispatcher.
//!
//! Pulls lexemes, gathers the value slots of one request, decodes them into a
//! [`Call`] and hands it to the [`Context`]. Errors abandon the current call
//! and parsing resumes at the next request token.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use crate::call::{self, Call, DecodeEnv, Decoded};
use crate::context::{Context, Dispatch};
use crate::error::RibError;
use crate::handles::HandleTables;
use crate::lexer::{Lexeme, Lexer};
use crate::raw::RawParameter;
use crate::request::Request;
use crate::sink::Sink;

/// Counters of one parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    /// Requests read from the stream, comments excluded.
    pub requests: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub comments: usize,
    /// Errors of `Error` severity or worse reported during this parse.
    pub errors: usize,
    /// Parsing stopped early because the error handler asked to.
    pub aborted: bool,
    pub lines: u32,
}

#[derive(Debug)]
struct Pending {
    request: Request,
    line: u32,
    slots: Vec<RawParameter>,
    array: Option<RawParameter>,
}

#[derive(Debug)]
struct DeferredComment {
    text: String,
    structured: bool,
    line: u32,
}

pub struct Parser<'c, S: Sink> {
    ctx: &'c mut Context<S>,
    handles: HandleTables,
    pending: Option<Pending>,
    /// Set after an error: values are dropped until the next request.
    skipping: bool,
    deferred: Vec<DeferredComment>,
    summary: ParseSummary,
}

impl<'c, S: Sink> Parser<'c, S> {
    pub fn new(ctx: &'c mut Context<S>) -> Self {
        Parser {
            ctx,
            handles: HandleTables::new(),
            pending: None,
            skipping: false,
            deferred: Vec::new(),
            summary: ParseSummary::default(),
        }
    }

    pub fn handles(&self) -> &HandleTables {
        &self.handles
    }

    pub fn parse_file(&mut self, path: &Path) -> Result<ParseSummary, RibError> {
        let file = File::open(path)
            .map_err(|e| RibError::Io(format!("{}: {}", path.display(), e)))?;
        self.parse(file)
    }

    /// Parse a whole stream. `Err` is returned only for failures that leave
    /// the context unusable (I/O, resource exhaustion); everything else goes
    /// through the context's error handler.
    pub fn parse<R: Read>(&mut self, input: R) -> Result<ParseSummary, RibError> {
        self.handles.clear();
        self.pending = None;
        self.skipping = false;
        self.deferred.clear();
        self.summary = ParseSummary::default();
        let errors_before = self.ctx.error_count();

        let mut lexer = Lexer::new(input);
        let result = self.run(&mut lexer);
        self.summary.lines = lexer.line();
        self.summary.errors = self.ctx.error_count() - errors_before;
        result.map(|()| self.summary)
    }

    fn run<R: Read>(&mut self, lexer: &mut Lexer<R>) -> Result<(), RibError> {
        loop {
            if self.ctx.should_abort() {
                self.summary.aborted = true;
                return Ok(());
            }
            let token = match lexer.next_lexeme() {
                Ok(t) => t,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.fail(&e)?;
                    continue;
                }
            };
            let line = token.line;
            match token.lexeme {
                Lexeme::Eof => {
                    self.finish_pending()?;
                    return self.flush_comments();
                }
                Lexeme::Comment { text, structured } => {
                    let comment = DeferredComment {
                        text,
                        structured,
                        line,
                    };
                    if self.pending.is_some() {
                        self.deferred.push(comment);
                    } else {
                        self.emit_comment(comment)?;
                    }
                }
                Lexeme::Request(name) => {
                    self.finish_pending()?;
                    match Request::from_name(&name) {
                        Some(request) => self.start(request, line),
                        None => {
                            self.summary.requests += 1;
                            self.summary.rejected += 1;
                            self.fail(&RibError::bad(line, format!("unknown request '{}'", name)))?;
                        }
                    }
                }
                Lexeme::EncodedRequest(request) => {
                    self.finish_pending()?;
                    self.start(request, line);
                }
                Lexeme::UndefinedRequest(op) => {
                    self.finish_pending()?;
                    self.summary.requests += 1;
                    self.summary.rejected += 1;
                    self.fail(&RibError::bad(
                        line,
                        format!("encoded request {} was never defined", op),
                    ))?;
                }
                Lexeme::ArrayStart => self.with_pending(line, |p| match p.array {
                    Some(_) => Err(RibError::syntax(line, "nested arrays are not allowed")),
                    None => {
                        p.array = Some(RawParameter::array(line));
                        Ok(())
                    }
                })?,
                Lexeme::ArrayEnd => self.with_pending(line, |p| match p.array.take() {
                    Some(array) => {
                        p.slots.push(array);
                        Ok(())
                    }
                    None => Err(RibError::syntax(line, "']' without matching '['")),
                })?,
                Lexeme::Int(v) => self.with_pending(line, |p| match &mut p.array {
                    Some(array) => array.push_int(v),
                    None => {
                        p.slots.push(RawParameter::int(v, line));
                        Ok(())
                    }
                })?,
                Lexeme::Float(v) => self.with_pending(line, |p| match &mut p.array {
                    Some(array) => array.push_float(v),
                    None => {
                        p.slots.push(RawParameter::float(v, line));
                        Ok(())
                    }
                })?,
                Lexeme::Str(s) => self.with_pending(line, |p| match &mut p.array {
                    Some(array) => array.push_string(s),
                    None => {
                        p.slots.push(RawParameter::string(s, line));
                        Ok(())
                    }
                })?,
                Lexeme::FloatArray(v) => self.with_pending(line, |p| match &mut p.array {
                    Some(array) => array.push_floats(&v),
                    None => {
                        p.slots.push(RawParameter::floats(v, line));
                        Ok(())
                    }
                })?,
                Lexeme::NotAToken(b) => {
                    self.fail(&RibError::syntax(line, format!("unexpected byte 0x{:02x}", b)))?
                }
            }
        }
    }

    fn start(&mut self, request: Request, line: u32) {
        self.skipping = false;
        self.pending = Some(Pending {
            request,
            line,
            slots: Vec::new(),
            array: None,
        });
    }

    /// Feed a value into the call being collected.
    fn with_pending(
        &mut self,
        line: u32,
        f: impl FnOnce(&mut Pending) -> Result<(), RibError>,
    ) -> Result<(), RibError> {
        if self.skipping {
            return Ok(());
        }
        let result = match self.pending.as_mut() {
            Some(p) => f(p),
            None => Err(RibError::syntax(line, "value outside of a request")),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.fail(&e.at_line(line)),
        }
    }

    /// Report `err`, abandon the current call and skip to the next request.
    fn fail(&mut self, err: &RibError) -> Result<(), RibError> {
        self.ctx.report(err);
        if self.pending.take().is_some() {
            self.summary.requests += 1;
            self.summary.rejected += 1;
        }
        self.skipping = true;
        self.flush_comments()
    }

    fn finish_pending(&mut self) -> Result<(), RibError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        self.summary.requests += 1;
        if pending.array.is_some() {
            self.summary.rejected += 1;
            let err = RibError::syntax(
                pending.line,
                format!("{}: unterminated array", pending.request),
            );
            self.ctx.report(&err);
            return self.flush_comments();
        }
        let outcome = self.dispatch(pending.request, pending.line, &pending.slots)?;
        match outcome {
            Dispatch::Accepted => self.summary.accepted += 1,
            Dispatch::Rejected => self.summary.rejected += 1,
        }
        self.flush_comments()
    }

    fn dispatch(
        &mut self,
        request: Request,
        line: u32,
        slots: &[RawParameter],
    ) -> Result<Dispatch, RibError> {
        let color_samples = self.ctx.color_samples();
        let ctx = &mut *self.ctx;
        let mut allocate = || ctx.new_handle();
        let mut env = DecodeEnv {
            color_samples,
            handles: &self.handles,
            allocate: &mut allocate,
        };
        let decoded = call::decode(request, line, slots, &mut env);
        let Decoded {
            call,
            params,
            binding,
        } = match decoded {
            Ok(d) => d,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.ctx.report(&e);
                return Ok(Dispatch::Rejected);
            }
        };
        let outcome = self.ctx.call(call, &params, line)?;
        if let (Dispatch::Accepted, Some((kind, key, handle))) = (outcome, binding) {
            self.handles.bind(kind, key, handle);
        }
        Ok(outcome)
    }

    fn emit_comment(&mut self, comment: DeferredComment) -> Result<(), RibError> {
        self.summary.comments += 1;
        let kind = if comment.structured {
            "structure"
        } else {
            "comment"
        };
        let call = Call::ArchiveRecord {
            kind: kind.to_owned(),
            text: comment.text,
        };
        self.ctx.call(call, &[], comment.line)?;
        Ok(())
    }

    fn flush_comments(&mut self) -> Result<(), RibError> {
        for comment in std::mem::take(&mut self.deferred) {
            self.emit_comment(comment)?;
        }
        Ok(())
    }
}

/// Parse `input` into `ctx` with a fresh parser.
pub fn parse<S: Sink, R: Read>(ctx: &mut Context<S>, input: R) -> Result<ParseSummary, RibError> {
    Parser::new(ctx).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HandlerKind, Options};
    use crate::sink::Recorder;

    fn context() -> Context<Recorder> {
        let options = Options {
            error_handler: HandlerKind::Collect,
            ..Options::default()
        };
        Context::with_options(options, Recorder::new()).unwrap()
    }

    #[test]
    fn values_before_any_request_are_reported_once() {
        let mut ctx = context();
        let summary = parse(&mut ctx, &b"1 2 3 version 3.04"[..]).unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.accepted, 1);
    }

    #[test]
    fn unterminated_array_abandons_call() {
        let mut ctx = context();
        ctx.begin().unwrap();
        let summary = parse(&mut ctx, &b"Color [1 0 0\n"[..]).unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn handle_bindings_only_follow_accepted_calls() {
        let mut ctx = context();
        ctx.begin().unwrap();
        // illegal outside the world block, so the key is never bound
        parse(&mut ctx, &b"LightSource \"spot\" 1\n"[..]).unwrap();
        let mut parser = Parser::new(&mut ctx);
        parser
            .parse(&b"WorldBegin LightSource \"spot\" 1 Illuminate 1 0"[..])
            .unwrap();
        assert_eq!(parser.handles().len(), 1);
    }
}
