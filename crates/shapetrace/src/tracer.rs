//! Observability hooks for the interpreter.
//!
//! The engine does not log to a global facility; instead the driver passes a
//! tracer and the interpreter reports what it does. `NoopTracer` compiles to
//! nothing, `StderrTracer` narrates a run for debugging, and
//! `RecordingTracer` captures events for assertions in tests.

use crate::{ctx::CtxStatus, source::SourceRange};

/// One observed interpreter event.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// A statement began executing on some number of live paths.
    Stmt { desc: String, paths: usize },
    /// A branch split paths into then/else sets.
    Fork { then_paths: usize, else_paths: usize },
    /// A constraint was added to some path's set.
    Constraint { rendered: String },
    /// A library call was dispatched.
    LibCall { path: String },
    /// A path reached a terminated state.
    PathEnd { status: CtxStatus },
}

/// Receiver for interpreter events.
pub trait AnalysisTracer {
    fn on_stmt(&mut self, desc: &str, paths: usize);
    fn on_fork(&mut self, then_paths: usize, else_paths: usize);
    fn on_constraint(&mut self, rendered: &str, source: Option<SourceRange>);
    fn on_libcall(&mut self, path: &str);
    fn on_path_end(&mut self, status: CtxStatus);
}

/// Tracer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl AnalysisTracer for NoopTracer {
    fn on_stmt(&mut self, _desc: &str, _paths: usize) {}
    fn on_fork(&mut self, _then_paths: usize, _else_paths: usize) {}
    fn on_constraint(&mut self, _rendered: &str, _source: Option<SourceRange>) {}
    fn on_libcall(&mut self, _path: &str) {}
    fn on_path_end(&mut self, _status: CtxStatus) {}
}

/// Tracer that narrates to stderr, for interactive debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl AnalysisTracer for StderrTracer {
    fn on_stmt(&mut self, desc: &str, paths: usize) {
        eprintln!("[stmt] {desc} on {paths} path(s)");
    }

    fn on_fork(&mut self, then_paths: usize, else_paths: usize) {
        eprintln!("[fork] then={then_paths} else={else_paths}");
    }

    fn on_constraint(&mut self, rendered: &str, source: Option<SourceRange>) {
        match source {
            Some(source) => eprintln!("[ctr]  {rendered} ({source})"),
            None => eprintln!("[ctr]  {rendered}"),
        }
    }

    fn on_libcall(&mut self, path: &str) {
        eprintln!("[lib]  {path}");
    }

    fn on_path_end(&mut self, status: CtxStatus) {
        eprintln!("[path] terminated: {status}");
    }
}

/// Tracer that records every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    pub events: Vec<TraceEvent>,
}

impl AnalysisTracer for RecordingTracer {
    fn on_stmt(&mut self, desc: &str, paths: usize) {
        self.events.push(TraceEvent::Stmt { desc: desc.to_owned(), paths });
    }

    fn on_fork(&mut self, then_paths: usize, else_paths: usize) {
        self.events.push(TraceEvent::Fork { then_paths, else_paths });
    }

    fn on_constraint(&mut self, rendered: &str, _source: Option<SourceRange>) {
        self.events.push(TraceEvent::Constraint { rendered: rendered.to_owned() });
    }

    fn on_libcall(&mut self, path: &str) {
        self.events.push(TraceEvent::LibCall { path: path.to_owned() });
    }

    fn on_path_end(&mut self, status: CtxStatus) {
        self.events.push(TraceEvent::PathEnd { status });
    }
}
