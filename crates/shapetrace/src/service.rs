//! The driver: runs a program to exhaustion and reports per-path verdicts.
//!
//! An `Analyzer` owns the pieces with run-scoped identity: the id generator,
//! the library-call registry, the budget configuration, and the bootstrapped
//! prelude. Each `run` starts one root context on the prelude state, drives
//! the interpreter until every path terminates, sweeps path heaps (the only
//! point where garbage collection is allowed), and classifies the outcome.

use std::collections::BTreeMap;

use crate::{
    ctx::{Ctx, CtxSet, CtxStatus, LogLevel},
    error::{AnalysisResult, ErrorKind},
    heap::Heap,
    interp::Interp,
    ir::IrStmt,
    libcall::LibCallRegistry,
    prelude::{Prelude, bootstrap},
    resource::{BudgetTracker, LimitedTracker, ResourceLimits},
    source::SourceRange,
    symbol::IdGen,
    tracer::{AnalysisTracer, NoopTracer},
    value::{Addr, Val},
};

/// Final verdict for one terminated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize)]
pub enum PathOutcome {
    /// Every precondition on the path was discharged.
    Success,
    /// The path completed but carries warnings or undischarged constraints.
    Warning,
    /// A precondition proved false; the failure message points at it.
    Failure,
}

/// One rendered constraint in a path report.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CtrReport {
    pub id: u32,
    pub rendered: String,
    pub source: Option<SourceRange>,
    pub message: Option<String>,
}

/// One log line in a path report.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LogReport {
    pub level: LogLevel,
    /// Error classification of the entry, when it reports a problem.
    pub kind: Option<ErrorKind>,
    pub message: String,
    pub source: Option<SourceRange>,
}

/// Structured record for one terminated path.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PathReport {
    pub outcome: PathOutcome,
    pub status: CtxStatus,
    /// First failure message, for failed paths.
    pub failure: Option<LogReport>,
    /// The ordered, deduplicated constraint log.
    pub constraints: Vec<CtrReport>,
    /// How many logged constraints remained undecided at termination
    /// (`ErrorKind::UnprovenPrecondition` territory: the path is not wrong,
    /// it is unvalidated).
    pub unproven_constraints: usize,
    /// Interval snapshot per symbol id, rendered.
    pub ranges: BTreeMap<u64, String>,
    pub logs: Vec<LogReport>,
}

/// The aggregate report over all terminated paths.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AnalysisReport {
    pub success: usize,
    pub warning: usize,
    pub failure: usize,
    pub budget_exhausted: bool,
    pub paths: Vec<PathReport>,
}

impl AnalysisReport {
    /// Serializes the report for host tooling.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of one run: the raw terminated contexts plus the report.
#[derive(Debug)]
pub struct Analysis {
    pub paths: Vec<Ctx<Val>>,
    pub report: AnalysisReport,
}

impl Analysis {
    /// Terminated contexts with the given outcome, in exploration order.
    pub fn paths_with(&self, outcome: PathOutcome) -> impl Iterator<Item = &Ctx<Val>> {
        self.paths
            .iter()
            .zip(self.report.paths.iter())
            .filter(move |(_, r)| r.outcome == outcome)
            .map(|(ctx, _)| ctx)
    }
}

/// The analysis service.
#[derive(Debug)]
pub struct Analyzer {
    idg: IdGen,
    registry: LibCallRegistry,
    limits: ResourceLimits,
    prelude: Prelude,
}

impl Analyzer {
    /// Builds an analyzer with the default registry and limits, running the
    /// builtin prelude once.
    pub fn new() -> AnalysisResult<Self> {
        Self::with_parts(LibCallRegistry::with_defaults(), ResourceLimits::default())
    }

    pub fn with_limits(limits: ResourceLimits) -> AnalysisResult<Self> {
        Self::with_parts(LibCallRegistry::with_defaults(), limits)
    }

    pub fn with_parts(registry: LibCallRegistry, limits: ResourceLimits) -> AnalysisResult<Self> {
        let idg = IdGen::new();
        let prelude = bootstrap(&idg)?;
        Ok(Self { idg, registry, limits, prelude })
    }

    /// The id generator, shared with callers that pre-build symbolic inputs.
    #[must_use]
    pub fn idg(&self) -> &IdGen {
        &self.idg
    }

    /// Registers an additional library-call table.
    pub fn extend_registry(&mut self, other: LibCallRegistry) {
        self.registry.extend(other);
    }

    /// Runs a program with no tracing.
    pub fn run(&self, program: &IrStmt) -> Analysis {
        self.run_traced(program, &mut NoopTracer)
    }

    /// Runs a program, reporting interpreter events to `tracer`.
    pub fn run_traced(&self, program: &IrStmt, tracer: &mut impl AnalysisTracer) -> Analysis {
        let mut budget = LimitedTracker::new(self.limits);
        let root = Ctx::new(
            self.prelude.env.clone(),
            self.prelude.heap.clone(),
            crate::ctr_set::CtrSet::new(),
            Val::None,
        );
        let mut interp = Interp::new(&self.idg, &self.registry, tracer, &mut budget);
        let terminated = interp.exec_stmt(CtxSet::single(root), program);
        let budget_exhausted = interp.budget_exhausted();

        // Between-task collection point: each terminated path keeps only
        // what its roots still reach.
        let paths: Vec<Ctx<Val>> = terminated
            .into_vec()
            .into_iter()
            .map(|ctx| {
                let heap = ctx.heap.collect(path_roots(&ctx));
                ctx.with_heap(heap)
            })
            .collect();

        let mut report = AnalysisReport {
            success: 0,
            warning: 0,
            failure: 0,
            budget_exhausted,
            paths: Vec::with_capacity(paths.len()),
        };
        for ctx in &paths {
            tracer.on_path_end(ctx.status);
            let path_report = classify(ctx);
            match path_report.outcome {
                PathOutcome::Success => report.success += 1,
                PathOutcome::Warning => report.warning += 1,
                PathOutcome::Failure => report.failure += 1,
            }
            report.paths.push(path_report);
        }
        Analysis { paths, report }
    }
}

/// Roots for the between-task sweep of one path's heap.
fn path_roots(ctx: &Ctx<Val>) -> Vec<Addr> {
    let mut roots: Vec<Addr> = ctx.env.iter().map(|(_, addr)| addr).collect();
    if let Val::Addr(addr) = &ctx.ret_val {
        roots.push(*addr);
    }
    roots
}

/// Classifies a terminated context and renders its report.
fn classify(ctx: &Ctx<Val>) -> PathReport {
    // Re-check the log against the final ranges: constraints that were
    // undecided when added may be decided now.
    let mut unproven = 0usize;
    let mut contradicted = false;
    let mut constraints = Vec::new();
    let mut seen = ahash::AHashSet::new();
    for logged in ctx.ctr_set.iter() {
        let rendered = logged.ctr.to_string();
        match ctx.ctr_set.check_immediate(&logged.ctr) {
            Some(true) => {}
            Some(false) => contradicted = true,
            None => unproven += 1,
        }
        // Deduplicate repeats (loop bodies re-add identical preconditions).
        if seen.insert(rendered.clone()) {
            constraints.push(CtrReport {
                id: logged.id.0,
                rendered,
                source: logged.ctr.source,
                message: logged.ctr.message.as_ref().map(|m| m.to_string()),
            });
        }
    }

    let outcome = match ctx.status {
        CtxStatus::Failed => PathOutcome::Failure,
        _ if contradicted => PathOutcome::Failure,
        CtxStatus::Warned => PathOutcome::Warning,
        CtxStatus::Active if unproven > 0 => PathOutcome::Warning,
        CtxStatus::Active => PathOutcome::Success,
    };

    let logs: Vec<LogReport> = ctx
        .logs
        .iter()
        .map(|entry| LogReport {
            level: entry.level,
            kind: entry.kind,
            message: entry.message.to_string(),
            source: entry.source,
        })
        .collect();
    let failure = logs.iter().find(|l| l.level == LogLevel::Fail).cloned();

    let mut ranges = BTreeMap::new();
    for (sym, range) in ctx.ctr_set.ranged_symbols() {
        ranges.insert(sym.0, range.to_string());
    }

    PathReport {
        outcome,
        status: ctx.status,
        failure,
        constraints,
        unproven_constraints: unproven,
        ranges,
        logs,
    }
}

/// Convenience for embedders: runs `program` once with default settings and
/// returns the report.
pub fn analyze(program: &IrStmt) -> AnalysisResult<AnalysisReport> {
    Ok(Analyzer::new()?.run(program).report)
}

/// Drives a program with an explicit budget tracker, for hosts that manage
/// budgets across several runs. The prelude is rebuilt per call.
pub fn analyze_with_budget(
    program: &IrStmt,
    budget: &mut impl BudgetTracker,
) -> AnalysisResult<Vec<Ctx<Val>>> {
    let idg = IdGen::new();
    let registry = LibCallRegistry::with_defaults();
    let prelude = bootstrap(&idg)?;
    let root = Ctx::new(prelude.env, prelude.heap, crate::ctr_set::CtrSet::new(), Val::None);
    let mut tracer = NoopTracer;
    let mut interp = Interp::new(&idg, &registry, &mut tracer, budget);
    Ok(interp.exec_stmt(CtxSet::single(root), program).into_vec())
}

/// Merges two terminated sibling paths into one context for hosts that want
/// a joined view: heaps merge with relocation, environments follow.
#[must_use]
pub fn merge_paths(left: &Ctx<Val>, right: &Ctx<Val>) -> (Heap, crate::env::Env) {
    let (heap, offset) = left.heap.merge(&right.heap);
    let env = left.env.merge(&right.env.relocate(offset));
    (heap, env)
}
