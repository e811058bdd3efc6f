//! # Phased Evaluator
//!
//! Expands macro keys embedded in a JSON document until every phase reaches
//! a fixpoint.
//!
//! ## Run loop
//!
//! ```text
//! Idle -> Walking(p) <-> Applying(p) -> PhaseDone(p) -> ... -> Complete
//! ```
//!
//! A walk visits every node depth-first. For each object key with a macro
//! registered in the active phase, the macro's factory produces a
//! [`Modifier`](crate::modifier::Modifier). Once the walk finishes the
//! pending modifiers are executed and the phase is walked again. A walk that
//! produces no modifiers ends the phase.
//!
//! ## Kind check
//!
//! Before every walk the root must be an object holding a non-empty `kind`
//! field (the key is compared case-insensitively). Fragments resolved on
//! behalf of composite lookups skip the check.
//!
//! ## Unknown macro keys
//!
//! Keys in the macro namespace that no phase recognizes are left as data and
//! logged, unless `strict_macros` is set. Strict runs fail on them during the
//! walk and fail again if any namespaced key survives the last phase.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kubegen_evaluator::{Attributes, Evaluator, EvaluatorConfig};
//!
//! let evaluator = Evaluator::from_config(EvaluatorConfig::default(), Arc::new(attributes));
//! let resolved = evaluator.evaluate_slice(br#"{"Kind": "Service", ...}"#)?;
//! ```

use crate::attributes::Attributes;
use crate::config::EvaluatorConfig;
use crate::error::{EvalError, EvalResult};
use crate::modifier::PendingModifiers;
use crate::phase::Phase;
use crate::registry::MacroRegistry;
use kubegen_tree::{walk_tree, Branch, Kind, ValueTree, Visitor};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What a macro factory can see while its key is being visited
pub struct MacroContext<'a> {
    evaluator: &'a Evaluator,
    tree: &'a ValueTree,
    phase: Phase,
}

impl<'a> MacroContext<'a> {
    pub fn new(evaluator: &'a Evaluator, tree: &'a ValueTree, phase: Phase) -> Self {
        Self {
            evaluator,
            tree,
            phase,
        }
    }

    pub fn tree(&self) -> &ValueTree {
        self.tree
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn namespace(&self) -> &str {
        self.evaluator.registry.namespace()
    }

    /// Fully evaluate a detached value with the same registry
    pub fn resolve_fragment(&self, value: Value) -> EvalResult<Value> {
        self.evaluator.resolve_fragment(value)
    }
}

/// Walk and modifier counts for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub walks: usize,
    pub modifiers: usize,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvalReport {
    phases: Vec<PhaseReport>,
}

impl EvalReport {
    fn new() -> Self {
        Self {
            phases: Phase::ALL
                .into_iter()
                .map(|phase| PhaseReport {
                    phase,
                    walks: 0,
                    modifiers: 0,
                })
                .collect(),
        }
    }

    pub fn phase(&self, phase: Phase) -> &PhaseReport {
        &self.phases[phase as usize]
    }

    pub fn phases(&self) -> &[PhaseReport] {
        &self.phases
    }

    pub fn total_walks(&self) -> usize {
        self.phases.iter().map(|report| report.walks).sum()
    }

    pub fn total_modifiers(&self) -> usize {
        self.phases.iter().map(|report| report.modifiers).sum()
    }

    fn phase_mut(&mut self, phase: Phase) -> &mut PhaseReport {
        &mut self.phases[phase as usize]
    }
}

enum EvalState {
    Idle,
    Walking(Phase),
    Applying(Phase, PendingModifiers),
    PhaseDone(Phase),
    Complete,
}

pub struct Evaluator {
    registry: Arc<MacroRegistry>,
    config: EvaluatorConfig,
    require_kind: bool,
    depth: usize,
}

impl Evaluator {
    pub fn new(registry: Arc<MacroRegistry>) -> Self {
        Self::with_config(registry, EvaluatorConfig::default())
    }

    pub fn with_config(registry: Arc<MacroRegistry>, config: EvaluatorConfig) -> Self {
        Self {
            registry,
            config,
            require_kind: true,
            depth: 0,
        }
    }

    /// Evaluator over the built-in macros in the configured namespace
    pub fn from_config(config: EvaluatorConfig, attributes: Arc<Attributes>) -> Self {
        let registry = MacroRegistry::with_builtins(config.namespace.clone(), attributes);
        Self::with_config(Arc::new(registry), config)
    }

    /// Skip the root `kind` check, for documents that are not manifests
    pub fn without_kind_check(mut self) -> Self {
        self.require_kind = false;
        self
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate JSON bytes and return the resolved document
    pub fn evaluate_slice(&self, bytes: &[u8]) -> EvalResult<Value> {
        let mut tree = ValueTree::from_slice(bytes)?;
        self.run(&mut tree)?;
        Ok(tree.to_value()?)
    }

    /// Evaluate YAML text and return the resolved document
    pub fn evaluate_yaml_str(&self, source: &str) -> EvalResult<Value> {
        let mut tree = ValueTree::from_yaml_str(source)?;
        self.run(&mut tree)?;
        Ok(tree.to_value()?)
    }

    pub fn evaluate_value(&self, value: Value) -> EvalResult<Value> {
        let mut tree = ValueTree::new(value);
        self.run(&mut tree)?;
        Ok(tree.to_value()?)
    }

    /// Run every phase to its fixpoint, mutating `tree` in place
    ///
    /// On error the tree is left with whatever modifiers already ran.
    #[instrument(skip(self, tree), fields(depth = self.depth, nodes = tree.len()))]
    pub fn run(&self, tree: &mut ValueTree) -> EvalResult<EvalReport> {
        info!("Starting evaluation");

        let mut report = EvalReport::new();
        let mut state = EvalState::Idle;

        loop {
            state = match state {
                EvalState::Idle => EvalState::Walking(Phase::first()),
                EvalState::Walking(phase) => {
                    let walks = report.phase(phase).walks;
                    if let Some(limit) = self.config.max_walks_per_phase {
                        if walks >= limit {
                            error!(%phase, walks, "Walk limit exceeded");
                            return Err(EvalError::WalkLimitExceeded { phase, walks });
                        }
                    }

                    let pending = self.walk(tree, phase)?;
                    report.phase_mut(phase).walks += 1;

                    if pending.is_empty() {
                        EvalState::PhaseDone(phase)
                    } else {
                        EvalState::Applying(phase, pending)
                    }
                }
                EvalState::Applying(phase, pending) => {
                    let applied = pending.apply_all(tree).map_err(|err| {
                        error!(%phase, error = %err, "Modifier execution failed");
                        err
                    })?;
                    report.phase_mut(phase).modifiers += applied;
                    EvalState::Walking(phase)
                }
                EvalState::PhaseDone(phase) => {
                    let summary = report.phase(phase);
                    debug!(%phase, walks = summary.walks, modifiers = summary.modifiers, "Phase complete");
                    match phase.next() {
                        Some(next) => EvalState::Walking(next),
                        None => EvalState::Complete,
                    }
                }
                EvalState::Complete => break,
            };
        }

        if self.config.strict_macros && self.depth == 0 {
            self.check_residual_macros(tree)?;
        }

        info!(
            walks = report.total_walks(),
            modifiers = report.total_modifiers(),
            "Evaluation complete"
        );
        Ok(report)
    }

    /// Walk the tree once, collecting modifiers for macros active in `phase`
    #[instrument(skip(self, tree))]
    pub fn walk(&self, tree: &ValueTree, phase: Phase) -> EvalResult<PendingModifiers> {
        if self.require_kind {
            check_kind(tree)?;
        }

        let mut walker = MacroWalker {
            evaluator: self,
            phase,
            pending: PendingModifiers::new(),
        };
        let branches = walk_tree(&mut walker, tree)?;

        debug!(
            branches = branches.len(),
            modifiers = walker.pending.len(),
            "Walk complete"
        );
        Ok(walker.pending)
    }

    /// Evaluate a value detached from the document, one level deeper
    fn resolve_fragment(&self, value: Value) -> EvalResult<Value> {
        let limit = self.config.max_lookup_depth;
        if self.depth >= limit {
            error!(limit, "Lookup nesting limit reached");
            return Err(EvalError::LookupDepthExceeded { limit });
        }

        let nested = Evaluator {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            require_kind: false,
            depth: self.depth + 1,
        };
        let mut fragment = ValueTree::new(value);
        nested.run(&mut fragment)?;
        Ok(fragment.to_value()?)
    }

    fn check_residual_macros(&self, tree: &ValueTree) -> EvalResult<()> {
        let mut scan = ResidualScan {
            registry: &self.registry,
            paths: Vec::new(),
        };
        walk_tree(&mut scan, tree)?;

        if scan.paths.is_empty() {
            Ok(())
        } else {
            error!(count = scan.paths.len(), "Macros left unresolved");
            Err(EvalError::UnresolvedMacros { paths: scan.paths })
        }
    }
}

/// Root must be an object with a non-empty `kind` field, any casing
fn check_kind(tree: &ValueTree) -> EvalResult<()> {
    let root = tree.root();
    let root_kind = tree.kind(root)?;
    if root_kind != Kind::Object {
        return Err(unknown_kind(format!("document root is {root_kind}, expected Object")));
    }

    let field = tree
        .children(root)?
        .into_iter()
        .find(|(key, _)| key.as_field().is_some_and(|name| name.eq_ignore_ascii_case("kind")));
    let Some((key, node)) = field else {
        return Err(unknown_kind("document has no kind field".to_string()));
    };

    let valid = match tree.kind(node)? {
        Kind::String => !tree.get_string(&[key.clone()])?.is_empty(),
        Kind::Object => !tree.children(node)?.is_empty(),
        _ => false,
    };
    if !valid {
        return Err(unknown_kind(format!(
            "field {key} must be a non-empty string or object"
        )));
    }
    Ok(())
}

fn unknown_kind(reason: String) -> EvalError {
    error!(%reason, "Kind check failed");
    EvalError::UnknownKind { reason }
}

struct MacroWalker<'e> {
    evaluator: &'e Evaluator,
    phase: Phase,
    pending: PendingModifiers,
}

impl Visitor for MacroWalker<'_> {
    type Error = EvalError;

    fn visit_branch(&mut self, tree: &ValueTree, branch: &Branch) -> EvalResult<()> {
        let Some(key) = branch.field_name() else {
            return Ok(());
        };
        let registry = &self.evaluator.registry;

        if let Some((invocation, factory)) = registry.lookup(self.phase, key) {
            let cx = MacroContext::new(self.evaluator, tree, self.phase);
            let modifier = factory
                .make_modifier(&cx, branch, &invocation)
                .map_err(|err| {
                    error!(path = %branch.path_string(), macro_name = %invocation.canonical_name(), error = %err, "Macro failed");
                    err
                })?;
            self.pending.insert(modifier);
            return Ok(());
        }

        if !registry.matcher().in_namespace(key) {
            return Ok(());
        }

        if !registry.phases_for(key).is_empty() {
            debug!(path = %branch.path_string(), key, phase = %self.phase, "Macro key belongs to another phase");
        } else if self.evaluator.config.strict_macros {
            error!(path = %branch.path_string(), key, "Unknown macro");
            return Err(EvalError::UnknownMacro {
                path: branch.path_string().to_string(),
                key: key.to_string(),
            });
        } else {
            warn!(path = %branch.path_string(), key, "Unknown macro key left as data");
        }
        Ok(())
    }
}

/// Collects namespaced keys that survived every phase
struct ResidualScan<'r> {
    registry: &'r MacroRegistry,
    paths: Vec<String>,
}

impl Visitor for ResidualScan<'_> {
    type Error = EvalError;

    fn visit_branch(&mut self, _tree: &ValueTree, branch: &Branch) -> EvalResult<()> {
        if branch
            .field_name()
            .is_some_and(|key| self.registry.matcher().in_namespace(key))
        {
            self.paths.push(branch.path_string().to_string());
        }
        Ok(())
    }
}

