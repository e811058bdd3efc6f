//! # Macro Registry
//!
//! Macro definitions keyed by `(phase, canonical name)`, and the matcher that
//! recognizes macro-shaped keys.
//!
//! ## Key shape
//!
//! ```text
//! <namespace>.<ReturnType>.<Verb>
//! <namespace>.<ReturnType>.<Verb>(<literal>)
//! ```
//!
//! `ReturnType` and `Verb` must come from the vocabulary of registered
//! macros. The vocabulary is the union over all phases, so a key can look
//! like a macro (`is_macro_like`) without resolving to any definition in the
//! active phase. Such keys are ordinary data during that phase.
//!
//! ## Collisions
//!
//! Defining a macro whose `(phase, canonical name)` is already taken replaces
//! the earlier definition. Last registration wins.

use crate::error::EvalResult;
use crate::evaluator::MacroContext;
use crate::macros::{MacroDef, MacroInvocation, DEFAULT_NAMESPACE};
use crate::modifier::Modifier;
use crate::phase::Phase;
use kubegen_tree::{Branch, Kind};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds the modifier for one recognized macro key
///
/// Implementations check that the branch holds the macro's input kind and
/// describe the mutation as a [`Modifier`]; they never mutate the tree.
pub trait ModifierFactory: Send + Sync {
    fn make_modifier(
        &self,
        cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier>;
}

impl<F> ModifierFactory for F
where
    F: Fn(&MacroContext<'_>, &Branch, &MacroInvocation) -> EvalResult<Modifier> + Send + Sync,
{
    fn make_modifier(
        &self,
        cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        self(cx, branch, invocation)
    }
}

/// Parsed form of a macro-shaped key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroKey<'k> {
    pub return_type: Kind,
    pub verb: &'k str,
    pub argument: Option<&'k str>,
}

/// Recognizes keys against the registered type and verb vocabulary
#[derive(Debug, Clone)]
pub struct MacroMatcher {
    namespace: String,
    types: BTreeSet<Kind>,
    verbs: BTreeSet<String>,
}

impl MacroMatcher {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            types: BTreeSet::new(),
            verbs: BTreeSet::new(),
        }
    }

    pub fn add(&mut self, def: &MacroDef) {
        self.types.insert(def.return_type);
        self.verbs.insert(def.verb.clone());
    }

    pub fn parse<'k>(&self, key: &'k str) -> Option<MacroKey<'k>> {
        let rest = key.strip_prefix(self.namespace.as_str())?.strip_prefix('.')?;
        let (type_name, call) = rest.split_once('.')?;

        let return_type = *self.types.iter().find(|kind| kind.name() == type_name)?;

        let (verb, argument) = match call.split_once('(') {
            Some((verb, tail)) => {
                let argument = tail.strip_suffix(')')?;
                if argument.contains(&['(', ')'][..]) {
                    return None;
                }
                (verb, Some(argument))
            }
            None => (call, None),
        };

        if !self.verbs.contains(verb) {
            return None;
        }

        Some(MacroKey {
            return_type,
            verb,
            argument,
        })
    }

    pub fn is_macro_like(&self, key: &str) -> bool {
        self.parse(key).is_some()
    }

    /// Whether `key` has the `<namespace>.<Type>.<Verb>` layout, whatever
    /// the type and verb
    pub fn in_namespace(&self, key: &str) -> bool {
        key.strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|rest| rest.contains('.'))
    }
}

struct RegisteredMacro {
    def: MacroDef,
    factory: Arc<dyn ModifierFactory>,
}

pub struct MacroRegistry {
    namespace: String,
    macros: HashMap<(Phase, String), RegisteredMacro>,
    matcher: MacroMatcher,
}

impl MacroRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            matcher: MacroMatcher::new(namespace.clone()),
            namespace,
            macros: HashMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Register a macro and extend the matcher vocabulary
    pub fn define_macro<F>(&mut self, def: MacroDef, factory: F) -> &mut Self
    where
        F: ModifierFactory + 'static,
    {
        let name = def.canonical_name(&self.namespace);
        debug!(macro_name = %name, phase = %def.phase, "Defining macro");

        self.matcher.add(&def);
        let previous = self.macros.insert(
            (def.phase, name.clone()),
            RegisteredMacro {
                def,
                factory: Arc::new(factory),
            },
        );
        if previous.is_some() {
            warn!(macro_name = %name, "Macro redefined, last registration wins");
        }
        self
    }

    pub fn matcher(&self) -> &MacroMatcher {
        &self.matcher
    }

    pub fn is_macro_like(&self, key: &str) -> bool {
        self.matcher.is_macro_like(key)
    }

    /// Macro registered for `key` in the given phase
    pub fn lookup(
        &self,
        phase: Phase,
        key: &str,
    ) -> Option<(MacroInvocation, Arc<dyn ModifierFactory>)> {
        let parsed = self.matcher.parse(key)?;
        let name = format!("{}.{}.{}", self.namespace, parsed.return_type.name(), parsed.verb);
        let registered = self.macros.get(&(phase, name.clone()))?;
        let invocation = MacroInvocation::new(
            registered.def.clone(),
            name,
            parsed.argument.map(str::to_string),
        );
        Some((invocation, Arc::clone(&registered.factory)))
    }

    /// Phases in which `key` resolves to a macro
    pub fn phases_for(&self, key: &str) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|phase| self.lookup(*phase, key).is_some())
            .collect()
    }

    /// Registered definitions, ordered by phase then name
    pub fn definitions(&self) -> Vec<&MacroDef> {
        let mut defs: Vec<(&(Phase, String), &MacroDef)> = self
            .macros
            .iter()
            .map(|(slot, registered)| (slot, &registered.def))
            .collect();
        defs.sort_by(|a, b| a.0.cmp(b.0));
        defs.into_iter().map(|(_, def)| def).collect()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

impl Default for MacroRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("namespace", &self.namespace)
            .field("macros", &self.definitions())
            .finish()
    }
}
