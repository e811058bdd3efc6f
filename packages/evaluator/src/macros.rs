//! Macro definitions and invocations

use crate::phase::Phase;
use kubegen_tree::Kind;

pub const DEFAULT_NAMESPACE: &str = "kubegen";

/// A macro the engine can recognize
///
/// The canonical name is `<namespace>.<ReturnType>.<Verb>`, e.g.
/// `kubegen.String.Lookup`. The registry keys definitions by phase and
/// canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroDef {
    pub return_type: Kind,
    pub phase: Phase,
    pub verb: String,
}

impl MacroDef {
    pub fn new(return_type: Kind, phase: Phase, verb: impl Into<String>) -> Self {
        Self {
            return_type,
            phase,
            verb: verb.into(),
        }
    }

    pub fn canonical_name(&self, namespace: &str) -> String {
        format!("{}.{}.{}", namespace, self.return_type.name(), self.verb)
    }
}

/// A recognized macro key, handed to the macro's modifier factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroInvocation {
    def: MacroDef,
    canonical_name: String,
    argument: Option<String>,
}

impl MacroInvocation {
    pub fn new(def: MacroDef, canonical_name: String, argument: Option<String>) -> Self {
        Self {
            def,
            canonical_name,
            argument,
        }
    }

    pub fn def(&self) -> &MacroDef {
        &self.def
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Literal in `kubegen.Object.Lookup(<argument>)`, if present
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    pub fn return_type(&self) -> Kind {
        self.def.return_type
    }
}
