//! Built-in macros
//!
//! | macro                     | phase      | input           |
//! |---------------------------|------------|-----------------|
//! | `Null.Delete`             | directives | String, Object  |
//! | `Boolean.Lookup`          | scalars    | String          |
//! | `String.Lookup`           | scalars    | String          |
//! | `Number.Lookup`           | scalars    | String          |
//! | `Array.Lookup`            | composites | String          |
//! | `Object.Lookup`           | composites | String          |
//! | `String.Join`             | composites | Array           |
//! | `String.AsJSON`           | encoding   | Object, Array   |
//! | `String.AsYAML`           | encoding   | Object, Array   |
//!
//! The object holding a macro key is its *wrapper*. Every built-in rewrites
//! the wrapper, never the macro key alone.

use crate::attributes::Attributes;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::MacroContext;
use crate::macros::{MacroDef, MacroInvocation};
use crate::modifier::{Modifier, Transform};
use crate::phase::Phase;
use crate::registry::{MacroRegistry, ModifierFactory};
use kubegen_tree::{Branch, Key, Kind};
use std::sync::Arc;
use tracing::trace;

fn expect_input(branch: &Branch, invocation: &MacroInvocation, accepted: &[Kind]) -> EvalResult<()> {
    if accepted.contains(&branch.kind()) {
        Ok(())
    } else {
        Err(EvalError::macro_type_mismatch(
            branch.path_string(),
            invocation.canonical_name(),
            accepted,
            branch.kind(),
        ))
    }
}

/// Path of the object holding the macro key
fn wrapper_path(branch: &Branch) -> Vec<Key> {
    // Macro keys are object fields, so they always have a parent
    branch.parent_path().unwrap_or(&[]).to_vec()
}

/// `<Type>.Lookup`: substitutes a named attribute for the wrapper
pub struct LookupMacro {
    attributes: Arc<Attributes>,
}

impl LookupMacro {
    pub fn new(attributes: Arc<Attributes>) -> Self {
        Self { attributes }
    }
}

impl ModifierFactory for LookupMacro {
    fn make_modifier(
        &self,
        cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        expect_input(branch, invocation, &[Kind::String])?;

        let name = cx.tree().get_string(branch.path())?;
        let return_type = invocation.return_type();
        let value = self.attributes.lookup(name, return_type)?.clone();
        let wrapper = wrapper_path(branch);
        trace!(attribute = name, %return_type, path = %branch.path_string(), "Resolving lookup");

        let modifier = Modifier::new(branch, invocation);
        if !return_type.is_container() {
            return Ok(modifier.set(wrapper, value));
        }

        // Looked-up fragments may carry macros of any phase
        let value = cx.resolve_fragment(value)?;
        let wrapper_node = cx.tree().get(&wrapper)?;
        if cx.tree().children(wrapper_node)?.len() == 1 {
            Ok(modifier.set(wrapper, value))
        } else {
            Ok(modifier
                .delete(branch.path().to_vec())
                .overlay(wrapper, value))
        }
    }
}

/// `String.Join`: concatenates the elements of an array
pub struct JoinMacro;

impl ModifierFactory for JoinMacro {
    fn make_modifier(
        &self,
        _cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        expect_input(branch, invocation, &[Kind::Array])?;
        Ok(Modifier::new(branch, invocation).transform(
            branch.path().to_vec(),
            wrapper_path(branch),
            Transform::Join,
        ))
    }
}

/// `String.AsJSON` / `String.AsYAML`: encodes a composite value as a string
pub struct EncodeMacro(pub Transform);

impl ModifierFactory for EncodeMacro {
    fn make_modifier(
        &self,
        _cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        expect_input(branch, invocation, &[Kind::Object, Kind::Array])?;
        Ok(Modifier::new(branch, invocation).transform(
            branch.path().to_vec(),
            wrapper_path(branch),
            self.0,
        ))
    }
}

/// `Null.Delete`: removes the wrapper from its parent
pub struct DeleteMacro;

impl ModifierFactory for DeleteMacro {
    fn make_modifier(
        &self,
        _cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        expect_input(branch, invocation, &[Kind::String, Kind::Object])?;
        Ok(Modifier::new(branch, invocation).delete(wrapper_path(branch)))
    }
}

/// Register every built-in macro
pub fn register_builtins(registry: &mut MacroRegistry, attributes: Arc<Attributes>) {
    registry.define_macro(MacroDef::new(Kind::Null, Phase::Directives, "Delete"), DeleteMacro);

    for kind in [Kind::Boolean, Kind::String, Kind::Number] {
        registry.define_macro(
            MacroDef::new(kind, Phase::Scalars, "Lookup"),
            LookupMacro::new(Arc::clone(&attributes)),
        );
    }
    for kind in [Kind::Array, Kind::Object] {
        registry.define_macro(
            MacroDef::new(kind, Phase::Composites, "Lookup"),
            LookupMacro::new(Arc::clone(&attributes)),
        );
    }
    registry.define_macro(MacroDef::new(Kind::String, Phase::Composites, "Join"), JoinMacro);

    registry
        .define_macro(
            MacroDef::new(Kind::String, Phase::Encoding, "AsJSON"),
            EncodeMacro(Transform::Json),
        )
        .define_macro(
            MacroDef::new(Kind::String, Phase::Encoding, "AsYAML"),
            EncodeMacro(Transform::Yaml),
        );
}

impl MacroRegistry {
    /// Registry holding the built-in macros
    pub fn with_builtins(namespace: impl Into<String>, attributes: Arc<Attributes>) -> Self {
        let mut registry = MacroRegistry::new(namespace);
        register_builtins(&mut registry, attributes);
        registry
    }
}
