pub mod attributes;
pub mod builtins;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod macros;
pub mod modifier;
pub mod phase;
pub mod registry;

#[cfg(test)]
mod tests_phases;

#[cfg(test)]
mod tests_builtins;

pub use attributes::{Attribute, Attributes};
pub use builtins::{register_builtins, DeleteMacro, EncodeMacro, JoinMacro, LookupMacro};
pub use config::{ConfigError, EvaluatorConfig, DEFAULT_CONFIG_NAME};
pub use error::{EvalError, EvalResult};
pub use evaluator::{EvalReport, Evaluator, MacroContext, PhaseReport};
pub use macros::{MacroDef, MacroInvocation, DEFAULT_NAMESPACE};
pub use modifier::{Instruction, Modifier, PendingModifiers, Transform};
pub use phase::Phase;
pub use registry::{MacroKey, MacroMatcher, MacroRegistry, ModifierFactory};

// Tree types appear throughout the public API
pub use kubegen_tree as tree;
