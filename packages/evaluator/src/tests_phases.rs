/// Phase loop tests
/// Covers fixpoints, the kind check, walk limits, reports and strict mode
use crate::*;
use kubegen_tree::{Branch, Key, Kind, ValueTree};
use serde_json::{json, Value};
use std::sync::Arc;

#[cfg(test)]
mod phase_tests {
    use super::*;

    fn attributes() -> Arc<Attributes> {
        let mut attributes = Attributes::new();
        attributes
            .declare("name", Kind::String, json!("web"))
            .declare("replicas", Kind::Number, json!(3))
            .declare("enabled", Kind::Boolean, json!(true))
            .declare("ports", Kind::Array, json!([80, 443]));
        Arc::new(attributes)
    }

    fn evaluator() -> Evaluator {
        Evaluator::from_config(EvaluatorConfig::default(), attributes())
    }

    fn custom(config: EvaluatorConfig, define: impl FnOnce(&mut MacroRegistry)) -> Evaluator {
        let mut registry = MacroRegistry::with_builtins(config.namespace.clone(), attributes());
        define(&mut registry);
        Evaluator::with_config(Arc::new(registry), config)
    }

    fn manifest() -> Value {
        json!({
            "Kind": "Deployment",
            "metadata": {"name": {"kubegen.String.Lookup": "name"}},
            "spec": {
                "replicas": {"kubegen.Number.Lookup": "replicas"},
                "paused": {"kubegen.Boolean.Lookup": "enabled"},
                "ports": {"kubegen.Array.Lookup": "ports"},
                "selector": {"kubegen.String.Join": ["app-", "web"]}
            }
        })
    }

    #[test]
    fn test_converged_phases_yield_no_modifiers() {
        let evaluator = evaluator();
        let mut tree = ValueTree::new(manifest());
        evaluator.run(&mut tree).expect("Failed to evaluate");

        let resolved = tree.to_value().expect("Failed to materialize");
        for phase in Phase::ALL {
            let pending = evaluator.walk(&tree, phase).expect("Failed to walk");
            assert!(pending.is_empty(), "phase {phase} produced modifiers");
        }
        assert_eq!(tree.to_value().unwrap(), resolved);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let evaluator = evaluator();
        let mut tree = ValueTree::new(manifest());
        evaluator.run(&mut tree).expect("Failed to evaluate");

        let report = evaluator.run(&mut tree).expect("Failed to re-evaluate");
        assert_eq!(report.total_modifiers(), 0);
        assert_eq!(report.total_walks(), Phase::ALL.len());
    }

    #[test]
    fn test_report_counts_walks_and_modifiers() {
        let mut tree = ValueTree::new(manifest());
        let report = evaluator().run(&mut tree).expect("Failed to evaluate");

        let directives = report.phase(Phase::Directives);
        assert_eq!((directives.walks, directives.modifiers), (1, 0));
        let scalars = report.phase(Phase::Scalars);
        assert_eq!((scalars.walks, scalars.modifiers), (2, 3));
        let composites = report.phase(Phase::Composites);
        assert_eq!((composites.walks, composites.modifiers), (2, 2));
        let encoding = report.phase(Phase::Encoding);
        assert_eq!((encoding.walks, encoding.modifiers), (1, 0));
        assert_eq!(report.total_modifiers(), 5);

        let serialized = serde_json::to_value(&report).unwrap();
        assert_eq!(serialized["phases"][1]["phase"], json!("Scalars"));
    }

    #[test]
    fn test_missing_kind_fails_before_any_macro() {
        let document = json!({"x": {"kubegen.String.Lookup": "name"}});
        let mut tree = ValueTree::new(document.clone());
        let err = evaluator().run(&mut tree).unwrap_err();

        assert!(matches!(err, EvalError::UnknownKind { .. }));
        assert_eq!(tree.to_value().unwrap(), document);
    }

    #[test]
    fn test_kind_field_is_case_insensitive() {
        for key in ["kind", "Kind", "KIND", "kInD"] {
            let mut document = serde_json::Map::new();
            document.insert(key.to_string(), json!("Service"));
            let resolved = evaluator()
                .evaluate_value(Value::Object(document))
                .expect("Failed to evaluate");
            assert_eq!(resolved[key], json!("Service"));
        }
    }

    #[test]
    fn test_kind_value_must_be_non_empty() {
        let evaluator = evaluator();
        for document in [
            json!({"kind": ""}),
            json!({"kind": {}}),
            json!({"kind": 7}),
            json!({"kind": null}),
            json!(["kind"]),
            json!("Service"),
        ] {
            let err = evaluator.evaluate_value(document.clone()).unwrap_err();
            assert!(matches!(err, EvalError::UnknownKind { .. }), "{document} was accepted");
        }

        let resolved = evaluator
            .evaluate_value(json!({"kind": {"group": "apps", "name": "Deployment"}}))
            .expect("Failed to evaluate object kind");
        assert_eq!(resolved["kind"]["group"], json!("apps"));
    }

    #[test]
    fn test_kind_check_can_be_disabled() {
        let resolved = evaluator()
            .without_kind_check()
            .evaluate_value(json!({"x": {"kubegen.String.Lookup": "name"}}))
            .expect("Failed to evaluate");
        assert_eq!(resolved, json!({"x": "web"}));
    }

    fn drop_kind(
        _cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        Ok(Modifier::new(branch, invocation)
            .delete(vec![Key::from("Kind")])
            .delete(branch.path().to_vec()))
    }

    #[test]
    fn test_kind_is_checked_at_every_walk() {
        let evaluator = custom(EvaluatorConfig::default(), |registry| {
            registry.define_macro(MacroDef::new(Kind::Null, Phase::Scalars, "DropKind"), drop_kind);
        });
        let mut tree = ValueTree::new(json!({"Kind": "Pod", "x": {"kubegen.Null.DropKind": ""}}));

        let err = evaluator.run(&mut tree).unwrap_err();
        assert!(matches!(err, EvalError::UnknownKind { .. }));
        // The first walk's modifier already ran
        assert_eq!(tree.to_value().unwrap(), json!({"x": {}}));
    }

    fn regrow(
        _cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        let wrapper = branch.parent_path().unwrap_or(&[]).to_vec();
        Ok(Modifier::new(branch, invocation).set(wrapper, json!({"kubegen.String.Grow": "again"})))
    }

    #[test]
    fn test_walk_limit_stops_runaway_expansion() {
        let config = EvaluatorConfig {
            max_walks_per_phase: Some(3),
            ..EvaluatorConfig::default()
        };
        let evaluator = custom(config, |registry| {
            registry.define_macro(MacroDef::new(Kind::String, Phase::Scalars, "Grow"), regrow);
        });

        let err = evaluator
            .evaluate_value(json!({"Kind": "Pod", "x": {"kubegen.String.Grow": "seed"}}))
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::WalkLimitExceeded { phase: Phase::Scalars, walks: 3 }
        ));
    }

    #[test]
    fn test_walk_limit_allows_converging_phases() {
        let config = EvaluatorConfig {
            max_walks_per_phase: Some(2),
            ..EvaluatorConfig::default()
        };
        let evaluator = Evaluator::from_config(config, attributes());
        let resolved = evaluator.evaluate_value(manifest()).expect("Failed to evaluate");
        assert_eq!(resolved["spec"]["replicas"], json!(3));
    }

    #[test]
    fn test_misspelled_macro_passes_through_when_lenient() {
        let document = json!({"Kind": "Pod", "x": {"kubegen.String.Lokup": "name"}});
        let resolved = evaluator()
            .evaluate_value(document.clone())
            .expect("Failed to evaluate");
        assert_eq!(resolved, document);
    }

    #[test]
    fn test_misspelled_macro_fails_when_strict() {
        let evaluator = Evaluator::from_config(EvaluatorConfig::default().strict(), attributes());
        let err = evaluator
            .evaluate_value(json!({"Kind": "Pod", "x": {"kubegen.String.Lokup": "name"}}))
            .unwrap_err();
        match err {
            EvalError::UnknownMacro { path, key } => {
                assert_eq!(path, r#"$["x"]["kubegen.String.Lokup"]"#);
                assert_eq!(key, "kubegen.String.Lokup");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unrelated_dotted_keys_are_data_in_strict_mode() {
        let evaluator = Evaluator::from_config(EvaluatorConfig::default().strict(), attributes());
        let document = json!({
            "Kind": "Pod",
            "metadata": {"labels": {"app.kubernetes.io/name": "web", "kubegen.io/owner": "ops"}}
        });
        let resolved = evaluator
            .evaluate_value(document.clone())
            .expect("Failed to evaluate");
        assert_eq!(resolved, document);
    }

    fn inject_lookup(
        _cx: &MacroContext<'_>,
        branch: &Branch,
        invocation: &MacroInvocation,
    ) -> EvalResult<Modifier> {
        let wrapper = branch.parent_path().unwrap_or(&[]).to_vec();
        Ok(Modifier::new(branch, invocation).set(wrapper, json!({"kubegen.Number.Lookup": "replicas"})))
    }

    #[test]
    fn test_residual_macros_fail_when_strict() {
        let define = |registry: &mut MacroRegistry| {
            registry.define_macro(
                MacroDef::new(Kind::String, Phase::Encoding, "Inject"),
                inject_lookup,
            );
        };
        let document = json!({"Kind": "Pod", "data": {"kubegen.String.Inject": "x"}});

        let lenient = custom(EvaluatorConfig::default(), define);
        let resolved = lenient
            .evaluate_value(document.clone())
            .expect("Failed to evaluate");
        assert_eq!(resolved["data"], json!({"kubegen.Number.Lookup": "replicas"}));

        let strict = custom(EvaluatorConfig::default().strict(), define);
        let err = strict.evaluate_value(document).unwrap_err();
        match err {
            EvalError::UnresolvedMacros { paths } => {
                assert_eq!(paths, vec![r#"$["data"]["kubegen.Number.Lookup"]"#.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_namespace() {
        let config = EvaluatorConfig {
            namespace: "acme".to_string(),
            ..EvaluatorConfig::default()
        };
        let evaluator = Evaluator::from_config(config, attributes());
        let resolved = evaluator
            .evaluate_value(json!({
                "Kind": "Pod",
                "a": {"acme.String.Lookup": "name"},
                "b": {"kubegen.String.Lookup": "name"}
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["a"], json!("web"));
        assert_eq!(resolved["b"], json!({"kubegen.String.Lookup": "name"}));
    }

    #[test]
    fn test_lookup_depth_is_bounded() {
        let mut attributes = Attributes::new();
        attributes.declare(
            "loop",
            Kind::Object,
            json!({"inner": {"kubegen.Object.Lookup": "loop"}}),
        );
        let config = EvaluatorConfig {
            max_lookup_depth: 4,
            ..EvaluatorConfig::default()
        };
        let evaluator = Evaluator::from_config(config, Arc::new(attributes));

        let err = evaluator
            .evaluate_value(json!({"Kind": "Pod", "x": {"kubegen.Object.Lookup": "loop"}}))
            .unwrap_err();
        assert!(matches!(err.root_cause(), EvalError::LookupDepthExceeded { limit: 4 }));
    }
}
