/// Built-in macro tests
/// Lookups, joins, encodings and deletions against small manifests
use crate::*;
use kubegen_tree::{Kind, TreeError};
use serde_json::json;
use std::sync::Arc;

#[cfg(test)]
mod builtin_tests {
    use super::*;

    fn evaluator_with(attributes: Attributes) -> Evaluator {
        Evaluator::from_config(EvaluatorConfig::default(), Arc::new(attributes))
    }

    fn evaluator() -> Evaluator {
        let mut attributes = Attributes::new();
        attributes
            .declare("image", Kind::String, json!("nginx:1.25"))
            .declare("port", Kind::Number, json!(8080))
            .declare("debug", Kind::Boolean, json!(false))
            .declare("hosts", Kind::Array, json!(["a.example.com", "b.example.com"]))
            .declare("labels", Kind::Object, json!({"app": "web", "tier": "frontend"}))
            .declare(
                "container",
                Kind::Object,
                json!({"name": "web", "ports": [{"containerPort": {"kubegen.Number.Lookup": "port"}}]}),
            );
        evaluator_with(attributes)
    }

    #[test]
    fn test_join_concatenates_strings() {
        let resolved = evaluator()
            .evaluate_slice(br#"{"Kind":"Some","s":{"kubegen.String.Join":["foo","bar"]}}"#)
            .expect("Failed to evaluate");
        assert_eq!(resolved, json!({"Kind": "Some", "s": "foobar"}));
    }

    #[test]
    fn test_join_sees_resolved_scalars() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "image": {"kubegen.String.Join": ["registry.local/", {"kubegen.String.Lookup": "image"}]}
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["image"], json!("registry.local/nginx:1.25"));
    }

    #[test]
    fn test_join_requires_array() {
        let err = evaluator()
            .evaluate_value(json!({"Kind": "Pod", "s": {"kubegen.String.Join": "foo"}}))
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::MacroTypeMismatch { actual: Kind::String, ref expected, .. } if expected == "Array"
        ));
    }

    #[test]
    fn test_scalar_lookups_replace_wrapper() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "image": {"kubegen.String.Lookup": "image"},
                "port": {"kubegen.Number.Lookup": "port"},
                "debug": {"kubegen.Boolean.Lookup": "debug"}
            }))
            .expect("Failed to evaluate");
        assert_eq!(
            resolved,
            json!({"Kind": "Pod", "image": "nginx:1.25", "port": 8080, "debug": false})
        );
    }

    #[test]
    fn test_scalar_lookup_inside_array() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "args": ["--port", {"kubegen.Number.Lookup": "port"}]
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["args"], json!(["--port", 8080]));
    }

    #[test]
    fn test_lookup_on_array_input_is_type_mismatch() {
        let err = evaluator()
            .evaluate_value(json!({"Kind": "Pod", "x": {"kubegen.String.Lookup": ["image"]}}))
            .unwrap_err();
        match err {
            EvalError::MacroTypeMismatch {
                path,
                macro_name,
                expected,
                actual,
            } => {
                assert_eq!(path, r#"$["x"]["kubegen.String.Lookup"]"#);
                assert_eq!(macro_name, "kubegen.String.Lookup");
                assert_eq!(expected, "String");
                assert_eq!(actual, Kind::Array);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lookup_with_wrong_declared_type() {
        let err = evaluator()
            .evaluate_value(json!({"Kind": "Pod", "x": {"kubegen.Number.Lookup": "image"}}))
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::AttributeTypeMismatch { expected: Kind::Number, actual: Kind::String, .. }
        ));
    }

    #[test]
    fn test_lookup_of_missing_attribute() {
        let err = evaluator()
            .evaluate_value(json!({"Kind": "Pod", "x": {"kubegen.String.Lookup": "nope"}}))
            .unwrap_err();
        assert!(matches!(err, EvalError::AttributeNotFound { .. }));
    }

    #[test]
    fn test_object_lookup_replaces_bare_wrapper() {
        let resolved = evaluator()
            .evaluate_value(json!({"Kind": "Pod", "labels": {"kubegen.Object.Lookup": "labels"}}))
            .expect("Failed to evaluate");
        assert_eq!(resolved["labels"], json!({"app": "web", "tier": "frontend"}));
    }

    #[test]
    fn test_object_lookup_keeps_literal_siblings() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "labels": {"kubegen.Object.Lookup": "labels", "tier": "backend", "team": "ops"}
            }))
            .expect("Failed to evaluate");
        assert_eq!(
            resolved["labels"],
            json!({"app": "web", "tier": "backend", "team": "ops"})
        );
    }

    #[test]
    fn test_array_lookup_replaces_wrapper() {
        let resolved = evaluator()
            .evaluate_value(json!({"Kind": "Ingress", "hosts": {"kubegen.Array.Lookup": "hosts"}}))
            .expect("Failed to evaluate");
        assert_eq!(resolved["hosts"], json!(["a.example.com", "b.example.com"]));
    }

    #[test]
    fn test_array_lookup_into_object_with_siblings_fails() {
        let err = evaluator()
            .evaluate_value(json!({
                "Kind": "Ingress",
                "hosts": {"kubegen.Array.Lookup": "hosts", "extra": true}
            }))
            .unwrap_err();
        assert!(matches!(err, EvalError::ModifierExecution { .. }));
        assert!(matches!(
            err.root_cause(),
            EvalError::Tree(TreeError::TypeMismatch { expected: Kind::Array, actual: Kind::Object, .. })
        ));
    }

    #[test]
    fn test_injected_macros_resolve_completely() {
        let mut attributes = Attributes::new();
        attributes
            .declare("obj1", Kind::Object, json!({"replicas": {"kubegen.Number.Lookup": "n"}}))
            .declare("n", Kind::Number, json!(2));
        let resolved = evaluator_with(attributes)
            .evaluate_value(json!({"Kind": "Some", "x": {"kubegen.Object.Lookup": "obj1"}}))
            .expect("Failed to evaluate");
        assert_eq!(resolved, json!({"Kind": "Some", "x": {"replicas": 2}}));
    }

    #[test]
    fn test_nested_fragment_resolution() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Deployment",
                "spec": {"containers": [{"kubegen.Object.Lookup": "container", "image": {"kubegen.String.Lookup": "image"}}]}
            }))
            .expect("Failed to evaluate");
        assert_eq!(
            resolved["spec"]["containers"][0],
            json!({"name": "web", "image": "nginx:1.25", "ports": [{"containerPort": 8080}]})
        );
    }

    #[test]
    fn test_lookups_with_arguments_share_a_wrapper() {
        let mut attributes = Attributes::new();
        attributes
            .declare("base", Kind::Object, json!({"a": 1, "shared": "base"}))
            .declare("extra", Kind::Object, json!({"b": 2, "shared": "extra"}));
        let resolved = evaluator_with(attributes)
            .evaluate_value(json!({
                "Kind": "ConfigMap",
                "data": {
                    "kubegen.Object.Lookup(base)": "base",
                    "kubegen.Object.Lookup(extra)": "extra"
                }
            }))
            .expect("Failed to evaluate");

        let data = resolved["data"].as_object().unwrap();
        assert_eq!(data["a"], json!(1));
        assert_eq!(data["b"], json!(2));
        // Descending key order: "(extra)" merges before "(base)"
        assert_eq!(data["shared"], json!("extra"));
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_as_json_encodes_object() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "ConfigMap",
                "data": {"config.json": {"kubegen.String.AsJSON": {"port": {"kubegen.Number.Lookup": "port"}}}}
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["data"]["config.json"], json!(r#"{"port":8080}"#));
    }

    #[test]
    fn test_as_yaml_encodes_array() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "ConfigMap",
                "data": {"hosts.yaml": {"kubegen.String.AsYAML": {"kubegen.Array.Lookup": "hosts"}}}
            }))
            .expect("Failed to evaluate");
        assert_eq!(
            resolved["data"]["hosts.yaml"],
            json!("- a.example.com\n- b.example.com\n")
        );
    }

    #[test]
    fn test_nested_encodings_run_inside_out() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "ConfigMap",
                "outer": {"kubegen.String.AsJSON": {"inner": {"kubegen.String.AsJSON": {"x": 1}}}}
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["outer"], json!(r#"{"inner":"{\"x\":1}"}"#));
    }

    #[test]
    fn test_as_json_rejects_scalars() {
        let err = evaluator()
            .evaluate_value(json!({"Kind": "ConfigMap", "x": {"kubegen.String.AsJSON": "text"}}))
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::MacroTypeMismatch { ref expected, actual: Kind::String, .. } if expected == "Object or Array"
        ));
    }

    #[test]
    fn test_delete_removes_wrapper() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Service",
                "spec": {
                    "clusterIP": {"kubegen.Null.Delete": "unused"},
                    "ports": [{"port": 80}, {"kubegen.Null.Delete": {}}, {"port": 443}, {"kubegen.Null.Delete": "x"}]
                }
            }))
            .expect("Failed to evaluate");
        assert_eq!(
            resolved,
            json!({"Kind": "Service", "spec": {"ports": [{"port": 80}, {"port": 443}]}})
        );
    }

    #[test]
    fn test_delete_runs_before_lookups() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Service",
                "gone": {"kubegen.Null.Delete": "", "value": {"kubegen.String.Lookup": "nope"}}
            }))
            .expect("Deleted lookups must never run");
        assert_eq!(resolved, json!({"Kind": "Service"}));
    }

    #[test]
    fn test_nested_deletes_with_early_sorting_keys() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "a": {"kubegen.Null.Delete": "", "b": {"kubegen.Null.Delete": ""}},
                "keep": {"kubegen.Null.Delete": {}, "annotations": {"x": {"kubegen.Null.Delete": ""}}}
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved, json!({"Kind": "Pod"}));
    }

    #[test]
    fn test_deletes_at_mixed_depths_inside_array() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "list": [
                    {"kubegen.Null.Delete": ""},
                    {"a": {"kubegen.Null.Delete": ""}, "b": 1},
                    {"kubegen.Null.Delete": ""}
                ]
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["list"], json!([{"b": 1}]));
    }

    #[test]
    fn test_scalar_lookup_wrapper_with_nested_lookup() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "a": {"kubegen.String.Lookup": "image", "b": {"kubegen.String.Lookup": "image"}}
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["a"], json!("nginx:1.25"));
    }

    #[test]
    fn test_object_lookup_wrapper_with_nested_lookup() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "Pod",
                "meta": {
                    "kubegen.Object.Lookup": "labels",
                    "annotations": {"kubegen.Object.Lookup": "labels"}
                }
            }))
            .expect("Failed to evaluate");
        assert_eq!(
            resolved["meta"],
            json!({
                "app": "web",
                "tier": "frontend",
                "annotations": {"app": "web", "tier": "frontend"}
            })
        );
    }

    #[test]
    fn test_encoding_wrapper_with_nested_encoding() {
        let resolved = evaluator()
            .evaluate_value(json!({
                "Kind": "ConfigMap",
                "a": {"kubegen.String.AsJSON": {"x": 1}, "b": {"kubegen.String.AsJSON": [1]}}
            }))
            .expect("Failed to evaluate");
        assert_eq!(resolved["a"], json!(r#"{"x":1}"#));
    }

    #[test]
    fn test_delete_root_fails() {
        let err = evaluator()
            .without_kind_check()
            .evaluate_value(json!({"kubegen.Null.Delete": ""}))
            .unwrap_err();
        assert!(matches!(err.root_cause(), EvalError::Tree(TreeError::RootDelete)));
    }

    #[test]
    fn test_delete_rejects_numbers() {
        let err = evaluator()
            .evaluate_value(json!({"Kind": "Service", "x": {"kubegen.Null.Delete": 1}}))
            .unwrap_err();
        assert!(matches!(
            err,
            EvalError::MacroTypeMismatch { ref expected, actual: Kind::Number, .. } if expected == "String or Object"
        ));
    }
}
