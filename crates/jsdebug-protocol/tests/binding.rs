mod common;

use std::sync::Arc;

use expect_test::expect;
use jsdebug_protocol::{BindMode, BindingError, BindingProblem, FieldValue};
use serde::Deserialize;
use serde_json::{json, Value};

use common::{binder, frame_schemas, schema, FRAME_FIELDS};

fn frame_json() -> Value {
    json!({
        "index": 0,
        "func": "main",
        "location": { "scriptId": "42", "line": 7, "column": 3 },
        "arguments": [1, 2],
        "weight": 0.5,
        "state": "running",
        "note": null,
        "receiver": { "type": "object", "className": "Window" }
    })
}

#[test]
fn eager_and_lazy_views_agree_on_valid_records() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let eager = binder.bind_eager(frame_json(), &frame).unwrap();
    let lazy = binder.bind_lazy(frame_json(), &frame);

    for name in FRAME_FIELDS {
        assert_eq!(
            eager.field(name).unwrap(),
            lazy.field(name).unwrap(),
            "field {name}"
        );
    }
    assert_eq!(eager.long("index").unwrap(), Some(0));
    assert_eq!(eager.string("functionName").unwrap(), Some("main"));
    assert_eq!(eager.field("note").unwrap(), &FieldValue::Null);
    let location = eager.record("location").unwrap().unwrap();
    assert_eq!(location.long("column").unwrap(), Some(3));
}

#[test]
fn missing_required_field_is_reported_in_both_modes() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw.as_object_mut().unwrap().remove("index");

    let eager = binder.bind_eager(raw.clone(), &frame).unwrap_err();
    assert_eq!(eager.field, "index");
    assert_eq!(eager.problem, BindingProblem::Missing);

    let lazy = binder.bind_lazy(raw, &frame);
    assert_eq!(lazy.string("functionName").unwrap(), Some("main"));
    let first = lazy.field("index").unwrap_err();
    let second = lazy.field("index").unwrap_err();
    assert_eq!(first, eager);
    assert_eq!(first, second);
}

#[test]
fn lazy_view_decodes_each_field_once() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let lazy = binder.bind_lazy(frame_json(), &frame);

    assert!(!lazy.is_decoded("location"));
    let first: *const FieldValue = lazy.field("location").unwrap();
    assert!(lazy.is_decoded("location"));
    assert!(!lazy.is_decoded("arguments"));
    let second: *const FieldValue = lazy.field("location").unwrap();
    assert!(std::ptr::eq(first, second));
}

#[test]
fn eager_view_is_fully_decoded() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let eager = binder.bind(frame_json(), &frame, BindMode::Eager).unwrap();
    assert!(FRAME_FIELDS.iter().all(|name| eager.is_decoded(name)));
    assert_eq!(eager.mode(), BindMode::Eager);
}

#[test]
fn long_fields_reject_fractions_and_strings() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let with_index = |index: Value| {
        let mut raw = frame_json();
        raw["index"] = index;
        binder.bind_eager(raw, &frame)
    };

    assert_eq!(with_index(json!(3.0)).unwrap().long("index").unwrap(), Some(3));
    assert_eq!(
        with_index(json!(3.5)).unwrap_err().problem,
        BindingProblem::Mistyped {
            found: "fractional number"
        }
    );
    assert_eq!(
        with_index(json!("3")).unwrap_err().problem,
        BindingProblem::Mistyped { found: "string" }
    );
    assert_eq!(
        with_index(json!([3])).unwrap_err().problem,
        BindingProblem::Mistyped { found: "array" }
    );
}

#[test]
fn double_fields_widen_integers() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw["weight"] = json!(2);
    let view = binder.bind_eager(raw, &frame).unwrap();
    assert_eq!(view.double("weight").unwrap(), Some(2.0));
}

#[test]
fn wire_name_is_the_only_property_read() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    let object = raw.as_object_mut().unwrap();
    object.remove("func");
    object.insert("functionName".into(), json!("main"));

    let err = binder.bind_eager(raw, &frame).unwrap_err();
    assert_eq!(err.field, "functionName");
    assert_eq!(err.problem, BindingProblem::Missing);
}

#[test]
fn list_errors_name_the_element() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw["arguments"] = json!([1, "two", 3]);

    let lazy = binder.bind_lazy(raw, &frame);
    let err = lazy.list("arguments").unwrap_err();
    assert_eq!(
        err.problem,
        BindingProblem::Element {
            index: 1,
            problem: Box::new(BindingProblem::Mistyped { found: "string" }),
        }
    );
    expect![[r#"Frame.arguments (list of long): element 1: found string"#]]
        .assert_eq(&err.to_string());
}

#[test]
fn null_is_only_accepted_by_nullable_fields() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw["location"] = Value::Null;

    let err = binder.bind_eager(raw, &frame).unwrap_err();
    assert_eq!(err.field, "location");
    assert_eq!(err.problem, BindingProblem::UnexpectedNull);
}

#[test]
fn optional_absent_field_is_unset() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw.as_object_mut().unwrap().remove("weight");

    let view = binder.bind_eager(raw, &frame).unwrap();
    assert!(view.field("weight").unwrap().is_unset());
    assert_eq!(view.double("weight").unwrap(), None);
}

#[test]
fn enum_constants_match_case_insensitively() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw["state"] = json!("SUSPENDED");
    let view = binder.bind_eager(raw.clone(), &frame).unwrap();
    assert_eq!(view.field("state").unwrap(), &FieldValue::Enum("suspended".into()));

    raw["state"] = json!("gone");
    let err = binder.bind_eager(raw, &frame).unwrap_err();
    assert_eq!(err.problem, BindingProblem::UnknownEnumValue("gone".into()));
}

#[test]
fn closed_record_rejects_undeclared_properties() {
    let binder = binder(frame_schemas());
    let location = schema(&binder, "Location");
    let raw = json!({ "scriptId": "1", "line": 2, "extra": true });

    let err = binder.bind_eager(raw.clone(), &location).unwrap_err();
    assert_eq!(err.field, "extra");
    assert_eq!(err.problem, BindingProblem::UndeclaredProperty);

    let lazy = binder.bind_lazy(raw, &location);
    assert_eq!(lazy.long("line").unwrap(), Some(2));
    assert!(lazy.bind_all().is_err());
}

#[test]
fn nested_record_errors_keep_the_inner_path() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw["location"] = json!({ "scriptId": "42" });

    let err = binder.bind_eager(raw, &frame).unwrap_err();
    let BindingProblem::Nested(inner) = &err.problem else {
        panic!("expected nested error, got {err:?}");
    };
    assert_eq!(inner.field, "line");
    expect![[r#"Frame.location (record Location): Location.line (long): missing"#]]
        .assert_eq(&err.to_string());
}

#[test]
fn lazy_nested_record_defers_its_own_fields() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let mut raw = frame_json();
    raw["location"] = json!({ "scriptId": "42" });

    let lazy = binder.bind_lazy(raw, &frame);
    let location = lazy.record("location").unwrap().unwrap();
    assert_eq!(location.mode(), BindMode::Lazy);
    assert_eq!(location.string("scriptId").unwrap(), Some("42"));
    assert_eq!(
        location.long("line").unwrap_err().problem,
        BindingProblem::Missing
    );
}

#[test]
fn non_object_root_is_rejected_eagerly() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let err = binder.bind_eager(json!([1, 2]), &frame).unwrap_err();
    assert_eq!(err.field, BindingError::ROOT);
    assert_eq!(err.problem, BindingProblem::NotAnObject { found: "array" });
}

#[test]
fn undeclared_field_lookup_is_an_error() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let view = binder.bind_eager(frame_json(), &frame).unwrap();
    assert_eq!(
        view.field("nope").unwrap_err().problem,
        BindingProblem::NotDeclared
    );
}

#[test]
fn bind_type_reports_unknown_types() {
    let binder = binder(frame_schemas());
    let err = binder
        .bind_type(frame_json(), "Missing", BindMode::Lazy)
        .unwrap_err();
    assert_eq!(err.problem, BindingProblem::UnknownType);
}

#[test]
fn views_share_and_never_mutate_the_raw_value() {
    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let raw = Arc::new(frame_json());
    let view = binder.bind_eager(Arc::clone(&raw), &frame).unwrap();
    assert!(Arc::ptr_eq(view.raw(), &raw));
    assert_eq!(*raw, frame_json());
}

#[test]
fn views_decode_into_serde_types() {
    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Location {
        script_id: String,
        line: u32,
        column: Option<u32>,
    }

    let binder = binder(frame_schemas());
    let frame = schema(&binder, "Frame");
    let view = binder.bind_eager(frame_json(), &frame).unwrap();
    let location: Location = view.record("location").unwrap().unwrap().decode().unwrap();
    assert_eq!(
        location,
        Location {
            script_id: "42".into(),
            line: 7,
            column: Some(3),
        }
    );
}
