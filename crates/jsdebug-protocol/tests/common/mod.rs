#![allow(dead_code)]

use std::sync::Arc;

use jsdebug_protocol::{
    AmbiguityPolicy, Binder, FieldDescriptor, SchemaDescriptor, SchemaRegistry, SubtypeCandidate,
    SubtypeCondition, ValueKind,
};

pub fn binder(schemas: impl IntoIterator<Item = SchemaDescriptor>) -> Binder {
    let mut builder = SchemaRegistry::builder();
    builder.register_all(schemas).expect("schemas register");
    Binder::new(Arc::new(builder.build().expect("registry builds")))
}

pub fn schema(binder: &Binder, id: &str) -> Arc<SchemaDescriptor> {
    Arc::clone(binder.describe(id).expect("schema registered"))
}

pub fn frame_schemas() -> Vec<SchemaDescriptor> {
    vec![
        SchemaDescriptor::record("Location")
            .field(FieldDescriptor::required("scriptId", ValueKind::String))
            .field(FieldDescriptor::required("line", ValueKind::Long))
            .field(FieldDescriptor::optional("column", ValueKind::Long))
            .closed(),
        SchemaDescriptor::record("Frame")
            .field(FieldDescriptor::required("index", ValueKind::Long))
            .field(FieldDescriptor::required("functionName", ValueKind::String).wire_name("func"))
            .field(FieldDescriptor::required(
                "location",
                ValueKind::record("Location"),
            ))
            .field(FieldDescriptor::optional(
                "arguments",
                ValueKind::list(ValueKind::Long),
            ))
            .field(FieldDescriptor::optional("weight", ValueKind::Double))
            .field(FieldDescriptor::optional(
                "state",
                ValueKind::enumeration(&["running", "suspended"]),
            ))
            .field(FieldDescriptor::optional("note", ValueKind::String).nullable())
            .field(FieldDescriptor::optional("receiver", ValueKind::Any)),
    ]
}

pub const FRAME_FIELDS: &[&str] = &[
    "index",
    "functionName",
    "location",
    "arguments",
    "weight",
    "state",
    "note",
    "receiver",
];

pub fn color_schemas() -> Vec<SchemaDescriptor> {
    vec![
        SchemaDescriptor::record("Ball")
            .field(FieldDescriptor::required("color", ValueKind::polymorphic("Color"))),
        SchemaDescriptor::record("Color").discriminated(vec![
            SubtypeCandidate::new("SchemedColor").when(SubtypeCondition::present("scheme")),
            SubtypeCandidate::new("NamedColor").when(SubtypeCondition::present("name")),
        ]),
        SchemaDescriptor::record("NamedColor")
            .subtype_of("Color")
            .field(FieldDescriptor::required("name", ValueKind::String)),
        SchemaDescriptor::record("SchemedColor")
            .subtype_of("Color")
            .field(FieldDescriptor::required(
                "scheme",
                ValueKind::enumeration(&["rgb", "cmyk"]),
            ))
            .discriminated(vec![
                SubtypeCandidate::new("RgbColor")
                    .when(SubtypeCondition::string_value("scheme", "rgb")),
                SubtypeCandidate::new("CmykColor")
                    .when(SubtypeCondition::string_value("scheme", "cmyk")),
            ]),
        SchemaDescriptor::record("RgbColor")
            .subtype_of("SchemedColor")
            .field(FieldDescriptor::required("red", ValueKind::Long))
            .field(FieldDescriptor::required("green", ValueKind::Long))
            .field(FieldDescriptor::required("blue", ValueKind::Long)),
        SchemaDescriptor::record("CmykColor")
            .subtype_of("SchemedColor")
            .field(FieldDescriptor::required("cyan", ValueKind::Long))
            .field(FieldDescriptor::required("magenta", ValueKind::Long))
            .field(FieldDescriptor::required("yellow", ValueKind::Long))
            .field(FieldDescriptor::required("black", ValueKind::Long)),
    ]
}

pub fn shape_schemas() -> Vec<SchemaDescriptor> {
    vec![
        SchemaDescriptor::record("Shape").discriminated(vec![
            SubtypeCandidate::new("ShapeA").when(SubtypeCondition::bool_value("isA", true)),
            SubtypeCandidate::new("ShapeB").when(SubtypeCondition::bool_value("isA", false)),
        ]),
        SchemaDescriptor::record("ShapeA")
            .subtype_of("Shape")
            .field(FieldDescriptor::required("isA", ValueKind::Bool))
            .field(FieldDescriptor::required("alpha", ValueKind::Long)),
        SchemaDescriptor::record("ShapeB")
            .subtype_of("Shape")
            .field(FieldDescriptor::required("isA", ValueKind::Bool))
            .field(FieldDescriptor::required("beta", ValueKind::Long)),
    ]
}

pub fn scalar_schemas() -> Vec<SchemaDescriptor> {
    vec![
        SchemaDescriptor::record("Scalar").structural(&["NumberScalar", "TextScalar"]),
        SchemaDescriptor::record("NumberScalar")
            .subtype_of("Scalar")
            .field(FieldDescriptor::required("value", ValueKind::Double)),
        SchemaDescriptor::record("TextScalar")
            .subtype_of("Scalar")
            .field(FieldDescriptor::required("text", ValueKind::String)),
    ]
}

pub fn scalar_binder(policy: AmbiguityPolicy) -> Binder {
    binder(scalar_schemas()).with_ambiguity(policy)
}
