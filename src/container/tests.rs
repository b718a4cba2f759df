use std::sync::Arc;

use hifitime::Epoch;
use ndarray::{array, Array1};
use serde_json::json;

use super::*;

fn hillas_schema() -> Arc<ContainerSchema> {
    ContainerSchema::builder("HillasParametersContainer")
        .prefix("hillas")
        .field(
            Field::new("intensity", f64::NAN).with_description("total intensity (size)"),
        )
        .field(
            Field::new("width", f64::NAN)
                .with_unit("m")
                .with_description("standard spread along the minor-axis"),
        )
        .field(Field::new("n_islands", 0))
        .build()
        .unwrap()
}

fn event_schema() -> Arc<ContainerSchema> {
    let hillas = hillas_schema();
    ContainerSchema::builder("EventContainer")
        .field(Field::new("event_id", -1).with_description("event identifier"))
        .field(Field::new("source", "unknown"))
        .field(Field::with_factory("image", || Value::from(Array1::<f64>::zeros(4))).with_unit("p.e."))
        .field(Field::container("hillas", &hillas))
        .field(Field::map("tel", &hillas))
        .build()
        .unwrap()
}

#[test]
fn test_fresh_record_has_declared_defaults() {
    let event = Container::new(event_schema());
    assert_eq!(event.get("event_id").unwrap(), &Value::Int(-1));
    assert_eq!(event.get("source").unwrap().as_str(), Some("unknown"));
    assert_eq!(
        event.get("image").unwrap().as_array().unwrap(),
        &Array1::<f64>::zeros(4).into_dyn()
    );
    assert!(event.get("hillas").unwrap().as_container().is_some());
    assert!(event.map("tel").unwrap().is_empty());

    let hillas = event.container("hillas").unwrap();
    assert!(hillas.get("intensity").unwrap().as_f64().unwrap().is_nan());
    assert_eq!(hillas.prefix(), "hillas");
    assert_eq!(event.prefix(), "event");
}

#[test]
fn test_default_prefix_is_derived_from_type_name() {
    let schema = ContainerSchema::builder("HillasParametersContainer")
        .build()
        .unwrap();
    assert_eq!(schema.default_prefix(), "hillas_parameters");

    let schema = ContainerSchema::builder("DL1CameraContainer").build().unwrap();
    assert_eq!(schema.default_prefix(), "dl1_camera");

    let schema = ContainerSchema::builder("Reconstructed").build().unwrap();
    assert_eq!(schema.default_prefix(), "reconstructed");
}

#[test]
fn test_factory_defaults_are_not_shared() {
    let schema = event_schema();
    let mut a = Container::new(Arc::clone(&schema));
    let b = Container::new(schema);

    if let Value::Array(image) = a.get_mut("image").unwrap() {
        image[0] = 10.0;
    } else {
        panic!("image should be an array");
    }
    a.container_mut("hillas")
        .unwrap()
        .set("intensity", 100.0)
        .unwrap();

    assert_eq!(b.get("image").unwrap().as_array().unwrap()[0], 0.0);
    assert!(b
        .container("hillas")
        .unwrap()
        .get("intensity")
        .unwrap()
        .as_f64()
        .unwrap()
        .is_nan());
}

#[test]
fn test_plain_mutable_defaults_are_shared() {
    let schema = ContainerSchema::builder("TaggedContainer")
        .field(Field::new("tags", Value::List(vec![])))
        .build()
        .unwrap();
    assert!(matches!(
        schema.field("tags").unwrap().default(),
        FieldDefault::Shared(_)
    ));

    let a = Container::new(Arc::clone(&schema));
    let b = Container::new(schema);
    let tags_a = a.get("tags").unwrap().as_shared().unwrap();
    let tags_b = b.get("tags").unwrap().as_shared().unwrap();
    assert!(tags_a.ptr_eq(tags_b));

    tags_a.with_mut(|v| {
        if let Value::List(l) = v {
            l.push("muon".into());
        }
    });
    assert_eq!(tags_b.get(), Value::List(vec!["muon".into()]));
}

#[test]
fn test_shared_defaults_can_be_denied() {
    let result = ContainerSchema::builder("TaggedContainer")
        .field(Field::new("tags", Value::List(vec![])))
        .deny_shared_defaults()
        .build();
    assert!(matches!(
        result,
        Err(ContainerError::SharedDefault { ref field, .. }) if field == "tags"
    ));

    // Factories are fine.
    let result = ContainerSchema::builder("TaggedContainer")
        .field(Field::with_factory("tags", || Value::List(vec![])))
        .deny_shared_defaults()
        .build();
    assert!(result.is_ok());
}

#[test]
fn test_duplicate_fields_are_rejected() {
    let result = ContainerSchema::builder("BrokenContainer")
        .field(Field::new("x", 0.0))
        .field(Field::new("x", 1.0))
        .build();
    assert!(matches!(
        result,
        Err(ContainerError::DuplicateField { ref field, .. }) if field == "x"
    ));
}

#[test]
fn test_unknown_fields_are_errors() {
    let mut hillas = Container::new(hillas_schema());
    assert!(matches!(
        hillas.get("length"),
        Err(ContainerError::UnknownField { ref field, .. }) if field == "length"
    ));
    assert!(matches!(
        hillas.set("length", 1.0),
        Err(ContainerError::UnknownField { .. })
    ));
}

#[test]
fn test_assignment_is_unchecked() {
    let mut hillas = Container::new(hillas_schema());
    hillas.set("width", "not a number").unwrap();
    assert_eq!(hillas.get("width").unwrap().as_str(), Some("not a number"));
}

#[test]
fn test_overrides_and_update() {
    let schema = hillas_schema();
    let hillas = Container::from_overrides(
        Arc::clone(&schema),
        Some("hillas_lst"),
        [("intensity", Value::from(250.0)), ("n_islands", Value::from(2))],
    )
    .unwrap();
    assert_eq!(hillas.prefix(), "hillas_lst");
    assert_eq!(hillas.get("intensity").unwrap().as_f64(), Some(250.0));
    assert_eq!(hillas.get("n_islands").unwrap().as_i64(), Some(2));

    let result = Container::from_overrides(Arc::clone(&schema), None, [("psi", 1.0)]);
    assert!(matches!(result, Err(ContainerError::UnknownField { .. })));

    // A failed update changes nothing.
    let mut hillas = Container::new(schema);
    let result = hillas.update([("intensity", 5.0), ("psi", 1.0)]);
    assert!(result.is_err());
    assert!(hillas.get("intensity").unwrap().as_f64().unwrap().is_nan());
}

#[test]
fn test_wrong_kind() {
    let event = Container::new(event_schema());
    assert!(matches!(
        event.container("source"),
        Err(ContainerError::WrongKind {
            expected: "container",
            found: "string",
            ..
        })
    ));
    assert!(matches!(
        event.map("hillas"),
        Err(ContainerError::WrongKind { expected: "map", .. })
    ));
}

#[test]
fn test_reset_restores_fresh_defaults() {
    let schema = event_schema();
    let fresh = Container::new(Arc::clone(&schema));

    let mut event = Container::new(schema);
    event.set("event_id", 42).unwrap();
    event.set("source", "gamma").unwrap();
    event
        .container_mut("hillas")
        .unwrap()
        .set("width", 0.1)
        .unwrap();
    event
        .map_mut("tel")
        .unwrap()
        .get_or_create(1_u32)
        .set("intensity", 10.0)
        .unwrap();

    event.reset();
    assert_eq!(event, fresh);
    assert_eq!(
        event.export(ExportOptions::nested()),
        fresh.export(ExportOptions::nested())
    );
}

#[test]
fn test_reset_of_untouched_record_exports_like_a_new_one() {
    let schema = ContainerSchema::builder("TaggedContainer")
        .field(Field::new("tags", Value::List(vec![Value::from("a")])))
        .field(Field::new("energy", 1.5).with_unit("TeV"))
        .build()
        .unwrap();
    let mut record = Container::new(Arc::clone(&schema));
    record.reset();
    let fresh = Container::new(schema);
    assert_eq!(
        record.export(ExportOptions::nested()),
        fresh.export(ExportOptions::nested())
    );
}

#[test]
fn test_reset_detaches_shared_defaults() {
    let schema = ContainerSchema::builder("TaggedContainer")
        .field(Field::new("tags", Value::List(vec![])))
        .build()
        .unwrap();
    let mut a = Container::new(Arc::clone(&schema));
    let b = Container::new(schema);
    a.reset();
    assert_eq!(a.get("tags").unwrap(), &Value::List(vec![]));

    a.set("tags", Value::List(vec!["x".into()])).unwrap();
    let shared = b.get("tags").unwrap().as_shared().unwrap();
    assert_eq!(shared.get(), Value::List(vec![]));
}

#[test]
fn test_shallow_export() {
    let mut event = Container::new(event_schema());
    event.map_mut("tel").unwrap().get_or_create(1_u32);
    let exported = event.export(ExportOptions::shallow());

    assert_eq!(
        exported.keys().collect::<Vec<_>>(),
        ["event_id", "source", "image", "hillas"]
    );
    // The sub-record is passed through as it is.
    assert!(matches!(
        exported["hillas"],
        Exported::Value(Value::Container(_))
    ));
}

#[test]
fn test_nested_export() {
    let mut event = Container::new(event_schema());
    event
        .map_mut("tel")
        .unwrap()
        .get_or_create(4_u32)
        .set("n_islands", 3)
        .unwrap();
    let exported = event.export(ExportOptions::nested());

    let hillas = exported["hillas"].as_nested().unwrap();
    assert_eq!(
        hillas.keys().collect::<Vec<_>>(),
        ["intensity", "width", "n_islands"]
    );
    let tel = exported["tel"].as_nested().unwrap();
    let tel_4 = tel["4"].as_nested().unwrap();
    assert_eq!(tel_4["n_islands"], Exported::Value(Value::Int(3)));

    let exported = event.export(ExportOptions::nested().with_prefix(true));
    assert!(exported.contains_key("event_event_id"));
    let hillas = exported["event_hillas"].as_nested().unwrap();
    assert!(hillas.contains_key("hillas_width"));
}

#[test]
fn test_flat_export_uses_dotted_paths() {
    let mut event = Container::new(event_schema());
    event.map_mut("tel").unwrap().get_or_create(1_u32);
    event.map_mut("tel").unwrap().get_or_create(2_u32);
    let row = event.to_row(false);
    assert_eq!(
        row.keys().collect::<Vec<_>>(),
        [
            "event_id",
            "source",
            "image",
            "hillas.intensity",
            "hillas.width",
            "hillas.n_islands",
            "tel.1.intensity",
            "tel.1.width",
            "tel.1.n_islands",
            "tel.2.intensity",
            "tel.2.width",
            "tel.2.n_islands",
        ]
    );

    let exported = event.export(ExportOptions::flat());
    assert_eq!(exported.len(), row.len());
    assert!(exported.values().all(|e| e.as_value().is_some()));
}

#[test]
fn test_flat_export_with_prefixes() {
    let mut event = Container::new(event_schema());
    event.map_mut("tel").unwrap().get_or_create(1_u32);
    let row = event.to_row(true);
    assert_eq!(
        row.keys().collect::<Vec<_>>(),
        [
            "event_event_id",
            "event_source",
            "event_image",
            "event_hillas_intensity",
            "event_hillas_width",
            "event_hillas_n_islands",
            "event_1_hillas_intensity",
            "event_1_hillas_width",
            "event_1_hillas_n_islands",
        ]
    );
}

#[test]
fn test_differently_prefixed_records_have_disjoint_columns() {
    let schema = hillas_schema();
    let a = Container::with_prefix(Arc::clone(&schema), "hillas_lst");
    let b = Container::with_prefix(schema, "hillas_mst");
    let options = ExportOptions::flat().with_prefix(true);
    let keys_a = a.export(options);
    let keys_b = b.export(options);
    assert_eq!(keys_a.len(), 3);
    assert!(keys_a.keys().all(|k| !keys_b.contains_key(k)));
}

#[test]
fn test_differently_prefixed_records_with_sub_records_have_disjoint_columns() {
    let schema = event_schema();
    let mut lst = Container::with_prefix(Arc::clone(&schema), "lst");
    let mut mst = Container::with_prefix(schema, "mst");
    for event in [&mut lst, &mut mst] {
        event.map_mut("tel").unwrap().get_or_create(1_u32);
    }
    let row_lst = lst.to_row(true);
    let row_mst = mst.to_row(true);
    assert_eq!(row_lst.len(), 9);
    assert_eq!(row_lst.len(), row_mst.len());
    assert!(row_lst.contains_key("lst_hillas_width"));
    assert!(row_lst.contains_key("lst_1_hillas_width"));
    assert!(row_mst.contains_key("mst_hillas_width"));
    assert!(row_lst.keys().all(|k| !row_mst.contains_key(k)));

    let units = lst.column_units(true);
    assert_eq!(units.get("lst_1_hillas_width").map(String::as_str), Some("m"));
}

#[test]
fn test_flat_export_collision_keeps_last_value() {
    // Both sub-records use the same prefix, so their prefixed columns clash.
    let hillas = hillas_schema();
    let schema = ContainerSchema::builder("PairContainer")
        .field(Field::container("first", &hillas))
        .field(Field::container("second", &hillas))
        .build()
        .unwrap();
    let mut pair = Container::new(schema);
    pair.container_mut("second")
        .unwrap()
        .set("n_islands", 7)
        .unwrap();
    let row = pair.to_row(true);
    assert_eq!(row.len(), 3);
    assert_eq!(row["pair_hillas_n_islands"], Value::Int(7));
    // Without prefixes the paths keep them apart.
    assert_eq!(pair.to_row(false).len(), 6);
}

#[test]
fn test_column_units() {
    let event = Container::new(event_schema());
    let units = event.column_units(false);
    assert_eq!(units.get("image").map(String::as_str), Some("p.e."));
    assert_eq!(units.get("hillas.width").map(String::as_str), Some("m"));
    assert!(!units.contains_key("hillas.intensity"));

    let units = event.column_units(true);
    assert_eq!(units.get("event_hillas_width").map(String::as_str), Some("m"));
}

#[test]
fn test_map_get_or_create() {
    let hillas = hillas_schema();
    let mut map = ContainerMap::new(Arc::clone(&hillas));
    assert!(map.get(1_u32).is_none());
    assert!(map.is_empty());

    map.get_or_create(1_u32).set("n_islands", 1).unwrap();
    map.get_or_create(1_u32).set("intensity", 2.0).unwrap();
    assert_eq!(map.len(), 1);
    let entry = map.get(1_u32).unwrap();
    assert_eq!(entry.get("n_islands").unwrap().as_i64(), Some(1));
    assert_eq!(entry.get("intensity").unwrap().as_f64(), Some(2.0));

    map.get_or_create("stereo");
    assert_eq!(
        map.keys().map(ToString::to_string).collect::<Vec<_>>(),
        ["1", "stereo"]
    );
    assert!(map.remove("stereo").is_some());
    assert!(!map.contains_key("stereo"));
}

#[test]
fn test_map_insert_checks_the_record_type() {
    let hillas = hillas_schema();
    let mut map = ContainerMap::new(Arc::clone(&hillas));
    let other = Container::new(event_schema());
    assert!(matches!(
        map.insert(1_u32, other),
        Err(ContainerError::SchemaMismatch { .. })
    ));
    assert!(map
        .insert(1_u32, Container::new(hillas))
        .unwrap()
        .is_none());
}

#[test]
fn test_json_serialisation() {
    let schema = ContainerSchema::builder("ObservationContainer")
        .field(Field::new("obs_id", 1))
        .field(Field::new("start", Epoch::from_gpst_seconds(1_000_000_000.0)))
        .field(Field::with_factory("grid", || {
            Value::from(array![[1.0, 2.0], [3.0, 4.0]].into_dyn())
        }))
        .field(Field::new("name", Value::None))
        .build()
        .unwrap();
    let obs = Container::new(schema);
    let json = serde_json::to_value(&obs).unwrap();
    assert_eq!(json["obs_id"], json!(1));
    assert_eq!(json["grid"], json!([[1.0, 2.0], [3.0, 4.0]]));
    assert_eq!(json["name"], json!(null));
    assert!(json["start"].as_str().unwrap().starts_with("2011"));
}

#[test]
fn test_display_lists_fields_units_and_descriptions() {
    let hillas = Container::new(hillas_schema());
    let s = hillas.to_string();
    assert!(s.starts_with("HillasParametersContainer (prefix 'hillas'):"));
    assert!(s.contains("width"));
    assert!(s.contains("[m]"));
    assert!(s.contains("# total intensity (size)"));
}
