//! Standard record types of an imaging atmospheric Cherenkov telescope
//! pipeline.
//!
//! These are built once per process and shared; instantiate them with
//! [`Container::new`](crate::container::Container::new).

use std::sync::Arc;

use ndarray::Array1;

use crate::container::{ContainerSchema, Field, Value};

lazy_static::lazy_static! {
    /// Identifies an event within an observation.
    pub static ref EVENT_INDEX: Arc<ContainerSchema> = ContainerSchema::builder("EventIndexContainer")
        .prefix("")
        .field(Field::new("obs_id", -1).with_description("observation identifier"))
        .field(Field::new("event_id", -1).with_description("event identifier"))
        .build()
        .expect("static schema is valid");

    pub static ref TELESCOPE_POINTING: Arc<ContainerSchema> = ContainerSchema::builder("TelescopePointingContainer")
        .field(
            Field::new("azimuth", f64::NAN)
                .with_unit("deg")
                .with_description("azimuth, measured N->E"),
        )
        .field(Field::new("altitude", f64::NAN).with_unit("deg").with_description("altitude"))
        .build()
        .expect("static schema is valid");

    /// Moments of a cleaned camera image.
    pub static ref HILLAS_PARAMETERS: Arc<ContainerSchema> = ContainerSchema::builder("HillasParametersContainer")
        .prefix("hillas")
        .fields([
            Field::new("intensity", f64::NAN).with_description("total intensity (size)"),
            Field::new("x", f64::NAN).with_unit("m").with_description("centroid x coordinate"),
            Field::new("y", f64::NAN).with_unit("m").with_description("centroid y coordinate"),
            Field::new("r", f64::NAN).with_unit("m").with_description("radial coordinate of centroid"),
            Field::new("phi", f64::NAN).with_unit("deg").with_description("polar coordinate of centroid"),
            Field::new("length", f64::NAN).with_unit("m").with_description("standard deviation along the major-axis"),
            Field::new("width", f64::NAN).with_unit("m").with_description("standard spread along the minor-axis"),
            Field::new("psi", f64::NAN).with_unit("deg").with_description("rotation angle of ellipse"),
            Field::new("skewness", f64::NAN).with_description("measure of the asymmetry"),
            Field::new("kurtosis", f64::NAN).with_description("measure of the tailedness"),
        ])
        .build()
        .expect("static schema is valid");

    /// A linear fit of pixel peak times along the shower axis.
    pub static ref TIMING_PARAMETERS: Arc<ContainerSchema> = ContainerSchema::builder("TimingParametersContainer")
        .prefix("timing")
        .fields([
            Field::new("slope", f64::NAN)
                .with_unit("1/m")
                .with_description("slope of arrival times along main shower axis"),
            Field::new("intercept", f64::NAN)
                .with_description("intercept of arrival times along main shower axis"),
            Field::new("deviation", f64::NAN)
                .with_description("root-mean-square deviation of the pulse times from the linear fit"),
        ])
        .build()
        .expect("static schema is valid");

    /// Per-telescope image data and the parameters derived from it.
    pub static ref DL1_CAMERA: Arc<ContainerSchema> = ContainerSchema::builder("DL1CameraContainer")
        .prefix("dl1")
        .field(
            Field::with_factory("image", || Value::from(Array1::<f64>::zeros(0)))
                .with_unit("p.e.")
                .with_description("calibrated charge per pixel"),
        )
        .field(
            Field::with_factory("peak_time", || Value::from(Array1::<f64>::zeros(0)))
                .with_unit("ns")
                .with_description("pulse arrival time per pixel"),
        )
        .field(Field::new("is_valid", false).with_description("true if the image passed cleaning"))
        .field(Field::container("hillas", &HILLAS_PARAMETERS))
        .field(Field::container("timing", &TIMING_PARAMETERS))
        .build()
        .expect("static schema is valid");

    /// Top-level event record, with per-telescope data keyed by telescope ID.
    pub static ref ARRAY_EVENT: Arc<ContainerSchema> = ContainerSchema::builder("ArrayEventContainer")
        .prefix("event")
        .field(Field::new("count", 0).with_description("number of events processed"))
        .field(Field::container("index", &EVENT_INDEX))
        .field(
            Field::map("pointing", &TELESCOPE_POINTING)
                .with_description("telescope pointing, keyed by telescope ID"),
        )
        .field(Field::map("dl1", &DL1_CAMERA).with_description("DL1 camera data, keyed by telescope ID"))
        .build()
        .expect("static schema is valid");
}

/// Every standard record type.
pub fn all_schemas() -> [&'static Arc<ContainerSchema>; 6] {
    [
        &EVENT_INDEX,
        &TELESCOPE_POINTING,
        &HILLAS_PARAMETERS,
        &TIMING_PARAMETERS,
        &DL1_CAMERA,
        &ARRAY_EVENT,
    ]
}

/// Look up a standard record type by its type name (case-insensitive, with
/// or without the "Container" suffix) or by its default prefix.
pub fn schema_by_name(name: &str) -> Option<&'static Arc<ContainerSchema>> {
    let wanted = name.to_lowercase();
    all_schemas().into_iter().find(|schema| {
        let type_name = schema.name().to_lowercase();
        type_name == wanted
            || type_name.strip_suffix("container") == Some(wanted.as_str())
            || (!schema.default_prefix().is_empty() && schema.default_prefix() == wanted)
    })
}
