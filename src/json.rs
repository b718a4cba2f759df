//! JSON output with a configurable indent.

use serde::{ser::Error as _, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};

/// Serialise `value` to JSON. With `indent`, the output is pretty-printed
/// with that many spaces per level; otherwise it is compact.
pub fn to_string<T: Serialize + ?Sized>(
    value: &T,
    indent: Option<usize>,
) -> serde_json::Result<String> {
    let indent = match indent {
        Some(indent) => vec![b' '; indent],
        None => return serde_json::to_string(value),
    };
    let mut buf = vec![];
    let formatter = PrettyFormatter::with_indent(&indent);
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(serde_json::Error::custom)
}
