//! The structured form of finished provenance, for writing alongside (or
//! inside) data products.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    activity::{ActivityRecord, ActivityStatus, EntityRef},
    environment::Environment,
    error::Result,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDocument {
    pub time_utc: String,
}

/// One finished activity, with the activities it started nested inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDocument {
    pub activity_name: String,
    pub activity_uuid: Uuid,
    pub status: ActivityStatus,
    pub start: TimeDocument,
    pub stop: Option<TimeDocument>,
    pub duration_s: Option<f64>,
    #[serde(default)]
    pub input: Vec<EntityRef>,
    #[serde(default)]
    pub output: Vec<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub system: Environment,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ActivityDocument>,
}

/// All finished activities, in the order they finished. Serialises as a
/// plain list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvDocument {
    pub activities: Vec<ActivityDocument>,
}

impl ProvDocument {
    pub(super) fn from_records(finished: &[ActivityRecord]) -> ProvDocument {
        let by_id: HashMap<Uuid, &ActivityRecord> = finished.iter().map(|r| (r.id, r)).collect();
        ProvDocument {
            activities: finished
                .iter()
                .map(|record| activity_document(record, &by_id))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    /// Serialise to JSON. With `indent`, the output is pretty-printed with
    /// that many spaces per level; otherwise it is compact.
    pub fn to_json(&self, indent: Option<usize>) -> Result<String> {
        Ok(crate::json::to_string(self, indent)?)
    }

    pub fn from_json(json: &str) -> Result<ProvDocument> {
        Ok(serde_json::from_str(json)?)
    }

    /// Flatten into single-level key/value pairs, e.g. for the header of a
    /// data file. Keys are dotted paths below `prefix`
    /// (`PROV.0.activity_name`, `PROV.0.input.1.url`); nulls are left out.
    ///
    /// With `max_value_len`, string values longer than that are split over
    /// several keys: `key`, `key.1`, `key.2`, ...
    pub fn flatten(&self, prefix: &str, max_value_len: Option<usize>) -> Result<Vec<(String, String)>> {
        let value = serde_json::to_value(self)?;
        let mut cards = vec![];
        flatten_json(prefix, &value, max_value_len, &mut cards);
        Ok(cards)
    }
}

fn activity_document(
    record: &ActivityRecord,
    by_id: &HashMap<Uuid, &ActivityRecord>,
) -> ActivityDocument {
    ActivityDocument {
        activity_name: record.name.clone(),
        activity_uuid: record.id,
        status: record.status,
        start: TimeDocument {
            time_utc: record.start.to_string(),
        },
        stop: record.stop.map(|stop| TimeDocument {
            time_utc: stop.to_string(),
        }),
        duration_s: record.duration().map(|d| d.to_seconds()),
        input: record.inputs.clone(),
        output: record.outputs.clone(),
        config: record.config.clone(),
        system: record.environment.clone(),
        // Children always finish before their parent, so they are all in
        // `by_id` unless the log was cleared in between.
        children: record
            .children
            .iter()
            .filter_map(|id| by_id.get(id))
            .map(|child| activity_document(child, by_id))
            .collect(),
    }
}

fn flatten_json(
    key: &str,
    value: &serde_json::Value,
    max_value_len: Option<usize>,
    cards: &mut Vec<(String, String)>,
) {
    use serde_json::Value;

    let join = |segment: &str| {
        if key.is_empty() {
            segment.to_string()
        } else {
            format!("{key}.{segment}")
        }
    };
    match value {
        Value::Null => (),
        Value::Object(map) => {
            for (k, v) in map {
                flatten_json(&join(k), v, max_value_len, cards);
            }
        }
        Value::Array(list) => {
            for (i, v) in list.iter().enumerate() {
                flatten_json(&join(&i.to_string()), v, max_value_len, cards);
            }
        }
        Value::String(s) => match max_value_len {
            Some(max) if max > 0 && s.chars().count() > max => {
                let chars = s.chars().collect::<Vec<_>>();
                for (i, chunk) in chars.chunks(max).enumerate() {
                    let chunk_key = if i == 0 {
                        key.to_string()
                    } else {
                        format!("{key}.{i}")
                    };
                    cards.push((chunk_key, chunk.iter().collect()));
                }
            }
            _ => cards.push((key.to_string(), s.clone())),
        },
        other => cards.push((key.to_string(), other.to_string())),
    }
}
