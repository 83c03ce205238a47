//! Loki push payload (JSON form of `/loki/api/v1/push`)

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stream labels, ordered so identical sets compare equal
pub type LabelSet = BTreeMap<String, String>;

/// One line bound for Loki
#[derive(Debug, Clone, PartialEq)]
pub struct LokiEntry {
    pub labels: Arc<LabelSet>,
    pub timestamp: DateTime<Utc>,
    pub line: String,
}

impl LokiEntry {
    pub fn new(labels: Arc<LabelSet>, timestamp: DateTime<Utc>, line: impl Into<String>) -> Self {
        Self {
            labels,
            timestamp,
            line: line.into(),
        }
    }

    /// Unix epoch nanoseconds as a decimal string
    fn timestamp_nanos(&self) -> String {
        self.timestamp
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PushRequest<'a> {
    pub streams: Vec<PushStream<'a>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PushStream<'a> {
    pub stream: &'a LabelSet,
    /// `[timestamp_ns, line]` pairs in arrival order
    pub values: Vec<[String; 2]>,
}

impl<'a> PushRequest<'a> {
    /// Group a batch into one stream per distinct label set
    pub fn from_entries(entries: &'a [LokiEntry]) -> Self {
        let mut grouped: BTreeMap<&'a LabelSet, Vec<[String; 2]>> = BTreeMap::new();
        for entry in entries {
            grouped
                .entry(entry.labels.as_ref())
                .or_default()
                .push([entry.timestamp_nanos(), entry.line.clone()]);
        }

        Self {
            streams: grouped
                .into_iter()
                .map(|(stream, values)| PushStream { stream, values })
                .collect(),
        }
    }
}
