//! Entry count attribute for configured entries.

use super::gauge;
use crate::collectors::MonitoredAttribute;

/// The `numSubordinates` operational attribute of an arbitrary entry.
pub fn entry_count_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    vec![(
        "numsubordinates",
        gauge(
            "numsubordinates",
            "Indicates how many immediate subordinates an entry has",
        ),
    )]
}
