//! Attributes of the `cn=monitor` entry.

use super::{counter, gauge, time_gauge};
use crate::collectors::MonitoredAttribute;

/// Server-wide connection and operation attributes.
pub fn server_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    vec![
        (
            "threads",
            counter(
                "threads",
                "Current number of active threads used for handling requests",
            ),
        ),
        (
            "currentconnections",
            gauge("currentconnections", "Current established connections"),
        ),
        (
            "totalconnections",
            counter(
                "totalconnections",
                "Number of connections the server handles after it starts",
            ),
        ),
        (
            "currentconnectionsatmaxthreads",
            gauge(
                "currentconnectionsatmaxthreads",
                "Number of connections currently utilizing the maximum allowed threads per connection",
            ),
        ),
        (
            "maxthreadsperconnhits",
            gauge(
                "maxthreadsperconnhits",
                "Displays how many times a connection hit max thread",
            ),
        ),
        (
            "dtablesize",
            gauge(
                "dtablesize",
                "The number of file descriptors available to the directory",
            ),
        ),
        (
            "readwaiters",
            gauge(
                "readwaiters",
                "Number of threads waiting to read data from a client",
            ),
        ),
        (
            "opsinitiated",
            gauge(
                "opsinitiated",
                "Number of operations the server has initiated since it started",
            ),
        ),
        (
            "opscompleted",
            gauge(
                "opscompleted",
                "Number of operations the server has completed since it started",
            ),
        ),
        (
            "entriessent",
            gauge(
                "entriessent",
                "Number of entries sent to clients since the server started",
            ),
        ),
        (
            "bytessent",
            gauge(
                "bytessent",
                "Number of bytes sent to clients after the server starts",
            ),
        ),
        (
            "nbackends",
            gauge(
                "nbackends",
                "Number of back ends (databases) the server services",
            ),
        ),
        (
            "currenttime",
            time_gauge(
                "currenttime",
                "Current time of the server, in GMT expressed as UTC epoch seconds",
            ),
        ),
        (
            "starttime",
            time_gauge(
                "starttime",
                "Time when the server started, in GMT expressed as UTC epoch seconds",
            ),
        ),
    ]
}
