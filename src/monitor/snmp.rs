//! Attributes of the `cn=snmp,cn=monitor` entry.

use super::{counter, gauge};
use crate::collectors::MonitoredAttribute;

/// Operation counters mirrored from the SNMP subtree.
pub fn snmp_attrs() -> Vec<(&'static str, MonitoredAttribute)> {
    vec![
        (
            "anonymousbinds",
            gauge("anonymousbinds", "Number of anonymous bind requests"),
        ),
        (
            "unauthbinds",
            gauge("unauthbinds", "Number of unauthenticated (anonymous) binds"),
        ),
        (
            "simpleauthbinds",
            gauge(
                "simpleauthbinds",
                "Number of LDAP simple bind requests (DN and password)",
            ),
        ),
        (
            "strongauthbinds",
            gauge(
                "strongauthbinds",
                "Number of LDAP SASL bind requests, for all SASL mechanisms",
            ),
        ),
        (
            "bindsecurityerrors",
            gauge(
                "bindsecurityerrors",
                "Number of times an invalid password was given in a bind request",
            ),
        ),
        (
            "compareops",
            counter("compareops", "Number of LDAP compare requests"),
        ),
        (
            "addentryops",
            counter("addentryops", "Number of LDAP add requests"),
        ),
        (
            "removeentryops",
            counter("removeentryops", "Number of LDAP delete requests"),
        ),
        (
            "modifyentryops",
            counter("modifyentryops", "Number of LDAP modify requests"),
        ),
        (
            "modifyrdnops",
            counter("modifyrdnops", "Number of LDAP modify RDN (modrdn) requests"),
        ),
        (
            "searchops",
            gauge("searchops", "Number of LDAP search requests"),
        ),
        (
            "onelevelsearchops",
            gauge("onelevelsearchops", "Number of one-level search operations"),
        ),
        (
            "wholesubtreesearchops",
            gauge(
                "wholesubtreesearchops",
                "Number of subtree-level search operations",
            ),
        ),
        (
            "securityerrors",
            gauge(
                "securityerrors",
                "Number of errors returned that were security related",
            ),
        ),
        ("errors", gauge("errors", "Number of errors returned")),
    ]
}
