#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]

pub mod cli;
pub mod collectors;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod pool;
pub mod probes;
pub mod server;
pub mod signal;

pub use self::{
    cli::CliArgs,
    config::{BackendType, ConfigError, ExporterConfig},
    metrics::MetricsState,
    pool::{
        dial_factory, ConnFactory, LdapAuthConfig, LdapPool, LdapPoolConfig, LdapSession,
        PoolError, PoolStat, PooledLdap, SearchRequest,
    },
    probes::ProbeState,
    server::{ServerBuilder, ServerBuilderError},
};
