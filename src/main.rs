use std::process::ExitCode;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use ds389_exporter::{
    dial_factory, CliArgs, ExporterConfig, LdapAuthConfig, LdapPool, LdapPoolConfig, MetricsState,
    ProbeState, ServerBuilder,
};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = CliArgs::parse();

    let cfg = match load_config(&args.config_file) {
        Ok(cfg) => cfg,
        Err(err) => {
            // Logging is not up yet.
            eprintln!("error loading config: {err}");
            return ExitCode::FAILURE;
        }
    };
    if args.check_config {
        print!("{}", cfg.to_redacted_yaml());
        return ExitCode::SUCCESS;
    }

    let _log_guards = match cfg.logging.init() {
        Ok(guards) => guards,
        Err(err) => {
            eprintln!("error initializing logging: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting ds389-exporter"
    );
    info!(
        url = %cfg.ldap.server_url,
        bind_dn = %cfg.ldap.bind_dn,
        backend = ?cfg.global.backend,
        "LDAP server info"
    );

    let pool = LdapPool::new(LdapPoolConfig {
        auth: LdapAuthConfig {
            url: cfg.ldap.server_url.clone(),
            bind_dn: cfg.ldap.bind_dn.clone(),
            bind_password: cfg.ldap.bind_password.clone(),
            tls_skip_verify: cfg.ldap.tls_skip_verify,
            dial_timeout: cfg.ldap.dial_timeout,
        },
        max_connections: cfg.ldap.pool.max_connections,
        max_idle_time: cfg.ldap.pool.max_idle_time,
        max_life_time: cfg.ldap.pool.max_life_time,
        conn_factory: dial_factory(),
    });

    let metrics = MetricsState::build(&cfg, &pool);
    let probes = ProbeState::new(pool.clone(), metrics.metrics_path());
    let app = metrics
        .build_router()
        .merge(probes.build_router())
        .layer(TraceLayer::new_for_http());

    let builder = ServerBuilder::from(&cfg.http);
    let server = match builder.build().await {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, "failed to build HTTP server");
            pool.close();
            return ExitCode::FAILURE;
        }
    };
    let handle = axum_server::Handle::new();
    if let Err(err) = builder.spawn_signal_handler(handle.clone(), cfg.global.shutdown_timeout) {
        error!(error = %err, "failed to install signal handlers");
        pool.close();
        return ExitCode::FAILURE;
    }

    info!(listen = %cfg.http.listen, "starting HTTP server");
    let served = server
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    pool.close();
    match served {
        Ok(()) => {
            info!("all resources shut down successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "HTTP server failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &str) -> Result<ExporterConfig, ds389_exporter::ConfigError> {
    let cfg = ExporterConfig::load(path)?;
    cfg.validate()?;
    Ok(cfg)
}
