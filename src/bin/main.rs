use std::{
    env,
    error::Error,
    path::PathBuf,
    process::ExitCode,
};

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use ovservice::{
    cli::{Cli, Commands, parse_args},
    config::ServiceCatalog,
    constants::{DEFAULT_RUNTIME_DIR, EXIT_FAILURE, EXIT_USAGE, INSTALL_ROOT_ENV},
    runtime::RuntimePaths,
    supervisor::{BatchReport, ServiceReport, ServiceSupervisor, StatusReport},
};

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    let Some(install_root) = env::var_os(INSTALL_ROOT_ENV).map(PathBuf::from) else {
        error!("{INSTALL_ROOT_ENV} must point at the installation root");
        return Ok(ExitCode::from(EXIT_USAGE));
    };

    let paths = RuntimePaths::new(
        args.runtime_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNTIME_DIR)),
    );
    debug!("Using runtime directory {:?}", paths.root());

    let catalog = ServiceCatalog::from_install_root(&install_root, &paths)?;
    let supervisor = ServiceSupervisor::new(catalog, paths, args.settings());

    let services = match args.command.target().services(supervisor.catalog()) {
        Ok(services) => services,
        Err(err) => {
            error!("{err}");
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };

    let report = match &args.command {
        Commands::Start { .. } => supervisor.start_many(&services),
        Commands::Stop { .. } => supervisor.stop_many(&services),
        Commands::Restart { service } => BatchReport {
            entries: vec![ServiceReport {
                service: service.clone(),
                result: supervisor.restart(service),
            }],
        },
        Commands::Status { .. } => {
            for service in services {
                let status = supervisor.status(&service)?;
                println!("{}", StatusReport { service, status });
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    for entry in &report.entries {
        println!("{entry}");
    }

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_FAILURE))
    }
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
