use ircd_listen::config::{self, Config};
use ircd_listen::logger;
use ircd_listen::net::{Socket2Engine, SocketBinder};
use ircd_listen::server::{ControlEvent, PortReconciler, ReconcileReport, SignalHandler};

type Ports = PortReconciler<Socket2Engine>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg.logging.level)?;

    // Reconciliation must never interleave, so everything runs on one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(&config_path, &cfg))
}

async fn run(config_path: &str, cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut ports = PortReconciler::new(SocketBinder::new(Socket2Engine, cfg.listen.backlog()));

    let report = ports.reconcile(cfg.bind_specs())?;
    report_failures(&report);
    if ports.is_empty() {
        return Err("no ports bound, nothing to listen on".into());
    }
    logger::log_info(&format!(
        "Listening on {} port(s), process ID {}",
        ports.len(),
        std::process::id()
    ));

    let mut signals = SignalHandler::register()?;
    loop {
        match signals.recv().await {
            ControlEvent::Reload => rehash(config_path, &mut ports),
            ControlEvent::Status => log_status(&ports),
            ControlEvent::Shutdown => {
                let closed = ports.close_all();
                logger::log_info(&format!("Shutting down, closed {closed} listener(s)"));
                return Ok(());
            }
        }
    }
}

/// Reload the config file and converge listeners onto it
fn rehash(config_path: &str, ports: &mut Ports) {
    logger::log_info(&format!("Rehashing {config_path}"));

    let cfg = match Config::load_from(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            logger::log_error(&format!("Rehash failed, keeping current listeners: {e}"));
            return;
        }
    };

    ports.set_backlog(cfg.listen.backlog());
    match ports.reconcile(cfg.bind_specs()) {
        Ok(report) => report_failures(&report),
        Err(e) => logger::log_error(&format!("Port reconciliation aborted: {e}")),
    }
}

fn report_failures(report: &ReconcileReport) {
    if let Some(summary) = report.failure_summary() {
        logger::log_warning(&summary);
    }
}

fn log_status(ports: &Ports) {
    match serde_json::to_string_pretty(&ports.status()) {
        Ok(json) => logger::log_info(&format!("Active ports:\n{json}")),
        Err(e) => logger::log_error(&format!("Failed to render port status: {e}")),
    }
}
