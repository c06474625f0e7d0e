use std::io::BufRead;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};

use deckinput::backends::open_sampler;
use deckinput::backends::virtual_input::{Command, VirtualLines};
use deckinput::eventbus::{EventBus, EventFilter};
use deckinput::logger::LogListener;
use deckinput::publisher::EventPublisher;
use deckinput::server::{event_channel, EventFeed, EventServer};
use deckinput::snapshot::EngineSnapshot;
use deckinput::wire::WallClock;
use deckinput::{init_logging, ChangeEvent, DeckConfig, InputEngine, PollLoop, Shutdown};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - deck input event daemon");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Address for the JSON-lines event server (overrides config)
    #[arg(short = 'l', long = "listen")]
    listen: Option<SocketAddr>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    log_level: Option<String>,
    /// Use in-memory lines driven from stdin instead of sysfs GPIO
    /// (`<name>` toggles an input, `e<id>+`/`e<id>-` turns, `e<id>p` taps)
    #[arg(long = "simulate")]
    simulate: bool,
    /// Also log every event locally
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Broadcasts to network clients and, optionally, logs locally.
struct DaemonPublisher<P: EventPublisher> {
    network: P,
    local: Option<EventBus>,
}

impl<P: EventPublisher> EventPublisher for DaemonPublisher<P> {
    fn publish(&mut self, event: &ChangeEvent) {
        self.network.publish(event);
        if let Some(bus) = self.local.as_mut() {
            bus.publish(event);
        }
    }

    fn update_snapshot(&mut self, snapshot: &EngineSnapshot) {
        self.network.update_snapshot(snapshot);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", DeckConfig::example_toml());
        return ExitCode::SUCCESS;
    }

    init_logging(cli.log_level.as_deref());

    let mut config = match cli.config.as_deref() {
        Some(path) => match DeckConfig::load_from_file(path) {
            Ok(cfg) => {
                info!("Loaded configuration from {}", path.display());
                cfg
            }
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => DeckConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    let (sampler, virtual_lines) = open_sampler(&config, cli.simulate);
    let engine = match InputEngine::bring_up(&config, sampler) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Line setup failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let (network, feed) = event_channel(config.event_buffer, WallClock::now());
    spawn_server(config.listen, feed, shutdown.clone());
    if let Some(lines) = virtual_lines {
        spawn_console(lines, config.clone());
    }

    let local = cli.verbose.then(|| {
        let mut bus = EventBus::new();
        bus.add_listener(LogListener::new(), EventFilter::All, None);
        bus
    });

    let publisher = DaemonPublisher { network, local };
    PollLoop::new(engine, publisher, config.poll_interval(), shutdown).run();
    info!("Goodbye");
    ExitCode::SUCCESS
}

/// Run the event server and the Ctrl-C watcher on a background runtime.
fn spawn_server(addr: SocketAddr, feed: EventFeed, shutdown: Shutdown) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to start runtime: {e}");
                shutdown.trigger();
                return;
            }
        };

        runtime.block_on(async move {
            let server = async {
                match EventServer::bind(addr, feed).await {
                    Ok(server) => server.serve().await,
                    Err(e) => Err(e),
                }
            };

            tokio::select! {
                res = server => {
                    if let Err(e) = res {
                        warn!("Event server stopped: {e}; continuing without network clients");
                        // Keep sampling; only the signal ends the process now.
                        let _ = signal::ctrl_c().await;
                    }
                }
                _ = signal::ctrl_c() => {
                    info!("Shutting down...");
                }
            }
            shutdown.trigger();
        });
    });
}

/// Read simulator commands from stdin until it closes.
fn spawn_console(lines: VirtualLines, config: DeckConfig) {
    info!("Simulating: type an input name, e<id>+, e<id>- or e<id>p");
    std::thread::spawn(move || {
        for input in std::io::stdin().lock().lines() {
            let Ok(input) = input else {
                break;
            };
            if input.trim().is_empty() {
                continue;
            }
            let result = input
                .parse::<Command>()
                .and_then(|command| lines.apply(&config, &command));
            if let Err(e) = result {
                warn!("{e}");
            }
        }
        debug!("Console input closed");
    });
}
