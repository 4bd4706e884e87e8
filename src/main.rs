use chrono::Local;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use intervox::agent::{SettingsMessage, build_prompt};
use intervox::audio::{CpalCaptureSource, CpalOutputFactory};
use intervox::config::DEFAULT_DURATION_MINUTES;
use intervox::session::{EventBus, Turn};
use intervox::store::JsonFileSink;
use intervox::transport::WebSocketTransportFactory;
use intervox::transport::websocket::DEFAULT_AGENT_URL;
use intervox::{AgentSecret, InterviewConfig, InterviewSession, SessionCommand, SessionResources};

// This is a demo client that runs one spoken interview end to end.
//
// Usage:
//   cargo run -- --name "Ada Lovelace" --objective "Systems background" \
//       -q "Walk me through a recent project" \
//       -q "What would you change about it today?"
//   cargo run -- --name Ada --objective Role -q Q1 --duration 5
//   cargo run -- --name Ada --objective Role -q Q1 --dry-run
//
// The DEEPGRAM_API_KEY environment variable must hold the agent credential
// (not needed for --dry-run). Press Ctrl-C to end the interview early; the
// response is still written.

#[derive(Parser, Debug)]
#[command(name = "intervox", version, about = "Voice interview session client")]
struct Cli {
    /// Candidate display name.
    #[arg(long)]
    name: String,

    /// What the interview should evaluate.
    #[arg(long)]
    objective: String,

    /// Interview question, in order. Repeatable.
    #[arg(short, long = "question")]
    questions: Vec<String>,

    /// Session length in minutes.
    #[arg(long, default_value = DEFAULT_DURATION_MINUTES)]
    duration: String,

    /// Interviewer persona name.
    #[arg(long)]
    interviewer: Option<String>,

    /// Upstream interview identifier carried into the stored record.
    #[arg(long)]
    interview_id: Option<String>,

    /// Candidate email carried into the stored record.
    #[arg(long)]
    email: Option<String>,

    /// Agent endpoint to dial.
    #[arg(long, default_value = DEFAULT_AGENT_URL)]
    url: String,

    /// Directory where finished responses are written as JSON.
    #[arg(long, default_value = "responses")]
    out_dir: PathBuf,

    /// Print the interviewer prompt and agent settings, then exit.
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let mut config = InterviewConfig::new(cli.name, cli.objective, cli.questions);
    config.duration_minutes = cli.duration;
    config.interviewer_name = cli.interviewer;
    config.interview_id = cli.interview_id;
    config.candidate_email = cli.email;

    if cli.dry_run {
        print_agent_config(&config);
        return;
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    rt.block_on(async move {
        let Some(secret) = AgentSecret::from_env() else {
            error!(
                "No agent credential found; set {} before starting",
                AgentSecret::ENV_VAR
            );
            return;
        };

        let sink = match JsonFileSink::new(&cli.out_dir).await {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                error!(
                    "Failed to prepare response directory {}: {}",
                    cli.out_dir.display(),
                    e
                );
                return;
            }
        };
        info!("Responses will be written to {}", cli.out_dir.display());

        let resources = SessionResources {
            transport_factory: Arc::new(WebSocketTransportFactory::new(cli.url, secret.expose())),
            capture_source: Box::new(CpalCaptureSource::new()),
            output_factory: Arc::new(CpalOutputFactory::new()),
            sink,
        };

        let session = InterviewSession::new(config, resources);
        info!("Call id: {}", session.call_id());

        let commands = session.commands();
        tokio::task::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, ending the interview...");
                let _ = commands.send(SessionCommand::End);
            }
        });

        spawn_console_reporter(session.bus());

        match session.run().await {
            Ok(summary) => {
                info!(
                    "Interview over ({:?}) after {}s with {} transcript entries",
                    summary.reason,
                    summary.duration_secs,
                    summary.record.details.transcript_object.len()
                );
                if let Some(failure) = summary.persist_failure {
                    error!("Response was not persisted: {}", failure);
                }
            }
            Err(e) => error!("Session failed: {}", e),
        }
    });
}

/// Render everything the session would send as configuration, for inspection
/// without dialing the agent.
fn print_agent_config(config: &InterviewConfig) {
    println!("--- interviewer prompt ---");
    println!("{}", build_prompt(config));
    println!("--- settings message ---");
    match serde_json::to_string_pretty(&SettingsMessage::for_interview(config)) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render settings: {}", e),
    }
}

/// Mirror the session's event bus onto the console until the bus closes.
fn spawn_console_reporter(bus: Arc<EventBus>) {
    let mut started = bus.started.subscribe();
    let mut transcript = bus.transcript_updated.subscribe();
    let mut turns = bus.turn_changed.subscribe();
    let mut time_left = bus.time_remaining.subscribe();
    let mut errors = bus.error.subscribe();

    tokio::task::spawn(async move {
        loop {
            tokio::select! {
                Ok(event) = started.recv() => {
                    info!(target: "Interview", "Session {} is live", event.call_id);
                }
                Ok(update) = transcript.recv() => {
                    let speaker = match update.entry.role {
                        intervox::agent::Role::Agent => "interviewer",
                        intervox::agent::Role::User => "you",
                    };
                    info!(target: "Interview", "[{}] {}", speaker, update.entry.content);
                }
                Ok(event) = turns.recv() => {
                    match event.turn {
                        Turn::User => info!(target: "Interview", "Your turn to speak"),
                        Turn::Agent => info!(target: "Interview", "Interviewer speaking..."),
                    }
                }
                Ok(remaining) = time_left.recv() => {
                    if remaining.seconds_left % 60 == 0 || remaining.seconds_left <= 10 {
                        info!(target: "Interview", "{}s remaining", remaining.seconds_left);
                    }
                }
                Ok(event) = errors.recv() => {
                    warn!(target: "Interview", "{}", event.description);
                }
                else => break,
            }
        }
    });
}
