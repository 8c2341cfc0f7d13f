use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thoughtline::chat::{ExchangeOutcome, Phase, SessionDispatcher};
use thoughtline::settings::{ClientSettings, SettingsStore};
use thoughtline::terminal::TerminalView;
use thoughtline_llm::{ChatRequest, create_backend};

mod cli;

use cli::{Cli, Commands, ConfigureArgs, SendArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,thoughtline=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let store = SettingsStore::load();

    match cli.command {
        Commands::Send(args) => send(&store, args).await,
        Commands::Configure(args) => configure(&store, args),
    }
}

async fn send(store: &SettingsStore, args: SendArgs) -> ExitCode {
    let settings = store.settings();
    let backend = match create_backend(settings.backend_config()) {
        Ok(backend) => backend,
        Err(error) => {
            tracing::error!(error = %error, "failed to create backend");
            return ExitCode::FAILURE;
        }
    };

    let view = Arc::new(TerminalView::stdout(args.show_reasoning));
    let dispatcher = SessionDispatcher::with_options(backend, view, settings.dispatch_options());

    let model = args.model.unwrap_or_else(|| settings.model.clone());
    let mut request = ChatRequest::new(args.message, model);
    if let Some(chat_id) = args.chat_id {
        request = request.with_chat_id(chat_id);
    }

    let outcome = tokio::select! {
        outcome = dispatcher.run(request) => outcome,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            return ExitCode::from(130);
        }
    };

    match outcome {
        ExchangeOutcome::Finished(state) if state.phase() == Phase::Done => ExitCode::SUCCESS,
        ExchangeOutcome::Finished(_) | ExchangeOutcome::Superseded(_) => ExitCode::FAILURE,
    }
}

fn configure(store: &SettingsStore, args: ConfigureArgs) -> ExitCode {
    let current = store.settings();
    let settings = ClientSettings {
        endpoint: args.endpoint.unwrap_or_else(|| current.endpoint.clone()),
        api_key: args.api_key.unwrap_or_else(|| current.api_key.clone()),
        model: args.model.unwrap_or_else(|| current.model.clone()),
        idle_timeout_secs: args.idle_timeout_secs.unwrap_or(current.idle_timeout_secs),
    };

    match store.update(settings) {
        Ok(()) => {
            println!("settings saved to {}", store.config_path().display());
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(error = %error, "failed to save settings");
            ExitCode::FAILURE
        }
    }
}
