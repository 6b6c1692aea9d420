//! `mudgate-cli` – MudGate Command Line Interface
//!
//! This binary connects one gated MUD session and lets an operator watch and
//! steer it.  It:
//!
//! 1. Checks for `~/.mudgate/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Builds the oracle for the configured provider, probing Ollama first
//!    when that provider is selected.
//! 3. Connects to the MUD server and runs the session, printing the game
//!    transcript and every decision or override as it happens.
//! 4. Reads a **manual-override console** (`/pause`, `/resume`, `/reset`,
//!    `/state`, `/quit`; anything else is sent as a game command).
//! 5. Intercepts **Ctrl-C** to shut the session down cleanly.

mod config;
mod console;
mod ollama;

use colored::Colorize;
use std::io::Write;
use std::process::ExitCode;
use tracing::{error, info, warn};

use mudgate_middleware::{EventBus, EventStream, TelnetTransport};
use mudgate_runtime::{Session, UsageMeter};
use mudgate_types::{Event, EventPayload, MudError};

fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // Logs go to stderr; stdout carries the game transcript.
    let _otel_guard = mudgate_runtime::init_tracing("mudgate");

    print_banner();

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Startup checks ────────────────────────────────────────────────────
    if cfg.ai_provider == config::AiProvider::Ollama {
        probe_ollama(&cfg);
    }

    let credentials = match cfg.credentials() {
        Ok(credentials) => credentials,
        Err(e) => return fatal(&e),
    };
    let session_config = cfg.session_config(credentials.as_ref());
    drop(credentials);

    let oracle = match cfg.build_oracle() {
        Ok(oracle) => oracle,
        Err(e) => return fatal(&e),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => return fatal(&MudError::Config(format!("cannot start async runtime: {e}"))),
    };

    // ── Session ───────────────────────────────────────────────────────────
    let result = runtime.block_on(async {
        print!("\n  Connecting to {}:{} … ", cfg.host.bold(), cfg.port);
        std::io::stdout().flush().ok();
        let transport = match TelnetTransport::connect(&cfg.host, cfg.port, cfg.send_interval()).await {
            Ok(transport) => {
                println!("{}", "connected".green());
                transport
            }
            Err(e) => {
                println!("{}", "failed".red());
                return Err(e);
            }
        };
        println!("  Oracle: {}", oracle.describe().yellow());
        println!("  Type {} for console commands.\n", "/help".bold().cyan());

        let (bus, stream) = EventBus::channel();
        let session = Session::new(Box::new(transport), oracle, bus, session_config);
        run_session(session, stream).await
    });

    match result {
        Ok(usage) => {
            println!();
            println!(
                "  {} Session ended. Oracle calls: {}, tokens: {} in / {} out.",
                "✓".green().bold(),
                usage.calls,
                usage.input_tokens,
                usage.output_tokens
            );
            ExitCode::SUCCESS
        }
        Err(e) => fatal(&e),
    }
}

/// Drive `session` to completion with the console, printer, and Ctrl-C
/// handler attached.
async fn run_session(mut session: Session, stream: EventStream) -> Result<UsageMeter, MudError> {
    let handle = session.handle();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let ctrlc_handle = handle.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting the session down …".yellow().bold());
        ctrlc_handle.shutdown();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Console ───────────────────────────────────────────────────────────
    // A plain thread: the console blocks on stdin and the process may exit
    // while it is still waiting.
    let console_handle = handle.clone();
    let runtime = tokio::runtime::Handle::current();
    if let Err(e) = std::thread::Builder::new()
        .name("mudgate-console".into())
        .spawn(move || console::run(console_handle, runtime))
    {
        warn!(error = %e, "console thread failed to start; manual override disabled");
    }

    let printer = tokio::spawn(print_events(stream));

    let result = session.run().await;
    let usage = session.usage();
    // Dropping the session closes the bus, which ends the printer.
    drop(session);
    if let Err(e) = printer.await {
        error!(error = %e, "event printer panicked");
    }

    info!(calls = usage.calls, tokens = usage.total_tokens(), "session finished");
    result.map(|()| usage)
}

// ─────────────────────────────────────────────────────────────────────────────
// Event printer
// ─────────────────────────────────────────────────────────────────────────────

async fn print_events(mut stream: EventStream) {
    while let Some(event) = stream.recv().await {
        match &event.payload {
            EventPayload::GameText(text) => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            _ => {
                if let Some(line) = render_notice(&event) {
                    println!("{line}");
                }
            }
        }
    }
}

/// One-line rendering of a non-text event.
fn render_notice(event: &Event) -> Option<String> {
    let stamp = event
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S")
        .to_string()
        .dimmed();
    let body = match &event.payload {
        EventPayload::GameText(_) => return None,
        EventPayload::Decision(command) => format!("{} {}", "▶".green().bold(), command.bold()),
        EventPayload::Override {
            original,
            replacement: Some(replacement),
            reason,
        } => format!(
            "{} {} → {} ({})",
            "↻".yellow().bold(),
            original.strikethrough(),
            replacement.bold(),
            reason
        ),
        EventPayload::Override {
            original,
            replacement: None,
            reason,
        } => format!("{} {} suppressed ({})", "✗".yellow().bold(), original, reason),
        EventPayload::ModeToggle { paused: true } => {
            format!("{}", "⏸ autonomous play paused".yellow())
        }
        EventPayload::ModeToggle { paused: false } => {
            format!("{}", "⏵ autonomous play resumed".green())
        }
        EventPayload::Notice(text) => format!("{} {}", "ℹ".cyan(), text),
        EventPayload::Fault(text) => format!("{} {}", "✗".red().bold(), text.red()),
    };
    Some(format!("{stamp} {body}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       MudGate First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up MudGate.\n");

    let mut cfg = config::Config::default();

    cfg.host = prompt_line(&format!("  MUD host [{}]: ", cfg.host), &cfg.host);
    let port_str = prompt_line(&format!("  MUD port [{}]: ", cfg.port), &cfg.port.to_string());
    match port_str.trim().parse::<u16>() {
        Ok(p) => cfg.port = p,
        Err(_) => println!(
            "  {} '{}' is not a valid port number, keeping {}",
            "Warning:".yellow(),
            port_str,
            cfg.port
        ),
    }

    // Oracle provider
    println!("  Which oracle would you like to use?");
    println!("    1) Cloud AI via Anthropic  (default)");
    println!("    2) Local AI via Ollama");
    println!("    3) Cloud AI via OpenAI");
    let choice = prompt_line("  Enter choice [1]: ", "1");
    match choice.trim() {
        "2" => {
            cfg.ai_provider = config::AiProvider::Ollama;
            cfg.active_model = match ollama::fetch_models(&cfg.ollama_url) {
                Ok(models) if !models.is_empty() => {
                    println!("  Available local models:");
                    for m in &models {
                        println!("    • {}", m.name.bold());
                    }
                    prompt_line(&format!("  Model [{}]: ", models[0].name), &models[0].name)
                }
                _ => prompt_line("  Model [llama3]: ", "llama3"),
            };
        }
        "3" => {
            cfg.ai_provider = config::AiProvider::OpenAI;
            cfg.active_model = prompt_line("  Model [gpt-4o]: ", "gpt-4o");
        }
        _ => cfg.ai_provider = config::AiProvider::Anthropic,
    }
    println!(
        "  {}",
        "API keys are read from ANTHROPIC_API_KEY / OPENAI_API_KEY.".dimmed()
    );

    // Login mode
    let login = prompt_line("  Let the oracle create or log into a character? [y/N]: ", "n");
    if login.trim().eq_ignore_ascii_case("y") {
        cfg.login = true;
        cfg.name_prefix = prompt_line(
            &format!("  Character name prefix [{}]: ", cfg.name_prefix),
            &cfg.name_prefix,
        );
        cfg.password = prompt_line("  Character password: ", "");
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __  ___        _______       __     "#.bold().cyan());
    println!("{}", r#"  /  |/  /_ _____/ / ___/__ _  / /____ "#.bold().cyan());
    println!("{}", r#" / /|_/ / // / _  / (_ / _ `/ / __/ -_)"#.bold().cyan());
    println!("{}", r#"/_/  /_/\_,_/\_,_/\___/\_,_/  \__/\__/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "MudGate".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Adaptive action gating for oracle-driven MUD play");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn probe_ollama(cfg: &config::Config) {
    print!("  Probing Ollama at {} … ", cfg.ollama_url.dimmed());
    std::io::stdout().flush().ok();
    match ollama::fetch_models(&cfg.ollama_url) {
        Ok(models) if ollama::has_model(&models, &cfg.active_model) => {
            println!("{} (model {} available)", "online".green(), cfg.active_model.bold());
        }
        Ok(models) => {
            println!("{} ({} model(s) available)", "online".green(), models.len());
            println!(
                "  {} model '{}' not found. Run `{}`.",
                "Warning:".yellow(),
                cfg.active_model,
                format!("ollama pull {}", cfg.active_model).bold()
            );
        }
        Err(e) => {
            println!("{}", "offline".yellow());
            println!("  {}", e.dimmed());
            println!("  Run `{}` to start a local AI.", "ollama serve".bold());
        }
    }
}

fn fatal(e: &MudError) -> ExitCode {
    error!(error = %e, "mudgate stopped");
    eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
    ExitCode::FAILURE
}

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::BufRead;
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
