//! neoneo command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use neoneo_agent::{register_default_tools, AgentError, AgentLoop, SafetyGate, ToolRegistry};
use neoneo_config::{self, Config};
use neoneo_provider::{OllamaProvider, Provider, Role};

use crate::confirm::TerminalConfirmer;
use crate::console::{Console, Tone};
use crate::Cli;

type InputLines = Lines<BufReader<Stdin>>;

enum Flow {
    Continue,
    Exit,
}

/// Load the configuration file (unless disabled) and apply the flags.
pub async fn load_config(cli: &Cli) -> Result<(Config, Option<PathBuf>)> {
    let path = cli.config.clone().or_else(neoneo_config::config_path);

    let mut config = match (&path, cli.no_config) {
        (Some(path), false) => Config::load_from(path)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))?,
        _ => Config::default(),
    };

    cli.apply(&mut config);
    Ok((config, path))
}

/// Run the requested action, by default the interactive session.
pub async fn run(cli: &Cli, config: Config, path: Option<PathBuf>) -> Result<()> {
    let console = Arc::new(Console::new());

    if cli.save_config {
        let path = path.context("No configuration path; pass --config")?;
        config.save_to(&path).await?;
        console.print(
            &format!("Configuration saved to: {}", path.display()),
            Tone::Success,
        );
        return Ok(());
    }

    let server = OllamaProvider::new(config.host.as_str(), config.model.as_str());
    console.print(
        &format!("Connecting to Ollama server at {}...", server.host()),
        Tone::System,
    );
    let version = server.version().await.with_context(|| {
        format!(
            "Could not connect to Ollama server at {}. Is Ollama running?",
            server.host()
        )
    })?;
    console.print(
        &format!("Connected to Ollama server (version {}).", version),
        Tone::Success,
    );

    if cli.list {
        return list_models(&server, &config, &console).await;
    }

    chat(config, console).await
}

async fn list_models(server: &OllamaProvider, config: &Config, console: &Console) -> Result<()> {
    let models = server.list_models().await?;
    if models.is_empty() {
        console.print(
            "No models found. You may need to pull a model first.",
            Tone::Warning,
        );
        console.print(&format!("Try running: ollama pull {}", config.model), Tone::System);
        return Ok(());
    }

    console.print("Available models:", Tone::Header);
    for model in models {
        console.print(&format!("  - {}", model.name), Tone::Normal);
    }
    Ok(())
}

async fn chat(config: Config, console: Arc<Console>) -> Result<()> {
    let mut tools = ToolRegistry::new();
    register_default_tools(&mut tools, &config);
    let confirmer = Arc::new(TerminalConfirmer::new(console.clone()));
    let gate = SafetyGate::from_config(&config, confirmer)?;

    if config.enable_shell {
        console.print(
            "WARNING: Shell command execution is enabled. Use with caution.",
            Tone::Warning,
        );
    }
    if config.enable_file_ops && config.auto_confirm_file_ops {
        console.print(
            "WARNING: Auto-confirmation for file operations is enabled.",
            Tone::Warning,
        );
    }
    if !tools.is_empty() {
        console.print(
            &format!("Tool usage enabled with {} available tools.", tools.len()),
            Tone::Success,
        );
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            interrupt.cancel();
        }
    });

    let provider = OllamaProvider::new(config.host.as_str(), config.model.as_str());
    let mut agent = AgentLoop::new(provider, &config, tools, gate)
        .with_sink(console.clone())
        .with_observer(console.clone())
        .with_cancel_token(cancel.clone());

    console.print(&format!("Starting chat with model: {}", agent.model()), Tone::Header);
    console.print(
        "Type '/exit' to quit, '/reset' to reset the conversation.",
        Tone::System,
    );
    console.print("Type '/help' for a list of available commands.", Tone::System);
    console.rule();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        console.prompt();
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            // EOF
            console.end_reply();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            if let Some(flow) = slash_command(input, &mut agent, &config, &console, &mut lines).await? {
                match flow {
                    Flow::Continue => continue,
                    Flow::Exit => break,
                }
            }
        }

        console.end_reply();
        match agent.handle_input(input).await {
            Ok(report) => {
                console.end_reply();
                debug!(
                    "turn finished: {} round-trip(s), {} tool call(s)",
                    report.round_trips,
                    report.outcomes.len()
                );
                if report.unexecuted_calls > 0 {
                    console.print(
                        &format!(
                            "The model requested {} more tool call(s); they were not executed.",
                            report.unexecuted_calls
                        ),
                        Tone::Warning,
                    );
                }
            }
            Err(AgentError::Cancelled) => {
                console.print("\nInterrupted.", Tone::Warning);
                break;
            }
            Err(e) => {
                warn!("turn failed: {}", e);
                console.print(&format!("\nError: {}", e), Tone::Error);
            }
        }
    }

    console.print("Goodbye.", Tone::System);
    Ok(())
}

/// Handle a REPL command. `None` means the input is not a command and goes
/// to the model as-is.
async fn slash_command(
    input: &str,
    agent: &mut AgentLoop<OllamaProvider>,
    config: &Config,
    console: &Console,
    lines: &mut InputLines,
) -> Result<Option<Flow>> {
    match input {
        "/exit" | "/quit" => return Ok(Some(Flow::Exit)),
        "/reset" => {
            agent.reset();
            console.print("Conversation reset.", Tone::Success);
        }
        "/help" => print_help(console, config),
        "/tools" => print_tools(agent, console),
        "/config" => print_config(config, console),
        "/models" => {
            let server = OllamaProvider::new(config.host.as_str(), "");
            match server.list_models().await {
                Ok(models) if models.is_empty() => {
                    console.print("No models found.", Tone::Warning)
                }
                Ok(models) => {
                    console.print(
                        &format!("Available models on Ollama server at {}:", server.host()),
                        Tone::Header,
                    );
                    for (i, model) in models.iter().enumerate() {
                        console.print(&format!("  {}. {}", i + 1, model.name), Tone::Normal);
                    }
                }
                Err(e) => console.print(&format!("Could not list models: {}", e), Tone::Error),
            }
        }
        "/prompt" => {
            console.print("Current system prompt:", Tone::Header);
            console.print(&"=".repeat(26), Tone::Normal);
            console.print(agent.system_prompt(), Tone::System);
            console.print(&"=".repeat(26), Tone::Normal);
        }
        "/setprompt" => {
            console.print(
                "Enter new system prompt (type '/end' on a new line when finished):",
                Tone::Header,
            );
            let mut prompt = Vec::new();
            while let Some(line) = lines.next_line().await? {
                if line.trim() == "/end" {
                    break;
                }
                prompt.push(line);
            }
            if prompt.is_empty() {
                console.print("No changes made to system prompt.", Tone::Warning);
            } else {
                agent.set_system_prompt(prompt.join("\n"));
                console.print("System prompt updated.", Tone::Success);
            }
        }
        "/template" => print_template(agent, console),
        _ => return Ok(None),
    }
    Ok(Some(Flow::Continue))
}

fn print_help(console: &Console, config: &Config) {
    console.print("Available commands:", Tone::Header);
    for (command, text) in [
        ("/exit, /quit", "Exit the application"),
        ("/reset", "Reset the conversation history"),
        ("/help", "Show this help message"),
        ("/models", "List available models on the Ollama server"),
        ("/config", "Show current configuration"),
        ("/template", "Show the conversation sent to the model"),
        ("/prompt", "Show the current system prompt"),
        ("/setprompt", "Set a new system prompt"),
    ] {
        console.print(&format!("  {:<14} - {}", command, text), Tone::Normal);
    }
    if config.tools_enabled() {
        console.print(&format!("  {:<14} - {}", "/tools", "List available tools"), Tone::Tool);
    }
}

fn print_tools(agent: &AgentLoop<OllamaProvider>, console: &Console) {
    let definitions = agent.tool_definitions();
    if definitions.is_empty() {
        console.print(
            "No tools are available. Start with -t, -s, -f or --model-list to enable tools.",
            Tone::Warning,
        );
        return;
    }

    console.print("Available tools:", Tone::Header);
    for tool in definitions {
        let function = tool.function;
        console.print(
            &format!("  - {}: {}", function.name, function.description),
            Tone::Tool,
        );
        if let Some(properties) = function.parameters["properties"].as_object() {
            console.print("    Parameters:", Tone::Normal);
            for (name, info) in properties {
                let description = info["description"].as_str().unwrap_or_default();
                console.print(&format!("      * {}: {}", name, description), Tone::Normal);
            }
        }
    }
}

fn print_config(config: &Config, console: &Console) {
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" };

    console.print("Current configuration:", Tone::Header);
    for (label, value) in [
        ("Model", config.model.clone()),
        ("Host", config.host.clone()),
        ("Streaming", yes_no(config.stream).to_string()),
        ("Tools enabled", yes_no(config.enable_tools).to_string()),
        ("Debug mode", yes_no(config.debug_mode).to_string()),
        ("Shell enabled", yes_no(config.enable_shell).to_string()),
        ("Auto-confirm shell", yes_no(config.auto_confirm_shell).to_string()),
        ("Model list tool", yes_no(config.enable_model_list).to_string()),
        ("File ops enabled", yes_no(config.enable_file_ops).to_string()),
        ("Auto-confirm files", yes_no(config.auto_confirm_file_ops).to_string()),
        ("Auto-confirm calc", yes_no(config.auto_confirm_calc).to_string()),
        ("Ignore calc safety", yes_no(config.ignore_calc_safety).to_string()),
        ("Ignore shell safety", yes_no(config.ignore_shell_safety).to_string()),
    ] {
        console.print(&format!("  {:<20} {}", format!("{}:", label), value), Tone::Normal);
    }
    console.print("To save this configuration, run with --save-config", Tone::System);
}

fn print_template(agent: &AgentLoop<OllamaProvider>, console: &Console) {
    console.print("Current conversation template:", Tone::Header);
    console.print(&"=".repeat(26), Tone::Normal);

    for turn in agent.conversation().turns() {
        console.print(&format!("ROLE: {}", turn.role), Tone::System);
        if let Some(name) = &turn.name {
            console.print(&format!("NAME: {}", name), Tone::System);
        }
        console.print("CONTENT:", Tone::System);
        let tone = match turn.role {
            Role::Tool => Tone::Tool,
            _ => Tone::Normal,
        };
        console.print(&turn.content, tone);

        if !turn.tool_calls.is_empty() {
            console.print("TOOL CALLS:", Tone::System);
            for call in &turn.tool_calls {
                let id = if call.id.is_empty() {
                    String::new()
                } else {
                    format!(" (ID: {})", call.id)
                };
                console.print(&format!("  - {}{}", call.name, id), Tone::Tool);
                let arguments = serde_json::to_string_pretty(&call.arguments)
                    .unwrap_or_else(|_| call.arguments.to_string());
                console.print(&format!("    Arguments: {}", arguments), Tone::Normal);
            }
        }
        console.print(&"-".repeat(26), Tone::Normal);
    }
    console.print(&"=".repeat(26), Tone::Normal);

    let definitions = agent.tool_definitions();
    if !definitions.is_empty() {
        console.print("Tools provided with this template:", Tone::Header);
        for tool in definitions {
            console.print(
                &format!("  - {}: {}", tool.function.name, tool.function.description),
                Tone::Tool,
            );
        }
    }
}
