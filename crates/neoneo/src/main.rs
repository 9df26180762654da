//! neoneo - chat with a local Ollama model that can use tools

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod confirm;
mod console;

use neoneo_config::Config;

/// neoneo - a tool-using chat front-end for Ollama
#[derive(Parser, Debug)]
#[command(name = "neoneo")]
#[command(about = "Chat with a local Ollama model that can use tools")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Model to chat with
    #[arg(short, long)]
    model: Option<String>,

    /// List the models installed on the server and exit
    #[arg(short, long)]
    list: bool,

    /// Enable the calculator tool
    #[arg(short, long)]
    tools: bool,

    /// Verbose logging to stderr
    #[arg(short, long)]
    debug: bool,

    /// Enable file read, write and edit tools
    #[arg(short, long)]
    file_ops: bool,

    /// Enable shell command tools
    #[arg(short, long)]
    shell: bool,

    /// Skip the generic confirmation for shell commands
    #[arg(long)]
    auto_confirm: bool,

    /// Skip the generic confirmation for file writes
    #[arg(long)]
    auto_confirm_files: bool,

    /// Do not check calculator expressions against the deny list
    #[arg(long)]
    ignore_calc_safety: bool,

    /// Do not check shell commands against the deny list
    #[arg(long)]
    ignore_shell_safety: bool,

    /// Enable the model listing tool
    #[arg(long)]
    model_list: bool,

    /// Ollama server URL
    #[arg(long)]
    host: Option<String>,

    /// Configuration file to load and save
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the effective configuration and exit
    #[arg(long)]
    save_config: bool,

    /// Ignore the configuration file
    #[arg(long)]
    no_config: bool,

    /// Ask for whole responses instead of streamed ones
    #[arg(long)]
    no_stream: bool,

    /// Model to chat with (same as --model)
    #[arg(value_name = "MODEL")]
    model_name: Option<String>,
}

impl Cli {
    /// Apply command-line flags on top of a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(model) = self.model.as_ref().or(self.model_name.as_ref()) {
            config.model = model.clone();
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }

        config.enable_tools |= self.tools;
        config.debug_mode |= self.debug;
        config.enable_file_ops |= self.file_ops;
        config.enable_shell |= self.shell;
        config.enable_model_list |= self.model_list;
        config.auto_confirm_shell |= self.auto_confirm;
        config.auto_confirm_file_ops |= self.auto_confirm_files;
        config.ignore_calc_safety |= self.ignore_calc_safety;
        config.ignore_shell_safety |= self.ignore_shell_safety;
        if self.no_stream {
            config.stream = false;
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = commands::load_config(&cli).await;
    let debug = match &loaded {
        Ok((config, _)) => config.debug_mode,
        Err(_) => cli.debug,
    };
    init_tracing(debug);

    let (config, path) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = commands::run(&cli, config, path).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
