use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "balas")]
#[command(about = "Balas — answers WhatsApp messages with Gemini", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default config file (credentials can also come from the environment).
    Init {
        /// Config file path (default: BALAS_CONFIG_PATH or ~/.balas/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the webhook gateway (health checks, GET /webhook handshake, POST /webhook deliveries).
    Serve {
        /// Config file path (default: BALAS_CONFIG_PATH or ~/.balas/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default: PORT env, then config, then 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one prompt to the configured Gemini model and print the reply.
    Ask {
        /// Config file path (default: BALAS_CONFIG_PATH or ~/.balas/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Prompt text
        prompt: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("balas {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, prompt }) => {
            if let Err(e) = run_ask(config, prompt).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(balas::config::default_config_path);
    if balas::config::write_default_config(&path)? {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = balas::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    config.gateway.port = balas::config::resolve_port(&config, port);
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    balas::gateway::run_gateway(config).await
}

async fn run_ask(config_path: Option<std::path::PathBuf>, prompt: String) -> anyhow::Result<()> {
    use balas::llm::{GeminiClient, GeminiSettings, InferenceGateway};

    let (config, _) = balas::config::load_config(config_path)?;
    let http = balas::gateway::http_client(&config)?;
    let gemini = GeminiClient::new(GeminiSettings::from_config(&config), http);
    log::debug!("asking {}", gemini.model());
    let reply = gemini.generate_reply(&prompt).await?;
    println!("{}", reply);
    Ok(())
}
