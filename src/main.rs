//! meshcopy command line
//!
//! - `meshcopy control` runs a node's control server (master, worker or standalone)
//! - `meshcopy send` asks a source node to push a file to one target
//! - `meshcopy send-all` asks a master to fan a file out to every node
//! - `meshcopy nodes` lists the nodes a master knows about

use clap::{Args, CommandFactory, Parser, Subcommand};
use meshcopy::{
    Config, ControlClient, Node, PackMode, SendAllRequest, SendFileRequest, run_with_shutdown,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "meshcopy", version, about = "Push files between machines over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a control server
    Control(ControlArgs),
    /// Push a file from a source node to one target
    Send(SendArgs),
    /// Push a file from a source node to every registered node, via the master
    SendAll(SendAllArgs),
    /// List the nodes registered with a master
    Nodes(NodesArgs),
}

#[derive(Args)]
#[command(disable_help_flag = true)]
struct ControlArgs {
    /// Keep the node registry and serve fan-out
    #[arg(long)]
    master: bool,
    /// Control port [default: 7000]
    #[arg(short, long)]
    port: Option<u16>,
    /// Bind address [default: 0.0.0.0]
    #[arg(short = 'h', long)]
    host: Option<String>,
    /// Master to register with (worker mode)
    #[arg(long)]
    master_host: Option<String>,
    /// Master control port [default: 7000]
    #[arg(long)]
    master_port: Option<u16>,
    /// Address other nodes use to reach this one
    #[arg(long = "node-host", visible_alias = "public-host")]
    node_host: Option<String>,
    /// Display name reported to the master
    #[arg(long)]
    node_name: Option<String>,
    /// Where packed artifacts are written [default: OS temp dir]
    #[arg(long)]
    temp_dir: Option<PathBuf>,
    /// Serve Swagger UI at /swagger-ui
    #[arg(long)]
    swagger_ui: bool,
    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

/// Pack mode and receiver-side flags shared by send and send-all
#[derive(Args)]
struct PackArgs {
    /// tar
    #[arg(short = 't')]
    tar: bool,
    /// gzip (a directory becomes .tar.gz); -t -g together means tar.gz
    #[arg(short = 'g')]
    gzip: bool,
    /// tar.gz
    #[arg(long = "tg")]
    tar_gz: bool,
    /// Do not extract on the receiving side
    #[arg(long)]
    norelease: bool,
    /// Report download progress on the receiving side
    #[arg(short = 'b', long)]
    progress: bool,
}

impl PackArgs {
    fn pack_mode(&self) -> PackMode {
        match (self.tar, self.gzip, self.tar_gz) {
            (_, _, true) | (true, true, _) => PackMode::TarGz,
            (true, false, false) => PackMode::Tar,
            (false, true, false) => PackMode::Gz,
            (false, false, false) => PackMode::None,
        }
    }

    fn auto_extract(&self) -> bool {
        !self.norelease && self.pack_mode() != PackMode::None
    }
}

#[derive(Args)]
struct SendArgs {
    /// Source control host; also the host the target pulls from
    #[arg(long, visible_alias = "send-host", default_value = "127.0.0.1")]
    source_host: String,
    /// Source control port
    #[arg(long = "source-port", default_value_t = 7000)]
    source_port: u16,
    /// File or directory on the source
    #[arg(short = 'f', long)]
    source_file: Option<String>,
    /// Data-plane port on the source
    #[arg(long, default_value_t = 9000)]
    send_port: u16,
    /// Target control host
    #[arg(long, visible_alias = "client-host")]
    target_host: Option<String>,
    /// Target control port
    #[arg(long, visible_alias = "client-port", default_value_t = 7000)]
    target_port: u16,
    /// Directory on the target to save into
    #[arg(long, visible_alias = "client-save", default_value = "")]
    target_save: String,
    #[command(flatten)]
    pack: PackArgs,
}

#[derive(Args)]
struct SendAllArgs {
    /// Master control host
    #[arg(long)]
    master_host: Option<String>,
    /// Master control port
    #[arg(long, default_value_t = 7000)]
    master_port: u16,
    /// Source control host
    #[arg(long, default_value = "127.0.0.1")]
    source_host: String,
    /// Source control port
    #[arg(long = "source-port", default_value_t = 7000)]
    source_port: u16,
    /// File or directory on the source
    #[arg(short = 'f', long)]
    source_file: Option<String>,
    /// Data-plane port on the source
    #[arg(long, default_value_t = 9000)]
    send_port: u16,
    /// Directory every target saves into
    #[arg(long, visible_alias = "client-save", default_value = "")]
    target_save: String,
    #[command(flatten)]
    pack: PackArgs,
}

#[derive(Args)]
struct NodesArgs {
    /// Master control host
    #[arg(long)]
    master_host: Option<String>,
    /// Master control port
    #[arg(long, default_value_t = 7000)]
    master_port: u16,
}

/// Initialize logging with tracing.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meshcopy=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match Cli::parse().command {
        Some(Commands::Control(args)) => control(args).await,
        Some(Commands::Send(args)) => send(args).await,
        Some(Commands::SendAll(args)) => send_all(args).await,
        Some(Commands::Nodes(args)) => nodes(args).await,
        None => {
            let _ = Cli::command().print_help();
            println!();
            ExitCode::SUCCESS
        }
    }
}

fn load_config(args: ControlArgs) -> meshcopy::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| meshcopy::Error::Config {
                message: format!("cannot read {}: {}", path.display(), e),
                key: None,
            })?;
            serde_json::from_str(&raw)?
        }
        None => Config::default(),
    };

    config.master |= args.master;
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(host) = args.host {
        config.bind_host = host;
    }
    if args.master_host.is_some() {
        config.master_host = args.master_host;
    }
    if let Some(port) = args.master_port {
        config.master_port = port;
    }
    if args.node_host.is_some() {
        config.public_host = args.node_host;
    }
    if args.node_name.is_some() {
        config.node_name = args.node_name;
    }
    if args.temp_dir.is_some() {
        config.transfer.temp_dir = args.temp_dir;
    }
    config.api.swagger_ui |= args.swagger_ui;
    Ok(config)
}

async fn control(args: ControlArgs) -> ExitCode {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let node = match Node::new(config).await {
        Ok(node) => Arc::new(node),
        Err(e) => {
            tracing::error!(error = %e, "failed to start node");
            return ExitCode::FAILURE;
        }
    };

    match run_with_shutdown(node).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "control server failed");
            ExitCode::FAILURE
        }
    }
}

fn client() -> Option<ControlClient> {
    match ControlClient::new(Duration::from_secs(300)) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!(error = %e, "cannot create HTTP client");
            None
        }
    }
}

async fn print_response(label: &str, result: meshcopy::Result<reqwest::Response>) {
    match result {
        Ok(response) => {
            println!("[{}] status: {}", label, response.status().as_u16());
            println!("{}", response.text().await.unwrap_or_default());
        }
        Err(e) => {
            tracing::debug!(error = %e, "request failed");
            eprintln!("[{}] no response", label);
        }
    }
}

async fn send(args: SendArgs) -> ExitCode {
    let Some(source_file) = args.source_file.filter(|f| !f.is_empty()) else {
        eprintln!("Error: --source-file or -f required");
        return ExitCode::FAILURE;
    };
    let Some(target_host) = args.target_host.filter(|h| !h.is_empty()) else {
        eprintln!("Error: --target-host required");
        return ExitCode::FAILURE;
    };

    tracing::info!(
        source = %format!("{}:{}", args.source_host, args.source_port),
        target = %format!("{}:{}", target_host, args.target_port),
        file = %source_file,
        "send"
    );

    let request = SendFileRequest {
        file_path: Some(source_file),
        data_port: Some(args.send_port),
        source_host: Some(args.source_host.clone()),
        target_host: Some(target_host),
        target_ctrl_port: Some(args.target_port),
        target_save: Some(args.target_save),
        pack_mode: args.pack.pack_mode(),
        auto_extract: args.pack.auto_extract(),
        progress: args.pack.progress,
    };

    let Some(client) = client() else {
        return ExitCode::FAILURE;
    };
    print_response(
        "SEND",
        client
            .send_file(&args.source_host, args.source_port, &request)
            .await,
    )
    .await;
    ExitCode::SUCCESS
}

async fn send_all(args: SendAllArgs) -> ExitCode {
    let Some(master_host) = args.master_host.filter(|h| !h.is_empty()) else {
        eprintln!("Error: --master-host required");
        return ExitCode::FAILURE;
    };
    let Some(source_file) = args.source_file.filter(|f| !f.is_empty()) else {
        eprintln!("Error: --source-file or -f required");
        return ExitCode::FAILURE;
    };

    tracing::info!(
        master = %format!("{}:{}", master_host, args.master_port),
        source = %format!("{}:{}", args.source_host, args.source_port),
        file = %source_file,
        "send-all"
    );

    let request = SendAllRequest {
        source_host: Some(args.source_host),
        source_file: Some(source_file),
        source_ctrl_port: Some(args.source_port),
        send_port: Some(args.send_port),
        target_save: Some(args.target_save),
        pack_mode: args.pack.pack_mode(),
        auto_extract: args.pack.auto_extract(),
        progress: args.pack.progress,
    };

    let Some(client) = client() else {
        return ExitCode::FAILURE;
    };
    print_response(
        "SEND-ALL",
        client
            .send_all(&master_host, args.master_port, &request)
            .await,
    )
    .await;
    ExitCode::SUCCESS
}

async fn nodes(args: NodesArgs) -> ExitCode {
    let Some(master_host) = args.master_host.filter(|h| !h.is_empty()) else {
        eprintln!("Error: --master-host required");
        return ExitCode::FAILURE;
    };
    let Some(client) = client() else {
        return ExitCode::FAILURE;
    };

    match client.nodes(&master_host, args.master_port).await {
        Ok(listing) => {
            for node in listing.nodes {
                println!(
                    "{}:{}\t{}\t{}",
                    node.host,
                    node.ctrl_port,
                    if node.name.is_empty() { "-" } else { &node.name },
                    node.last_seen.to_rfc3339()
                );
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "request failed");
            eprintln!("[NODES] no response");
        }
    }
    ExitCode::SUCCESS
}
