//! jdfetch CLI - serve the extraction endpoint or extract a single URL

use clap::{Parser, Subcommand, ValueEnum};
use jdfetch::{ErrorBody, ExtractResponse, Pipeline, PipelineBuilder, SERVICE_LLMTXT};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output format for fetch subcommand
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Text with YAML frontmatter
    #[default]
    Md,
    /// JSON format
    Json,
}

/// jdfetch - hardened page fetching and text extraction
#[derive(Parser, Debug)]
#[command(name = "jdfetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print full help with examples (llmtxt)
    #[arg(long)]
    llmtxt: bool,
}

/// Options shared by every subcommand that builds a pipeline
#[derive(clap::Args, Debug, Clone)]
struct PipelineArgs {
    /// Custom User-Agent
    #[arg(long, env = "JDFETCH_USER_AGENT")]
    user_agent: Option<String>,

    /// Outbound fetch timeout in milliseconds
    #[arg(long, env = "JDFETCH_TIMEOUT_MS", default_value_t = 8000)]
    timeout_ms: u64,

    /// Re-check every redirect hop against admission control
    #[arg(long)]
    revalidate_redirects: bool,

    /// Only fetch URLs starting with this prefix (repeatable)
    #[arg(long = "allow-prefix")]
    allow_prefixes: Vec<String>,

    /// Never fetch URLs starting with this prefix (repeatable)
    #[arg(long = "block-prefix")]
    block_prefixes: Vec<String>,
}

impl PipelineArgs {
    fn build(self) -> Pipeline {
        let mut builder: PipelineBuilder = Pipeline::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .revalidate_redirects(self.revalidate_redirects);

        if let Some(ua) = self.user_agent {
            builder = builder.user_agent(ua);
        }
        for prefix in self.allow_prefixes {
            builder = builder.allow_prefix(prefix);
        }
        for prefix in self.block_prefixes {
            builder = builder.block_prefix(prefix);
        }

        builder.build()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the extraction endpoint over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "JDFETCH_BIND", default_value = "127.0.0.1:8787")]
        bind: SocketAddr,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Extract a single URL and print the result
    Fetch {
        /// URL to fetch
        url: String,

        /// Output format
        #[arg(long, short, default_value = "md")]
        output: OutputFormat,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Handle --llmtxt flag
    if cli.llmtxt {
        writeln_safe(SERVICE_LLMTXT);
        std::process::exit(0);
    }

    init_tracing();

    match cli.command {
        Some(Commands::Serve { bind, pipeline }) => {
            run_serve(bind, pipeline.build()).await;
        }
        Some(Commands::Fetch {
            url,
            output,
            pipeline,
        }) => {
            run_fetch(&url, output, pipeline.build()).await;
        }
        None => {
            eprintln!("Usage: jdfetch serve [--bind ADDR]");
            eprintln!("   or: jdfetch fetch <URL>");
            eprintln!("   or: jdfetch --help");
            std::process::exit(1);
        }
    }
}

/// Log to stderr, filtered by RUST_LOG (default: info)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run_serve(bind: SocketAddr, pipeline: Pipeline) {
    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error binding {}: {}", bind, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = jdfetch::server::serve(listener, pipeline).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run_fetch(url: &str, output: OutputFormat, pipeline: Pipeline) {
    match pipeline.run(url).await {
        Ok(response) => match output {
            OutputFormat::Md => writeln_safe(&format_md_with_frontmatter(&response)),
            OutputFormat::Json => writeln_safe(&to_json(&response)),
        },
        Err(e) => {
            match output {
                OutputFormat::Md => eprintln!("Error ({}): {}", e.status_code(), e),
                OutputFormat::Json => writeln_safe(&to_json(&ErrorBody::from(&e))),
            }
            std::process::exit(1);
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing response: {}", e);
        std::process::exit(1);
    })
}

/// Format response as text with YAML frontmatter
fn format_md_with_frontmatter(response: &ExtractResponse) -> String {
    let mut output = String::new();

    output.push_str("---\n");
    output.push_str(&format!("url: {}\n", response.url));
    if !response.title.is_empty() {
        output.push_str(&format!("title: {}\n", response.title));
    }
    if !response.company.is_empty() {
        output.push_str(&format!("company: {}\n", response.company));
    }
    output.push_str(&format!("chars: {}\n", response.text.chars().count()));
    output.push_str("---\n");
    output.push_str(&response.text);

    output
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
