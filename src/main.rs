use anyhow::{Context, Result};
use casesla::{
    display_json, format_display, Config, HttpInferenceClient, ReconcileOutcome, Session, Table,
};
use clap::{Args, Parser, Subcommand};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "casesla")]
#[command(about = "Predict case resolution times from ticket spreadsheets")]
struct Cli {
    /// YAML file with endpoint, timeout_secs and accept_invalid_certs
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct ConnectionArgs {
    /// Inference endpoint URL
    #[arg(long)]
    endpoint: Option<String>,
    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Accept invalid TLS certificates from the endpoint
    #[arg(long, default_value_t = false)]
    insecure: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a file and list its columns
    Inspect { file: PathBuf },
    /// Print the JSON payload for one row
    Payload {
        file: PathBuf,
        #[arg(long)]
        row: usize,
    },
    /// Run one row through the endpoint and print the prediction
    Predict {
        file: PathBuf,
        #[arg(long)]
        row: usize,
        /// Actuals file to reconcile the prediction against
        #[arg(long)]
        actuals: Option<PathBuf>,
        /// Print the prediction as JSON keyed by field name
        #[arg(long, default_value_t = false)]
        json: bool,
        #[command(flatten)]
        conn: ConnectionArgs,
    },
    /// Interactive session reading commands from stdin
    Session {
        #[command(flatten)]
        conn: ConnectionArgs,
    },
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let base = match &cli.config {
        Some(path) => Config::from_yaml_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Inspect { file } => inspect(&file),
        Commands::Payload { file, row } => {
            let mut session = Session::new();
            load_primary(&mut session, &file)?;
            println!("{}", session.build_payload(row)?.text);
            Ok(())
        }
        Commands::Predict {
            file,
            row,
            actuals,
            json,
            conn,
        } => {
            let config = connection(base, conn)?;
            predict(&config, &file, row, actuals.as_deref(), json)
        }
        Commands::Session { conn } => {
            let config = connection(base, conn)?;
            run_session(&config)
        }
    }
}

fn connection(base: Config, conn: ConnectionArgs) -> Result<Config> {
    Ok(base.with_overrides(conn.endpoint, conn.timeout, conn.insecure)?)
}

fn read_upload(path: &Path) -> Result<(Vec<u8>, String)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((bytes, name))
}

fn load_primary(session: &mut Session, path: &Path) -> Result<usize> {
    let (bytes, name) = read_upload(path)?;
    let count = session.load_table(&bytes, &name)?;
    println!("File loaded: {} records found.", count);
    Ok(count)
}

fn inspect(path: &Path) -> Result<()> {
    let (bytes, name) = read_upload(path)?;
    let table: Table = casesla::load_table(&bytes, &name)?;
    println!("{}: {} records", name, table.len());
    for column in table.columns() {
        println!("  {}", column);
    }
    Ok(())
}

fn print_rows(rows: &[(&'static str, String)]) {
    let width = rows.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
    for (label, value) in rows {
        println!("{:<width$}  {}", label, value, width = width);
    }
}

fn reconcile(session: &mut Session, path: &Path) -> Result<()> {
    let (bytes, name) = read_upload(path)?;
    match session.reconcile_actuals(&bytes, &name)? {
        ReconcileOutcome::Reconciled => info!(file = %name, "actuals applied"),
        ReconcileOutcome::Warning(w) => println!("warning: {}", w),
    }
    Ok(())
}

fn predict(
    config: &Config,
    file: &Path,
    row: usize,
    actuals: Option<&Path>,
    json: bool,
) -> Result<()> {
    let client = HttpInferenceClient::new(config)?;
    info!(endpoint = %client.endpoint(), "sending prediction request");
    let mut session = Session::new();
    load_primary(&mut session, file)?;
    session.build_payload(row)?;

    if let Some(w) = session.run_inference(&client)? {
        println!("warning: {}", w);
        return Ok(());
    }
    if let Some(path) = actuals {
        reconcile(&mut session, path)?;
    }
    if let Some(record) = session.display_record() {
        if json {
            println!("{}", serde_json::to_string_pretty(&display_json(record))?);
        } else {
            print_rows(&format_display(record));
        }
    }
    Ok(())
}

const SESSION_HELP: &str = "commands:
  load <file>      load the ticket file (.csv, .xlsx, .xls)
  row <n>          select a row (1-based)
  build            build the payload for the selected row
  infer            send the payload to the endpoint
  actuals <file>   reconcile the prediction against an actuals file
  show             print the current prediction
  help             show this text
  quit             leave the session";

/// Read commands until EOF or `quit`. Every command is its own action: a
/// failure is printed and the session carries on.
fn run_session(config: &Config) -> Result<()> {
    let client = HttpInferenceClient::new(config)?;
    println!("endpoint: {}", client.endpoint());
    let mut session = Session::new();
    let mut row: usize = 1;

    println!("{}", SESSION_HELP);
    let stdin = io::stdin();
    let mut out = io::stdout();
    write!(out, "> ")?;
    out.flush()?;

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read a command")?;
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("");
        let arg = words.collect::<Vec<_>>().join(" ");

        let result: Result<()> = match command {
            "" => Ok(()),
            "quit" | "exit" => break,
            "help" => {
                println!("{}", SESSION_HELP);
                Ok(())
            }
            "load" => load_primary(&mut session, Path::new(&arg)).map(|_| row = 1),
            "row" => arg
                .parse::<usize>()
                .context("row must be a positive number")
                .map(|n| {
                    row = n;
                    println!("row {} selected", n);
                }),
            "build" => session
                .build_payload(row)
                .map(|p| println!("{}", p.text))
                .map_err(Into::into),
            "infer" => session
                .run_inference(&client)
                .map(|warning| match warning {
                    Some(w) => println!("warning: {}", w),
                    None => println!("Success!"),
                })
                .map_err(Into::into),
            "actuals" => reconcile(&mut session, Path::new(&arg)),
            "show" => {
                match session.display_rows() {
                    Some(rows) => print_rows(&rows),
                    None => println!("no prediction yet"),
                }
                Ok(())
            }
            other => {
                println!("unknown command '{}', try 'help'", other);
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(command, error = %e, "action failed");
            println!("error: {:#}", e);
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    Ok(())
}
