mod color;
mod fields;
mod rows;

use std::{
    io::{Read as _, Write as _, stdin, stdout},
    path::PathBuf,
    time,
};

use anyhow::{bail, Context as _};
use baserow::{Profile, Row, TableClient};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::cli::color::{LABEL, Painted};

#[derive(Debug, Parser)]
#[command(
    name = "baserow",
    about = "Read and write Baserow tables",
    version = env!("BASEROW_VERSION"),
    propagate_version = true
)]
pub(crate) struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// How to format output.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Output {
    Json,
    #[default]
    Tty,
}

#[derive(Debug, clap::Args)]
#[command(next_help_heading = "Global Options")]
pub(crate) struct GlobalArgs {
    /// Name of the profile to use
    #[arg(long, short = 'P', global = true)]
    pub profile: Option<String>,
    /// Output format
    #[arg(long, short = 'O', global = true)]
    pub output: Option<Output>,
    /// Timeout (in seconds) for client operations (-1 = no timeout)
    #[arg(long, global = true)]
    pub client_timeout: Option<i64>,
    /// Print verbose logs
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    /// Base URL of the Baserow instance [default: from profile]
    #[arg(long, global = true)]
    pub database_url: Option<String>,
    /// Database token [default: from profile]
    #[arg(long, global = true)]
    pub token: Option<String>,
    /// File containing the database token
    #[arg(long, global = true, conflicts_with = "token")]
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Print version.
    Version,
    /// Print information about the current configuration
    Info,
    /// Show the fields of a table
    Fields(fields::FieldsArgs),
    /// List all rows of a table
    Rows(rows::RowsArgs),
    /// Get a single row
    Get(rows::GetArgs),
    /// Create or update a single row
    Add(rows::AddArgs),
    /// Create and update many rows at once
    Batch(rows::BatchArgs),
}

pub(crate) struct Cli {
    pub(crate) client: TableClient,
    pub(crate) global: GlobalArgs,
}

pub(crate) fn run(args: Args) -> anyhow::Result<()> {
    // Some commands don't require any config.
    if let Command::Version = args.command {
        println!("baserow {}", env!("BASEROW_VERSION"));
        return Ok(());
    }

    let profile = resolve_profile(&args.global)?.with_ua_product("baserow-cli");

    // Allows error responses to be parsed.
    let mut cfg = ureq::config::Config::builder().http_status_as_error(false);
    let timeout = match args.global.client_timeout {
        Some(-1) | None => None,
        Some(v) if v > 0 => Some(time::Duration::from_secs(v as _)),
        Some(v) => bail!("Invalid timeout value: {v}"),
    };

    cfg = cfg.timeout_global(timeout);
    let agent = ureq::Agent::new_with_config(cfg.build());

    debug!(?profile, command = ?args.command, "cli invocation");

    let cli = Cli {
        client: TableClient::with_transport(profile, agent),
        global: args.global,
    };

    match args.command {
        Command::Version => unreachable!(),
        Command::Info => handle_info(&cli),
        Command::Fields(args) => fields::handle(&cli, args),
        Command::Rows(args) => rows::list(&cli, args),
        Command::Get(args) => rows::get(&cli, args),
        Command::Add(args) => rows::add(&cli, args),
        Command::Batch(args) => rows::batch(&cli, args),
    }
}

/// Flags take precedence over the profile. With `--database-url`, the
/// profile is skipped entirely.
fn resolve_profile(global: &GlobalArgs) -> anyhow::Result<Profile> {
    if let Some(url) = &global.database_url {
        return Ok(Profile::new(
            url,
            global.token.clone(),
            global.token_path.as_deref(),
        )?);
    }

    let mut profile = if let Some(name) = global.profile.as_deref() {
        Profile::from_env(name)
    } else {
        Profile::from_default_env()
    }?;

    if let Some(token) = &global.token {
        profile.token = Some(token.clone());
    } else if let Some(path) = &global.token_path {
        profile.token = Some(baserow::load_token(path)?);
    }

    Ok(profile)
}

impl Cli {
    pub(crate) fn output(&self) -> Output {
        self.global.output.unwrap_or_default()
    }
}

/// Reads JSON from a file, or stdin for `-` or no file.
pub(crate) fn read_json<T>(path: Option<&str>) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut buf = String::new();
    match path {
        None | Some("-") => {
            stdin().read_to_string(&mut buf)?;
        }
        Some(path) => {
            buf = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
        }
    }

    serde_json::from_str(&buf).context("Invalid JSON input")
}

pub(crate) fn print_row(cli: &Cli, row: Row) -> anyhow::Result<()> {
    let row = serde_json::Value::Object(row);
    match cli.output() {
        Output::Json => serde_json::to_writer(stdout(), &row)?,
        Output::Tty => serde_json::to_writer_pretty(stdout(), &row)?,
    }

    println!();
    Ok(())
}

fn handle_info(cli: &Cli) -> anyhow::Result<()> {
    let profile = cli.client.profile();
    let token = if profile.token.is_some() { "set" } else { "not set" };

    let mut stdout = stdout().lock();
    for (label, value) in [
        ("Profile", profile.name.clone()),
        ("Database URL", profile.database_url.to_string()),
        ("Token", token.to_owned()),
        ("Client Version", env!("BASEROW_VERSION").to_owned()),
    ] {
        writeln!(&mut stdout, "{} {value}", Painted(LABEL, format!("{label:<20}")))?;
    }

    Ok(())
}
