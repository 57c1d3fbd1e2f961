use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tictactoe_db_init::config::{Config, ConfigOverrides};
use tictactoe_db_init::initializer::{InitReport, Initializer};
use tictactoe_db_init::output::json::render_json;
use tictactoe_db_init::output::table::{
    render_init_table, render_plan_table, render_verify_table,
};
use tictactoe_db_init::schema::{SchemaPlan, COMPLETION_MESSAGE};
use tictactoe_db_init::target::MongoTarget;
use tictactoe_db_init::verify::{verify_schema, SchemaReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "tictactoe-db-init",
    about = "Create the tic-tac-toe collections and indexes"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    uri: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    database: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init {
        #[arg(long)]
        dry_run: bool,
    },
    Verify,
    Plan,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let overrides = ConfigOverrides {
        uri: cli.uri.clone(),
        port: cli.port,
        database: cli.database.clone(),
    };
    let plan = SchemaPlan::tictactoe();
    let command = cli.command.unwrap_or(Commands::Init { dry_run: false });

    match command {
        Commands::Config { init, show } => {
            handle_config_command(init, show, &config_path, overrides)
        }
        Commands::Plan => {
            match cli.output {
                OutputFormat::Table => println!("{}", render_plan_table(&plan)),
                OutputFormat::Json => println!("{}", render_json(&plan)?),
            }
            Ok(())
        }
        Commands::Init { dry_run } => {
            let config = load_config(&config_path, overrides)?;
            let target = connect(&config).await?;
            let report = Initializer::new(&target).dry_run(dry_run).run(&plan).await?;
            println!("{}", render_init_output(&report, cli.output)?);
            if dry_run {
                info!("dry run: no changes were made");
            }
            Ok(())
        }
        Commands::Verify => {
            let config = load_config(&config_path, overrides)?;
            let target = connect(&config).await?;
            let report = verify_schema(&target, &plan).await?;
            print_verify(&report, cli.output)?;
            if !report.is_satisfied() {
                bail!(
                    "schema of {} does not match: {} issue(s)",
                    report.database,
                    report.issues()
                );
            }
            Ok(())
        }
    }
}

fn load_config(config_path: &Path, overrides: ConfigOverrides) -> Result<Config> {
    let mut config = Config::load(Some(config_path))?;
    config.apply_overrides(overrides)?;
    Ok(config)
}

async fn connect(config: &Config) -> Result<MongoTarget> {
    info!("using database {}", config.database.name);
    MongoTarget::connect(
        &config.database.uri,
        &config.database.name,
        &config.database.app_name,
    )
    .await
}

/// The template is written before anything is read, so `--init` also
/// repairs a file that no longer parses.
fn handle_config_command(
    init: bool,
    show: bool,
    config_path: &Path,
    overrides: ConfigOverrides,
) -> Result<()> {
    if init {
        if config_path.exists() {
            warn!("overwriting existing config at {}", config_path.display());
        }
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        let config = load_config(config_path, overrides)?;
        println!("{}", render_json(&config)?);
    }
    Ok(())
}

/// JSON output stays a single document; the confirmation line belongs to the
/// table form only.
fn render_init_output(report: &InitReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table if report.dry_run => Ok(render_init_table(report)),
        OutputFormat::Table => Ok(format!(
            "{}\n{COMPLETION_MESSAGE}",
            render_init_table(report)
        )),
        OutputFormat::Json => {
            if !report.dry_run {
                info!("{COMPLETION_MESSAGE}");
            }
            render_json(report)
        }
    }
}

fn print_verify(report: &SchemaReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_verify_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Utc;
    use tictactoe_db_init::config::{Config, ConfigOverrides};
    use tictactoe_db_init::initializer::{CollectionReport, InitReport, Outcome};
    use tictactoe_db_init::schema::COMPLETION_MESSAGE;

    use super::{handle_config_command, render_init_output, OutputFormat};

    fn report(dry_run: bool) -> InitReport {
        InitReport {
            database: "myapp".to_string(),
            dry_run,
            collections: vec![CollectionReport {
                name: "users".to_string(),
                outcome: Outcome::Created,
                indexes: Vec::new(),
            }],
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn json_init_output_is_a_single_document() {
        let rendered = render_init_output(&report(false), OutputFormat::Json).expect("render");
        let parsed: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(parsed["database"], "myapp");
        assert!(!rendered.contains(COMPLETION_MESSAGE));
    }

    #[test]
    fn table_init_output_ends_with_confirmation() {
        let rendered = render_init_output(&report(false), OutputFormat::Table).expect("render");
        assert!(rendered.ends_with(COMPLETION_MESSAGE));

        let dry = render_init_output(&report(true), OutputFormat::Table).expect("render");
        assert!(!dry.contains(COMPLETION_MESSAGE));
    }

    #[test]
    fn config_init_repairs_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[database\n").expect("write");

        handle_config_command(true, true, &path, ConfigOverrides::default())
            .expect("config --init");
        let config = Config::load(Some(&path)).expect("load");
        assert_eq!(config.database.uri, "mongodb://localhost:5000");
    }

    #[test]
    fn config_show_still_rejects_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[database\n").expect("write");

        assert!(handle_config_command(false, true, &path, ConfigOverrides::default()).is_err());
    }
}
