//! Command-line interface for stratum database migrations.

use clap::{Parser, Subcommand};
use stratum::{
    ConnectionConfig, ConsoleReporter, Dialect, FsSource, Migration, Migrator, SortOrder,
    VersionStyle,
};

mod config;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(version, about = "Database schema migrations driven by plain SQL scripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new migration script
    New {
        /// Short description of the schema change
        message: String,
    },
    /// Apply outstanding migrations against the database
    Up {
        /// Apply up to and including this version only
        #[arg(short, long)]
        version: Option<String>,
    },
    /// Revert applied migrations against the database
    Down {
        /// Revert down to and including this version only
        #[arg(short, long)]
        version: Option<String>,
    },
    /// List migrations and whether each is applied
    Status,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::Config::load()?;

    let style: VersionStyle = cfg.source.version_style.parse()?;
    let source = FsSource::new(&cfg.source.filesystem.directory_path)?;

    let dialect: Dialect = cfg.database.driver.parse()?;
    let connection = ConnectionConfig {
        host: cfg.database.host.clone(),
        port: cfg.database.port.clone(),
        user: cfg.database.user.clone(),
        password: cfg.database.password.clone(),
        dbname: cfg.database.dbname.clone(),
    };
    let ledger = dialect.connect(&connection, &cfg.database.migrations_table)?;

    let mut migrator = Migrator::new(
        Box::new(source),
        ledger,
        style,
        Box::new(ConsoleReporter),
    );

    match cli.command {
        Commands::New { message } => {
            migrator.create(&message)?;
        }
        Commands::Up { version: None } => migrator.apply_all()?,
        Commands::Up { version: Some(v) } => migrator.apply_up_to(&v)?,
        Commands::Down { version: None } => migrator.revert_all()?,
        Commands::Down { version: Some(v) } => migrator.revert_down_to(&v)?,
        Commands::Status => print_status(&migrator.list(SortOrder::Asc)?),
    }

    Ok(())
}

fn print_status(migrations: &[Migration]) {
    if migrations.is_empty() {
        println!("No migrations found.");
        return;
    }

    let version_width = migrations
        .iter()
        .map(|m| m.version.len())
        .max()
        .unwrap_or(0)
        .max("Version".len());
    let message_width = migrations
        .iter()
        .map(|m| m.normalized_message().len())
        .max()
        .unwrap_or(0)
        .max("Message".len());

    println!(
        "{:<version_width$}    {:<message_width$}    Applied",
        "Version", "Message"
    );
    for migration in migrations {
        println!(
            "{:<version_width$}    {:<message_width$}    [{}]",
            migration.version,
            migration.normalized_message(),
            if migration.applied { "x" } else { " " }
        );
    }
}
