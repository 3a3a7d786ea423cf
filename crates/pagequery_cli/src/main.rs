//! Command-line front end for the page query engine.
//!
//! # Responsibility
//! - Open a migrated SQLite database and run page queries or grouped
//!   counts against entities from a catalog.
//! - Print results as JSON on stdout and diagnostics on stderr.

use clap::{Parser, Subcommand, ValueHint};
use log::info;
use pagequery_core::{
    core_version, init_logging, init_stderr_logging, open_db, open_db_in_memory, Catalog,
    DbError, EntitySchema, Filter, PageQueryRequest, QueryEngine, QueryError, SchemaError,
    SqliteRecordStore, StoreError,
};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "pagequery",
    version,
    about = "Offset and cursor pagination over SQLite tables",
    arg_required_else_help = true,
    after_help = r#"EXAMPLES
  $ pagequery --db lessons.db query membros --request '{"filters": {"nome": "ali"}, "limit": 5}'
  $ pagequery --db lessons.db query membros --request '{"last_id": 10, "page_size": 5}'
  $ pagequery --db lessons.db count-by cursos --field professor_id --min 2"#
)]
struct Cli {
    #[arg(
        long,
        help = "SQLite database file (default: empty in-memory database)",
        value_hint = ValueHint::FilePath
    )]
    db: Option<PathBuf>,
    #[arg(
        long,
        help = "Entity catalog JSON (default: built-in lesson catalog)",
        value_hint = ValueHint::FilePath
    )]
    catalog: Option<PathBuf>,
    #[arg(
        long,
        help = "Write rotated log files to this absolute directory instead of stderr",
        value_hint = ValueHint::DirPath
    )]
    log_dir: Option<String>,
    #[arg(long, default_value = "warn", help = "trace|debug|info|warn|error")]
    log_level: String,
    #[arg(long, help = "Pretty-print JSON output")]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one page query and print `{data, pagination}`.
    Query {
        entity: String,
        #[arg(
            long,
            default_value = "{}",
            help = "Request JSON: filters, offset/limit/page or last_id/page_size, sort_field, sort_direction"
        )]
        request: String,
    },
    /// Count records grouped by one field.
    CountBy {
        entity: String,
        #[arg(long)]
        field: String,
        #[arg(long, default_value_t = 1)]
        min: u64,
        #[arg(long, default_value = "{}", help = "Filter JSON object of field -> value")]
        filters: String,
    },
    /// List catalog entities and their fields.
    Entities,
    /// Print the core library version.
    Version,
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Catalog(SchemaError),
    Db(DbError),
    Store(StoreError),
    Query(QueryError),
    Json(serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::Catalog(_) | Self::Json(_) => 2,
            Self::Query(err) if err.is_client_error() => 2,
            Self::Db(_) | Self::Store(_) | Self::Query(_) => 1,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}"),
            Self::Catalog(err) => write!(f, "catalog: {err}"),
            Self::Db(err) => write!(f, "database: {err}"),
            Self::Store(err) => write!(f, "store: {err}"),
            Self::Query(err) => write!(f, "query: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
        }
    }
}

impl From<SchemaError> for CliError {
    fn from(value: SchemaError) -> Self {
        Self::Catalog(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<QueryError> for CliError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let logging = match &cli.log_dir {
        Some(dir) => init_logging(&cli.log_level, dir),
        None => init_stderr_logging(&cli.log_level),
    };
    logging.map_err(CliError::Usage)?;

    if let Command::Version = cli.command {
        println!("{}", core_version());
        return Ok(());
    }

    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::builtin()?,
    };
    let engine = QueryEngine::from_catalog(&catalog);

    let output = match &cli.command {
        Command::Query { entity, request } => {
            let schema = entity_schema(&catalog, entity)?;
            let request: PageQueryRequest = serde_json::from_str(request)?;
            let conn = connect(cli.db.as_ref())?;
            let store = verified_store(&conn, schema)?;
            let page = engine.query_request(&store, schema, &request)?;
            serde_json::to_value(page)?
        }
        Command::CountBy {
            entity,
            field,
            min,
            filters,
        } => {
            let schema = entity_schema(&catalog, entity)?;
            let params: BTreeMap<String, String> = serde_json::from_str(filters)?;
            let filter = Filter::from_params(
                schema,
                params.iter().map(|(name, value)| (name.as_str(), value.as_str())),
            )?;
            let conn = connect(cli.db.as_ref())?;
            let store = verified_store(&conn, schema)?;
            let groups = engine.count_by(&store, schema, &filter, field, *min)?;
            serde_json::to_value(groups)?
        }
        Command::Entities => serde_json::Value::Array(
            catalog
                .entity_names()
                .filter_map(|name| catalog.entity(name))
                .map(describe_entity)
                .collect(),
        ),
        Command::Version => return Ok(()),
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}

fn entity_schema<'c>(catalog: &'c Catalog, name: &str) -> Result<&'c EntitySchema, CliError> {
    catalog.entity(name).ok_or_else(|| {
        let known = catalog.entity_names().collect::<Vec<_>>().join(", ");
        CliError::Usage(format!("unknown entity `{name}`; expected one of: {known}"))
    })
}

fn connect(path: Option<&PathBuf>) -> Result<Connection, CliError> {
    let conn = match path {
        Some(path) => open_db(path)?,
        None => {
            info!("event=cli_db module=cli status=ok mode=memory");
            open_db_in_memory()?
        }
    };
    Ok(conn)
}

fn verified_store<'c>(
    conn: &'c Connection,
    schema: &EntitySchema,
) -> Result<SqliteRecordStore<'c>, CliError> {
    let store = SqliteRecordStore::new(conn);
    store.verify_schema(schema)?;
    Ok(store)
}

fn describe_entity(schema: &EntitySchema) -> serde_json::Value {
    serde_json::json!({
        "name": schema.name(),
        "key": schema.key_field(),
        "key_kind": schema.key_kind(),
        "fields": schema.fields(),
    })
}
