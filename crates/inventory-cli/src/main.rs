//! Inventory CLI
//!
//! Command-line access to the inventory graph:
//! - Inspecting the entity schema and applying its storage DDL
//! - Running submissions through the sanitizer (dry run or commit)
//! - Editing and rejecting existing entries
//! - Reading entries back by unique name, uid or type

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use inventory_sanitizer::{SanitizeError, Sanitizer, SanitizerContext, User};
use inventory_schema::schema::TYPE_PREDICATE;
use inventory_schema::uid::is_uid;
use inventory_schema::{catalog, BlankId, NodeRef, Registry, Role, Uid, Value};
use inventory_store::{
    EntrySelector, Filter, GraphClient, ListRequest, MemoryGraph, Mutation, NQuad, Projection,
    Reader, StoreConfig,
};
use serde_json::Value as JsonValue;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod report;

#[derive(Parser)]
#[command(name = "inventory")]
#[command(author, version, about = "Schema-driven entry validation for the media inventory")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// TOML file with store settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Store HTTP endpoint (overrides the file and DGRAPH_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Access token (overrides the file and DGRAPH_AUTH_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,
    /// Refuse every mutation
    #[arg(long, global = true)]
    read_only: bool,
    /// Work against a throwaway in-memory store acting as a local admin
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Args)]
struct ActorArgs {
    /// Uid of the acting user
    #[arg(long)]
    user: Option<String>,
    /// Client address recorded on audit stamps
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,
}

#[derive(Args)]
struct InputArgs {
    /// JSON file with the submission (stdin when omitted or `-`)
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List entity types, or the predicates of one type
    Schema {
        /// Entity type (case-insensitive)
        type_name: Option<String>,
        /// Print the storage schema instead
        #[arg(long)]
        ddl: bool,
    },

    /// Apply the storage schema to the store
    Migrate,

    /// Validate a new entry without writing it
    Validate {
        type_name: String,
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Validate and commit a new entry
    Submit {
        type_name: String,
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Update an existing entry; the input names it under `uid`
    Edit {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        actor: ActorArgs,
        /// Validate only
        #[arg(long)]
        dry_run: bool,
    },

    /// Retype an entry as rejected
    Reject {
        uid: String,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Show one entry by unique name or uid
    Get {
        id: String,
        /// Project for this type instead of the entry's own
        #[arg(long = "type")]
        type_name: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// List entries of a type
    List {
        type_name: String,
        /// Equality filter `predicate=value` (repeatable)
        #[arg(long = "where", value_parser = parse_pair)]
        filters: Vec<(String, String)>,
        /// Keep entries linked via `predicate` to the entry with this unique name
        #[arg(long, value_parser = parse_pair)]
        related: Vec<(String, String)>,
        /// Predicates to return
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Return every predicate of the type
        #[arg(long, conflicts_with = "fields")]
        all: bool,
        #[arg(long, default_value_t = 50)]
        first: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        json: bool,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `predicate=value`, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty predicate in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Defaults, then the config file, then the environment, then flags.
fn store_config(args: &StoreArgs) -> Result<StoreConfig> {
    let config = match &args.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StoreConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(token) = &args.token {
        config.auth_token = Some(token.clone());
    }
    if args.read_only {
        config.read_only = true;
    }
    Ok(config)
}

struct Session {
    registry: Arc<Registry>,
    client: GraphClient,
    /// Acting user of a `--memory` session.
    local_user: Option<User>,
}

impl Session {
    fn open(args: &StoreArgs) -> Result<Self> {
        let registry = Arc::new(catalog::build().context("building the entity catalog")?);
        let config = store_config(args)?;
        if !args.memory {
            tracing::info!(endpoint = %config.endpoint, read_only = config.read_only, "connecting");
            let client = GraphClient::connect(config)?;
            return Ok(Self {
                registry,
                client,
                local_user: None,
            });
        }

        let graph = Arc::new(MemoryGraph::new());
        let client = GraphClient::with_backend(graph.clone(), config);
        client.alter(&registry.generate_storage_schema())?;
        let local = NodeRef::New(BlankId::new("local")?);
        let mut seed = Mutation::new();
        seed.set.push(NQuad::value(local.clone(), TYPE_PREDICATE, Value::string(catalog::USER_TYPE)));
        seed.set.push(NQuad::value(local.clone(), "display_name", Value::string("local")));
        seed.set.push(NQuad::value(local.clone(), "role", Value::Int(Role::Admin.level())));
        let uid = graph.seed(&seed)?.resolve(&local)?;
        tracing::info!(%uid, "in-memory store ready");
        Ok(Self {
            registry,
            client,
            local_user: Some(User::new(uid, Role::Admin).with_name("local")),
        })
    }

    fn reader(&self) -> Reader<'_> {
        Reader::new(&self.client, &self.registry)
    }

    fn context(&self) -> SanitizerContext {
        SanitizerContext::new(self.registry.clone(), self.client.clone())
    }

    fn actor(&self, args: &ActorArgs) -> Result<User> {
        match &args.user {
            Some(raw) => {
                let uid = Uid::parse(raw)?;
                let record = self
                    .reader()
                    .get_user(&uid)?
                    .ok_or_else(|| anyhow!("no user with uid {uid}"))?;
                Ok(record.into())
            }
            None => self
                .local_user
                .clone()
                .ok_or_else(|| anyhow!("--user is required unless --memory is set")),
        }
    }
}

fn read_input(path: Option<&Path>) -> Result<JsonValue> {
    let text = match path {
        Some(p) if p != Path::new("-") => {
            fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?
        }
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("submission is not valid JSON")
}

fn emit(s: &Sanitizer, committed: Option<&Uid>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report::submission_json(s, committed))?);
    } else {
        report::print_submission(s, committed);
    }
    Ok(())
}

fn cmd_schema(type_name: Option<&str>, ddl: bool) -> Result<()> {
    let registry = catalog::build()?;
    if ddl {
        print!("{}", registry.generate_storage_schema());
        return Ok(());
    }
    match type_name {
        Some(name) => {
            let entity = registry
                .resolve_type(name)
                .ok_or_else(|| anyhow!("unknown entity type `{name}`"))?;
            report::print_predicates(entity);
        }
        None => report::print_types(&registry),
    }
    Ok(())
}

fn cmd_create(session: &Session, type_name: &str, input: &InputArgs, actor: &ActorArgs, commit: bool) -> Result<()> {
    let data = read_input(input.input.as_deref())?;
    let user = session.actor(actor)?;
    let ctx = session.context();
    let s = Sanitizer::create(&ctx, type_name, &data, &user, &actor.ip)?;
    let committed = if commit {
        Some(s.commit(&session.client)?)
    } else {
        None
    };
    emit(&s, committed.as_ref(), input.json)
}

fn cmd_edit(session: &Session, input: &InputArgs, actor: &ActorArgs, dry_run: bool) -> Result<()> {
    let data = read_input(input.input.as_deref())?;
    let user = session.actor(actor)?;
    let s = Sanitizer::edit(&session.context(), &data, &user, &actor.ip)?;
    let committed = if dry_run {
        None
    } else {
        Some(s.commit(&session.client)?)
    };
    emit(&s, committed.as_ref(), input.json)
}

fn cmd_reject(session: &Session, raw_uid: &str, actor: &ActorArgs) -> Result<()> {
    let uid = Uid::parse(raw_uid)?;
    let user = session.actor(actor)?;
    let s = Sanitizer::reject(&session.context(), &uid, &user, &actor.ip)?;
    s.commit(&session.client)?;
    println!("{} {uid}", "Rejected".yellow().bold());
    Ok(())
}

fn cmd_get(session: &Session, id: &str, type_name: Option<&str>, json: bool) -> Result<()> {
    let selector = if is_uid(id.trim()) {
        EntrySelector::Uid(Uid::parse(id.trim())?)
    } else {
        EntrySelector::UniqueName(id.to_string())
    };
    let doc = session
        .reader()
        .get_entry(&selector, type_name)?
        .ok_or_else(|| SanitizeError::NotFound(format!("no entry `{id}`")))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&doc.to_json())?);
    } else {
        report::print_document(&doc);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_list(
    session: &Session,
    type_name: &str,
    filters: &[(String, String)],
    related: &[(String, String)],
    fields: &[String],
    all: bool,
    first: usize,
    offset: usize,
    json: bool,
) -> Result<()> {
    if first == 0 {
        bail!("--first must be at least 1");
    }
    let projection = if all {
        Projection::All
    } else if fields.is_empty() {
        Projection::Default
    } else {
        Projection::Fields(fields.to_vec())
    };
    let mut request = ListRequest::new(type_name).projection(projection).page(first, offset);
    let mut eq: Vec<Filter> = filters.iter().map(|(k, v)| Filter::eq(k, v.as_str())).collect();
    match eq.len() {
        0 => {}
        1 => request = request.filter(eq.remove(0)),
        _ => request = request.filter(Filter::And(eq)),
    }
    for (predicate, name) in related {
        request = request.related(predicate, Filter::eq("unique_name", name.to_lowercase()));
    }

    let docs = session.reader().list_by_type(&request)?.unwrap_or_default();
    if json {
        let rows: Vec<JsonValue> = docs.iter().map(|d| d.to_json()).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if docs.is_empty() {
        eprintln!("{}", "no entries".dimmed());
    } else {
        for doc in &docs {
            report::print_row(doc);
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Schema { type_name, ddl } = &cli.command {
        return cmd_schema(type_name.as_deref(), *ddl);
    }
    let session = Session::open(&cli.store)?;
    let result = match &cli.command {
        Commands::Schema { .. } => unreachable!("handled without a store"),
        Commands::Migrate => {
            session.client.alter(&session.registry.generate_storage_schema())?;
            println!("{}", "Schema applied".green().bold());
            Ok(())
        }
        Commands::Validate {
            type_name,
            input,
            actor,
        } => cmd_create(&session, type_name, input, actor, false),
        Commands::Submit {
            type_name,
            input,
            actor,
        } => cmd_create(&session, type_name, input, actor, true),
        Commands::Edit {
            input,
            actor,
            dry_run,
        } => cmd_edit(&session, input, actor, *dry_run),
        Commands::Reject { uid, actor } => cmd_reject(&session, uid, actor),
        Commands::Get {
            id,
            type_name,
            json,
        } => cmd_get(&session, id, type_name.as_deref(), *json),
        Commands::List {
            type_name,
            filters,
            related,
            fields,
            all,
            first,
            offset,
            json,
        } => cmd_list(
            &session, type_name, filters, related, fields, *all, *first, *offset, *json,
        ),
    };
    session.client.close();
    result
}

/// 2 for rejected input, 3 for refused permission, 4 for a missing entry.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SanitizeError>() {
        Some(SanitizeError::Validation(_)) => 2,
        Some(SanitizeError::Permission(_)) => 3,
        Some(SanitizeError::NotFound(_)) => 4,
        _ => 1,
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        if let Some(field) = err
            .downcast_ref::<SanitizeError>()
            .and_then(SanitizeError::offending_field)
        {
            eprintln!("{} {}", "field:".yellow().bold(), field);
        }
        std::process::exit(exit_code(&err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_split_on_first_equals() {
        assert_eq!(
            parse_pair("url = a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn flags_override_file_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"endpoint = \"http://graph:8080\"\ntimeout_secs = 5\n",
        )
        .unwrap();
        let args = StoreArgs {
            config: Some(file.path().to_path_buf()),
            endpoint: Some("http://override:9080".into()),
            token: None,
            read_only: true,
            memory: false,
        };
        let config = store_config(&args).unwrap();
        assert_eq!(config.endpoint, "http://override:9080");
        assert_eq!(config.timeout_secs, 5);
        assert!(config.read_only);
    }

    #[test]
    fn memory_session_acts_as_local_admin() {
        let args = StoreArgs {
            config: None,
            endpoint: None,
            token: None,
            read_only: false,
            memory: true,
        };
        let session = Session::open(&args).unwrap();
        let actor = ActorArgs {
            user: None,
            ip: "127.0.0.1".into(),
        };
        let user = session.actor(&actor).unwrap();
        assert_eq!(user.role, Role::Admin);

        let country = serde_json::json!({"name": "Germany", "iso_3166_1_2": "DE"});
        let s = Sanitizer::create(&session.context(), "Country", &country, &user, "::1").unwrap();
        let uid = s.commit(&session.client).unwrap();
        let doc = session
            .reader()
            .get_entry(&EntrySelector::UniqueName("germany".into()), None)
            .unwrap()
            .unwrap();
        assert_eq!(doc.uid(), Some(uid));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let err = anyhow::Error::from(SanitizeError::Permission("no".into()));
        assert_eq!(exit_code(&err), 3);
        let err = anyhow::Error::from(SanitizeError::field("name", "a value is required"));
        assert_eq!(exit_code(&err), 2);
        assert_eq!(exit_code(&anyhow!("boom")), 1);
    }
}
