mod fetch;
mod wizard;

use clap::{Args, Parser, Subcommand, ValueEnum};
use component_form::{
    check_schema, evaluate_expression, render_json_ui as component_render_json_ui,
    render_text as component_render_text, validate_values,
};
use fetch::HttpSchemaFetcher;
use form_spec::{
    ActionPipeline, FileStore, FormSchema, FormSession, FormValues, RemoteSource, ResolvedSchema,
    Storage, SubmissionResult, render_json_ui, resolve_draft_schema, resolve_published_schema,
    spec::default::DEFAULT_SUBMISSION_KEY, store::DEFAULT_NAMESPACE,
};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use wizard::{PromptContext, Verbosity, WizardField, WizardPayload, WizardPresenter, parse_answer};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Lucky draw entry form tool",
    long_about = "Fill, validate and submit schema-driven forms, and manage the published form schema"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,
    #[command(subcommand)]
    command: Command,
}

/// Settings shared by every command; each can also come from the environment.
#[derive(Args, Debug, Clone)]
struct GlobalOpts {
    /// Directory holding the local form storage.
    #[arg(long, env = "DRAW_FORM_STORE_DIR", default_value = ".draw-form", global = true)]
    store_dir: PathBuf,
    /// Prefix for every storage key.
    #[arg(long, env = "DRAW_FORM_NAMESPACE", default_value = DEFAULT_NAMESPACE, global = true)]
    namespace: String,
    /// URL of a published schema; tried before the stored one.
    #[arg(long, env = "DRAW_FORM_SCHEMA_URL", global = true)]
    schema_url: Option<String>,
    /// Seconds to wait for the schema URL.
    #[arg(long, env = "DRAW_FORM_FETCH_TIMEOUT_SECS", default_value_t = 10, global = true)]
    fetch_timeout: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Fill the form interactively and submit it.
    Fill {
        /// Schema JSON file; defaults to the resolved published schema.
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<PathBuf>,
        /// JSON file with values to start from.
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
        /// JSON file with values for the schema's hidden.inject fields.
        #[arg(long, value_name = "HIDDEN")]
        hidden: Option<PathBuf>,
        /// Show status, visible fields and the submitted data.
        #[arg(long, alias = "debug")]
        verbose: bool,
    },
    /// Validate values against the fields currently shown.
    Validate {
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<PathBuf>,
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
    },
    /// Print the form as text or JSON for the given values.
    Render {
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<PathBuf>,
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Validate and submit values, running the schema's actions.
    Submit {
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<PathBuf>,
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
        #[arg(long, value_name = "HIDDEN")]
        hidden: Option<PathBuf>,
    },
    /// showWhen expression helpers.
    Expr {
        #[command(subcommand)]
        command: ExprCommand,
    },
    /// Schema administration.
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// List stored submissions.
    Submissions {
        #[arg(long, default_value = DEFAULT_SUBMISSION_KEY)]
        key: String,
    },
    /// Local storage maintenance.
    Storage {
        #[command(subcommand)]
        command: StorageCommand,
    },
}

#[derive(Subcommand)]
enum ExprCommand {
    /// Evaluate an expression against JSON values.
    Eval {
        expression: String,
        #[arg(long, default_value = "{}")]
        values: String,
    },
    /// Check expression syntax.
    Check { expression: String },
}

#[derive(Subcommand)]
enum SchemaCommand {
    /// Print the schema a form would use, with where it came from.
    Resolve {
        /// Prefer the draft slot, as the editor does.
        #[arg(long)]
        draft: bool,
    },
    /// Report authoring problems in a schema file.
    Check {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
    /// Work with the draft slot.
    Draft {
        #[command(subcommand)]
        command: DraftCommand,
    },
    /// Copy a schema file or the draft into the published slot.
    Publish {
        /// Schema JSON file; defaults to the stored draft.
        #[arg(long, value_name = "SCHEMA")]
        schema: Option<PathBuf>,
        /// Admin password.
        #[arg(long)]
        password: String,
        #[arg(long, env = "DRAW_FORM_ADMIN_PASSWORD", default_value = "changeme", hide_env_values = true)]
        admin_password: String,
        /// Allow writing the published slot.
        #[arg(long, env = "DRAW_FORM_ALLOW_SAVE_LOCAL")]
        allow_save_local: bool,
    },
    /// Print the JSON Schema of the form schema format.
    JsonSchema,
}

#[derive(Subcommand)]
enum DraftCommand {
    Save {
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
    Show,
    Discard,
}

#[derive(Subcommand)]
enum StorageCommand {
    /// Check that the store can be written.
    Probe,
    /// Remove every key in the namespace.
    Clear,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = cli.global;
    match cli.command {
        Command::Fill {
            schema,
            values,
            hidden,
            verbose,
        } => run_fill(&opts, schema, values, hidden, verbose),
        Command::Validate { schema, values } => run_validate(&opts, schema, values),
        Command::Render {
            schema,
            values,
            format,
        } => run_render(&opts, schema, values, format),
        Command::Submit {
            schema,
            values,
            hidden,
        } => run_submit(&opts, schema, values, hidden),
        Command::Expr { command } => run_expr(command),
        Command::Schema { command } => run_schema(&opts, command),
        Command::Submissions { key } => run_submissions(&opts, &key),
        Command::Storage { command } => run_storage(&opts, command),
    }
}

fn open_storage(opts: &GlobalOpts) -> CliResult<Storage<FileStore>> {
    let store = FileStore::open(&opts.store_dir)?;
    Ok(Storage::with_namespace(store, opts.namespace.clone()))
}

fn resolve_schema(
    opts: &GlobalOpts,
    storage: &Storage<FileStore>,
    draft: bool,
) -> CliResult<ResolvedSchema> {
    let fetcher = match opts.schema_url {
        Some(_) => Some(HttpSchemaFetcher::new(Duration::from_secs(opts.fetch_timeout))?),
        None => None,
    };
    let remote = opts
        .schema_url
        .as_deref()
        .zip(fetcher.as_ref())
        .map(|(url, fetcher)| RemoteSource::new(url, fetcher));
    let resolved = if draft {
        resolve_draft_schema(remote, storage)
    } else {
        resolve_published_schema(remote, storage)
    };
    debug!(origin = resolved.origin.as_str(), "resolved schema");
    Ok(resolved)
}

fn read_schema(path: &Path) -> CliResult<FormSchema> {
    let contents = fs::read_to_string(path)?;
    Ok(FormSchema::from_json(&contents)?)
}

/// The schema file if given, otherwise the resolved published schema.
fn load_schema(
    opts: &GlobalOpts,
    storage: &Storage<FileStore>,
    path: Option<&Path>,
) -> CliResult<FormSchema> {
    match path {
        Some(path) => read_schema(path),
        None => Ok(resolve_schema(opts, storage, false)?.schema),
    }
}

fn read_values(path: Option<&Path>) -> CliResult<FormValues> {
    let Some(path) = path else {
        return Ok(FormValues::new());
    };
    let contents = fs::read_to_string(path)?;
    match serde_json::from_str(&contents)? {
        Value::Object(map) => Ok(map),
        _ => Err(format!("{} must contain a JSON object", path.display()).into()),
    }
}

fn component_config(opts: &GlobalOpts, schema: &FormSchema) -> CliResult<String> {
    Ok(json!({
        "schema_json": schema.to_json_pretty()?,
        "namespace": opts.namespace,
    })
    .to_string())
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(error.to_string().into());
    }
    Ok(value)
}

fn print_json(value: &impl serde::Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_validate(opts: &GlobalOpts, schema: Option<PathBuf>, values: PathBuf) -> CliResult<()> {
    let storage = open_storage(opts)?;
    let schema = load_schema(opts, &storage, schema.as_deref())?;
    let values_json = fs::read_to_string(values)?;
    let result = parse_component_result(&validate_values(
        &component_config(opts, &schema)?,
        &values_json,
    ))?;

    let valid = result["valid"].as_bool().unwrap_or(false);
    println!(
        "Validation result: {}",
        if valid { "valid" } else { "invalid" }
    );
    if let Some(errors) = result["errors"].as_object() {
        for (field_id, message) in errors {
            println!(" - {}: {}", field_id, message.as_str().unwrap_or_default());
        }
    }

    if valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn run_render(
    opts: &GlobalOpts,
    schema: Option<PathBuf>,
    values: Option<PathBuf>,
    format: RenderMode,
) -> CliResult<()> {
    let storage = open_storage(opts)?;
    let schema = load_schema(opts, &storage, schema.as_deref())?;
    let config = component_config(opts, &schema)?;
    let values_json = Value::Object(read_values(values.as_deref())?).to_string();
    match format {
        RenderMode::Text => {
            let text = component_render_text(&config, &values_json);
            if text.starts_with('{') {
                parse_component_result(&text)?;
            }
            println!("{}", text);
        }
        RenderMode::Json => {
            let ui = parse_component_result(&component_render_json_ui(&config, &values_json))?;
            print_json(&ui)?;
        }
    }
    Ok(())
}

fn run_submit(
    opts: &GlobalOpts,
    schema: Option<PathBuf>,
    values: PathBuf,
    hidden: Option<PathBuf>,
) -> CliResult<()> {
    let mut storage = open_storage(opts)?;
    let schema = load_schema(opts, &storage, schema.as_deref())?;
    let hidden = read_values(hidden.as_deref())?;
    let mut session = FormSession::new(schema);
    for (field_id, value) in read_values(Some(&values))? {
        session.set_value(&field_id, value)?;
    }

    let result = {
        let mut pipeline = ActionPipeline::new(&mut storage);
        session.submit(&hidden, &mut pipeline)?
    };
    print_json(&result)?;
    match result {
        SubmissionResult::Invalid { .. } => Err("submission failed validation".into()),
        SubmissionResult::Submitted(report) if !report.is_success() => {
            Err("one or more submit actions failed".into())
        }
        SubmissionResult::Submitted(_) => Ok(()),
    }
}

fn run_fill(
    opts: &GlobalOpts,
    schema: Option<PathBuf>,
    values: Option<PathBuf>,
    hidden: Option<PathBuf>,
    verbose: bool,
) -> CliResult<()> {
    let mut storage = open_storage(opts)?;
    let schema = load_schema(opts, &storage, schema.as_deref())?;
    let hidden = read_values(hidden.as_deref())?;
    let mut session = FormSession::new(schema);
    let mut asked = BTreeSet::new();
    for (field_id, value) in read_values(values.as_deref())? {
        session.set_value(&field_id, value)?;
        asked.insert(field_id);
    }

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose));
    loop {
        let ui = render_json_ui(&session.render());
        let payload =
            WizardPayload::from_json(&ui).map_err(|err| format!("wizard UI error: {}", err))?;
        presenter.show_header(&payload);

        let next = payload
            .fields
            .iter()
            .find(|field| field.visible && !asked.contains(&field.id));
        if let Some(field) = next {
            asked.insert(field.id.clone());
            if field.is_note() {
                presenter.show_note(field);
                continue;
            }
            presenter.show_status(&payload);
            let prompt = PromptContext::new(field, &payload.progress);
            match prompt_field(&prompt, field, &presenter)? {
                Some(value) => session.set_value(&field.id, value)?,
                None => session.clear_value(&field.id)?,
            }
            continue;
        }

        let result = {
            let mut pipeline = ActionPipeline::new(&mut storage);
            session.submit(&hidden, &mut pipeline)?
        };
        match result {
            SubmissionResult::Invalid { errors } => {
                presenter.show_validation_errors(&errors);
                for field_id in errors.keys() {
                    asked.remove(field_id);
                }
            }
            SubmissionResult::Submitted(report) => {
                presenter.show_completion(&report);
                return if report.is_success() {
                    Ok(())
                } else {
                    Err("one or more submit actions failed".into())
                };
            }
        }
    }
}

fn prompt_field(
    prompt: &PromptContext,
    field: &WizardField,
    presenter: &WizardPresenter,
) -> CliResult<Option<Value>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input ended before the form was complete".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("form aborted by user".into());
        }

        match parse_answer(field, trimmed) {
            Ok(value) => return Ok(value),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn run_expr(command: ExprCommand) -> CliResult<()> {
    match command {
        ExprCommand::Eval { expression, values } => {
            let result = parse_component_result(&evaluate_expression(&expression, &values))?;
            print_json(&result)
        }
        ExprCommand::Check { expression } => {
            let check = form_spec::check(&expression);
            print_json(&check)?;
            if check.valid {
                Ok(())
            } else {
                Err("expression is not valid".into())
            }
        }
    }
}

fn run_schema(opts: &GlobalOpts, command: SchemaCommand) -> CliResult<()> {
    match command {
        SchemaCommand::Resolve { draft } => {
            let storage = open_storage(opts)?;
            let resolved = resolve_schema(opts, &storage, draft)?;
            eprintln!("Schema origin: {}", resolved.origin.as_str());
            print_json(&resolved)
        }
        SchemaCommand::Check { schema } => {
            let schema = read_schema(&schema)?;
            let report = parse_component_result(&check_schema(&component_config(opts, &schema)?))?;
            print_json(&report)?;
            if report["publishable"].as_bool().unwrap_or(false) {
                Ok(())
            } else {
                Err("schema has errors".into())
            }
        }
        SchemaCommand::Draft { command } => run_draft(opts, command),
        SchemaCommand::Publish {
            schema,
            password,
            admin_password,
            allow_save_local,
        } => run_publish(opts, schema, &password, &admin_password, allow_save_local),
        SchemaCommand::JsonSchema => print_json(&schemars::schema_for!(FormSchema)),
    }
}

fn run_draft(opts: &GlobalOpts, command: DraftCommand) -> CliResult<()> {
    let mut storage = open_storage(opts)?;
    match command {
        DraftCommand::Save { schema } => {
            let schema = read_schema(&schema)?;
            storage.save_draft_schema(&schema)?;
            println!("Saved draft '{}' (v{})", schema.title, schema.version);
            Ok(())
        }
        DraftCommand::Show => match storage.load_draft_schema()? {
            Some(schema) => print_json(&schema),
            None => Err("no draft schema stored".into()),
        },
        DraftCommand::Discard => {
            storage.discard_draft_schema()?;
            println!("Draft discarded");
            Ok(())
        }
    }
}

fn run_publish(
    opts: &GlobalOpts,
    schema: Option<PathBuf>,
    password: &str,
    admin_password: &str,
    allow_save_local: bool,
) -> CliResult<()> {
    if !allow_save_local {
        return Err("publishing is disabled; set DRAW_FORM_ALLOW_SAVE_LOCAL=true".into());
    }
    if password != admin_password {
        return Err("invalid admin password".into());
    }

    let mut storage = open_storage(opts)?;
    let schema = match schema {
        Some(path) => read_schema(&path)?,
        None => storage
            .load_draft_schema()?
            .ok_or("no draft schema stored; pass --schema")?,
    };
    let issues = schema.check();
    if !schema.is_publishable() {
        print_json(&issues)?;
        return Err("schema has errors and was not published".into());
    }

    storage.save_published_schema(&schema)?;
    info!(title = %schema.title, version = %schema.version, "published schema");
    println!("Published '{}' (v{})", schema.title, schema.version);
    Ok(())
}

fn run_submissions(opts: &GlobalOpts, key: &str) -> CliResult<()> {
    let storage = open_storage(opts)?;
    print_json(&storage.submissions(key)?)
}

fn run_storage(opts: &GlobalOpts, command: StorageCommand) -> CliResult<()> {
    let mut storage = open_storage(opts)?;
    match command {
        StorageCommand::Probe => {
            let status = storage.probe();
            print_json(&status)?;
            if status.available {
                Ok(())
            } else {
                Err("storage is not available".into())
            }
        }
        StorageCommand::Clear => {
            let removed = storage.clear_all()?;
            println!("Removed {} keys from '{}'", removed, storage.namespace());
            Ok(())
        }
    }
}
