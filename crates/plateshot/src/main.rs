//! `plateshot` - CLI for the numberplate capture client.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use plateshot::cli::{
    Cli, Command, ConfigCommand, GalleryCommand, ListCommand, OutputFormat, RecognizeCommand,
    SettingsCommand,
};
use plateshot::gallery::{clear_notice, render_plain, render_table, GalleryQuery};
use plateshot::{
    init_logging, CaptureSession, Config, FileSource, FrameSource, HttpPlateApi, Outcome,
    PlateResult, Recognizer, ResultStore, Settings, StdinSource, Storage,
};

/// Exit code when the API answered but read no plate.
const EXIT_NOT_RECOGNIZED: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let result = runtime.block_on(run(cli.command, &config));
    // A frame source stuck on stdin must not keep the process alive
    runtime.shutdown_background();
    result
}

async fn run(command: Command, config: &Config) -> Result<ExitCode> {
    match command {
        Command::Recognize(cmd) => handle_recognize(config, &cmd).await,
        Command::Gallery(cmd) => handle_gallery(config, cmd).await,
        Command::Settings(cmd) => handle_settings(config, &cmd),
        Command::Status(cmd) => handle_status(config, cmd.json),
        Command::Config(cmd) => handle_config(config, cmd),
    }
}

fn open_storage(config: &Config) -> Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("opening {}", path.display()))
}

fn http_api(config: &Config, storage: &Storage) -> Result<HttpPlateApi> {
    let endpoint = Settings::new(storage).effective_endpoint(config)?;
    Ok(HttpPlateApi::new(&endpoint, config)?)
}

async fn handle_recognize(config: &Config, cmd: &RecognizeCommand) -> Result<ExitCode> {
    let storage = open_storage(config)?;
    // Resolve the endpoint before touching the frame source
    let api = http_api(config, &storage)?;

    let source: Box<dyn FrameSource> = if cmd.from_stdin() {
        Box::new(StdinSource::new())
    } else {
        Box::new(FileSource::new(&cmd.image))
    };
    let frame = CaptureSession::new(source, config.into()).capture().await?;

    let mut recognizer = Recognizer::new(api, &storage);
    if cmd.keep_image {
        recognizer = recognizer.keep_images_in(config.images_dir());
    }

    match recognizer.submit(&frame).await? {
        Outcome::Saved(plate) => {
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&plate)?);
            } else {
                print_plate(&plate);
            }
            Ok(ExitCode::SUCCESS)
        }
        Outcome::NotRecognized => {
            eprintln!("No numberplate detected or recognized");
            Ok(ExitCode::from(EXIT_NOT_RECOGNIZED))
        }
    }
}

fn print_plate(plate: &PlateResult) {
    println!("Numberplate: {}", plate.numberplate);
    if let Some(percent) = plate.confidence_percent() {
        println!("Confidence:  {percent}%");
    }
    if let Some(created) = plate.created_at() {
        println!("Captured:    {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(image) = &plate.image {
        println!("Image:       {}", image.display());
    }
    println!("Id:          {}", plate.id);
}

async fn handle_gallery(config: &Config, cmd: GalleryCommand) -> Result<ExitCode> {
    let storage = open_storage(config)?;
    let store = ResultStore::new(&storage);

    match cmd {
        GalleryCommand::List(list) => handle_list(&store, list)?,
        GalleryCommand::Show { id, json } => {
            let plate = store
                .get(&id)?
                .with_context(|| format!("no numberplate with id {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plate)?);
            } else {
                print_plate(&plate);
            }
        }
        GalleryCommand::Delete { id } => {
            if store.delete(&id)? {
                println!("Deleted {id}");
            } else {
                anyhow::bail!("no numberplate with id {id}");
            }
        }
        GalleryCommand::Clear { yes } => {
            if yes {
                let count = store.clear()?;
                println!("Deleted {count} numberplates");
            } else {
                println!("{}", clear_notice(store.len()?));
            }
        }
        GalleryCommand::Sync => {
            let recognizer = Recognizer::new(http_api(config, &storage)?, &storage);
            let synced = recognizer.sync().await?;
            println!("Synced; {} numberplates stored", synced.len());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_list(store: &ResultStore<'_>, list: ListCommand) -> Result<()> {
    let all = store.list()?;
    let query = GalleryQuery {
        search: list.search,
        sort: list.sort.into(),
    };
    let mut view = query.apply(&all);
    if let Some(limit) = list.limit {
        view.truncate(limit);
    }

    if list.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    if view.is_empty() {
        println!("{}", query.empty_message(all.len()));
        return Ok(());
    }
    match list.format {
        OutputFormat::Table => print!("{}", render_table(&view)),
        _ => print!("{}", render_plain(&view)),
    }
    Ok(())
}

fn handle_settings(config: &Config, cmd: &SettingsCommand) -> Result<ExitCode> {
    let storage = open_storage(config)?;
    let settings = Settings::new(&storage);

    match cmd {
        SettingsCommand::Show => {
            match settings.endpoint()? {
                Some(saved) => println!("Endpoint:  {saved} (saved)"),
                None => match &config.api.endpoint {
                    Some(fallback) => println!("Endpoint:  {fallback} (from configuration)"),
                    None => println!("Endpoint:  not configured"),
                },
            }
            println!("Variant:   {}", config.api.variant);
        }
        SettingsCommand::SetEndpoint { url } => {
            let saved = settings.save_endpoint(url)?;
            println!("Saved endpoint {saved}");
        }
        SettingsCommand::ClearEndpoint => {
            if settings.clear_endpoint()? {
                println!("Cleared saved endpoint");
            } else {
                println!("No endpoint was saved");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_status(config: &Config, json: bool) -> Result<ExitCode> {
    let storage = open_storage(config)?;
    let plates = ResultStore::new(&storage).list()?;
    let stats = storage.stats()?;
    let endpoint = Settings::new(&storage).configured_endpoint(config)?;

    let oldest = plates.iter().map(|p| p.timestamp).min();
    let newest = plates.iter().map(|p| p.timestamp).max();
    let fmt_ts = |ts: Option<i64>| {
        ts.and_then(chrono::DateTime::from_timestamp_millis)
            .map(|t| t.to_rfc3339())
    };

    if json {
        let status = serde_json::json!({
            "numberplates": plates.len(),
            "oldest": fmt_ts(oldest),
            "newest": fmt_ts(newest),
            "database_path": storage.path(),
            "database_size_bytes": stats.db_size_bytes,
            "schema_version": stats.schema_version,
            "last_write": stats.last_write.map(|t| t.to_rfc3339()),
            "endpoint": endpoint,
            "variant": config.api.variant,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("plateshot status");
        println!("----------------");
        println!("Numberplates:  {}", plates.len());
        if let (Some(o), Some(n)) = (fmt_ts(oldest), fmt_ts(newest)) {
            println!("Oldest:        {o}");
            println!("Newest:        {n}");
        }
        println!("Database:      {}", storage.path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Schema:        v{}", stats.schema_version);
        if let Some(written) = stats.last_write {
            println!("Last write:    {}", written.to_rfc3339());
        }
        println!(
            "Endpoint:      {}",
            endpoint.as_deref().unwrap_or("not configured")
        );
        println!("API variant:   {}", config.api.variant);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[API]");
                println!(
                    "  Endpoint:           {}",
                    config.api.endpoint.as_deref().unwrap_or("(unset)")
                );
                println!("  Variant:            {}", config.api.variant);
                println!("  Timeout (secs):     {}", config.api.timeout_secs);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Images dir:         {}", config.images_dir().display());
                println!();
                println!("[Capture]");
                println!(
                    "  Acquire timeout ms: {}",
                    config.capture.acquire_timeout_ms
                );
                println!("  Max dimension:      {}", config.capture.max_dimension);
                println!("  JPEG quality:       {}", config.capture.jpeg_quality);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
