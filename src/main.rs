mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{
    CheckRangeArgs, Cli, Commands, ConfigAction, ConfigArgs, InfoArgs, MergeArgs, RotateArgs,
    SplitArgs, WatermarkArgs,
};
use pdf_wizard::services::Validate;
use pdf_wizard::types::PageSpan;
use pdf_wizard::{
    AppConfig, CancelHandle, DocumentInfo, DocumentLoader, DocumentOperationExecutor, HexColor,
    LopdfEngine, MergeSession, OperationListPlanner, OutputManifest, PageRangeParser,
    PageSelection, PdfEngine, PdfWizardError, Result, RotateDefinition, RotateSession,
    SplitDefinition, SplitSession, WatermarkSession,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Everything a command handler needs besides its own arguments.
struct AppContext {
    config: AppConfig,
    config_path: PathBuf,
    output_dir: PathBuf,
    force: bool,
    timeout: Option<Duration>,
}

impl AppContext {
    fn executor(&self) -> DocumentOperationExecutor<LopdfEngine> {
        DocumentOperationExecutor::new(LopdfEngine::new()).with_timeout(self.timeout)
    }

    async fn prepare_output_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PdfWizardError::OutputDirectory {
                reason: format!("cannot create {}: {}", self.output_dir.display(), e),
            })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt().with_target(false);
    if std::env::var_os("RUST_LOG").is_some() {
        subscriber.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        subscriber.with_max_level(log_level).init();
    }

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path().context("Failed to locate the config file")?,
    };
    let config = AppConfig::load(&config_path);

    let ctx = AppContext {
        output_dir: cli
            .output
            .clone()
            .or_else(|| config.default_output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("./output")),
        force: cli.force,
        timeout: cli.timeout.map(Duration::from_secs).or_else(|| config.timeout()),
        config,
        config_path,
    };

    let result = match &cli.command {
        Commands::Info(args) => handle_info_command(args).await,
        Commands::Merge(args) => handle_merge_command(args, &ctx).await,
        Commands::Split(args) => handle_split_command(args, &ctx).await,
        Commands::Rotate(args) => handle_rotate_command(args, &ctx).await,
        Commands::Watermark(args) => handle_watermark_command(args, &ctx).await,
        Commands::CheckRange(args) => handle_check_range_command(args).await,
        Commands::Config(args) => handle_config_command(args, ctx).await,
    };

    if let Err(e) = result {
        error!("Operation failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Cancels the returned handle when Ctrl-C is pressed.
fn cancel_on_interrupt() -> CancelHandle {
    let cancel = CancelHandle::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            handle.cancel();
        }
    });
    cancel
}

async fn metadata(path: &Path) -> Result<DocumentInfo> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || LopdfEngine::new().metadata(&path))
        .await
        .map_err(|e| PdfWizardError::Execution {
            reason: format!("worker thread failed: {}", e),
        })?
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json_content =
        serde_json::to_string_pretty(value).context("Failed to serialize results")?;
    tokio::fs::write(path, json_content)
        .await
        .context("Failed to write JSON output file")?;
    info!("Results written to: {}", path.display());
    Ok(())
}

async fn report(manifest: &OutputManifest, json_output: Option<&PathBuf>) -> Result<()> {
    info!(
        "Successfully created {} file(s) from {} source(s):",
        manifest.outputs.len(),
        manifest.sources.len()
    );
    for output in &manifest.outputs {
        info!("  - {}", output.display());
    }
    if let Some(path) = json_output {
        write_json(path, manifest).await?;
    }
    Ok(())
}

async fn handle_info_command(args: &InfoArgs) -> Result<()> {
    let mut documents = Vec::with_capacity(args.files.len());

    for file in &args.files {
        let info = metadata(file).await?;
        println!("\n=== {} ===", info.name);
        println!("Path: {}", info.path.display());
        println!("Pages: {}", info.total_pages);
        println!("Size: {} bytes", info.size_bytes);
        println!("Modified: {}", info.last_modified.to_rfc3339());
        documents.push(info);
    }

    if let Some(path) = &args.json_output {
        write_json(path, &documents).await?;
    }
    Ok(())
}

async fn handle_merge_command(args: &MergeArgs, ctx: &AppContext) -> Result<()> {
    info!("Starting merge with {} sources", args.sources.len());

    let inputs = DocumentLoader::collect_inputs(&args.sources)?;
    if inputs.is_empty() {
        return Err(PdfWizardError::InvalidArgument {
            reason: "no PDF files found in the given sources".to_string(),
        });
    }

    let mut session = MergeSession::new();
    for input in &inputs {
        session.add_file(input)?;
    }
    ctx.prepare_output_dir().await?;
    session.output_mut().set_directory(&ctx.output_dir);
    session.output_mut().set_filename(&args.filename);

    for (idx, file) in session.files().iter().enumerate() {
        info!("  {}: {}", idx + 1, file.display());
    }

    let executor = ctx.executor();
    let manifest = session
        .execute(&executor, &cancel_on_interrupt(), ctx.force)
        .await?;
    report(&manifest, args.json_output.as_ref()).await
}

async fn handle_split_command(args: &SplitArgs, ctx: &AppContext) -> Result<()> {
    let document = metadata(&args.file).await?;
    info!(
        "Document '{}' has {} pages",
        document.name, document.total_pages
    );

    let mut session = SplitSession::new(ctx.config.max_definitions);
    session.select_document(document);

    if args.ranges.is_empty() {
        while session.definitions().last().map(|d| d.end_page) < Some(session.total_pages()) {
            if session.add_split().is_none() {
                warn!(
                    "Stopped at {} parts; the rest of the document is not covered",
                    session.definitions().len()
                );
                break;
            }
        }
    } else {
        for (idx, range) in args.ranges.iter().enumerate() {
            let definition = SplitDefinition {
                id: 0,
                start_page: range.start,
                end_page: range.end,
                filename: range
                    .value
                    .clone()
                    .unwrap_or_else(|| format!("split_{}", idx + 1)),
            };
            if session.push(definition).is_none() {
                return Err(PdfWizardError::InvalidArgument {
                    reason: format!("at most {} ranges are allowed", ctx.config.max_definitions),
                });
            }
        }
    }

    let plan: Vec<String> = session
        .definitions()
        .iter()
        .map(|d| format!("Pages {}-{} -> {}", d.start_page, d.end_page, d.output_name()))
        .collect();
    preview(&plan);
    for (a, b) in session.overlaps() {
        warn!("Ranges {} and {} overlap", a, b);
    }
    report_problems(session.definitions(), session.total_pages());

    ctx.prepare_output_dir().await?;
    session.output_mut().set_directory(&ctx.output_dir);

    let executor = ctx.executor();
    let manifest = session
        .execute(&executor, &cancel_on_interrupt(), ctx.force)
        .await?;
    report(&manifest, args.json_output.as_ref()).await
}

async fn handle_rotate_command(args: &RotateArgs, ctx: &AppContext) -> Result<()> {
    let document = metadata(&args.file).await?;
    info!(
        "Document '{}' has {} pages",
        document.name, document.total_pages
    );

    let mut session = RotateSession::new(ctx.config.max_definitions);
    session.select_document(document);

    for range in &args.ranges {
        let definition = RotateDefinition {
            id: 0,
            start_page: range.start,
            end_page: range.end,
            rotation: range.value,
        };
        if session.push(definition).is_none() {
            return Err(PdfWizardError::InvalidArgument {
                reason: format!("at most {} ranges are allowed", ctx.config.max_definitions),
            });
        }
    }

    let plan: Vec<String> = session
        .definitions()
        .iter()
        .map(|d| format!("Pages {}-{}: {} degrees", d.start_page, d.end_page, d.rotation.degrees()))
        .collect();
    preview(&plan);
    for (a, b) in session.overlaps() {
        warn!("Ranges {} and {} overlap; rotations add up on shared pages", a, b);
    }
    report_problems(session.definitions(), session.total_pages());

    ctx.prepare_output_dir().await?;
    session.output_mut().set_directory(&ctx.output_dir);
    session.output_mut().set_filename(&args.filename);

    let executor = ctx.executor();
    let manifest = session
        .execute(&executor, &cancel_on_interrupt(), ctx.force)
        .await?;
    report(&manifest, args.json_output.as_ref()).await
}

async fn handle_watermark_command(args: &WatermarkArgs, ctx: &AppContext) -> Result<()> {
    let document = metadata(&args.file).await?;

    let mut session = WatermarkSession::new();
    session.select_document(document);
    session.set_text(&args.text);
    session.set_font_color(if args.color.trim().is_empty() {
        HexColor { r: 0, g: 0, b: 0 }
    } else {
        args.color.parse::<HexColor>()?
    });
    session.set_rotation(args.rotation);
    session.set_position(args.position);
    session.set_font_family(args.font);
    session.set_page_range(PageSelection::from(args.pages.clone()));
    session.edit_font_size(&args.font_size);
    session.edit_opacity(&args.opacity);

    let definition = session.definition();
    info!(
        "Stamping '{}' ({} pt, {}, {}% opacity) on pages: {}",
        definition.text_config.text,
        definition.text_config.font_size,
        definition.text_config.font_color,
        definition.text_config.opacity_percent(),
        String::from(definition.page_range.clone())
    );

    ctx.prepare_output_dir().await?;
    session.output_mut().set_directory(&ctx.output_dir);
    session.output_mut().set_filename(&args.filename);

    let executor = ctx.executor();
    let manifest = session
        .execute(&executor, &cancel_on_interrupt(), ctx.force)
        .await?;
    report(&manifest, args.json_output.as_ref()).await
}

async fn handle_check_range_command(args: &CheckRangeArgs) -> Result<()> {
    let total_pages = match (&args.file, args.pages) {
        (Some(file), _) => metadata(file).await?.total_pages,
        (None, Some(pages)) => pages,
        (None, None) => {
            return Err(PdfWizardError::InvalidArgument {
                reason: "either --pages or --file is required".to_string(),
            })
        }
    };

    let pages = PageRangeParser::parse(&args.expression, total_pages)?;
    println!("\n=== Range '{}' ===", args.expression);
    println!("Document pages: {}", total_pages);
    println!("Selected pages: {}", pages.len());
    println!("Canonical form: {}", pages);
    Ok(())
}

async fn handle_config_command(args: &ConfigArgs, ctx: AppContext) -> Result<()> {
    let AppContext {
        mut config,
        config_path,
        ..
    } = ctx;

    match &args.action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigAction::Path => println!("{}", config_path.display()),
        ConfigAction::SetLanguage { code } => {
            config.set_language(code)?;
            config.save(&config_path)?;
            info!("Language set to {}", config.language);
        }
        ConfigAction::SetOutputDir { dir } => {
            config.default_output_dir = dir.clone();
            config.save(&config_path)?;
            match dir {
                Some(dir) => info!("Default output directory set to {}", dir.display()),
                None => info!("Default output directory cleared"),
            }
        }
    }
    Ok(())
}

fn preview(lines: &[String]) {
    info!("Planned {} operation(s):", lines.len());
    for (idx, line) in lines.iter().enumerate() {
        info!("  {}: {}", idx + 1, line);
    }
}

fn report_problems<D: Validate + PageSpan>(definitions: &[D], total_pages: u32) {
    for (id, problem) in OperationListPlanner::problems(definitions, total_pages) {
        warn!("Range #{} is invalid: {}", id, problem);
    }
}
