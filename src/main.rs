mod cli;

use assetforged::{config, profiles::Profiles, server, transform::tools};
use assetforged_common::AttachmentId;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "assetforged=trace,assetforged_db=debug,assetforged_common=debug,tower_http=debug"
                .to_string()
        } else {
            "assetforged=info,assetforged_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(host, port, config_path))
        }
        Commands::Import {
            file,
            parent,
            title,
            location,
            id,
        } => match id {
            Some(id) => replace_file(config_path, &file, &id),
            None => import_file(
                config_path,
                &file,
                parent.as_deref(),
                title.as_deref(),
                location.as_deref(),
            ),
        },
        Commands::Variant { id, profile } => resolve_variant(config_path, &id, &profile),
        Commands::Profiles => list_profiles(config_path),
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
    }
}

async fn serve(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting assetforged server");
    tracing::info!("Data directory: {:?}", config.storage.data_dir);

    let ctx = server::AppContext::from_config(config)?;
    server::start_server(ctx).await
}

fn import_file(
    config_path: Option<&Path>,
    file: &Path,
    parent: Option<&str>,
    title: Option<&str>,
    location: Option<&str>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = server::AppContext::from_config(config)?;

    let parent = parent
        .map(str::parse::<AttachmentId>)
        .transpose()
        .context("Invalid parent id")?;

    let att = ctx
        .import(file, parent, title, location)
        .with_context(|| format!("Failed to import {:?}", file))?;

    println!("{}", att.id);
    Ok(())
}

fn replace_file(config_path: Option<&Path>, file: &Path, id: &str) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = server::AppContext::from_config(config)?;

    let id: AttachmentId = id.parse().context("Invalid attachment id")?;
    let att = ctx
        .replace(id, file)
        .with_context(|| format!("Failed to replace {} with {:?}", id, file))?;

    println!("{} {}", att.id, att.formatted_revision());
    Ok(())
}

fn resolve_variant(config_path: Option<&Path>, id: &str, profile: &str) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = server::AppContext::from_config(config)?;

    let id: AttachmentId = id.parse().context("Invalid attachment id")?;
    let variant = ctx
        .variants
        .resolve(id, profile)
        .with_context(|| format!("Failed to resolve {} of {}", profile, id))?;

    println!("{} {} {}", variant.id, variant.formatted_revision(), variant.size);
    Ok(())
}

fn list_profiles(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let profiles = Profiles::from_config(&config.profiles)?;

    if profiles.is_empty() {
        println!("No profiles configured");
        return Ok(());
    }

    for profile in profiles.iter() {
        let (width, height) = profile.declared_size();
        let filters: Vec<String> = profile.filters().iter().map(ToString::to_string).collect();
        println!(
            "{} {}x{} [{}]",
            profile.name(),
            width,
            height,
            filters.join(", ")
        );
    }

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking transform tools...\n");

    let tools = tools::check_tools();
    let any_ok = tools.iter().any(|t| t.available);

    for tool in &tools {
        let status = if tool.available { "✓" } else { "✗" };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if any_ok {
        println!("ImageMagick is available; the imagemagick backend can be used.");
    } else {
        println!("ImageMagick not found; only the native backend is available.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Data directory: {:?}", config.storage.data_dir);
            println!("  Backend: {:?}", config.transform.backend);
            println!("  Passthrough: {}", config.delivery.passthrough);
            println!("  Cache redirect: {}", config.delivery.cache);
            println!("  Profiles: {}", config.profiles.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
