//! Command parsing and execution.

use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use vestry_core::{ApiClient, Config, CredentialStore, SectionCache};

/// Environment variable that supplies the admin token without the keychain
const ACCESS_TOKEN_ENV: &str = "VESTRY_ACCESS_TOKEN";

/// Characters of the anon key shown by `vestry config`
const KEY_PREVIEW_CHARS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        sections: Vec<String>,
        placeholder: Option<String>,
    },
    List,
    Set {
        section: String,
        source: String,
    },
    Login,
    Logout,
    ShowConfig,
    InitConfig {
        project_url: String,
        anon_key: String,
    },
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        match name.as_str() {
            "get" => Self::parse_get(rest),
            "list" => Ok(Command::List),
            "set" => match rest {
                [section, source] => Ok(Command::Set {
                    section: section.clone(),
                    source: source.clone(),
                }),
                _ => bail!("set takes a section and a file (or - for stdin)"),
            },
            "login" => Ok(Command::Login),
            "logout" => Ok(Command::Logout),
            "config" => match rest {
                [] => Ok(Command::ShowConfig),
                [init, url, key] if init == "init" => Ok(Command::InitConfig {
                    project_url: url.clone(),
                    anon_key: key.clone(),
                }),
                _ => bail!("config takes no arguments or: init <project_url> <anon_key>"),
            },
            "help" | "-h" | "--help" => Ok(Command::Help),
            other => bail!("Unknown command: {}", other),
        }
    }

    fn parse_get(rest: &[String]) -> Result<Self> {
        let mut sections = Vec::new();
        let mut placeholder = None;
        let mut iter = rest.iter();
        while let Some(arg) = iter.next() {
            if arg == "--placeholder" {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--placeholder needs a value"))?;
                placeholder = Some(value.clone());
            } else {
                sections.push(arg.clone());
            }
        }
        if sections.is_empty() {
            bail!("get needs at least one section");
        }
        Ok(Command::Get {
            sections,
            placeholder,
        })
    }
}

pub async fn run(command: Command) -> Result<()> {
    match command {
        Command::Get {
            sections,
            placeholder,
        } => get_sections(&sections, placeholder.as_deref()).await,
        Command::List => list_sections().await,
        Command::Set { section, source } => set_section(&section, &source).await,
        Command::Login => login(),
        Command::Logout => logout(),
        Command::ShowConfig => show_config(),
        Command::InitConfig {
            project_url,
            anon_key,
        } => init_config(project_url, anon_key),
        Command::Help => Ok(()),
    }
}

fn load_config() -> Result<Config> {
    let config = Config::load()?;
    config.validate()?;
    Ok(config)
}

fn build_cache(config: &Config, client: ApiClient) -> SectionCache<ApiClient> {
    SectionCache::new(client).with_ttl(config.cache_ttl())
}

fn anon_client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(
        config.project_url()?,
        config.anon_key()?,
        config.request_timeout_secs,
    )
}

async fn get_sections(sections: &[String], placeholder: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let cache = build_cache(&config, anon_client(&config)?);

    let reads = sections.iter().map(|section| {
        let cache = &cache;
        async move {
            let content = match placeholder {
                Some(fallback) => cache.read_or(section, fallback).await,
                None => cache.read(section).await,
            };
            (section, content)
        }
    });
    let results = futures::future::join_all(reads).await;

    let multiple = results.len() > 1;
    for (section, content) in results {
        if multiple {
            println!("==> {} <==", section);
        }
        if content.is_empty() {
            eprintln!("(no content for {})", section);
        } else {
            println!("{}", content);
        }
    }

    let stats = cache.stats().await;
    debug!(
        hits = stats.hits,
        misses = stats.misses,
        errors = stats.fetch_errors,
        "Section cache stats"
    );
    Ok(())
}

async fn list_sections() -> Result<()> {
    let config = load_config()?;
    let cache = build_cache(&config, anon_client(&config)?);

    let records = cache
        .list_sections()
        .await
        .context("Failed to list sections")?;

    if records.is_empty() {
        println!("No sections stored");
        return Ok(());
    }

    let width = records.iter().map(|r| r.section.len()).max().unwrap_or(0);
    for record in &records {
        println!(
            "{:<width$}  {:>8} bytes  updated {}",
            record.section,
            record.html().len(),
            record.display_updated(),
            width = width
        );
    }
    Ok(())
}

fn read_source(source: &str) -> Result<String> {
    if source == "-" {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read content from stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))
    }
}

fn access_token(project_url: &str) -> Result<String> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Ok(token);
        }
    }
    CredentialStore::get_token(project_url)
        .context("No admin access token - run `vestry login` first")
}

async fn set_section(section: &str, source: &str) -> Result<()> {
    let config = load_config()?;
    let content = read_source(source)?;
    let token = access_token(config.project_url()?)?;

    let client = anon_client(&config)?.with_token(token);
    let cache = build_cache(&config, client);

    cache
        .write_and_invalidate(section, &content)
        .await
        .with_context(|| format!("Failed to update section {}", section))?;

    println!("Updated {} ({} bytes)", section, content.len());
    Ok(())
}

fn login() -> Result<()> {
    let config = load_config()?;
    let token = rpassword::prompt_password("Admin access token: ")?;
    let token = token.trim();
    if token.is_empty() {
        bail!("Access token required");
    }
    CredentialStore::store(config.project_url()?, token)?;
    println!("Stored access token for {}", config.project_url()?);
    Ok(())
}

fn logout() -> Result<()> {
    let config = load_config()?;
    let url = config.project_url()?;
    if !CredentialStore::has_token(url) {
        println!("No stored access token for {}", url);
        return Ok(());
    }
    CredentialStore::delete(url)?;
    println!("Removed access token for {}", url);
    Ok(())
}

fn mask(key: &str) -> String {
    let preview: String = key.chars().take(KEY_PREVIEW_CHARS).collect();
    format!("{}...", preview)
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    println!("Config file:     {}", Config::config_path()?.display());
    println!(
        "Project URL:     {}",
        config.project_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Anon key:        {}",
        config
            .anon_key
            .as_deref()
            .map(mask)
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("Cache TTL:       {}s", config.cache_ttl_secs);
    println!("Request timeout: {}s", config.request_timeout_secs);
    if let Err(e) = config.validate() {
        warn!(error = %e, "Configuration incomplete");
        println!("Status:          incomplete ({})", e);
    }
    Ok(())
}

fn init_config(project_url: String, anon_key: String) -> Result<()> {
    let mut config = Config::load_from(&Config::config_path()?)?;
    config.project_url = Some(project_url);
    config.anon_key = Some(anon_key);
    config.validate()?;
    config.save()?;
    println!("Wrote {}", Config::config_path()?.display());
    Ok(())
}
