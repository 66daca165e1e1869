use anyhow::{bail, Result};
use std::fs::{self, OpenOptions};
use std::sync::Arc;

use relief_core::{
    config::{self, AppConfig},
    models::{ResourceCategory, ResourceDraft, ResourceStatus, ResourceType},
    AuthError, EventBus, HttpIdentityService, PartitionChange, ResourceStore, SessionHolder,
    Storage, StoreWatcher,
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;

    let storage = Storage::new(&config.store_root);
    let events = EventBus::new();
    let store = ResourceStore::open(storage.clone(), events.clone());

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("watch") => watch(&config, storage, store, events).await,
        Some("list") => list(&store),
        Some("responses") => responses(&store, &args[1..]),
        Some("post") => post(&store, &args[1..]),
        Some("status") => status(&store, &args[1..]),
        Some("whoami") => whoami(&config, storage, events),
        Some(other) => bail!(
            "unknown command `{other}`; expected list, post, status, responses, whoami or watch"
        ),
    }
}

/// Tail partition changes and store events until interrupted.
async fn watch(
    config: &AppConfig,
    storage: Storage,
    store: ResourceStore,
    events: EventBus,
) -> Result<()> {
    let identity = Arc::new(HttpIdentityService::new(
        &config.identity.base_url,
        &config.identity.api_key,
    ));
    let holder = SessionHolder::new(storage.clone(), identity, events.clone());

    fs::create_dir_all(storage.root())?;
    let (mut changes, _watcher) = StoreWatcher::new(storage.root()).spawn()?;
    let mut bus = events.subscribe();
    tracing::info!("watching {}", storage.root().display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => {
                let Some(change) = change else { break };
                match &change {
                    PartitionChange::Session => holder.reload(),
                    other => store.apply_change(other),
                }
                tracing::info!("partition changed: {change:?}");
            }
            event = bus.recv() => {
                if let Ok(event) = event {
                    println!("event: {event:?}");
                }
            }
        }
    }
    Ok(())
}

fn list(store: &ResourceStore) -> Result<()> {
    for resource in store.resources() {
        let kind = format!("{:?}", resource.kind).to_lowercase();
        let category = format!("{:?}", resource.category).to_lowercase();
        let status = resource
            .status
            .map(|status| format!("{status:?}").to_lowercase())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>14}  {:<5} {:<8} {:<10} {}  {}",
            resource.id,
            kind,
            category,
            status,
            resource.created_at.format("%Y-%m-%d %H:%M"),
            resource.display_name(),
        );
    }
    Ok(())
}

fn responses(store: &ResourceStore, args: &[String]) -> Result<()> {
    let Some(user_id) = args.first() else {
        bail!("usage: relief responses <user-id>");
    };
    for response in store.responses_for(user_id) {
        println!(
            "{:>14}  -> {:<14} {:<8} {}",
            response.id,
            response.request_id,
            format!("{:?}", response.status).to_lowercase(),
            response.title,
        );
    }
    Ok(())
}

fn post(store: &ResourceStore, args: &[String]) -> Result<()> {
    let [kind, category, title, description, location] = args else {
        bail!("usage: relief post <need|offer> <category> <title> <description> <location>");
    };
    let draft = ResourceDraft {
        kind: parse_kind(kind)?,
        category: parse_category(category)?,
        title: title.clone(),
        description: description.clone(),
        location: location.clone(),
        ..ResourceDraft::default()
    };
    let record = store.add_resource(draft)?;
    println!("posted {} ({})", record.display_name(), record.id);
    Ok(())
}

fn status(store: &ResourceStore, args: &[String]) -> Result<()> {
    let [id, status] = args else {
        bail!("usage: relief status <resource-id> <pending|addressing|resolved>");
    };
    match store.update_resource_status(id, parse_status(status)?)? {
        Some(updated) => {
            println!("{} is now {status}", updated.display_name());
            Ok(())
        }
        None => bail!("no resource with id {id}"),
    }
}

fn whoami(config: &AppConfig, storage: Storage, events: EventBus) -> Result<()> {
    let identity = Arc::new(HttpIdentityService::new(
        &config.identity.base_url,
        &config.identity.api_key,
    ));
    let holder = SessionHolder::new(storage, identity, events);
    match holder.current() {
        Some(profile) => {
            let role = format!("{:?}", profile.role).to_lowercase();
            println!("{} <{}> ({role})", profile.name, profile.email);
            Ok(())
        }
        None => {
            println!("{}", AuthError::NotSignedIn);
            Ok(())
        }
    }
}

fn parse_kind(value: &str) -> Result<ResourceType> {
    match value {
        "need" => Ok(ResourceType::Need),
        "offer" => Ok(ResourceType::Offer),
        other => bail!("unknown resource type `{other}`"),
    }
}

fn parse_category(value: &str) -> Result<ResourceCategory> {
    Ok(match value {
        "water" => ResourceCategory::Water,
        "shelter" => ResourceCategory::Shelter,
        "food" => ResourceCategory::Food,
        "supplies" => ResourceCategory::Supplies,
        "medical" => ResourceCategory::Medical,
        "safety" => ResourceCategory::Safety,
        other => bail!("unknown category `{other}`"),
    })
}

fn parse_status(value: &str) -> Result<ResourceStatus> {
    Ok(match value {
        "pending" => ResourceStatus::Pending,
        "addressing" => ResourceStatus::Addressing,
        "resolved" => ResourceStatus::Resolved,
        other => bail!("unknown status `{other}`"),
    })
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("relief.log");

    let env_filter = EnvFilter::from_default_env();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
