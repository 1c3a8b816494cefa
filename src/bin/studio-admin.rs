use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use studio_booking::{
    auth::hash_password,
    provision::{self, Access, ACCESS},
    store::{collections, CollectionProbe, ListOptions, PocketBaseClient, Sort},
};

#[derive(Parser)]
#[command(
    name = "studio-admin",
    about = "Maintenance tasks for the studio's PocketBase backend",
    version,
    propagate_version = true
)]
struct Cli {
    /// PocketBase base URL
    #[arg(long, env = "POCKETBASE_URL", global = true)]
    url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping the health endpoint and read one public collection
    Health,
    /// Check that every collection exists with the expected visibility
    VerifySchema,
    /// Check that the users collection exists and is protected
    VerifyUsers,
    /// Fetch media_gallery with and without a sort to isolate rule or index problems
    DebugFetch,
    /// Apply the access rules to every collection.
    ///
    /// Requires superuser credentials, not a regular user account.
    FixRules {
        #[arg(long, env = "PB_SUPERUSER_EMAIL")]
        email: String,
        #[arg(long, env = "PB_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Print an argon2 hash suitable for ADMIN_PASSWORD_HASH
    HashPassword { password: String },
}

fn client(url: Option<&str>) -> anyhow::Result<PocketBaseClient> {
    let url = url.context("--url or POCKETBASE_URL is required")?;
    PocketBaseClient::new(url).with_context(|| format!("building client for {url}"))
}

async fn health(client: &PocketBaseClient) -> anyhow::Result<()> {
    println!("Checking connection to {}", client.base_url());
    let status = client.health().await.context("health check failed")?;
    println!("✓ health: {} ({})", status.message, status.code);
    match client.probe_collection(collections::SERVICES).await {
        CollectionProbe::Public { total_items } => {
            println!("✓ services readable, {total_items} items")
        }
        probe => println!("⚠ services: {}", provision::describe_probe(&probe)),
    }
    Ok(())
}

async fn verify_schema(client: &PocketBaseClient) -> anyhow::Result<()> {
    println!("Checking collections on {}\n", client.base_url());
    let names: Vec<&str> = ACCESS.iter().map(|(name, _)| *name).collect();
    let mut problems = 0;
    for ((name, probe), (_, access)) in provision::probe_all(client, &names)
        .await
        .into_iter()
        .zip(ACCESS)
    {
        let ok = provision::probe_matches_access(&probe, *access);
        if !ok {
            problems += 1;
        }
        let mark = if ok { "✓" } else { "✗" };
        println!("{mark} {name:<20} {}", provision::describe_probe(&probe));
    }
    if problems > 0 {
        bail!("{problems} collection(s) missing or with unexpected visibility");
    }
    Ok(())
}

async fn verify_users(client: &PocketBaseClient) -> anyhow::Result<()> {
    let probe = client.probe_collection(collections::USERS).await;
    println!("users: {}", provision::describe_probe(&probe));
    if !provision::probe_matches_access(&probe, Access::Owner) {
        bail!("users collection is not protected as expected");
    }
    Ok(())
}

async fn debug_fetch(client: &PocketBaseClient) -> anyhow::Result<()> {
    let attempts = [
        ("media_gallery without sort", collections::MEDIA_GALLERY, ListOptions::new()),
        (
            "media_gallery sorted by -created",
            collections::MEDIA_GALLERY,
            ListOptions::new().sort(Sort::desc("created")),
        ),
        ("services", collections::SERVICES, ListOptions::new()),
    ];
    for (label, collection, options) in attempts {
        match client.list_page(collection, 1, 1, &options).await {
            Ok(page) => println!(
                "✓ {label}: {} item(s) of {}",
                page.items.len(),
                page.total_items
            ),
            Err(err) => println!("✗ {label}: {err}"),
        }
    }
    Ok(())
}

async fn fix_rules(client: &PocketBaseClient, email: &str, password: &str) -> anyhow::Result<()> {
    client
        .auth_with_password(email, password)
        .await
        .context("superuser login failed; check PB_SUPERUSER_EMAIL and PB_SUPERUSER_PASSWORD")?;
    println!("✓ logged in as {email}");

    let mut failed = 0;
    for (name, result) in provision::fix_rules(client).await {
        match result {
            Ok(()) => println!("✓ rules applied to {name}"),
            Err(err) => {
                failed += 1;
                println!("✗ {name}: {err}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} collection(s) could not be updated");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let url = cli.url.as_deref();

    match cli.command {
        Commands::Health => health(&client(url)?).await,
        Commands::VerifySchema => verify_schema(&client(url)?).await,
        Commands::VerifyUsers => verify_users(&client(url)?).await,
        Commands::DebugFetch => debug_fetch(&client(url)?).await,
        Commands::FixRules { email, password } => {
            fix_rules(&client(url)?, &email, &password).await
        }
        Commands::HashPassword { password } => {
            let hash = hash_password(&password).map_err(|err| anyhow::anyhow!("{err}"))?;
            println!("{hash}");
            Ok(())
        }
    }
}
