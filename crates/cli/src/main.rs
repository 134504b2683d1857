//! Lavande CLI - Terminal client for the Lavande storefront.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! lavande products --search "ao khoac" --limit 5
//!
//! # Sign in (the session is stored under LAVANDE_DATA_DIR)
//! lavande login -e me@example.com -p secret
//!
//! # Interactive shopping session: cart, promo codes, checkout
//! lavande shop
//!
//! # Follow an order until it is delivered
//! lavande track DH102938 --watch
//! ```
//!
//! # Commands
//!
//! - `products` / `product` / `top-rated` - Catalog browsing
//! - `register` / `login` / `logout` / `whoami` / `change-password` - Account
//! - `shop` - Interactive cart and checkout (cash or VNPAY)
//! - `orders` / `track` / `set-status` - Order history and tracking
//! - `chat` - Ask the store's chat assistant

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use lavande_client::ClientConfig;
use lavande_client::api::catalog::ProductQuery;
use lavande_core::CategoryId;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "lavande")]
#[command(author, version, about = "Lavande storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the product catalog
    Products {
        /// Full-text search query
        #[arg(short, long)]
        search: Option<String>,

        /// Page number (1-based)
        #[arg(long)]
        page: Option<u32>,

        /// Page size
        #[arg(long)]
        limit: Option<u32>,

        /// Filter by category id
        #[arg(long)]
        category: Option<String>,

        /// Minimum price in đồng
        #[arg(long)]
        price_min: Option<i64>,

        /// Maximum price in đồng
        #[arg(long)]
        price_max: Option<i64>,
    },
    /// Show one product in full
    Product {
        /// Product id
        id: String,
    },
    /// Show the highest-rated products
    TopRated,
    /// Create an account
    Register {
        /// Display name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Phone number
        #[arg(long)]
        phone: String,

        /// Password (uppercase start, a special character, no spaces)
        #[arg(long)]
        password: String,
    },
    /// Sign in and store the session
    Login {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },
    /// Sign out and discard the stored session
    Logout,
    /// Change the signed-in account's password
    ChangePassword {
        /// Current password
        #[arg(long)]
        current: String,

        /// New password
        #[arg(long)]
        new: String,
    },
    /// Show the signed-in user
    Whoami,
    /// Interactive cart and checkout session
    Shop,
    /// List your orders
    Orders {
        /// List every order in the store (admin credential required)
        #[arg(long)]
        all: bool,
    },
    /// Find one order and show its delivery timeline
    Track {
        /// Order id, order number, or VNPAY transaction reference
        reference: String,

        /// Keep polling and print every status change
        #[arg(short, long)]
        watch: bool,

        /// Poll interval in seconds when watching
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Move an order to a new status (admin credential required)
    SetStatus {
        /// Order id
        order_id: String,

        /// One of: pending, processing, shipped, delivered, cancelled
        status: String,
    },
    /// Ask the store's chat assistant
    Chat {
        /// One-shot question; omit for an interactive session
        question: Option<String>,
    },
}

fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ClientConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Initialize tracing with EnvFilter and Sentry integration
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lavande_cli=info,lavande_client=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = commands::CommandContext::init(config).await?;

    match cli.command {
        Commands::Products {
            search,
            page,
            limit,
            category,
            price_min,
            price_max,
        } => {
            let query = ProductQuery {
                page,
                limit,
                price_min,
                price_max,
                status: None,
                category: category.map(CategoryId::new),
                search_text: search,
            };
            commands::catalog::products(&ctx, &query).await?;
        }
        Commands::Product { id } => commands::catalog::product(&ctx, &id).await?,
        Commands::TopRated => commands::catalog::top_rated(&ctx).await?,
        Commands::Register {
            username,
            email,
            phone,
            password,
        } => commands::account::register(&ctx, &username, &email, &phone, &password).await?,
        Commands::Login { email, password } => {
            commands::account::login(&ctx, &email, &password).await?;
        }
        Commands::Logout => commands::account::logout(&ctx).await?,
        Commands::ChangePassword { current, new } => {
            commands::account::change_password(&ctx, &current, &new).await?;
        }
        Commands::Whoami => commands::account::whoami(&ctx)?,
        Commands::Shop => commands::shop::run(&ctx).await?,
        Commands::Orders { all } => commands::orders::history(&ctx, all).await?,
        Commands::Track {
            reference,
            watch,
            interval,
        } => commands::orders::track(&ctx, &reference, watch, interval).await?,
        Commands::SetStatus { order_id, status } => {
            commands::orders::set_status(&ctx, &order_id, &status).await?;
        }
        Commands::Chat { question } => commands::chat::run(&ctx, question.as_deref()).await?,
    }
    Ok(())
}
