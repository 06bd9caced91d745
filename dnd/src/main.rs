//! D&D dice roller.
//!
//! Runs the `!roll` / `!character` / `!macro` / `!variable` command set on
//! stdin, storing characters in `cache.json` under `DND_ROLLER_STORAGE`
//! (or `--storage`).
//!
//! ```bash
//! cargo run -p dnd -- --user 4242 --name Ana
//! ```

mod headless;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so replies on stdout stay clean.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dnd=info,dnd_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = headless::parse_config_from_args(&args);
    headless::run_headless(config).await
}

fn print_help() {
    println!("D&D Roller - D&D 5e checks, saves and macros for chat");
    println!();
    println!("USAGE:");
    println!("  dnd [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --storage <DIR>     Directory holding cache.json (default: $DND_ROLLER_STORAGE or .)");
    println!("  --guild <ID>        Guild to speak in (default: None, a direct message)");
    println!("  --user <ID>         User id to speak as (default: local)");
    println!("  --name <NAME>       Display name (default: Adventurer)");
    println!();
    println!("ENVIRONMENT:");
    println!("  DND_ROLLER_STORAGE  Storage directory, also read from .env");
    println!("  RUST_LOG            Log filter (default: dnd=info,dnd_core=info)");
    println!();
    println!("EXAMPLES:");
    println!("  dnd --name Ana");
    println!("  echo '!r 1d20+5 adv' | dnd --storage /tmp/rolls");
}
