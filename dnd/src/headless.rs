//! Headless mode for the roller.
//!
//! Reads chat messages from stdin, one per line, and prints the roller's
//! replies. Useful for trying commands without a chat platform and for
//! scripted testing.

use anyhow::Context;
use dnd_core::persist::DIRECT_MESSAGE_GUILD;
use dnd_core::{Roller, RollerConfig};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::info;

/// Who is talking, and where the characters live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Overrides the storage directory from the environment.
    pub storage: Option<PathBuf>,
    pub guild: String,
    pub user: String,
    pub name: String,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            storage: None,
            guild: DIRECT_MESSAGE_GUILD.to_string(),
            user: "local".to_string(),
            name: "Adventurer".to_string(),
        }
    }
}

fn print_local_help() {
    println!("[HELP]");
    println!("  #quit          - Exit");
    println!("  #user <id>     - Speak as another user");
    println!("  #guild <id>    - Move to another guild");
    println!("  #name <name>   - Change your display name");
    println!("  #whoami        - Show who you are speaking as");
    println!("  #help          - Show this help");
    println!("  (anything else is sent to the roller, try !help)");
}

/// Run the roller on stdin.
///
/// Lines starting with `#` are local commands; everything else is handed to
/// the roller exactly as a chat message would be.
pub async fn run_headless(mut config: HeadlessConfig) -> anyhow::Result<()> {
    let mut roller_config = RollerConfig::from_env();
    if let Some(storage) = config.storage.take() {
        roller_config = roller_config.with_storage_dir(storage);
    }
    let store = roller_config.store_path();
    let roller = Roller::open(roller_config)
        .await
        .with_context(|| format!("Failed to open character store {}", store.display()))?;
    info!(store = %store.display(), "roller ready");

    println!("=== D&D Roller Headless Mode ===");
    println!("Speaking as {} ({}) in guild {}", config.name, config.user, config.guild);
    println!("Type !help for roller commands or #help for local ones.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.as_slice() {
                ["quit" | "exit", ..] => {
                    println!("Goodbye!");
                    break;
                }
                ["user", id] => {
                    config.user = id.to_string();
                    println!("[OK] Now speaking as user {id}");
                }
                ["guild", id] => {
                    config.guild = id.to_string();
                    println!("[OK] Now in guild {id}");
                }
                ["name", name @ ..] if !name.is_empty() => {
                    config.name = name.join(" ");
                    println!("[OK] Display name is now {}", config.name);
                }
                ["whoami", ..] => {
                    println!("[STATUS] {} ({}) in guild {}", config.name, config.user, config.guild);
                }
                ["help", ..] => print_local_help(),
                _ => println!("[ERROR] Unknown command. Type #help for help."),
            }
            stdout.flush().ok();
            continue;
        }

        match roller.handle(&config.guild, &config.user, &config.name, line).await {
            Ok(Some(reply)) => println!("{reply}\n"),
            Ok(None) => {}
            Err(e) => println!("[ERROR] {e}"),
        }
        stdout.flush().ok();
    }

    Ok(())
}

/// Parse the speaker and storage options from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> HeadlessConfig {
    let mut config = HeadlessConfig::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--storage" => {
                if let Some(dir) = args.get(i + 1) {
                    config.storage = Some(PathBuf::from(dir));
                    i += 1;
                }
            }
            "--guild" => {
                if let Some(guild) = args.get(i + 1) {
                    config.guild = guild.clone();
                    i += 1;
                }
            }
            "--user" => {
                if let Some(user) = args.get(i + 1) {
                    config.user = user.clone();
                    i += 1;
                }
            }
            "--name" => {
                if let Some(name) = args.get(i + 1) {
                    config.name = name.clone();
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_defaults() {
        let config = parse_config_from_args(&args("dnd"));
        assert_eq!(config, HeadlessConfig::default());
        assert_eq!(config.guild, "None");
    }

    #[test]
    fn test_all_flags() {
        let config = parse_config_from_args(&args(
            "dnd --storage /tmp/rolls --guild 77 --user 4242 --name Ana",
        ));
        assert_eq!(config.storage, Some(PathBuf::from("/tmp/rolls")));
        assert_eq!(config.guild, "77");
        assert_eq!(config.user, "4242");
        assert_eq!(config.name, "Ana");
    }

    #[test]
    fn test_flag_without_value_is_ignored() {
        let config = parse_config_from_args(&args("dnd --user 4242 --name"));
        assert_eq!(config.user, "4242");
        assert_eq!(config.name, "Adventurer");
    }
}
