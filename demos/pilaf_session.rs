//! End-to-end PILAF session.
//!
//! Demonstrates:
//! - Building a client against a bot bridge
//! - Queueing commands before login
//! - Observing chat, health and end events
//! - Fire-and-forget item commands and a correlated command
//! - Inventory checks by friendly slot name
//!
//! Usage:
//!   cargo run --example pilaf_session
//!   cargo run --example pilaf_session -- --scripted
//!   cargo run --example pilaf_session -- --bridge ws://localhost:3000 --username Steve
//!   cargo run --example pilaf_session -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use pilaf_client::transport::bridge::DEFAULT_BRIDGE_URL;
use pilaf_client::{
    BridgeTransport, Client, ClientOptions, EventKind, ItemStack, Result, ScriptedTransport,
    SessionEvent, SessionTransport,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    scripted: bool,
    bridge: String,
    host: String,
    port: u16,
    username: String,
}

impl Args {
    /// Parse command-line arguments.
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            scripted: args.iter().any(|a| a == "--scripted"),
            bridge: value("--bridge").unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string()),
            host: value("--host").unwrap_or_else(|| "localhost".to_string()),
            port: value("--port").and_then(|p| p.parse().ok()).unwrap_or(25565),
            username: value("--username").unwrap_or_else(|| "pilaf_test_player".to_string()),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== PILAF Session ===\n");

    // ========================================================================
    // Build Client
    // ========================================================================

    println!("[1] Building client...");
    let transport: Arc<dyn SessionTransport> = if args.scripted {
        println!("    Transport: scripted (offline)");
        Arc::new(scripted_server())
    } else {
        println!("    Transport: bridge at {}", args.bridge);
        Arc::new(BridgeTransport::new(&args.bridge)?)
    };

    let client = Client::builder()
        .host(&args.host)
        .port(args.port)
        .username(&args.username)
        .options(ClientOptions::new().with_command_timeout(Duration::from_secs(5)))
        .shared_transport(transport)
        .build()?;
    println!("    ✓ {}\n", client.identity());

    client.subscribe(EventKind::Chat, |event| {
        if let SessionEvent::Chat { sender, message } = event {
            println!("    [chat] <{sender}> {message}");
        }
    });
    client.subscribe(EventKind::Health, |event| {
        if let SessionEvent::Health(vitals) = event {
            println!("    [health] {:.1} hp, {:.0} food", vitals.health, vitals.food);
        }
    });
    client.subscribe(EventKind::End, |event| {
        if let SessionEvent::End { reason } = event {
            println!("    [end] {reason}");
        }
    });

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[2] Queueing setup commands and connecting...");
    client.queue_command("time set day");
    client.queue_command("weather clear");
    client.connect().await?;
    println!("    ✓ Connected ({})\n", client.state());

    // ========================================================================
    // Items
    // ========================================================================

    println!("[3] Giving and equipping items...");
    client.give_item("dragon_egg", 1)?;
    client.equip_item("shield", "offhand")?;
    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("    Offhand shield: {}", client.has_item("shield", "offhand"));
    println!("    Dragon egg anywhere: {}", client.has_item("dragon_egg", "any"));
    for item in client.get_inventory() {
        println!("    - {} x{} ({})", item.display_name, item.count, item.item_type);
    }
    println!();

    // ========================================================================
    // Correlated Command
    // ========================================================================

    println!("[4] Executing ability command...");
    match client.execute_command("ability 1").await {
        Ok(reply) => println!("    ✓ Acknowledged: {reply}\n"),
        Err(e) if e.is_timeout() => println!("    ✗ No acknowledgement: {e}\n"),
        Err(e) => return Err(e),
    }

    if let Some(position) = client.get_position() {
        println!("    Position: {position}\n");
    }

    // ========================================================================
    // Disconnect
    // ========================================================================

    println!("[5] Disconnecting...");
    client.disconnect();
    println!("    ✓ {}\n", client.state());

    println!("=== Done ===");
    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "pilaf_client=debug"
    } else {
        "pilaf_client=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Offline stand-in for a game server.
fn scripted_server() -> ScriptedTransport {
    let transport = ScriptedTransport::new()
        .with_auto_establish()
        .reply_to("give", "", "Gave 1 [Dragon Egg] to pilaf_test_player")
        .reply_to("replaceitem", "", "Replaced a slot on pilaf_test_player with [Shield]")
        .reply_to("ability", "Server", "Lightning ability activated!");
    transport.set_slot(36, Some(ItemStack::new("dragon_egg", 1, "Dragon Egg")));
    transport.set_slot(45, Some(ItemStack::new("shield", 1, "Shield")));
    transport.set_position(pilaf_client::Position::new(0, 64, 0));
    transport
}
