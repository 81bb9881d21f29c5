use clap::Parser;
use client::game::{ClientState, LocalStats};
use client::input::{parse_command, Command, HELP};
use client::network::RoomClient;
use client::rendering::render;
use log::{info, warn};
use rand::Rng;
use shared::DEFAULT_PORT;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Room to join
    #[arg(short, long)]
    room: String,

    /// Player name; a random one is picked when omitted
    #[arg(short, long)]
    name: Option<String>,

    /// Starting level
    #[arg(short, long, default_value = "1")]
    level: u32,

    /// Starting gear
    #[arg(short, long, default_value = "0")]
    gear: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let name = args
        .name
        .unwrap_or_else(|| format!("player-{:04}", rand::thread_rng().gen_range(0..10_000)));

    info!("Connecting to: {}", args.server);
    let mut client = RoomClient::connect(&args.server).await?;
    let mut state = ClientState::new(name, args.room, LocalStats::new(args.level, args.gear));

    client.send(&state.request_join(None)).await?;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = client.next_event() => {
                let Some(message) = event else {
                    warn!("Server closed the connection");
                    break;
                };
                state.apply(&message);
                println!("{}", render(&state));
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed
                    if state.joined {
                        client.send(&state.leave()).await?;
                    }
                    break;
                };

                let Some(command) = parse_command(&line) else {
                    println!("Unknown command, type 'help'");
                    continue;
                };

                if !run_command(command, &mut client, &mut state).await? {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Applies one command. Returns false when the client should exit.
async fn run_command(
    command: Command,
    client: &mut RoomClient,
    state: &mut ClientState,
) -> Result<bool, Box<dyn std::error::Error>> {
    let stats_changed = match command {
        Command::LevelUp => {
            state.me.level_up();
            true
        }
        Command::LevelDown => {
            state.me.level_down();
            true
        }
        Command::GearUp => {
            state.me.gear_up();
            true
        }
        Command::GearDown => {
            state.me.gear_down();
            true
        }
        Command::Join(room) => {
            client.send(&state.request_join(room)).await?;
            false
        }
        Command::Leave => {
            if state.joined {
                client.send(&state.leave()).await?;
            }
            println!("{}", render(state));
            false
        }
        Command::Show => {
            println!("{}", render(state));
            false
        }
        Command::Help => {
            println!("{}", HELP);
            false
        }
        Command::Quit => {
            if state.joined {
                client.send(&state.leave()).await?;
            }
            return Ok(false);
        }
    };

    if stats_changed {
        if state.joined {
            client.send(&state.changes_message()).await?;
        }
        println!("{}", render(state));
    }

    Ok(true)
}
