use clap::Parser;
use client::commands::{describe, Action, Session, HELP};
use client::network::Connection;
use log::{error, info};
use shared::{ClientEvent, User};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Opaque user id presented when joining rooms
    #[arg(short = 'u', long, default_value = "guest")]
    user_id: String,

    /// Name shown to other members
    #[arg(short = 'n', long, default_value = "guest")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    info!("Connecting to: {}", args.server);

    let connection = Connection::connect(&args.server).await?;
    let mut session = Session::new(User::new(args.user_id, args.name), connection.connection_id());
    let (mut reader, mut writer) = connection.into_split();

    // Frame reads are not cancel safe, so they get their own task
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            match reader.recv().await {
                Ok(Some(event)) => {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Connection error: {}", e);
                    break;
                }
            }
        }
    });

    println!("Type /help for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        session.apply(&event);
                        println!("{}", describe(&event, &session));
                    }
                    None => {
                        info!("Server closed the connection");
                        break;
                    }
                }
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    writer.send(&ClientEvent::Disconnect).await?;
                    break;
                };
                match session.parse(&line) {
                    Ok(Action::Send(event)) => {
                        writer.send(&event).await?;
                        session.sent(&event);
                    }
                    Ok(Action::Help) => println!("{}", HELP),
                    Ok(Action::Quit) => {
                        writer.send(&ClientEvent::Disconnect).await?;
                        break;
                    }
                    Ok(Action::Nothing) => {}
                    Err(e) => eprintln!("! {}", e),
                }
            },
        }
    }

    Ok(())
}
