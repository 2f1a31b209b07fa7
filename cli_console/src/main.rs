use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use game_runtime::{Keyboard, MessageId, OutboundFrame};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Tide Pet chat console", long_about = None)]
struct Cli {
    /// Address of the game server's chat endpoint.
    #[arg(long, default_value = "127.0.0.1:41100")]
    server: String,
    /// Telegram-style user id to play as.
    #[arg(long, default_value_t = 1)]
    user: u64,
}

/// Last screen the server showed, so numbered input can press its buttons.
#[derive(Debug, Default)]
struct ScreenState {
    message_id: Option<MessageId>,
    buttons: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    let cli = Cli::parse();
    loop {
        match TcpStream::connect(&cli.server).await {
            Ok(stream) => {
                info!("Connected to {} as user {}", cli.server, cli.user);
                println!("Type /start to begin, a button number to press it, or `ad_viewed <id>`.");
                match run_session(stream, cli.user).await {
                    Ok(()) => break,
                    Err(err) => {
                        warn!("Connection error: {}", err);
                        info!("Reconnecting in 2 seconds...");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
            Err(err) => {
                warn!("Failed to connect: {}", err);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
    Ok(())
}

/// Runs until stdin closes (`Ok`) or the server connection drops (`Err`).
async fn run_session(stream: TcpStream, user: u64) -> Result<()> {
    let (read_half, write_half) = stream.into_split();
    let screen = Arc::new(Mutex::new(ScreenState::default()));
    let mut frames = tokio::spawn(print_frames(read_half, Arc::clone(&screen)));
    let mut input = tokio::spawn(forward_input(write_half, user, screen));

    tokio::select! {
        finished = &mut frames => {
            input.abort();
            finished??;
            Err(color_eyre::eyre::eyre!("server closed the connection"))
        }
        finished = &mut input => {
            frames.abort();
            finished?
        }
    }
}

async fn print_frames(read_half: OwnedReadHalf, screen: Arc<Mutex<ScreenState>>) -> Result<()> {
    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        let frame = match OutboundFrame::from_line(&line) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Unreadable frame from server: {}", err);
                continue;
            }
        };
        match frame {
            OutboundFrame::Message {
                message_id,
                text,
                keyboard,
                ..
            }
            | OutboundFrame::Edit {
                message_id,
                text,
                keyboard,
                ..
            } => {
                let mut screen = screen.lock().await;
                screen.message_id = Some(message_id);
                screen.buttons = keyboard.buttons().map(|b| b.data.clone()).collect();
                println!("\n{text}");
                print_keyboard(&keyboard);
            }
            OutboundFrame::CallbackAnswer { callback_id } => {
                debug!(%callback_id, "callback.answered");
            }
        }
    }
    Ok(())
}

fn print_keyboard(keyboard: &Keyboard) {
    for (index, button) in keyboard.buttons().enumerate() {
        println!("  [{}] {} ({})", index + 1, button.label, button.data);
    }
}

async fn forward_input(
    mut write_half: OwnedWriteHalf,
    user: u64,
    screen: Arc<Mutex<ScreenState>>,
) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let outbound = outbound_line(line, user, &*screen.lock().await);
        debug!(line = %outbound.trim_end(), "console.send");
        write_half.write_all(outbound.as_bytes()).await?;
    }
    Ok(())
}

/// Builds the protocol line for one console input.
fn outbound_line(input: &str, user: u64, screen: &ScreenState) -> String {
    if input.starts_with("ad_viewed ") {
        return format!("{input}\n");
    }
    if input.starts_with('/') {
        return format!("{user} {input}\n");
    }
    let data = input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| screen.buttons.get(index))
        .map(String::as_str)
        .unwrap_or(input);
    match screen.message_id {
        Some(MessageId(id)) => format!("{user} #{id} {data}\n"),
        None => format!("{user} {data}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> ScreenState {
        ScreenState {
            message_id: Some(MessageId(7)),
            buttons: vec!["collect".to_string(), "feed".to_string()],
        }
    }

    #[test]
    fn numbers_press_buttons_on_the_last_message() {
        assert_eq!(outbound_line("2", 42, &screen()), "42 #7 feed\n");
        assert_eq!(outbound_line("shop", 42, &screen()), "42 #7 shop\n");
        assert_eq!(outbound_line("9", 42, &screen()), "42 #7 9\n");
    }

    #[test]
    fn commands_and_ad_confirmations_pass_through() {
        assert_eq!(outbound_line("/start", 42, &screen()), "42 /start\n");
        assert_eq!(outbound_line("ad_viewed ad-3", 42, &screen()), "ad_viewed ad-3\n");
        assert_eq!(outbound_line("collect", 42, &ScreenState::default()), "42 collect\n");
    }
}
