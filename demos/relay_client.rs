//! Terminal chat client example
//!
//! Run with: cargo run --example relay_client -- --username alice [OPTIONS]
//!
//! Type a line and press enter to send it. Other commands:
//!   /file <path>   send a file
//!   /quit          leave the chat
//!
//! Files received from others are written to `--download-dir`.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use chat_relay::client::{read_attachment, save_attachment};
use chat_relay::{ChatClient, ClientConfig, Frame};

#[derive(Debug, Parser)]
#[command(name = "relay_client", about = "Group chat relay client")]
struct Args {
    /// Name to log in with
    #[arg(short, long)]
    username: String,

    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:9999")]
    server: String,

    /// Where received files are saved
    #[arg(long, default_value = "downloads")]
    download_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=info".parse()?)
                .add_directive("relay_client=info".parse()?),
        )
        .init();

    let mut client = ChatClient::connect(ClientConfig::new(args.server, args.username)).await?;
    println!("Connected as {}. Type /quit to leave.", client.username());

    // Saving files is async; hand them to a separate task
    let (file_tx, mut file_rx) = mpsc::unbounded_channel::<(String, String, bytes::Bytes)>();
    let download_dir = args.download_dir;
    tokio::spawn(async move {
        while let Some((from, filename, contents)) = file_rx.recv().await {
            match save_attachment(&download_dir, &filename, &contents).await {
                Ok(path) => println!("[{}] sent a file, saved to {}", from, path.display()),
                Err(e) => eprintln!("Could not save {} from {}: {}", filename, from, e),
            }
        }
    });

    let receiver = client.on_frame(move |frame| match frame {
        Frame::Text { username, body } => {
            println!("[{}] {}", username, String::from_utf8_lossy(&body));
        }
        Frame::File {
            username,
            filename,
            contents,
        } => {
            if filename.is_empty() {
                println!("[{}] sent an empty file message", username);
            } else {
                let _ = file_tx.send((username, filename, contents));
            }
        }
        Frame::Alert { text } => println!("* {}", text),
        Frame::Login { .. } => {}
    })?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();

                if line == "/quit" {
                    break;
                } else if let Some(path) = line.strip_prefix("/file ") {
                    match read_attachment(path.trim()).await {
                        Ok(attachment) => {
                            let name = attachment.filename.clone();
                            match client.send_file(attachment.filename, attachment.contents).await {
                                Ok(()) => {}
                                Err(chat_relay::Error::MalformedFrame(e)) => {
                                    eprintln!("Could not send {}: {}", name, e);
                                }
                                Err(e) => return Err(e.into()),
                            }
                        }
                        Err(e) => eprintln!("Could not read {}: {}", path.trim(), e),
                    }
                } else if !line.is_empty() {
                    client.send_text(line.to_owned()).await?;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await?;
    let _ = receiver.await;
    println!("Bye.");

    Ok(())
}
