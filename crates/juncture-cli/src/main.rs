//! Juncture CLI Client
//!
//! Interactive command-line client for Juncture servers.
//!
//! # Usage
//!
//! ```bash
//! # Connect to local server
//! juncture
//!
//! # Connect to remote server
//! juncture --url ws://example.com:3000
//!
//! # Execute single command
//! juncture -c 'set-state {"count": 3}'
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use futures_util::{SinkExt, Stream, StreamExt};
use juncture_protocol::{Frame, MAX_FRAME_SIZE};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Juncture Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "juncture")]
#[command(author, version, about = "Juncture CLI - command bridge client")]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:3000", env = "JUNCTURE_URL")]
    url: String,

    /// Execute command and exit
    #[arg(short, long)]
    command: Option<String>,

    /// Seconds to wait for the reply in single command mode
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Quiet mode (no banner)
    #[arg(short, long)]
    quiet: bool,
}

/// A line typed by the user
enum Input {
    Send(Frame),
    Help,
    Clear,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (ws, _) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {}", args.url))?;
    let (mut write, mut read) = ws.split();

    // Single command mode
    if let Some(line) = args.command {
        let frame = match parse_line(&line)? {
            Input::Send(frame) => frame,
            _ => bail!("Not a remote command: {}", line),
        };
        let command = frame.event.clone();
        write.send(Message::Text(frame.encode())).await?;

        let reply = wait_for_reply(&mut read, &command);
        let frame = tokio::time::timeout(Duration::from_secs(args.timeout), reply)
            .await
            .context("Timed out waiting for reply")??;
        if let Some((_, false)) = frame.reply_to() {
            std::process::exit(1);
        }
        return Ok(());
    }

    if !args.quiet {
        println!(
            "{}",
            format!(
                r#"
  Juncture CLI
  Connected to {}
  Type 'help' for usage, 'quit' to exit
"#,
                args.url
            )
            .cyan()
        );
    }

    // Interactive mode: readline blocks, so it runs on its own thread
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        if let Err(e) = read_lines(line_tx) {
            eprintln!("{} {}", "Error:".red(), e);
        }
    });

    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let line = match line {
                    Some(line) => line,
                    None => break,
                };
                match parse_line(&line) {
                    Ok(Input::Send(frame)) => {
                        write.send(Message::Text(frame.encode())).await?;
                    }
                    Ok(Input::Help) => print_help(),
                    Ok(Input::Clear) => print!("\x1B[2J\x1B[1;1H"),
                    Ok(Input::Quit) => break,
                    Err(e) => eprintln!("{} {}", "Error:".red(), e),
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match Frame::decode(&text, MAX_FRAME_SIZE) {
                        Ok(frame) => print_frame(&frame),
                        Err(e) => eprintln!("{} {}", "Bad frame:".red(), e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        eprintln!("{}", "Connection lost.".red());
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        eprintln!("{} {}", "Error:".red(), e);
                        break;
                    }
                }
            }
        }
    }

    let _ = write.send(Message::Close(None)).await;
    Ok(())
}

/// Print and return the first reply to `command`, skipping broadcasts
async fn wait_for_reply<S>(read: &mut S, command: &str) -> Result<Frame>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        if let Message::Text(text) = msg? {
            let frame = Frame::decode(&text, MAX_FRAME_SIZE)?;
            if matches!(frame.reply_to(), Some((cmd, _)) if cmd == command) {
                print_frame(&frame);
                return Ok(frame);
            }
        }
    }
    bail!("Connection closed before reply")
}

/// Line history file in the user's home directory
fn history_path() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".juncture_history"))
        .unwrap_or_default()
}

fn read_lines(tx: mpsc::UnboundedSender<String>) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = history_path();

    let _ = rl.load_history(&history);

    loop {
        let prompt = format!("{}> ", "juncture".green());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                let quit = matches!(line.to_lowercase().as_str(), "quit" | "exit");
                if tx.send(line).is_err() || quit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                let _ = rl.save_history(&history);
                return Err(err.into());
            }
        }
    }

    let _ = rl.save_history(&history);
    Ok(())
}

/// Parse `<command> [json-args]`. Arguments that are not JSON are sent as a string.
fn parse_line(line: &str) -> Result<Input> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_lowercase().as_str() {
        "" => bail!("Empty command"),
        "help" => return Ok(Input::Help),
        "clear" => return Ok(Input::Clear),
        "quit" | "exit" => return Ok(Input::Quit),
        _ => {}
    }

    let data = if rest.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(rest).unwrap_or_else(|_| Value::String(rest.to_string()))
    };

    Ok(Input::Send(Frame::new(command, data)))
}

fn print_frame(frame: &Frame) {
    let data = serde_json::to_string_pretty(&frame.data).unwrap_or_default();
    match frame.reply_to() {
        Some((_, true)) => println!("{} {}", frame.event.green().bold(), data),
        Some((_, false)) => {
            let message = frame.data["message"].as_str().map(str::to_string).unwrap_or(data);
            println!("{} {}", frame.event.red().bold(), message.red())
        }
        None => println!("{} {}", frame.event.blue(), data.dimmed()),
    }
}

fn print_help() {
    println!(
        r#"
{}

{}
  <command> [json]          Invoke a command, e.g. set-state {{"count": 1}}
  get-message               Sample command, replies "HELLO"
  get-state                 Full state document
  set-state <object>        Merge top-level keys into the state
  ping                      Check connection

{}
  <command>-result          Successful reply
  <command>-error           Failed reply with a message
  <event>                   Broadcast from the server

{}
  help                      Show this help
  clear                     Clear screen
  quit/exit                 Exit CLI
"#,
        "Juncture Commands".cyan().bold(),
        "Remote".yellow().bold(),
        "Output".yellow().bold(),
        "Local".yellow().bold(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sent(line: &str) -> Frame {
        match parse_line(line).unwrap() {
            Input::Send(frame) => frame,
            _ => panic!("expected a remote command"),
        }
    }

    #[test]
    fn test_history_lives_in_home_dir() {
        let path = history_path();
        assert!(path.ends_with(".juncture_history"));
        if let Some(home) = dirs::home_dir() {
            assert!(path.starts_with(home));
        }
    }

    #[test]
    fn test_command_without_args() {
        assert_eq!(sent("get-state"), Frame::new("get-state", Value::Null));
    }

    #[test]
    fn test_command_with_json_args() {
        assert_eq!(
            sent(r#"set-state {"count": 3, "tags": ["a"]}"#),
            Frame::new("set-state", json!({ "count": 3, "tags": ["a"] }))
        );
        assert_eq!(sent("echo 42"), Frame::new("echo", json!(42)));
    }

    #[test]
    fn test_non_json_args_sent_as_string() {
        assert_eq!(sent("echo hello world"), Frame::new("echo", json!("hello world")));
    }

    #[test]
    fn test_local_commands() {
        assert!(matches!(parse_line("HELP").unwrap(), Input::Help));
        assert!(matches!(parse_line("clear").unwrap(), Input::Clear));
        assert!(matches!(parse_line("exit").unwrap(), Input::Quit));
        assert!(parse_line("   ").is_err());
    }
}
