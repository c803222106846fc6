use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jitsi_integration::external_api_url;
use shared::domain::{DisplayName, RoomName};
use url::Url;

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a deployment serves its embedding script.
    Doctor {
        #[arg(long, default_value = "meet.jit.si")]
        domain: String,
    },
    /// Validate meeting parameters and print the page URL for them.
    JoinUrl {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        base_url: String,
        room: String,
        display_name: String,
        #[arg(long)]
        audio_muted: bool,
        #[arg(long)]
        video_muted: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Doctor { domain } => doctor(&domain).await,
        Command::JoinUrl {
            base_url,
            room,
            display_name,
            audio_muted,
            video_muted,
        } => {
            let url = join_url(&base_url, &room, &display_name, audio_muted, video_muted)?;
            println!("{url}");
            Ok(())
        }
    }
}

async fn doctor(domain: &str) -> Result<()> {
    let script_url = external_api_url(domain);
    let started = Instant::now();
    let response = reqwest::get(&script_url)
        .await
        .with_context(|| format!("failed to fetch {script_url}"))?;
    let elapsed = started.elapsed();
    let status = response.status();
    println!("{script_url} -> {status} in {elapsed:?}");

    if !status.is_success() {
        bail!("embedding script is not served (status {status})");
    }
    Ok(())
}

fn join_url(
    base_url: &str,
    room: &str,
    display_name: &str,
    audio_muted: bool,
    video_muted: bool,
) -> Result<Url> {
    let room = RoomName::parse(room)?;
    let display_name = DisplayName::parse(display_name)?;

    let mut base: Url = base_url.parse().context("base url is not a valid url")?;
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    let mut url = base
        .join(&format!("rooms/{room}"))
        .context("could not build the room url")?;
    url.query_pairs_mut()
        .append_pair("display_name", display_name.as_str())
        .append_pair("audio_muted", if audio_muted { "true" } else { "false" })
        .append_pair("video_muted", if video_muted { "true" } else { "false" });
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_validates_and_encodes() {
        let url = join_url("http://127.0.0.1:8080", "demo", "Sam Carter", true, false)
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8080/rooms/demo?display_name=Sam+Carter&audio_muted=true&video_muted=false"
        );
    }

    #[test]
    fn join_url_rejects_an_invalid_room() {
        let err = join_url("http://127.0.0.1:8080", "bad room", "Sam", false, false)
            .expect_err("invalid room");
        assert!(err.to_string().contains("room name"));
    }
}
