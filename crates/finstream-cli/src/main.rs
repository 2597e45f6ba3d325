//! Finstream CLI - Playback Diagnostics Tool
//!
//! Features:
//! - Capability detection against a described runtime
//! - Device profile generation
//! - Playback negotiation against a live media server

use anyhow::Context;
use clap::{Parser, Subcommand};
use finstream_core::{
    build_device_profile, Capabilities, CapabilityProbe, PlaybackInfoRequest, ProbeResponse,
    ServerClient, StreamSettings,
};
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

/// Finstream CLI - Adaptive playback diagnostics
#[derive(Parser)]
#[command(name = "finstream-cli")]
#[command(version)]
#[command(about = "Capability, profile, and negotiation diagnostics", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect capabilities from a runtime description file
    Capabilities {
        /// JSON runtime description (supported queries + platform version)
        runtime: PathBuf,
    },

    /// Generate the device profile for a runtime
    Profile {
        /// JSON runtime description
        runtime: PathBuf,

        /// Maximum streaming bitrate in bps (0 = platform default)
        #[arg(short, long, default_value = "0")]
        bitrate: u64,

        /// Maximum video width (0 = platform default)
        #[arg(long, default_value = "0")]
        width: u32,

        /// Maximum video height (0 = platform default)
        #[arg(long, default_value = "0")]
        height: u32,
    },

    /// Negotiate playback for an item against a live server
    Negotiate {
        /// Item id
        item: String,

        /// Server base URL
        #[arg(short, long)]
        server: Url,

        /// API token
        #[arg(short, long)]
        token: String,

        /// User id
        #[arg(short, long)]
        user: String,

        /// JSON runtime description
        #[arg(short, long)]
        runtime: PathBuf,

        /// Maximum streaming bitrate in bps (0 = platform default)
        #[arg(short, long, default_value = "0")]
        bitrate: u64,
    },
}

/// Runtime description consumed instead of a live feature-probe API: the CLI
/// runs off-device, so the probe answers come from a file
#[derive(Debug, Deserialize)]
struct RuntimeDescription {
    #[serde(default)]
    supported: Vec<String>,
    #[serde(default)]
    platform_version: Option<String>,
}

struct FileProbe {
    description: RuntimeDescription,
}

impl CapabilityProbe for FileProbe {
    fn supports_media(&self, query: &str) -> ProbeResponse {
        if self
            .description
            .supported
            .iter()
            .any(|s| query.contains(s.as_str()))
        {
            ProbeResponse::Probably
        } else {
            ProbeResponse::Unsupported
        }
    }

    fn platform_version(&self) -> Option<String> {
        self.description.platform_version.clone()
    }
}

fn load_runtime(path: &PathBuf) -> anyhow::Result<Capabilities> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading runtime description {}", path.display()))?;
    let description: RuntimeDescription =
        serde_json::from_str(&raw).context("parsing runtime description")?;
    Ok(Capabilities::detect(&FileProbe { description }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(level).init();

    match cli.command {
        Commands::Capabilities { runtime } => {
            let caps = load_runtime(&runtime)?;
            println!("{}", serde_json::to_string_pretty(&caps)?);
        }
        Commands::Profile {
            runtime,
            bitrate,
            width,
            height,
        } => {
            let caps = load_runtime(&runtime)?;
            let settings = StreamSettings {
                max_bitrate: bitrate,
                max_width: width,
                max_height: height,
            };
            let profile = build_device_profile(&caps, &settings);
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Negotiate {
            item,
            server,
            token,
            user,
            runtime,
            bitrate,
        } => {
            let caps = load_runtime(&runtime)?;
            let settings = StreamSettings {
                max_bitrate: bitrate,
                ..StreamSettings::default()
            };
            let profile = build_device_profile(&caps, &settings);
            let max_streaming_bitrate = profile.max_streaming_bitrate;

            let client = ServerClient::new(server, token);
            let request = PlaybackInfoRequest {
                user_id: user,
                device_profile: profile,
                max_streaming_bitrate,
                start_time_ticks: 0,
                audio_stream_index: None,
                subtitle_stream_index: None,
                media_source_id: None,
                auto_open_live_stream: true,
            };

            let plan = client.resolve_playback(&item, &request).await?;
            println!("delivery: {:?}", plan.method);
            println!("url: {}", plan.url);
        }
    }

    Ok(())
}
