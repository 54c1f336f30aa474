//! speech-relay CLI: 文本转语音、分块预览与模型列表的命令行工具
//!
//! Usage:
//!   speech-relay-cli speak <text> --out <file> [--voice <v>] [--stream] [--config <path>]
//!   speech-relay-cli plan <text> [--fixed] [--config <path>]
//!   speech-relay-cli models
//!   speech-relay-cli version

use anyhow::{bail, Context};
use speech_relay::client::available_models;
use speech_relay::planner::clean::CleaningOptions;
use speech_relay::{RelayConfig, SpeechRelay, SpeechRequest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_VOICE: &str = "zh-CN-XiaoxiaoNeural";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "speak" => cmd_speak(&args[2..]).await,
        "plan" => cmd_plan(&args[2..]),
        "models" => cmd_models(),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"speech-relay-cli: 文本转语音中继命令行工具

USAGE:
    speech-relay-cli <COMMAND> [OPTIONS]

COMMANDS:
    speak <text> --out <file>   Synthesize text into an audio file
        --voice <name>          Neural voice (default {DEFAULT_VOICE})
        --stream                Use ordered concurrent streaming
        --config <path>         YAML relay configuration
    plan <text> [--fixed]       Show the segments a request would use
    models                      List OpenAI-compatible model ids
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    SPEECH_RELAY_*              Configuration overrides
    RUST_LOG                    Log filter (default info)"#
    );
}

fn cmd_version() {
    println!("speech-relay-cli {}", env!("CARGO_PKG_VERSION"));
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn load_config(args: &[String]) -> anyhow::Result<RelayConfig> {
    let config = match flag_value(args, "--config") {
        Some(path) => RelayConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => RelayConfig::default(),
    };
    Ok(config.apply_env_overrides())
}

fn text_arg(args: &[String]) -> anyhow::Result<&str> {
    match args.first() {
        Some(text) if !text.starts_with("--") => Ok(text.as_str()),
        _ => bail!("missing <text> argument"),
    }
}

async fn cmd_speak(args: &[String]) -> anyhow::Result<()> {
    let text = text_arg(args)?;
    let out = PathBuf::from(flag_value(args, "--out").context("missing --out <file>")?);
    let voice = flag_value(args, "--voice").unwrap_or(DEFAULT_VOICE);

    let relay = SpeechRelay::builder().config(load_config(args)?).build()?;
    let request = SpeechRequest::new(text, voice)
        .cleaning(CleaningOptions::default())
        .streaming(has_flag(args, "--stream"));

    let audio = relay.synthesize_request(request).await?.collect().await?;
    tokio::fs::write(&out, &audio)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    println!("{} bytes written to {}", audio.len(), out.display());
    Ok(())
}

fn cmd_plan(args: &[String]) -> anyhow::Result<()> {
    let text = text_arg(args)?;
    let relay = SpeechRelay::builder().config(load_config(args)?).build()?;
    let request = SpeechRequest::new(text, DEFAULT_VOICE)
        .cleaning(CleaningOptions::default())
        .streaming(!has_flag(args, "--fixed"));

    let segments = relay.plan(&request)?;
    println!("{} segment(s)", segments.len());
    for segment in segments {
        println!("[{:>3}] ({} chars) {}", segment.index, segment.text.chars().count(), segment.text);
    }
    Ok(())
}

fn cmd_models() -> anyhow::Result<()> {
    let list = available_models();
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}
