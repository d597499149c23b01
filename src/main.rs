use clap::{Arg, Command};
use log::LevelFilter;
use phishguard::{ContentKind, EngineConfig, Language, ScanRequest};
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("phishguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Phishing detection and scoring engine for URLs, text, and SMS")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/phishguard.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and referenced data files")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("kind")
                .short('k')
                .long("kind")
                .value_name("KIND")
                .help("Content kind: url, text, or sms")
                .default_value("text"),
        )
        .arg(
            Arg::new("language")
                .short('l')
                .long("language")
                .value_name("LANG")
                .help("Language hint (english, hindi, tamil, telugu)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("content")
                .value_name("CONTENT")
                .help("The URL or message to scan")
                .action(clap::ArgAction::Set),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        match EngineConfig::generate_default(generate_path) {
            Ok(()) => {
                println!("Default configuration written to {generate_path}");
                return;
            }
            Err(e) => {
                eprintln!("Failed to generate configuration: {e}");
                process::exit(1);
            }
        }
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = if std::path::Path::new(config_path).exists() {
        match EngineConfig::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration from {config_path}: {e}");
                process::exit(1);
            }
        }
    } else {
        log::info!("no configuration at {config_path}, using built-in defaults");
        EngineConfig::default()
    };

    if matches.get_flag("test-config") {
        match config.build_engine() {
            Ok(_) => {
                println!("Configuration OK");
                return;
            }
            Err(e) => {
                eprintln!("Configuration invalid: {e}");
                process::exit(1);
            }
        }
    }

    let Some(content) = matches.get_one::<String>("content") else {
        eprintln!("No content given; pass a URL or message to scan");
        process::exit(2);
    };

    let kind = match matches.get_one::<String>("kind").unwrap().as_str() {
        "url" => ContentKind::Url,
        "text" => ContentKind::Text,
        "sms" => ContentKind::Sms,
        other => {
            eprintln!("Unknown content kind '{other}' (expected url, text, or sms)");
            process::exit(2);
        }
    };

    let mut request = ScanRequest::new(content.clone(), kind);
    if let Some(hint) = matches.get_one::<String>("language") {
        match Language::from_hint(hint) {
            Some(language) => request = request.with_language(language),
            None => log::warn!("ignoring unsupported language hint '{hint}'"),
        }
    }

    let engine = match config.build_engine() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to initialize engine: {e}");
            process::exit(1);
        }
    };

    match engine.scan(&request).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize result: {e}");
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Scan failed: {e}");
            process::exit(1);
        }
    }
}
