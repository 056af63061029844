//! CLI entry point for tokitsuzuri

mod speech;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokitsuzuri_agent::{DiaryApp, GREETING};
use tokitsuzuri_core::config::{Config, ConfigLoader};
use tokitsuzuri_core::logging::init_logging;
use tokitsuzuri_core::speech::SpeechPlayback;
use tokitsuzuri_core::transfer::export_file_name;
use tokitsuzuri_core::utils::{expand_tilde, truncate_chars};
use tokitsuzuri_core::{
    Capabilities, DiaryRecord, Error, FileStore, KeyValueStore, Role, Screen, VoiceSettings,
};
use tokitsuzuri_providers::OpenAiClientFactory;
use tracing::{error, info, warn};

use crate::speech::{capture_from_file, CommandSynthesizer, HostProbe};

#[derive(Parser)]
#[command(name = "tokitsuzuri")]
#[command(about = "Talk about your day and turn the conversation into a diary")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a diary conversation
    Chat,
    /// Browse saved diaries
    Diary {
        #[command(subcommand)]
        command: DiaryCommands,
    },
    /// View or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Export diaries and settings to a JSON file
    Export {
        /// Output file (defaults to 時綴_データ_<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import diaries and settings from an export file
    Import {
        /// Export file to read
        file: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Delete every diary and setting
    ClearAll {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show status information
    Status,
}

#[derive(Subcommand)]
enum DiaryCommands {
    /// List diaries, newest first
    List {
        /// Only show diaries containing this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Print one diary
    Show { id: i64 },
    /// Delete one diary
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show,
    /// Set the OpenAI API key (prompted when omitted)
    ApiKey { key: Option<String> },
    /// Set the chat model
    Model { model: String },
    /// Set speech synthesis parameters
    Voice {
        /// Speaking rate, 0.1 to 10
        #[arg(long)]
        rate: Option<f32>,
        /// Pitch, 0 to 2
        #[arg(long)]
        pitch: Option<f32>,
        /// Volume, 0 to 1
        #[arg(long)]
        volume: Option<f32>,
    },
    /// Speak a test sentence with the current voice settings
    TestVoice,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Create config loader
    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    let config = config_loader.load()?;
    let _log_guard = init_logging(&config.logging);

    let mut app = open_app(config)?;

    match cli.command {
        Commands::Chat => {
            info!("Starting chat");
            run_chat(&mut app).await?;
        }
        Commands::Diary { command } => match command {
            DiaryCommands::List { search } => {
                info!("Listing diaries");
                run_diary_list(&mut app, search.as_deref());
            }
            DiaryCommands::Show { id } => {
                info!("Showing diary {}", id);
                run_diary_show(&app, id)?;
            }
            DiaryCommands::Delete { id, yes } => {
                info!("Deleting diary {}", id);
                run_diary_delete(&mut app, id, yes)?;
            }
        },
        Commands::Settings { command } => {
            app.switch_screen(Screen::Settings);
            match command {
                SettingsCommands::Show => run_settings_show(&app),
                SettingsCommands::ApiKey { key } => run_set_api_key(&mut app, key)?,
                SettingsCommands::Model { model } => {
                    app.set_model(&model).map_err(notify)?;
                    println!("{} モデルを {} に変更しました", style("✓").green(), model);
                }
                SettingsCommands::Voice {
                    rate,
                    pitch,
                    volume,
                } => run_set_voice(&mut app, rate, pitch, volume)?,
                SettingsCommands::TestVoice => {
                    app.test_voice().map_err(notify)?;
                    wait_for_playback(&app).await;
                }
            }
        }
        Commands::Export { output } => {
            info!("Exporting data");
            run_export(&app, output)?;
        }
        Commands::Import { file, yes } => {
            info!("Importing data from {:?}", file);
            run_import(&mut app, &file, yes)?;
        }
        Commands::ClearAll { yes } => {
            run_clear_all(&mut app, yes)?;
        }
        Commands::Status => {
            info!("Showing status");
            run_status(&config_loader, &app);
        }
    }

    Ok(())
}

/// Wire the store, completion client and speech adapters into a session
fn open_app(config: Config) -> Result<DiaryApp> {
    let storage_dir = expand_tilde(&config.storage.dir);
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&storage_dir, config.storage.quota_bytes)
            .with_context(|| format!("Failed to open data store in {}", storage_dir.display()))?,
    );

    let synthesizer = CommandSynthesizer::detect(config.speech.synthesizer.as_deref());
    let capabilities = Capabilities::detect(
        &HostProbe {
            synthesizer: synthesizer.is_some(),
        },
        &config.completion.api_base,
    );
    let playback = match synthesizer {
        Some(synthesizer) => SpeechPlayback::new(Box::new(synthesizer), config.speech.lang.clone()),
        None => SpeechPlayback::unavailable(config.speech.lang.clone()),
    };

    let factory = Arc::new(OpenAiClientFactory::new(&config.completion));
    Ok(DiaryApp::new(config, store, factory, capabilities, playback))
}

/// Print the user-facing text for an error and hand it on
fn notify(e: Error) -> anyhow::Error {
    eprintln!("{} {}", style("✗").red(), e.notification());
    anyhow::Error::new(e)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(template);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn wait_for_playback(app: &DiaryApp) {
    while app.is_speaking() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn print_chat_help() {
    println!(
        "{}",
        style("/save 日記を保存  /clear 会話をクリア  /new 新しい日記  /voice <音声ファイル> 音声入力  /speak 最後の返答を読み上げ  /quit 終了").dim()
    );
}

/// Interactive conversation loop
async fn run_chat(app: &mut DiaryApp) -> Result<()> {
    println!("{}", style("時綴 - AI日記アシスタント").bold().cyan());
    print_chat_help();
    println!();
    println!("{} {}", style("AI:").magenta().bold(), GREETING);

    loop {
        let line: String = Input::new()
            .with_prompt(style("あなた").green().bold().to_string())
            .with_initial_text(app.draft().to_string())
            .allow_empty(true)
            .interact_text()?;
        app.set_draft(line.clone());

        let trimmed = line.trim();
        let (command, argument) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        match command {
            "/quit" | "/exit" => {
                app.set_draft(String::new());
                if let Err(e) = app.stop_speaking() {
                    warn!("Failed to stop playback: {}", e);
                }
                break;
            }
            "/help" => {
                app.set_draft(String::new());
                print_chat_help();
            }
            "/save" => {
                app.set_draft(String::new());
                save_diary(app).await?;
            }
            "/clear" => {
                app.set_draft(String::new());
                if confirm("会話をクリアしますか？")? {
                    app.clear_conversation();
                    println!("{}", style("会話をクリアしました").dim());
                }
            }
            "/new" => {
                app.set_draft(String::new());
                if app.messages().is_empty() || confirm("現在の会話は失われます。新しい日記を始めますか？")? {
                    app.start_new_diary();
                    println!("{} {}", style("AI:").magenta().bold(), GREETING);
                }
            }
            "/voice" => {
                app.set_draft(String::new());
                if argument.is_empty() {
                    println!("{}", style("使い方: /voice <音声ファイル>").yellow());
                    continue;
                }
                let bar = spinner("音声を認識しています...");
                let notices = capture_from_file(app, &expand_tilde(argument)).await;
                bar.finish_and_clear();
                for notice in notices {
                    eprintln!("{} {}", style("✗").red(), notice.notification());
                }
                if !app.draft().is_empty() {
                    println!(
                        "{}",
                        style("認識結果を入力欄に追加しました。編集して送信してください。").dim()
                    );
                }
            }
            "/speak" => {
                app.set_draft(String::new());
                match app.speak_last_reply() {
                    Ok(true) => {}
                    Ok(false) => println!("{}", style("読み上げる返答がありません").dim()),
                    Err(e) => eprintln!("{} {}", style("✗").red(), e.notification()),
                }
            }
            _ if command.starts_with('/') => {
                app.set_draft(String::new());
                println!("{} {}", style("不明なコマンド:").yellow(), command);
            }
            _ => send_draft(app).await?,
        }
    }

    Ok(())
}

async fn send_draft(app: &mut DiaryApp) -> Result<()> {
    let bar = spinner("考えています...");
    let result = app.send_draft().await;
    bar.finish_and_clear();

    match result {
        Ok(Some(reply)) => println!("{} {}", style("AI:").magenta().bold(), reply),
        Ok(None) => {}
        Err(Error::CredentialMissing) => {
            eprintln!(
                "{} {}",
                style("✗").red(),
                Error::CredentialMissing.notification()
            );
            if app.screen() == Screen::Settings {
                run_set_api_key(app, None)?;
                app.switch_screen(Screen::Chat);
            }
        }
        Err(e) => {
            error!("Failed to get reply: {}", e);
            eprintln!("{} {}", style("✗").red(), e.notification());
        }
    }
    Ok(())
}

async fn save_diary(app: &mut DiaryApp) -> Result<()> {
    let bar = spinner("日記を作成しています...");
    let result = app.save_diary().await;
    bar.finish_and_clear();

    match result {
        Ok(record) => {
            println!("{}", style("日記を保存しました！").green().bold());
            print_diary(&record);
            app.switch_screen(Screen::Chat);
            println!("{} {}", style("AI:").magenta().bold(), GREETING);
        }
        Err(Error::CredentialMissing) => {
            eprintln!(
                "{} {}",
                style("✗").red(),
                Error::CredentialMissing.notification()
            );
            if app.screen() == Screen::Settings {
                run_set_api_key(app, None)?;
                app.switch_screen(Screen::Chat);
            }
        }
        Err(e) => {
            error!("Failed to save diary: {}", e);
            eprintln!("{} {}", style("✗").red(), e.notification());
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

fn print_diary(record: &DiaryRecord) {
    println!("{}", style(&record.date).dim());
    for line in record.content.lines() {
        match line.trim().strip_prefix("# ") {
            Some(title) => println!("{}", style(title).bold().cyan()),
            None => println!("{}", line),
        }
    }
    println!();
}

fn run_diary_list(app: &mut DiaryApp, search: Option<&str>) {
    app.switch_screen(Screen::DiaryList);
    let records = match search {
        Some(term) => app.search_diaries(term),
        None => app.list_diaries(),
    };

    if records.is_empty() {
        println!("{}", style("まだ日記がありません").dim());
        return;
    }

    println!("{}", style(format!("日記一覧 ({}件)", records.len())).bold());
    for record in records {
        let title = record
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| truncate_chars(record.content.trim(), 30));
        println!(
            "  {}  {}  {}",
            style(record.id).dim(),
            style(&record.date).cyan(),
            title
        );
    }
}

fn run_diary_show(app: &DiaryApp, id: i64) -> Result<()> {
    let record = app
        .find_diary(id)
        .ok_or_else(|| Error::NotFound(format!("diary {}", id)))
        .map_err(notify)?;

    print_diary(&record);
    if !record.chat_history.is_empty() {
        println!("{}", style("会話履歴").bold());
        for message in &record.chat_history {
            let label = match message.role {
                Role::User => style("あなた").green(),
                _ => style("AI").magenta(),
            };
            println!("  {}: {}", label, message.content);
        }
    }
    Ok(())
}

fn run_diary_delete(app: &mut DiaryApp, id: i64, yes: bool) -> Result<()> {
    if !yes && !confirm("この日記を削除しますか？")? {
        println!("削除をキャンセルしました");
        return Ok(());
    }

    if app.delete_diary(id).map_err(notify)? {
        println!("{} 日記を削除しました", style("✓").green());
    } else {
        return Err(notify(Error::NotFound(format!("diary {}", id))));
    }
    Ok(())
}

fn run_settings_show(app: &DiaryApp) {
    let settings = app.settings();
    println!("{}", style("設定").bold().cyan());
    let credential = if settings.has_credential() {
        style(settings.masked_api_key()).green()
    } else {
        style("未設定".to_string()).red()
    };
    println!("  APIキー: {}", credential);
    println!("  モデル: {}", settings.model);
    println!(
        "  音声: 速度 {:.1} / 高さ {:.1} / 音量 {:.1}",
        settings.voice.rate, settings.voice.pitch, settings.voice.volume
    );
}

fn run_set_api_key(app: &mut DiaryApp, key: Option<String>) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => Password::new()
            .with_prompt("OpenAI APIキー (sk-...)")
            .interact()?,
    };
    app.set_api_key(&key).map_err(notify)?;
    println!("{} 設定を保存しました", style("✓").green());
    Ok(())
}

fn run_set_voice(
    app: &mut DiaryApp,
    rate: Option<f32>,
    pitch: Option<f32>,
    volume: Option<f32>,
) -> Result<()> {
    let current = app.settings().voice;
    let voice = VoiceSettings {
        rate: rate.unwrap_or(current.rate),
        pitch: pitch.unwrap_or(current.pitch),
        volume: volume.unwrap_or(current.volume),
    };
    app.set_voice(voice).map_err(notify)?;
    println!("{} 音声設定を保存しました", style("✓").green());
    Ok(())
}

fn run_export(app: &DiaryApp, output: Option<PathBuf>) -> Result<()> {
    let document = app.export(chrono::Utc::now());
    let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(&chrono::Local::now())));
    let json = document.to_json().map_err(notify)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "{} {}件の日記を {} にエクスポートしました",
        style("✓").green(),
        document.diaries.as_ref().map(Vec::len).unwrap_or(0),
        path.display()
    );
    Ok(())
}

fn run_import(app: &mut DiaryApp, file: &Path, yes: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    if !yes && !confirm("既存のデータは上書きされます。インポートしますか？")? {
        println!("インポートをキャンセルしました");
        return Ok(());
    }

    app.import_json(&raw).map_err(notify)?;
    println!("{} データをインポートしました", style("✓").green());
    Ok(())
}

fn run_clear_all(app: &mut DiaryApp, yes: bool) -> Result<()> {
    if !yes
        && !confirm("すべてのデータを削除しますか？この操作は取り消せません。")?
    {
        println!("削除をキャンセルしました");
        return Ok(());
    }
    app.clear_all().map_err(notify)?;
    println!("{} すべてのデータを削除しました", style("✓").green());
    Ok(())
}

fn run_status(loader: &ConfigLoader, app: &DiaryApp) {
    let config = app.config();

    println!("{}", style("Tokitsuzuri Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config file: {}", loader.config_path().display());
    println!("  Data directory: {}", expand_tilde(&config.storage.dir).display());
    println!("  Log directory: {}", expand_tilde(&config.logging.dir).display());
    println!("  Endpoint: {}", config.completion.api_base);
    println!();

    println!("{}", style("Session:").bold());
    let settings = app.settings();
    let credential = if settings.has_credential() {
        style("configured").green()
    } else {
        style("not configured").red()
    };
    println!("  API key: {}", credential);
    println!("  Model: {}", settings.model);
    println!("  Diaries: {}", app.list_diaries().len());
    println!();

    println!("{}", style("Speech:").bold());
    let caps = app.capabilities();
    for (name, available) in [
        ("Capture (audio files)", caps.capture_usable()),
        ("Synthesis", caps.synthesis),
        ("Secure endpoint", caps.secure_context),
    ] {
        let status = if available {
            style("available").green()
        } else {
            style("unavailable").dim()
        };
        println!("  {}: {}", name, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_diary_delete() {
        let cli = Cli::parse_from(["tokitsuzuri", "diary", "delete", "42", "--yes"]);
        assert!(matches!(
            cli.command,
            Commands::Diary {
                command: DiaryCommands::Delete { id: 42, yes: true }
            }
        ));
    }

    #[test]
    fn test_open_app_uses_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.dir = dir.path().join("data").to_string_lossy().to_string();
        config.speech.synthesizer = Some("tokitsuzuri-no-such-synth".to_string());

        let mut app = open_app(config).unwrap();
        app.set_model("gpt-4o").unwrap();

        assert!(dir.path().join("data").join("store.json").exists());
        assert!(!app.capabilities().synthesis);
        assert_eq!(app.screen(), Screen::Chat);
    }
}
