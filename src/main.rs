use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use podresolve::{
    AudioStore, Config, LogFormat, NoopReporter, PodcastResolution, PodcastResolver,
    ProgressEvent, ProgressReporter, ReqwestClient, ResolverSettings, SharedProgressReporter,
    Transcriber, WhisperApiBackend, YtDlpExtractor,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static WRITING: Emoji<'_, '_> = Emoji("📝 ", "[t] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Resolve a podcast link to stored audio and a timestamped transcript
#[derive(Parser, Debug)]
#[command(name = "podresolve")]
#[command(about = "Resolve a podcast link to stored audio and a timestamped transcript")]
#[command(version)]
struct Args {
    /// Apple Podcasts episode page or RSS feed URL
    reference: String,

    /// Directory for stored audio (overrides AUDIO_STORAGE_PATH)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Validate TLS certificates for feed and webpage requests too
    #[arg(long)]
    strict_tls: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    download_bar: Mutex<Option<ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            download_bar: Mutex::new(None),
            main_bar,
        }
    }

    fn get_or_create_bar(&self) -> ProgressBar {
        let mut slot = self.download_bar.lock().unwrap();

        if let Some(bar) = slot.as_ref() {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        *slot = Some(bar.clone());
        bar
    }

    fn finish_bar(&self) {
        if let Some(bar) = self.download_bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ClassifiedReference {
                is_platform_page,
                candidate_count,
                ..
            } => {
                let kind = if is_platform_page {
                    "platform page"
                } else {
                    "feed URL"
                };
                self.main_bar.set_message(format!(
                    "{SEARCH}Resolving {} ({} feed candidates)",
                    kind.cyan(),
                    candidate_count.to_string().cyan()
                ));
            }

            ProgressEvent::TryingFeed { url, attempt } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}[{}] Fetching feed: {}",
                    attempt.to_string().cyan(),
                    url.cyan()
                ));
            }

            ProgressEvent::FeedCandidateFailed { url, reason } => {
                self.multi
                    .println(format!(
                        "  {CROSS}{} - {}",
                        url.yellow(),
                        reason.dimmed()
                    ))
                    .ok();
            }

            ProgressEvent::FeedResolved {
                feed_title,
                episode_count,
                ..
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} episodes",
                    feed_title.bold().green(),
                    episode_count.to_string().cyan()
                ));
            }

            ProgressEvent::EpisodeSelected {
                episode_title,
                matched_id,
            } => {
                let note = if matched_id { "" } else { " (newest)" };
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{}{}",
                    truncate_title(&episode_title, 60).bold(),
                    note.dimmed()
                ));
            }

            ProgressEvent::AudioStrategyFailed { strategy, reason } => {
                self.multi
                    .println(format!(
                        "  {CROSS}{}: {}",
                        strategy.to_string().yellow(),
                        reason.dimmed()
                    ))
                    .ok();
            }

            ProgressEvent::AudioLocated { strategy, url } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}Audio via {}: {}",
                    strategy.to_string().green(),
                    url.cyan()
                ));
            }

            ProgressEvent::ExtractorStarted { url } => {
                self.main_bar
                    .set_message(format!("{DOWNLOAD}Extracting audio from {}", url.cyan()));
            }

            ProgressEvent::DownloadStarting {
                title,
                content_length,
            } => {
                let bar = self.get_or_create_bar();
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(truncate_title(&title, 40));
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar();
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadCompleted { filename, bytes } => {
                let bar = self.get_or_create_bar();
                bar.set_position(bytes);
                bar.set_message(format!("{SUCCESS}{}", filename.green()));
                self.finish_bar();
            }

            ProgressEvent::Transcribing { path } => {
                self.main_bar
                    .set_message(format!("{WRITING}Transcribing {}", path.cyan()));
            }

            ProgressEvent::TranscriptionCompleted { .. } => {
                self.main_bar.finish_and_clear();
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_logging(config: &Config) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "podresolve=info".into())
    };

    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}

fn print_summary(result: &PodcastResolution) {
    println!(
        "\n{SUCCESS}{} {}",
        "Resolved:".bold().green(),
        result.title.bold()
    );
    println!(
        "  {} {} • {} sentences • {:.2}s",
        "source".dimmed(),
        result.source.to_string().cyan(),
        result.sentences.len().to_string().cyan(),
        result.duration
    );
    println!(
        "  {FOLDER}{} ({})",
        result.audio_path.display().to_string().cyan(),
        result.audio_url.dimmed()
    );

    for sentence in result.sentences.iter().take(5) {
        println!(
            "  {} {}",
            format!("[{:>7.2} - {:>7.2}]", sentence.start, sentence.end).dimmed(),
            sentence.text
        );
    }
    if result.sentences.len() > 5 {
        println!("  {}", format!("… {} more", result.sentences.len() - 5).dimmed());
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(dir) = args.storage_dir {
        config.audio_storage_path = dir;
    }
    if args.strict_tls {
        config.insecure_tls = false;
    }

    init_logging(&config);

    let show_progress = !args.quiet && !args.json;
    if show_progress {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podresolve".bold().magenta(),
            "- Podcast Resolver".dimmed()
        );
    }

    let client = ReqwestClient::new(
        &config.user_agent,
        config.insecure_tls,
        config.download_read_timeout,
    )
    .context("Failed to build HTTP client")?;

    let transcriber = match config.transcription.clone() {
        Some(settings) => Transcriber::new(
            WhisperApiBackend::new(settings).context("Failed to build transcription client")?,
        ),
        None => Transcriber::Unconfigured,
    };

    debug!(
        storage = %config.audio_storage_path.display(),
        known_feeds = config.known_feeds.len(),
        transcription = transcriber.is_configured(),
        insecure_tls = config.insecure_tls,
        "configuration loaded"
    );

    let reporter: SharedProgressReporter = if show_progress {
        Arc::new(IndicatifReporter::new())
    } else {
        NoopReporter::shared()
    };

    let resolver = PodcastResolver::new(
        client,
        Arc::new(YtDlpExtractor::new(config.ytdlp_path.clone())),
        transcriber,
        AudioStore::new(
            config.audio_storage_path.clone(),
            config.public_audio_prefix.clone(),
        ),
        ResolverSettings::from_config(&config),
    )
    .with_reporter(reporter);

    resolver
        .store()
        .ensure_exists()
        .await
        .context("Failed to create audio storage directory")?;

    let result = resolver
        .resolve_podcast(&args.reference)
        .await
        .with_context(|| format!("Failed to resolve {}", args.reference))?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to encode result")?;
        println!("{json}");
    } else if !args.quiet {
        print_summary(&result);
    }

    Ok(())
}
