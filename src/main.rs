use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use swipecull::config::AppConfig;
use swipecull::core::achievements::{format_progress, progress_percentage};
use swipecull::core::analysis::suggestion_score;
use swipecull::core::filters::{FILTER_PRESETS, FilterType};
use swipecull::core::photo::{BYTES_PER_MB, Photo, PhotoDecision, SessionStats};
use swipecull::services::deletion::DeletionOutcome;
use swipecull::services::media::{FsMediaSource, read_history};
use swipecull::services::permissions::DirectoryPermissions;
use swipecull::services::storage::{JsonFileStore, Storage};
use swipecull::store::{GalleryStore, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "swipecull", version, about = "Swipe through a photo library and cull it")]
struct Cli {
    /// Where stats, config and the deletion log live (default: `<dir>/.swipecull`)
    #[arg(long, value_name = "DIR", global = true)]
    state_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Review photos one by one
    Review {
        /// Photo library directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Only review photos matching this filter
        #[arg(short, long, default_value = "all")]
        filter: FilterType,
    },

    /// Classify every photo and print filter counts
    Analyze {
        /// Photo library directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },

    /// Show lifetime stats, streak and recent sessions
    Stats {
        /// Photo library directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },

    /// List achievements and progress
    Achievements {
        /// Photo library directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },

    /// List deletion history records
    History {
        /// Photo library directory
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Review { path, filter } => {
            let mut store = open_store(&path, cli.state_dir)?;
            let reviewed = review(&mut store, &path, filter).await;
            let closed = close_store(store).await;
            reviewed?;
            closed?;
        }

        Commands::Analyze { path } => {
            let mut store = open_store(&path, cli.state_dir)?;
            let analyzed = analyze(&mut store, &path).await;
            let closed = close_store(store).await;
            analyzed?;
            closed?;
        }

        Commands::Stats { path } => {
            let mut store = open_store(&path, cli.state_dir)?;
            store.load_persisted_data();
            print_stats(&store);
        }

        Commands::Achievements { path } => {
            let mut store = open_store(&path, cli.state_dir)?;
            store.load_persisted_data();
            print_achievements(&store);
        }

        Commands::History { path } => {
            let state_dir = state_dir_for(&path, cli.state_dir);
            let records = read_history(&state_dir.join("history.jsonl"))
                .with_context(|| format!("Could not read history in {:?}", state_dir))?;

            if records.is_empty() {
                println!("No deletions recorded.");
                return Ok(());
            }
            println!("🗂️  Deletion History:");
            for (i, rec) in records.iter().enumerate() {
                println!("[{}] {}\n     action: {}", i, rec.timestamp, rec.action);
                for removed in &rec.removed {
                    println!("     🗑️  {}", removed);
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_module("swipecull", log::LevelFilter::Debug);
    }
    builder.init();
}

fn state_dir_for(library: &Path, state_dir: Option<PathBuf>) -> PathBuf {
    state_dir.unwrap_or_else(|| AppConfig::default_state_dir(library))
}

fn open_store(library: &Path, state_dir: Option<PathBuf>) -> Result<GalleryStore> {
    let state_dir = state_dir_for(library, state_dir);
    let config = AppConfig::load_or_create(&state_dir)
        .with_context(|| format!("Failed to load config from {:?}", state_dir))?;

    let mut media = FsMediaSource::new(
        library.to_path_buf(),
        state_dir.clone(),
        config.supported_formats.clone(),
    );
    if config.use_trash {
        media = media.with_trash(AppConfig::trash_dir(&state_dir));
    }

    let kv = JsonFileStore::open(&state_dir.join("store.json"))
        .with_context(|| format!("Failed to open state in {:?}", state_dir))?;
    let storage = Storage::new(Arc::new(kv)).with_session_history_limit(config.session_history_limit);

    Ok(GalleryStore::new(
        config,
        Arc::new(media),
        storage,
        Arc::new(DirectoryPermissions::new(library.to_path_buf())),
        Arc::new(SystemClock),
    ))
}

/// Waits for queued deletions and warns about photos that could not be deleted.
async fn close_store(store: GalleryStore) -> Result<()> {
    let report = store
        .close()
        .await
        .context("Deletion worker did not stop cleanly")?;
    report_outcomes(&report.outcomes);

    let stranded: usize = report.failed.iter().map(|intent| intent.photo_ids.len()).sum();
    if stranded > 0 {
        eprintln!("⚠️  {} photo(s) remain in the library although they were culled.", stranded);
    }
    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn format_mb(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / BYTES_PER_MB as f64)
}

fn format_date(epoch_ms: i64) -> String {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown date".to_string())
}

async fn load_library(store: &mut GalleryStore, path: &Path) -> Result<()> {
    if !store.request_permissions() {
        anyhow::bail!("No read/write access to {}", path.display());
    }

    let spinner = spinner("Loading photos…")?;
    store
        .load_photos()
        .await
        .with_context(|| format!("Failed to list photos in {:?}", path))?;
    spinner.finish_with_message(format!("Loaded {} photo(s)", store.state().photos.len()));
    Ok(())
}

async fn analyze(store: &mut GalleryStore, path: &Path) -> Result<()> {
    load_library(store, path).await?;
    while store.load_more_photos().await? {}

    let total = store.state().photos.len() as u64;
    let bar = ProgressBar::new(total);
    bar.set_style(ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?);
    bar.set_message("analyzing");
    store
        .analyze_photos(|done, _| bar.set_position(done as u64))
        .await;
    bar.finish_with_message("done");

    let counts = store.filter_counts();
    println!("\n📊 Filters:");
    for preset in FILTER_PRESETS.iter() {
        println!(
            "   {} {:<20} {}",
            preset.icon,
            preset.label,
            counts.get(&preset.filter_type).copied().unwrap_or(0)
        );
    }

    let suggestions = store.smart_suggestions();
    if suggestions.is_empty() {
        println!("\nNo smart suggestions.");
        return Ok(());
    }
    println!("\n✨ Smart suggestions ({}):", suggestions.len());
    for id in suggestions.iter().take(20) {
        let (Some(photo), Some(analysis)) = (store.state().photo(id), store.state().analyses.get(id)) else {
            continue;
        };
        println!(
            "   ▶ {} (score {}, {})",
            photo.filename,
            suggestion_score(analysis),
            format_mb(photo.file_size)
        );
    }
    Ok(())
}

fn next_photo(store: &GalleryStore, filter: FilterType, skipped: &HashSet<String>) -> Option<Photo> {
    let state = store.state();
    let pending = |photo: &&Photo| state.decision(&photo.id).is_none() && !skipped.contains(&photo.id);

    if filter == FilterType::All {
        let start = state.current_index.min(state.photos.len());
        return state.photos[start..].iter().find(pending).cloned();
    }
    store.filtered_photos(filter).into_iter().find(pending).cloned()
}

fn describe(store: &GalleryStore, photo: &Photo) {
    let state = store.state();
    let star = if store.is_favorite(&photo.id) { " ★" } else { "" };
    println!(
        "\n📷 {}{}  [{} of {}]",
        photo.filename,
        star,
        state.stats.processed + 1,
        state.photos.len()
    );
    println!(
        "   {}x{}  {}  {}",
        photo.width,
        photo.height,
        format_mb(photo.file_size),
        format_date(photo.creation_time)
    );

    if let Some(analysis) = state.analyses.get(&photo.id) {
        let mut tags = Vec::new();
        if analysis.is_screenshot {
            tags.push("screenshot");
        }
        if analysis.is_blurry {
            tags.push("blurry");
        }
        if analysis.is_potential_duplicate {
            tags.push("duplicate");
        }
        if !tags.is_empty() {
            println!("   🏷️  {}", tags.join(", "));
        }
    }
}

fn announce(store: &GalleryStore, unlocked: &[String]) {
    for id in unlocked {
        if let Some(a) = store.state().achievements.iter().find(|a| &a.id == id) {
            println!("   🏆 Achievement unlocked: {} {}: {}", a.icon, a.title, a.description);
        }
    }
}

fn report_outcomes(outcomes: &[DeletionOutcome]) {
    for outcome in outcomes {
        if let DeletionOutcome::Failed { intent, error, .. } = outcome {
            eprintln!(
                "⚠️  Could not delete {} photo(s) from the library: {}",
                intent.photo_ids.len(),
                error
            );
        }
    }
}

const ACTIONS: [&str; 6] = ["👍 Keep", "🗑️  Delete", "↩️  Undo", "★ Favorite", "⏭️  Skip", "🚪 Quit"];

async fn review(store: &mut GalleryStore, path: &Path, filter: FilterType) -> Result<()> {
    if let Err(e) = review_photos(store, path, filter).await {
        // no prompts on this path
        if let Some(session) = store.end_session() {
            print_session(store, &session);
        }
        report_outcomes(&store.poll_deletions());
        return Err(e);
    }
    finish_review(store).await
}

async fn review_photos(store: &mut GalleryStore, path: &Path, filter: FilterType) -> Result<()> {
    store.load_persisted_data();
    load_library(store, path).await?;

    if filter != FilterType::All {
        while store.load_more_photos().await? {}
        store.analyze_photos(|_, _| {}).await;
        println!("{} {}", filter.preset().icon, filter.preset().label);
    }

    store.start_session();
    let mut skipped: HashSet<String> = HashSet::new();

    loop {
        if store.should_preload() {
            store.load_more_photos().await?;
        }

        let Some(photo) = next_photo(store, filter, &skipped) else {
            if store.load_more_photos().await? {
                continue;
            }
            println!("\n🎉 Nothing left to review.");
            break;
        };

        describe(store, &photo);
        let choice = Select::new()
            .with_prompt("Decision")
            .items(&ACTIONS)
            .default(0)
            .interact()?;

        match choice {
            0 => store.mark_photo(&photo.id, PhotoDecision::Keep),
            1 => store.mark_photo(&photo.id, PhotoDecision::Delete),
            2 => {
                if store.state().can_undo() {
                    store.undo_last_decision();
                    println!("   ↩️  Undone");
                } else {
                    println!("   Nothing to undo");
                }
                continue;
            }
            3 => {
                let favorite = store.toggle_favorite(&photo.id);
                println!("   {}", if favorite { "★ Added to favorites" } else { "☆ Removed from favorites" });
                continue;
            }
            4 => {
                skipped.insert(photo.id.clone());
                continue;
            }
            _ => break,
        }

        let unlocked = store.check_and_update_achievements();
        announce(store, &unlocked);
        report_outcomes(&store.poll_deletions());
    }
    Ok(())
}

fn print_session(store: &GalleryStore, session: &SessionStats) {
    println!(
        "\n✅ Session done: {} reviewed, {} kept, {} deleted, {} freed (🔥 streak {})",
        session.photos_reviewed,
        session.photos_kept,
        session.photos_deleted,
        format_mb(session.storage_freed),
        store.state().stats.current_streak
    );
}

async fn finish_review(store: &mut GalleryStore) -> Result<()> {
    let unlocked = store.check_and_update_achievements();
    announce(store, &unlocked);

    if let Some(session) = store.end_session() {
        print_session(store, &session);
    }

    let pending = store.state().pending_deletions();
    if !pending.is_empty() {
        let bytes = store.state().stats.storage_to_free;
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete the {} photo(s) still marked for deletion ({})?",
                pending.len(),
                format_mb(bytes)
            ))
            .default(true)
            .interact()?;
        if confirmed {
            let count = store.commit_pending_deletions().await?;
            println!("🗑️  Deleted {} photo(s)", count);
        }
    }

    let spinner = spinner("Finishing deletions…")?;
    let outcomes = store.flush_deletions().await;
    spinner.finish_and_clear();
    report_outcomes(&outcomes);

    while !store.failed_deletions().is_empty() {
        let count: usize = store
            .failed_deletions()
            .iter()
            .map(|intent| intent.photo_ids.len())
            .sum();
        let retry = Confirm::new()
            .with_prompt(format!("{} photo(s) could not be deleted. Retry?", count))
            .default(true)
            .interact()?;
        if !retry {
            break;
        }
        store.retry_failed_deletions()?;
        report_outcomes(&store.flush_deletions().await);
    }

    let unlocked = store.check_and_update_achievements();
    announce(store, &unlocked);
    Ok(())
}

fn print_stats(store: &GalleryStore) {
    let stats = &store.state().stats;
    let storage = store.storage();

    println!("📊 Stats:");
    println!("   🗑️  Lifetime deleted: {}", stats.lifetime_deleted);
    println!("   💾 Lifetime freed:   {}", format_mb(stats.lifetime_freed));
    println!("   🔁 Sessions:         {}", stats.total_sessions);
    println!("   ★ Favorites:        {}", store.favorites().len());
    match storage.last_session_date() {
        Some(date) => println!("   🔥 Streak:           {} (last active {})", stats.current_streak, date),
        None => println!("   🔥 Streak:           {}", stats.current_streak),
    }

    let sessions = storage.sessions();
    if sessions.is_empty() {
        return;
    }
    println!("\n🕒 Recent sessions:");
    for session in sessions.iter().rev().take(10) {
        println!(
            "   {}  reviewed {}, kept {}, deleted {}, freed {}",
            format_date(session.start_time),
            session.photos_reviewed,
            session.photos_kept,
            session.photos_deleted,
            format_mb(session.storage_freed)
        );
    }
}

fn print_achievements(store: &GalleryStore) {
    let achievements = &store.state().achievements;
    let unlocked = achievements.iter().filter(|a| a.is_unlocked()).count();
    println!("🏆 Achievements ({}/{}):", unlocked, achievements.len());

    for a in achievements {
        match a.unlocked_at {
            Some(at) => println!("   ✅ {} {}  unlocked {}", a.icon, a.title, format_date(at)),
            None => println!(
                "   🔒 {} {}  {} ({:.0}%)",
                a.icon,
                a.title,
                format_progress(a),
                progress_percentage(a)
            ),
        }
        println!("        {}", a.description);
    }
}
