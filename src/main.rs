mod action;
mod app;
mod error;
mod executor;
mod generator;
#[cfg(feature = "hooks")]
mod hotkey;
mod human_mouse;
mod injector;
mod script_file;
mod status;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{fmt, EnvFilter};

use crate::action::Script;
use crate::executor::{test_action, PlaybackExecutor, PlaybackOptions, RunOutcome};
use crate::generator::{generate, Preview, Settings, SettingsForm};
use crate::injector::{EnigoInjector, InputInjector, MotionStyle};
use crate::status::TracingSink;

#[derive(Parser)]
#[command(name = "course-autoplay")]
#[command(about = "Click through a list of video courses and let each one play")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Defaults to opening the window
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive window
    Gui {
        #[command(flatten)]
        injector: InjectorArgs,
    },

    /// Generate a course script and save it
    Generate {
        #[command(flatten)]
        layout: LayoutArgs,

        /// Output file (default: video_course_script_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the steps a layout would generate and how long they take
    Preview {
        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Play a saved script
    Run {
        /// Script file
        file: PathBuf,

        /// How many times to play the whole script
        #[arg(long, default_value_t = 1)]
        loops: u32,

        /// Seconds between loops
        #[arg(long, default_value_t = 2.0)]
        loop_interval: f64,

        #[command(flatten)]
        injector: InjectorArgs,
    },

    /// Perform a single step of a saved script once
    Test {
        /// Script file
        file: PathBuf,

        /// Step number as listed (starting at 1)
        #[arg(long)]
        step: usize,

        #[command(flatten)]
        injector: InjectorArgs,
    },

    /// Print the current cursor position
    Position,
}

#[derive(Args, Clone, Copy, Default)]
struct InjectorArgs {
    /// Glide the cursor along a curved path instead of jumping
    #[arg(long)]
    human_motion: bool,

    /// Keep going even when the cursor sits in a screen corner
    #[arg(long)]
    no_fail_safe: bool,
}

impl InjectorArgs {
    fn injector(self) -> EnigoInjector {
        let motion = if self.human_motion { MotionStyle::Human } else { MotionStyle::Direct };
        EnigoInjector::new(motion, !self.no_fail_safe)
    }
}

#[derive(Args)]
struct LayoutArgs {
    /// X of the first course in the list
    #[arg(long, allow_negative_numbers = true)]
    start_x: i32,

    /// Y of the first course in the list
    #[arg(long, allow_negative_numbers = true)]
    start_y: i32,

    /// X of the play button
    #[arg(long, allow_negative_numbers = true)]
    play_x: i32,

    /// Y of the play button
    #[arg(long, allow_negative_numbers = true)]
    play_y: i32,

    /// Horizontal distance between courses
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    interval_x: i32,

    /// Vertical distance between courses
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    interval_y: i32,

    /// Number of courses
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    courses: i32,

    /// Seconds to let each video play
    #[arg(long, default_value_t = 300.0)]
    duration: f64,
}

impl From<&LayoutArgs> for Settings {
    fn from(a: &LayoutArgs) -> Self {
        Settings {
            start_x: a.start_x,
            start_y: a.start_y,
            play_x: a.play_x,
            play_y: a.play_y,
            interval_x: a.interval_x,
            interval_y: a.interval_y,
            course_count: a.courses,
            video_duration_secs: a.duration,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command.unwrap_or(Commands::Gui { injector: InjectorArgs::default() }) {
        Commands::Gui { injector } => open_window(injector.injector()),
        Commands::Generate { layout, output } => generate_script(&Settings::from(&layout), output),
        Commands::Preview { layout } => {
            println!("{}", Preview::new(&Settings::from(&layout))?);
            Ok(())
        }
        Commands::Run { file, loops, loop_interval, injector } => {
            play(file, PlaybackOptions { loop_count: loops, loop_interval_secs: loop_interval }, injector.injector())
        }
        Commands::Test { file, step, injector } => test_step(file, step, injector.injector()),
        Commands::Position => {
            let (x, y) = EnigoInjector::default().current_position()?;
            println!("X: {x}, Y: {y}");
            Ok(())
        }
    }
}

/// Wires the stop hotkey to `executor` when built with the `hooks` feature.
fn watch_stop_key(executor: &Arc<PlaybackExecutor>) {
    #[cfg(feature = "hooks")]
    {
        let executor = Arc::clone(executor);
        hotkey::spawn_stop_listener(move || {
            executor.stop();
        });
    }
    #[cfg(not(feature = "hooks"))]
    let _ = executor;
}

fn open_window(injector: EnigoInjector) -> Result<()> {
    let executor = Arc::new(PlaybackExecutor::new());
    watch_stop_key(&executor);
    app::run(injector, executor).map_err(|e| anyhow!("window failed: {e}"))
}

fn generate_script(settings: &Settings, output: Option<PathBuf>) -> Result<()> {
    let script = Script::from(generate(settings)?);
    let form = SettingsForm::from(settings);
    let path = match output {
        Some(path) => {
            script_file::save(&path, &script, &form)?;
            path
        }
        None => script_file::save_timestamped(&std::env::current_dir()?, &script, &form)?,
    };
    println!("wrote {} steps to {}", script.len(), path.display());
    Ok(())
}

fn play(file: PathBuf, options: PlaybackOptions, injector: EnigoInjector) -> Result<()> {
    let loaded = script_file::load(&file)?;
    let executor = Arc::new(PlaybackExecutor::new());

    let stopper = Arc::clone(&executor);
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl-C, stopping playback...");
        stopper.stop();
    })
    .context("failed to install Ctrl-C handler")?;
    watch_stop_key(&executor);

    tracing::info!(
        steps = loaded.script.len(),
        secs_per_loop = loaded.script.total_wait_secs(),
        "loaded {}",
        file.display()
    );
    executor.start(&loaded.script, options, injector, Arc::new(TracingSink))?;
    match executor.join() {
        Some(Ok(report)) => {
            let verb = if report.outcome == RunOutcome::Completed { "finished" } else { "stopped" };
            println!("{verb}: {} loops, {} steps dispatched", report.loops_completed, report.actions_dispatched);
            Ok(())
        }
        Some(Err(e)) => Err(e).with_context(|| format!("playing {}", file.display())),
        None => bail!("playback worker never started"),
    }
}

fn test_step(file: PathBuf, step: usize, mut injector: EnigoInjector) -> Result<()> {
    let loaded = script_file::load(&file)?;
    let index = step.checked_sub(1).context("steps are numbered from 1")?;
    test_action(&loaded.script, index, &mut injector, &TracingSink)?;
    Ok(())
}
