mod scripts;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ava_controller::{create_desktop_controller, DesktopController};
use ava_core::{tester::test_template, window::resolve_window, LogBus, TaskExecutor};
use ava_resource::{manifest::WindowTarget, Resource};

#[derive(Parser)]
#[command(name = "ava", about = "Visual automation for desktop windows")]
struct Cli {
    /// Resource root holding templates.toml and tasks/
    #[arg(long, default_value = "./resources")]
    resource: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List visible top-level windows
    Windows,
    /// List task manifests under the resource root
    Tasks,
    /// Check a catalog template against a saved frame, print the report
    TestTemplate {
        /// Base image to search in
        #[arg(long)]
        image: PathBuf,
        /// Template catalog; defaults to the shared one in the resource root
        #[arg(long)]
        config: Option<PathBuf>,
        key: String,
    },
    /// Run a task and follow its log until it reaches a terminal state
    Run { id: String },
    /// Save the pixels of a window to an image file
    Capture {
        /// Title substring of the window to capture
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "capture.png")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Windows => {
            let controller = create_desktop_controller()?;
            for info in controller.list_windows()? {
                println!(
                    "{:>8}  {:<24} {:>4}x{:<4} at ({},{})  {}",
                    info.id,
                    info.process_name,
                    info.rect.width(),
                    info.rect.height(),
                    info.rect.left,
                    info.rect.top,
                    info.title
                );
            }
        }
        Command::Tasks => {
            let resource = Resource::load(&cli.resource)?;
            let config = resource.task_config()?;
            let mut ids: Vec<&String> = config.0.keys().collect();
            ids.sort();
            for id in ids {
                let manifest = &config.0[id];
                println!("{id}: {} (entry: {})", manifest.name, manifest.entry);
            }
        }
        Command::TestTemplate { image, config, key } => {
            let config = config.unwrap_or_else(|| cli.resource.join("templates.toml"));
            let report = test_template(&image, &config, &key)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Run { id } => {
            let resource = Resource::load(&cli.resource)?;
            let config = resource.task_config()?;
            let manifest = config
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("no task named {id}"))?;

            let controller: Arc<dyn DesktopController> = Arc::from(create_desktop_controller()?);
            let log = Arc::new(LogBus::default());
            let executor =
                TaskExecutor::new(controller, scripts::registry(), resource.clone(), log.clone());

            executor.run(&id, manifest)?;

            let mut seen = 0usize;
            loop {
                for record in log.recent(0).iter().skip(seen) {
                    println!("[{}] {}", record.level, record.message);
                    seen += 1;
                }
                match executor.state(&id) {
                    Some(state) if state.is_terminal() => {
                        println!("task {id}: {state:?}");
                        break;
                    }
                    _ => std::thread::sleep(Duration::from_millis(200)),
                }
            }
        }
        Command::Capture { title, output } => {
            let controller = create_desktop_controller()?;
            let target = WindowTarget::with_title(&title);
            let id = resolve_window(&*controller, &target)?;
            let rect = controller.window_rect(id)?;
            let frame = controller.capture_rect(rect)?;
            frame.save(&output)?;
            println!(
                "saved {}x{} capture to {:?}",
                frame.width(),
                frame.height(),
                output
            );
        }
    }

    Ok(())
}
