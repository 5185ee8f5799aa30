//! Command-line control of local bulbs and bridge lights.
//!
//! Every command scans first, since the registry lives only as long as the
//! process. Results are printed as `(outcome, payload)` JSON.
//!
//! Run with: cargo run --example lightdeck_cli -- --help

use clap::{Parser, Subcommand};
use serde::Serialize;

use lightdeck::{ControllerConfig, Error, Hsv, LightController, Mode, Reply, Scene};

#[derive(Parser)]
#[command(name = "lightdeck")]
#[command(about = "Control local bulbs and bridge lights from the command line", long_about = None)]
struct Cli {
    /// Path to the JSON configuration
    #[arg(short, long, global = true, default_value = "lightdeck.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover lights and print them
    Scan,

    /// Print the registered lights
    List,

    /// Print everything readable about one light
    State { id: String },

    /// Turn lights on
    On { ids: Vec<String> },

    /// Turn lights off
    Off { ids: Vec<String> },

    /// Set a color (hue 0-360, saturation and value 0-100)
    Color {
        hue: u16,
        saturation: u8,
        value: u8,
        ids: Vec<String>,
    },

    /// Set brightness (clamped to 0-100)
    Brightness {
        #[arg(allow_negative_numbers = true)]
        level: i64,
        ids: Vec<String>,
    },

    /// Switch a light's mode (white, colour, scene, music, hs, xy, ct)
    Mode { id: String, mode: Mode },

    /// Write a raw hex scene
    Scene { scene: String, ids: Vec<String> },

    /// Set warm white on bridge lights (calibrated percentages only)
    Warmth { percent: i64, ids: Vec<String> },

    /// Switch lights off after a number of seconds
    Timer { seconds: i64, ids: Vec<String> },
}

fn print<T: Serialize>(reply: Reply<T>) -> bool {
    match serde_json::to_string_pretty(&reply) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("cannot print reply: {e}"),
    }
    reply.is_success()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let controller = LightController::from_config(ControllerConfig::load(&cli.config)?)?;
    let scanned = controller.rescan().await;

    fn ids(ids: &[String]) -> Vec<&str> {
        ids.iter().map(String::as_str).collect()
    }

    let succeeded = match cli.command {
        Commands::Scan => print(Reply::from(scanned)),
        Commands::List => print(Reply::from(Ok::<_, Error>(controller.list_records()))),
        Commands::State { id } => print(Reply::from(controller.get_state(&id).await)),
        Commands::On { ids: targets } => print(Reply::from(controller.put_toggle(&ids(&targets), true).await)),
        Commands::Off { ids: targets } => print(Reply::from(controller.put_toggle(&ids(&targets), false).await)),
        Commands::Color {
            hue,
            saturation,
            value,
            ids: targets,
        } => {
            let hsv = Hsv::new(hue, saturation, value);
            print(Reply::from(controller.put_color(&ids(&targets), hsv).await))
        }
        Commands::Brightness { level, ids: targets } => {
            print(Reply::from(controller.put_brightness(&ids(&targets), level).await))
        }
        Commands::Mode { id, mode } => print(Reply::from(controller.put_mode(&id, mode).await)),
        Commands::Scene { scene, ids: targets } => match Scene::decode(&scene) {
            Ok(scene) => print(Reply::from(controller.put_scene(&ids(&targets), &scene).await)),
            Err(e) => print(Reply::<()>::from(Err(e))),
        },
        Commands::Warmth { percent, ids: targets } => {
            print(Reply::from(controller.put_warmth(&ids(&targets), percent).await))
        }
        Commands::Timer { seconds, ids: targets } => {
            let at = chrono::Utc::now() + chrono::Duration::seconds(seconds);
            let scheduled = print(Reply::from(controller.set_timer(&ids(&targets), at).await));
            if scheduled {
                // keep the process alive until the timer has fired
                tokio::time::sleep(std::time::Duration::from_secs(seconds.max(0) as u64 + 5)).await;
            }
            scheduled
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
