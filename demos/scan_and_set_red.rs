//! Scan for every configured light and set them all to red.
//!
//! Run with: cargo run --example scan_and_set_red -- lightdeck.json

use lightdeck::{ControllerConfig, LightController, Rgb};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "lightdeck.json".to_string());
    let controller = LightController::from_config(ControllerConfig::load(&path)?)?;

    println!("Scanning for lights...");
    let devices = controller.rescan().await?;

    if devices.is_empty() {
        println!("No lights found.");
        return Ok(());
    }

    println!("Found {} light(s):", devices.len());
    for device in &devices {
        println!("  - {} ({}) {}", device.id(), device.kind(), device.name().unwrap_or(""));
    }

    let ids: Vec<&str> = devices.iter().map(|d| d.id()).collect();
    let result = controller.put_rgb(&ids, Rgb::new(255, 0, 0)).await?;

    if result.completed {
        println!("\nAll lights are red.");
    } else {
        println!("\nSome lights did not respond, see the log for details.");
    }
    Ok(())
}
