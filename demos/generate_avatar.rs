//! This example runs one full generation attempt:
//! 1. Validating a local image and binding its preview.
//! 2. Checking the rate limit and submitting the image with the chosen style.
//! 3. Saving the result into a temporary directory.
//!
//! The service URL is read from `AVATAR_API_URL` (default `http://localhost:8000/`).
//!
//! Usage:
//! `cargo run --example generate_avatar <IMAGE_PATH> [STYLE]`

use avatar_stylizer::{CandidateFile, LocalPlatform, Orchestrator, Style, StylizerClient};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if it exists.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let image_path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Please provide an image path as a command-line argument."))?;
    let style: Style = match env::args().nth(2) {
        Some(name) => name.parse()?,
        None => Style::default(),
    };

    let client = StylizerClient::new(None)?;
    let temp_dir = tempfile::Builder::new()
        .prefix("avatar_download_")
        .tempdir()?;
    let platform = LocalPlatform::new(client.clone(), temp_dir.path());
    let mut orchestrator = Orchestrator::new(client, platform);

    let accepted = orchestrator.select_file(CandidateFile::from_path(&image_path)?)?;
    println!(
        "Selected `{}` ({} bytes), preview at {}",
        accepted.candidate.file_name,
        accepted.candidate.size,
        accepted.preview.path().display()
    );

    orchestrator.set_style(style);
    println!("\nGenerating a {} avatar...", style.label());

    match orchestrator.request_generation().await {
        Ok(avatar) => {
            println!("Generated: {}", avatar.image_url);
            if let Some(path) = orchestrator.download_result().await? {
                println!("Saved to {}", path.display());
            }
        }
        Err(e) => {
            let notice = e.notice();
            eprintln!("\n{}: {}", notice.title, notice.message);
        }
    }

    // Keep the downloaded file around for inspection.
    let kept = temp_dir.keep();
    println!("\nOutput directory: {}", kept.display());
    orchestrator.teardown();

    Ok(())
}
