use caption_runner::selection::fallback_images;
use caption_runner::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caption_runner=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(flavor) = args.next() else {
        eprintln!("Usage: caption_batch <flavor_id> [image_url...]");
        std::process::exit(1);
    };
    let flavor_id: FlavorId = flavor.parse()?;
    let urls: Vec<String> = args.collect();

    let console_url =
        std::env::var("CAPTION_CONSOLE_URL").unwrap_or("http://localhost:3000".to_string());
    let token = std::env::var("CAPTION_ACCESS_TOKEN").unwrap_or_default();

    let client = PipelineClient::new();
    let stored = urls
        .iter()
        .enumerate()
        .map(|(i, url)| StoredImage::new(i as i64 + 1, url.as_str()))
        .collect::<Vec<_>>();
    let mut catalog = ImageCatalog::new(stored);
    catalog.refresh_access(&client).await;

    let mut selection = Selection::new();
    for image in catalog.visible() {
        if !selection.toggle_image(&catalog, image.id) {
            println!("Skipping unreachable image {}", image.url);
        }
    }
    if catalog.images() == fallback_images().as_slice() {
        println!("No image URLs given, using placeholder images.");
    }

    let validator = HttpFlavorValidator::new(console_url);
    let readiness = validator.check_steps(flavor_id).await;
    let orchestrator = Orchestrator::new(client, validator, StaticSession::new(token));

    let request = InvocationRequest {
        flavor_id: Some(flavor_id),
        cached_readiness: Some(readiness),
        source: selection.image_source(&catalog),
    };
    let report = orchestrator
        .invoke_with_progress(request, |event| match event {
            RunEvent::RunStarted { image_url, .. } => println!("Running {}", image_url),
            RunEvent::FlavorRejected { body, .. } => println!("Flavor rejected: {}", body),
            RunEvent::PollAttempt { attempt, max_attempts, .. } => {
                println!("  attempt {}/{}", attempt, max_attempts)
            }
            RunEvent::RunSettled(_) => {}
        })
        .await;

    if let Some(warning) = &report.warning {
        println!("Warning: {}", warning);
    }
    if let Some(banner) = &report.banner {
        println!("{}", banner);
    }
    for run in &report.runs {
        match run.status {
            RunStatus::Success => println!("{} ({} captions)", run.image_url, run.captions.len()),
            _ => println!(
                "{} failed: {}",
                run.image_url,
                run.error.as_deref().unwrap_or("unknown error")
            ),
        }
        for caption in &run.captions {
            println!("  - {}", caption);
        }
    }

    Ok(())
}
