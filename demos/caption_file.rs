use caption_runner::*;
use std::path::Path;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caption_runner=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(image_path), Some(flavor)) = (args.next(), args.next()) else {
        eprintln!("Usage: caption_file <image_path> <flavor_id> [console_url]");
        std::process::exit(1);
    };
    let console_url = args.next().unwrap_or("http://localhost:3000".to_string());
    let flavor_id: FlavorId = flavor.parse()?;

    let token = std::env::var("CAPTION_ACCESS_TOKEN").unwrap_or_default();
    let orchestrator = Orchestrator::new(
        PipelineClient::new(),
        HttpFlavorValidator::new(console_url),
        StaticSession::new(token),
    );

    let file = ImageFile::from_path(Path::new(&image_path)).await?;
    println!("Captioning {} with flavor {}...", file.name, flavor_id);

    let report = orchestrator
        .invoke_with_progress(InvocationRequest::new(flavor_id).with_file(file), |event| {
            if let RunEvent::PollAttempt { attempt, max_attempts, .. } = event {
                println!("Generating captions... (attempt {}/{})", attempt, max_attempts);
            }
        })
        .await;

    if let Some(banner) = &report.banner {
        eprintln!("{}", banner);
    }
    for step in &report.debug_steps {
        eprintln!("  [{}] {:?} {}", step.step, step.status, step.detail);
    }

    println!("Captions ({}):", report.captions.len());
    for caption in &report.captions {
        println!("  - {}", caption);
    }

    Ok(())
}
