
use caption_runner::*;
use test_helpers::*;

fn summary(report: &InvocationReport) -> Vec<(RunSource, String, RunStatus, Vec<String>, Option<String>, bool)> {
    report
        .runs
        .iter()
        .map(|r| {
            (
                r.source,
                r.image_url.clone(),
                r.status,
                r.captions.clone(),
                r.error.clone(),
                r.flavor_rejected,
            )
        })
        .collect()
}

// --- Preconditions ---

#[tokio::test]
async fn test_missing_flavor_aborts_without_runs() {
    let orch = orchestrator(ScriptedTransport::new());
    let request = InvocationRequest {
        flavor_id: None,
        cached_readiness: None,
        source: ImageSource::Stored(images(&["https://img.test/1.png"])),
    };
    let report = orch.invoke(request).await;

    assert_eq!(report.error, Some(CaptionError::NoFlavorSelected));
    assert_eq!(report.banner.as_deref(), Some("Please select a humor flavor."));
    assert!(report.runs.is_empty());
    assert!(orch.client().transport().calls().is_empty());
}

#[tokio::test]
async fn test_flavor_without_steps_aborts() {
    let orch = Orchestrator::new(
        pipeline(ScriptedTransport::new()),
        ScriptedValidator::with(FlavorReadiness::NotReady(
            "This flavor has no steps. Add steps first.".into(),
        )),
        StaticSession::new("tok"),
    );
    let report = orch
        .invoke(InvocationRequest::new(3).with_images(images(&["https://img.test/1.png"])))
        .await;

    assert!(matches!(report.error, Some(CaptionError::FlavorNotReady(_))));
    assert_eq!(
        report.banner.as_deref(),
        Some("This flavor has no steps. Add steps first.")
    );
    assert!(report.runs.is_empty());
    assert!(orch.client().transport().calls().is_empty());
}

#[tokio::test]
async fn test_cached_not_ready_short_circuits() {
    let orch = orchestrator(ScriptedTransport::new());
    let report = orch
        .invoke(
            InvocationRequest::new(3)
                .with_cached_readiness(FlavorReadiness::NotReady("no steps".into()))
                .with_images(images(&["https://img.test/1.png"])),
        )
        .await;
    assert_eq!(report.error, Some(CaptionError::FlavorNotReady("no steps".into())));
    assert!(report.runs.is_empty());
}

#[tokio::test]
async fn test_cached_ready_is_reverified() {
    let orch = Orchestrator::new(
        pipeline(ScriptedTransport::new()),
        ScriptedValidator::with(FlavorReadiness::NotReady("steps removed".into())),
        StaticSession::new("tok"),
    );
    let report = orch
        .invoke(
            InvocationRequest::new(3)
                .with_cached_readiness(FlavorReadiness::Ready)
                .with_images(images(&["https://img.test/1.png"])),
        )
        .await;
    assert_eq!(
        report.error,
        Some(CaptionError::FlavorNotReady("steps removed".into()))
    );
}

#[tokio::test]
async fn test_no_image_source_aborts() {
    let orch = orchestrator(ScriptedTransport::new());
    let report = orch.invoke(InvocationRequest::new(3)).await;
    assert_eq!(report.error, Some(CaptionError::NoImageSource));

    let report = orch
        .invoke(InvocationRequest::new(3).with_images(Vec::new()))
        .await;
    assert_eq!(report.error, Some(CaptionError::NoImageSource));
    assert!(orch.client().transport().calls().is_empty());
}

#[tokio::test]
async fn test_signed_out_fails_before_any_stage() {
    let orch = Orchestrator::new(
        pipeline(ScriptedTransport::new()),
        ScriptedValidator::ready(),
        StaticSession::signed_out(),
    );
    let report = orch
        .invoke(InvocationRequest::new(3).with_file(png("a.png")))
        .await;
    assert_eq!(report.error, Some(CaptionError::NoActiveSession));
    assert_eq!(
        report.banner.as_deref(),
        Some("No active session. Please sign in again.")
    );
    assert!(orch.client().transport().calls().is_empty());
}

// --- File invocation ---

#[tokio::test]
async fn test_file_invocation_end_to_end() {
    let orch = orchestrator(
        ScriptedTransport::new().on_post(test_helpers::GENERATE, Reply::ok(r#"["one", "two"]"#)),
    );
    let report = orch
        .invoke(InvocationRequest::new(5).with_file(png("cat.png")))
        .await;

    assert!(!report.is_aborted());
    assert_eq!(report.runs.len(), 1);
    let run = &report.runs[0];
    assert_eq!(run.source, RunSource::File);
    assert_eq!(run.image_url, "https://cdn.test/abc.png");
    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.image_id.as_deref(), Some("img-1"));
    assert_eq!(report.captions, vec!["one", "two"]);

    let transport = orch.client().transport();
    assert_eq!(transport.methods(), vec!["POST", "PUT", "POST", "POST"]);
    for call in transport.calls().iter().filter(|c| c.method == "POST") {
        assert_eq!(call.bearer.as_deref(), Some("test-token"));
    }
    // Fresh uploads are not probed.
    assert!(!transport.methods().contains(&"HEAD"));
}

#[tokio::test]
async fn test_upload_failure_creates_no_run() {
    let orch = orchestrator(ScriptedTransport::new().on_put(Reply::status(500, "disk full")));
    let report = orch
        .invoke(InvocationRequest::new(5).with_file(png("cat.png")))
        .await;

    assert!(report.runs.is_empty());
    assert!(matches!(
        report.error,
        Some(CaptionError::UploadFailure { status: 500, .. })
    ));
    assert_eq!(report.banner.as_deref(), Some("Failed to upload image bytes."));
    assert_eq!(report.debug_steps.len(), 1);
    assert_eq!(report.debug_steps[0].step, "upload bytes");
    assert_eq!(report.debug_steps[0].detail, "disk full");
    assert!(orch.client().transport().calls_to(test_helpers::REGISTER).is_empty());
}

#[tokio::test]
async fn test_unsupported_file_is_invocation_error() {
    let orch = orchestrator(ScriptedTransport::new());
    let report = orch
        .invoke(
            InvocationRequest::new(5).with_file(ImageFile::new("doc.pdf", "application/pdf", vec![1])),
        )
        .await;
    assert!(report.runs.is_empty());
    assert_eq!(
        report.banner.as_deref(),
        Some("Unsupported file type. Use JPG, PNG, WebP, GIF, or HEIC.")
    );
    assert!(orch.client().transport().calls().is_empty());
}

// --- Batch invocation ---

#[tokio::test]
async fn test_unreachable_image_does_not_stop_batch() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .unreachable("https://img.test/2.png")
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["first"]"#))
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["third"]"#)),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&[
            "https://img.test/1.png",
            "https://img.test/2.png",
            "https://img.test/3.png",
        ])))
        .await;

    let statuses: Vec<RunStatus> = report.runs.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![RunStatus::Success, RunStatus::Error, RunStatus::Success]
    );
    assert_eq!(report.captions, vec!["first", "third"]);
    assert_eq!(report.runs[1].error_kind, Some(ErrorKind::Unreachable));
    assert_eq!(
        report.runs[1].error.as_deref(),
        Some("Selected image URL is not publicly accessible. Upload a file instead.")
    );
    assert!(report.runs[1].image_id.is_none());
    assert!(!report.is_aborted());
    assert!(report.banner.is_some());

    let registered: Vec<String> = orch
        .client()
        .transport()
        .calls_to(test_helpers::REGISTER)
        .into_iter()
        .map(|c| c.body.unwrap()["imageUrl"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(registered, vec!["https://img.test/1.png", "https://img.test/3.png"]);
}

#[tokio::test]
async fn test_runs_are_strictly_sequential() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["a"]"#))
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["b"]"#)),
    );
    orch.invoke(InvocationRequest::new(9).with_images(images(&[
        "https://img.test/1.png",
        "https://img.test/2.png",
    ])))
    .await;

    // Each image is probed, registered, and captioned before the next starts.
    let calls = orch.client().transport().calls();
    let trace: Vec<String> = calls
        .iter()
        .map(|c| {
            let tail = c.url.rsplit('/').next().unwrap_or("").to_string();
            format!("{} {}", c.method, tail)
        })
        .collect();
    assert_eq!(
        trace,
        vec![
            "HEAD 1.png",
            "POST upload-image-from-url",
            "POST generate-captions",
            "HEAD 2.png",
            "POST upload-image-from-url",
            "POST generate-captions",
        ]
    );
}

#[tokio::test]
async fn test_stage_failures_stay_in_their_run() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post(test_helpers::REGISTER, Reply::Down)
            .on_post(test_helpers::REGISTER, Reply::ok(r#"{"imageId": "img-2"}"#))
            .on_post(test_helpers::REGISTER, Reply::ok(r#"{"imageId": "img-3"}"#))
            .on_post(test_helpers::GENERATE, Reply::status(500, "model crashed"))
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["ok"]"#)),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&[
            "https://img.test/1.png",
            "https://img.test/2.png",
            "https://img.test/3.png",
        ])))
        .await;

    assert_eq!(report.runs[0].error_kind, Some(ErrorKind::Network));
    assert_eq!(report.runs[1].error_kind, Some(ErrorKind::GenerationFailure));
    assert_eq!(report.runs[1].image_id.as_deref(), Some("img-2"));
    assert_eq!(report.runs[1].error.as_deref(), Some("Failed to generate captions."));
    assert_eq!(report.runs[2].status, RunStatus::Success);
    assert_eq!(report.captions, vec!["ok"]);

    assert_eq!(report.debug_steps.len(), 2);
    assert_eq!(report.debug_steps[0].step, "upload-image-from-url");
    assert_eq!(report.debug_steps[0].status, None);
    assert_eq!(report.debug_steps[1].step, "generate-captions");
    assert_eq!(report.debug_steps[1].status, Some(500));
    assert_eq!(report.debug_steps[1].image_url.as_deref(), Some("https://img.test/2.png"));
}

#[tokio::test]
async fn test_transport_failures_reach_diagnostics() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post(test_helpers::REGISTER, Reply::Down)
            .on_post(test_helpers::GENERATE, Reply::status(422, "bad flavor"))
            .on_post(test_helpers::GENERATE, Reply::Down),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&[
            "https://img.test/1.png",
            "https://img.test/2.png",
        ])))
        .await;

    let steps: Vec<(&str, Option<u16>)> = report
        .debug_steps
        .iter()
        .map(|s| (s.step.as_str(), s.status))
        .collect();
    assert_eq!(
        steps,
        vec![("upload-image-from-url", None), ("generate-captions", None)]
    );
    assert!(report.debug_steps[0].detail.contains("connection refused"));
    assert_eq!(report.debug_steps[1].image_url.as_deref(), Some("https://img.test/2.png"));

    // The failed fallback is the latest exchange, not the rejected primary.
    let last = report.last_generation.unwrap();
    assert_eq!(last.image_id, "img-1");
    assert_eq!(last.status, None);
    assert_eq!(last.body, None);

    let run = &report.runs[1];
    assert_eq!(run.error_kind, Some(ErrorKind::Network));
    assert!(run.flavor_rejected);
    assert_eq!(run.debug.as_ref().map(|d| d.step.as_str()), Some("generate-captions"));
}

#[tokio::test(start_paused = true)]
async fn test_poll_transport_failure_gets_poll_step() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post(test_helpers::GENERATE, Reply::ok("[]"))
            .on_post(test_helpers::GENERATE, Reply::Down),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&["https://img.test/1.png"])))
        .await;
    assert_eq!(report.runs[0].error_kind, Some(ErrorKind::Network));
    assert_eq!(report.debug_steps.len(), 1);
    assert_eq!(report.debug_steps[0].step, "generate-captions (poll)");
    assert_eq!(report.debug_steps[0].status, None);
}

#[tokio::test]
async fn test_upload_transport_failure_is_logged() {
    let orch = orchestrator(ScriptedTransport::new().on_put(Reply::Down));
    let report = orch
        .invoke(InvocationRequest::new(5).with_file(png("cat.png")))
        .await;
    assert!(report.runs.is_empty());
    assert!(matches!(report.error, Some(CaptionError::Network { .. })));
    assert_eq!(report.debug_steps.len(), 1);
    assert_eq!(report.debug_steps[0].step, "upload");
    assert_eq!(report.debug_steps[0].status, None);
}

#[tokio::test]
async fn test_missing_image_id_is_run_error() {
    let orch = orchestrator(
        ScriptedTransport::new().on_post(test_helpers::REGISTER, Reply::ok(r#"{"id": 1}"#)),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&["https://img.test/1.png"])))
        .await;
    assert_eq!(report.runs[0].error.as_deref(), Some("API did not return an image id."));
    assert!(orch.client().transport().calls_to(test_helpers::GENERATE).is_empty());
}

// --- Fallback and polling through the orchestrator ---

#[tokio::test]
async fn test_flavor_rejection_marks_run_and_warns() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post(test_helpers::GENERATE, Reply::status(422, "unknown field humorFlavorId"))
            .on_post(test_helpers::GENERATE, Reply::ok(r#"[{"content": "plain"}]"#)),
    );
    let mut events = Vec::new();
    let report = orch
        .invoke_with_progress(
            InvocationRequest::new(9).with_images(images(&["https://img.test/1.png"])),
            |e| events.push(e),
        )
        .await;

    let run = &report.runs[0];
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.flavor_rejected);
    assert_eq!(run.captions, vec!["plain"]);
    assert_eq!(
        report.warning.as_deref(),
        Some("Flavor parameter rejected by API, retrying without it. (unknown field humorFlavorId)")
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, RunEvent::FlavorRejected { .. })));
    assert_eq!(orch.client().transport().calls_to(test_helpers::GENERATE).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pending_then_polled_results() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post(test_helpers::GENERATE, Reply::ok("[]"))
            .on_post_n(test_helpers::GENERATE, Reply::ok("[]"), 2)
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["late caption"]"#)),
    );
    let mut attempts = Vec::new();
    let report = orch
        .invoke_with_progress(
            InvocationRequest::new(9).with_images(images(&["https://img.test/1.png"])),
            |e| {
                if let RunEvent::PollAttempt { attempt, max_attempts, .. } = e {
                    attempts.push((attempt, max_attempts));
                }
            },
        )
        .await;

    assert_eq!(report.runs[0].status, RunStatus::Success);
    assert_eq!(report.captions, vec!["late caption"]);
    assert_eq!(attempts, vec![(1, 20), (2, 20), (3, 20)]);
    let last = report.last_generation.unwrap();
    assert_eq!(last.status, Some(200));
    assert_eq!(last.body.as_deref(), Some(r#"["late caption"]"#));
    assert_eq!(last.image_id, "img-1");
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_is_reported_as_still_processing() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post_n(test_helpers::GENERATE, Reply::ok("[]"), 21)
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["second image"]"#)),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&[
            "https://img.test/1.png",
            "https://img.test/2.png",
        ])))
        .await;

    let run = &report.runs[0];
    assert_eq!(run.status, RunStatus::Error);
    assert!(run.is_still_processing());
    assert_eq!(
        run.error.as_deref(),
        Some("Still processing, try again in a few seconds.")
    );
    assert!(run.captions.is_empty());
    assert_eq!(
        report.banner.as_deref(),
        Some("Still processing, try again in a few seconds.")
    );
    // A soft timeout is not an invocation failure and the batch continues.
    assert!(!report.is_aborted());
    assert_eq!(report.runs[1].status, RunStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failure_gets_poll_label() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .on_post(test_helpers::GENERATE, Reply::ok("[]"))
            .on_post(test_helpers::GENERATE, Reply::status(502, "bad gateway")),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&["https://img.test/1.png"])))
        .await;
    assert_eq!(report.runs[0].error_kind, Some(ErrorKind::GenerationFailure));
    assert_eq!(report.debug_steps[0].step, "generate-captions (poll)");
    assert_eq!(report.debug_steps[0].status, Some(502));
}

#[tokio::test]
async fn test_unexpected_shape_run_error() {
    let orch = orchestrator(
        ScriptedTransport::new().on_post(test_helpers::GENERATE, Reply::ok("accepted")),
    );
    let report = orch
        .invoke(InvocationRequest::new(9).with_images(images(&["https://img.test/1.png"])))
        .await;
    assert_eq!(report.runs[0].error_kind, Some(ErrorKind::UnexpectedShape));
    assert_eq!(
        report.last_generation.unwrap().body.as_deref(),
        Some("accepted")
    );
}

// --- Events and idempotence ---

#[tokio::test]
async fn test_each_run_starts_before_it_settles() {
    let orch = orchestrator(
        ScriptedTransport::new()
            .unreachable("https://img.test/2.png")
            .on_post(test_helpers::GENERATE, Reply::ok(r#"["a"]"#)),
    );
    let mut log = Vec::new();
    orch.invoke_with_progress(
        InvocationRequest::new(9).with_images(images(&[
            "https://img.test/1.png",
            "https://img.test/2.png",
        ])),
        |e| {
            log.push(match e {
                RunEvent::RunStarted { .. } => "started",
                RunEvent::RunSettled(ref r) if r.status == RunStatus::Success => "success",
                RunEvent::RunSettled(_) => "error",
                _ => "other",
            })
        },
    )
    .await;
    assert_eq!(log, vec!["started", "success", "error"]);
}

fn scripted_batch() -> ScriptedTransport {
    ScriptedTransport::new()
        .unreachable("https://img.test/2.png")
        .on_post(test_helpers::GENERATE, Reply::status(400, "no flavor here"))
        .on_post(test_helpers::GENERATE, Reply::ok(r#"["x", {"content": "y"}]"#))
        .on_post(test_helpers::GENERATE, Reply::ok(r#"[{"weird": true}]"#))
}

#[tokio::test]
async fn test_identical_invocations_produce_identical_history() {
    let request = || {
        InvocationRequest::new(9).with_images(images(&[
            "https://img.test/1.png",
            "https://img.test/2.png",
            "https://img.test/3.png",
        ]))
    };

    let first = orchestrator(scripted_batch()).invoke(request()).await;
    let second = orchestrator(scripted_batch()).invoke(request()).await;

    assert_eq!(summary(&first), summary(&second));
    assert_eq!(first.captions, second.captions);
    assert_eq!(first.captions, vec!["x", "y", "{\"weird\":true}"]);
    assert_eq!(first.warning, second.warning);
    // Run ids are per-invocation and never reused.
    assert_ne!(first.runs[0].id, second.runs[0].id);
}
