use std::time::Duration;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use companion_media::{
    DIAGNOSTICS_FILE, ErrorKind, MediaClient, MediaError, PollPolicy, RESULT_ACTION,
    SUBMIT_ACTION, VideoRequest,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::support::{FakeMediaService, credentials};

const PHOTO: &[u8] = b"\x89PNG\r\n\x1a\nfake pet photo";
const VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake video bytes";

fn fast() -> PollPolicy {
    PollPolicy::default().with_interval(Duration::from_millis(10))
}

struct Fixture {
    service: FakeMediaService,
    client: MediaClient,
    dir: tempfile::TempDir,
}

impl Fixture {
    async fn new() -> Result<Self> {
        let service = FakeMediaService::start().await?;
        let client = MediaClient::new(credentials(), service.config())?;
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("rex.png"), PHOTO)?;
        Ok(Self {
            service,
            client,
            dir,
        })
    }

    fn submitted(&self, task_id: &str) {
        self.service.respond(
            SUBMIT_ACTION,
            200,
            json!({ "code": 10000, "message": "Success", "data": { "task_id": task_id } }),
        );
    }

    fn status(&self, status: &str) {
        self.service.respond(
            RESULT_ACTION,
            200,
            json!({ "code": 10000, "data": { "status": status } }),
        );
    }

    fn done(&self, video_path: &str) {
        self.service.respond(
            RESULT_ACTION,
            200,
            json!({ "code": 10000, "data": { "status": "done", "video_url": self.service.file_url(video_path) } }),
        );
    }

    async fn generate(&self, policy: &PollPolicy, cancel: CancellationToken) -> Result<std::path::PathBuf, MediaError> {
        self.client
            .generate_video(
                &self.dir.path().join("rex.png"),
                &self.dir.path().join("videos"),
                &VideoRequest::default(),
                policy,
                cancel,
            )
            .await
    }
}

#[tokio::test]
async fn it_polls_until_done_and_downloads_the_video() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-1");
    fixture.status("in_queue");
    fixture.status("generating");
    fixture.done("cdn/task-1.mp4");
    fixture.service.serve_file("cdn/task-1.mp4", VIDEO);

    let path = fixture.generate(&fast(), CancellationToken::new()).await?;

    assert_eq!(path, fixture.dir.path().join("videos").join("rex_i2v.mp4"));
    assert_eq!(std::fs::read(&path)?, VIDEO);
    assert_eq!(fixture.service.calls(SUBMIT_ACTION), 1);
    assert_eq!(fixture.service.calls(RESULT_ACTION), 3);

    let submitted = &fixture.service.bodies(SUBMIT_ACTION)[0];
    let encoded = STANDARD.encode(PHOTO);
    assert_eq!(submitted["req_key"], "jimeng_i2v_first_tail_v30");
    assert_eq!(submitted["binary_data_base64"], json!([encoded, encoded]));
    assert_eq!(submitted["prompt"], "旋转跳跃");
    assert_eq!(submitted["seed"], -1);
    assert_eq!(submitted["frames"], 121);

    assert_eq!(
        fixture.service.bodies(RESULT_ACTION)[0],
        json!({ "req_key": "jimeng_i2v_first_tail_v30", "task_id": "task-1" })
    );

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_retries_failed_result_queries() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-2");
    fixture
        .service
        .respond(RESULT_ACTION, 500, json!({ "message": "busy" }));
    fixture.service.respond_raw(RESULT_ACTION, 200, "not json");
    fixture
        .service
        .respond(RESULT_ACTION, 200, json!({ "code": 50000, "message": "transient" }));
    fixture.done("cdn/task-2.mp4");
    fixture.service.serve_file("cdn/task-2.mp4", VIDEO);

    let path = fixture.generate(&fast(), CancellationToken::new()).await?;

    assert_eq!(std::fs::read(path)?, VIDEO);
    assert_eq!(fixture.service.calls(RESULT_ACTION), 4);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_does_not_poll_after_a_rejected_submission() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.service.respond(
        SUBMIT_ACTION,
        200,
        json!({ "code": 50411, "message": "Pre Img Risk Not Pass" }),
    );

    let error = fixture
        .generate(&fast(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(error, MediaError::Service { ref code, ref message } if code == "50411" && message == "Pre Img Risk Not Pass")
    );
    assert_eq!(fixture.service.calls(RESULT_ACTION), 0);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_does_not_poll_after_a_malformed_submission_reply() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.service.respond_raw(SUBMIT_ACTION, 200, "not json");

    let error = fixture
        .generate(&fast(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Protocol);
    assert!(matches!(error, MediaError::Malformed(_)));
    assert_eq!(fixture.service.calls(SUBMIT_ACTION), 1);
    assert_eq!(fixture.service.calls(RESULT_ACTION), 0);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_does_not_poll_after_a_failed_submission_request() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.service.respond_raw(SUBMIT_ACTION, 502, "<html>bad gateway</html>");

    let error = fixture
        .generate(&fast(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, MediaError::Status { status: 502, .. }));
    assert_eq!(fixture.service.calls(RESULT_ACTION), 0);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_saves_a_submission_reply_without_a_task_id() -> Result<()> {
    let service = FakeMediaService::start().await?;
    service.respond(
        SUBMIT_ACTION,
        200,
        json!({ "code": 10000, "data": { "state": "accepted" } }),
    );
    let dir = tempfile::tempdir()?;
    let diagnostics = dir.path().join("diagnostics");
    let client = MediaClient::new(
        credentials(),
        service.config().with_diagnostics_dir(&diagnostics),
    )?;

    let error = client
        .submit_video_job(PHOTO, &VideoRequest::default())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Schema);

    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(diagnostics.join(DIAGNOSTICS_FILE))?)?;
    assert_eq!(saved["data"]["state"], "accepted");

    service.stop();
    Ok(())
}

#[tokio::test]
async fn it_requires_a_task_id() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture
        .service
        .respond(SUBMIT_ACTION, 200, json!({ "code": 10000, "data": {} }));

    let error = fixture
        .generate(&fast(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Schema);
    assert_eq!(fixture.service.calls(RESULT_ACTION), 0);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_gives_up_after_the_attempt_budget() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-3");
    fixture.status("in_queue");

    let error = fixture
        .generate(&fast().with_max_attempts(3), CancellationToken::new())
        .await
        .unwrap_err();

    match error {
        MediaError::Timeout {
            job_id, attempts, ..
        } => {
            assert_eq!(job_id, "task-3");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fixture.service.calls(RESULT_ACTION), 3);
    assert!(!fixture.dir.path().join("videos/rex_i2v.mp4").exists());

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_gives_up_after_the_time_budget() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-4");
    fixture.status("generating");

    let policy = fast().with_max_wait(Duration::from_millis(100));
    let error = fixture
        .generate(&policy, CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Timeout);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_stops_polling_when_cancelled() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-5");
    fixture.status("generating");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let slow = PollPolicy::default().with_interval(Duration::from_secs(60));
    let error = tokio::time::timeout(Duration::from_secs(10), fixture.generate(&slow, cancel))
        .await?
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert_eq!(fixture.service.calls(RESULT_ACTION), 1);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_rejects_a_finished_job_without_a_video() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-6");
    fixture.status("done");

    let error = fixture
        .generate(&fast(), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Schema);
    assert_eq!(fixture.service.calls(RESULT_ACTION), 1);

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_leaves_no_file_behind_when_the_download_fails() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-7");
    fixture.done("cdn/never-uploaded.mp4");

    let error = fixture
        .generate(&fast(), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(error, MediaError::Status { status: 404, .. }));
    assert!(!fixture.dir.path().join("videos/rex_i2v.mp4").exists());

    fixture.service.stop();
    Ok(())
}

#[tokio::test]
async fn it_does_not_submit_without_an_image() -> Result<()> {
    let fixture = Fixture::new().await?;
    fixture.submitted("task-8");

    let error = fixture
        .client
        .generate_video(
            &fixture.dir.path().join("missing.png"),
            fixture.dir.path(),
            &VideoRequest::default(),
            &fast(),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::File);
    assert_eq!(fixture.service.total_calls(), 0);

    fixture.service.stop();
    Ok(())
}
