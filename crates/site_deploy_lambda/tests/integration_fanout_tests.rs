mod support;

use serde_json::{json, Value};
use support::events::{create, source, update};
use support::harness::DeployerHarness;

#[tokio::test]
async fn sources_fan_out_and_merge_into_one_prefix() {
    let harness = DeployerHarness::new().with_fanout();
    harness.seed_archive("a", "app.zip", &[("index.html", "app"), ("app.js", "run()")]);
    harness.seed_archive("a", "docs.zip", &[("docs/index.html", "docs")]);
    harness.store.seed("d", "web/sibling.txt", b"not ours");

    harness
        .run(create(json!({
            "Sources": [source("a", "app.zip"), source("a", "docs.zip")],
            "DestinationBucketName": "d",
            "DestinationBucketKeyPrefix": "web",
        })))
        .await;

    assert_eq!(harness.only_signal()["Status"], "SUCCESS");
    let uploader = harness.uploader.as_ref().expect("fan-out configured");
    let payloads = uploader.payloads();
    assert_eq!(payloads.len(), 2);
    assert!(payloads.iter().all(|payload| !payload.prune_stale));
    assert_eq!(
        harness.store.keys("d"),
        vec!["web/app.js", "web/docs/index.html", "web/index.html", "web/sibling.txt"]
    );
}

#[tokio::test]
async fn single_source_fan_out_mirrors_the_prefix() {
    let harness = DeployerHarness::new().with_fanout();
    harness.seed_archive("a", "app.zip", &[("index.html", "app")]);
    harness.store.seed("d", "web/stale.html", b"old");

    harness
        .run(update(
            "aws.cdk.s3deployment.existing",
            json!({
                "Sources": [source("a", "app.zip")],
                "DestinationBucketName": "d",
                "DestinationBucketKeyPrefix": "web",
                "FileOptions": [["--exclude", "*", "--include", "*.html", "--cache-control", "no-cache"]],
            }),
            Value::Null,
        ))
        .await;

    assert_eq!(harness.only_signal()["Status"], "SUCCESS");
    assert_eq!(harness.store.keys("d"), vec!["web/index.html"]);
    let index = harness.store.object("d", "web/index.html").expect("index published");
    assert_eq!(index.headers.cache_control.as_deref(), Some("no-cache"));
}

#[tokio::test]
async fn one_failing_source_fails_the_deployment_after_all_finish() {
    let harness = DeployerHarness::new().with_fanout();
    harness.seed_archive("a", "good.zip", &[("good.txt", "ok")]);

    harness
        .run(create(json!({
            "Sources": [source("a", "good.zip"), source("a", "missing.zip")],
            "DestinationBucketName": "d",
        })))
        .await;

    let body = harness.only_signal();
    assert_eq!(body["Status"], "FAILED");
    assert!(body["Reason"]
        .as_str()
        .is_some_and(|reason| reason.contains("s3://a/missing.zip")));
    assert_eq!(harness.store.keys("d"), vec!["good.txt"]);
}
