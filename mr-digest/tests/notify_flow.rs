use chat_webhook::SlackWebhookClient;
use git_provider::{GitLabClient, GitLabConfig};
use mr_digest::collect::{collect_project_ids, resolve_group_ids};
use mr_digest::{CycleReport, Delivery, Notifier, NotifyConfig};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gitlab(server: &MockServer) -> GitLabClient {
    GitLabClient::from_config(GitLabConfig::new(server.uri(), "test-token")).unwrap()
}

fn notifier(server: &MockServer, targets_yaml: &str) -> Notifier {
    let yaml = format!("gitlab:\n  url: {}\n{targets_yaml}", server.uri());
    let config = NotifyConfig::from_yaml_str(&yaml).unwrap();
    Notifier::new(gitlab(server), SlackWebhookClient::default(), config).unwrap()
}

fn merge_request(project_id: u64, iid: u64, title: &str, author: &str) -> Value {
    json!({
        "id": project_id * 1000 + iid,
        "iid": iid,
        "project_id": project_id,
        "title": title,
        "web_url": format!("https://gitlab.example.com/p{project_id}/-/merge_requests/{iid}"),
        "state": "opened",
        "created_at": "2024-03-05T09:07:00.000Z",
        "author": { "name": author, "username": author.to_lowercase() }
    })
}

async fn mount_json(server: &MockServer, p: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_project(server: &MockServer, id: u64, name: &str, mrs: Value) {
    mount_json(server, &format!("/api/v4/projects/{id}"), json!({ "id": id, "name": name })).await;
    mount_json(server, &format!("/api/v4/projects/{id}/merge_requests"), mrs).await;
}

async fn mount_approvals(server: &MockServer, project_id: u64, iid: u64, names: &[&str]) {
    let approved_by: Vec<Value> = names.iter().map(|n| json!({ "user": { "name": n } })).collect();
    mount_json(
        server,
        &format!("/api/v4/projects/{project_id}/merge_requests/{iid}/approvals"),
        json!({ "approved_by": approved_by }),
    )
    .await;
}

async fn mount_webhook(server: &MockServer, p: &str, expected_posts: u64) {
    Mock::given(method("POST"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(expected_posts)
        .mount(server)
        .await;
}

/// Texts posted to the given webhook path, in arrival order.
async fn posted_texts(server: &MockServer, p: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == p)
        .map(|r| {
            let body: Value = serde_json::from_slice(&r.body).unwrap();
            body["text"].as_str().unwrap().to_string()
        })
        .collect()
}

#[tokio::test]
async fn group_digest_lists_every_merge_request_with_approvals() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/v4/groups/10/subgroups", json!([])).await;
    mount_json(
        &server,
        "/api/v4/groups/10/projects",
        json!([{ "id": 100, "name": "backend" }]),
    )
    .await;
    mount_project(
        &server,
        100,
        "backend",
        json!([
            merge_request(100, 1, "Add caching", "Carol"),
            merge_request(100, 2, "Fix typo", "Dave"),
        ]),
    )
    .await;
    mount_approvals(&server, 100, 1, &["Alice"]).await;
    mount_approvals(&server, 100, 2, &[]).await;
    mount_webhook(&server, "/hooks/w1", 1).await;

    let n = notifier(
        &server,
        &format!("groups:\n  - id: 10\n    slackWebhook: {}/hooks/w1\n", server.uri()),
    );
    let report = n.run_cycle().await;

    assert_eq!(report.sent, 1);
    assert_eq!(report.total(), 1);

    let texts = posted_texts(&server, "/hooks/w1").await;
    assert_eq!(texts.len(), 1);
    let blocks: Vec<&str> = texts[0].split_terminator("\n\n").collect();
    assert_eq!(blocks.len(), 2);
    assert!(blocks.iter().all(|b| b.starts_with(":arrow_forward: backend <")));
    assert!(blocks[0].contains("|Add caching>"));
    assert!(blocks[0].ends_with("*Approved by:* Alice"));
    assert!(blocks[1].contains("*Author:* Dave"));
    assert!(blocks[1].contains("*Created at:* 5 March 2024, 09:07 UTC"));
    assert!(blocks[1].ends_with("*Approved by:* None"));
}

#[tokio::test]
async fn standalone_project_without_merge_requests_celebrates() {
    let server = MockServer::start().await;

    mount_project(&server, 200, "infra", json!([])).await;
    mount_webhook(&server, "/hooks/w2", 1).await;

    let n = notifier(
        &server,
        &format!("projects:\n  - id: 200\n    slackWebhook: {}/hooks/w2\n", server.uri()),
    );
    let report = n.run_cycle().await;

    assert_eq!(report.sent, 1);
    assert_eq!(
        posted_texts(&server, "/hooks/w2").await,
        vec![":tada: There are no open merge requests for infra ! :tada:".to_string()]
    );
}

#[tokio::test]
async fn group_without_subgroups_resolves_to_itself() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/v4/groups/42/subgroups", json!([])).await;

    let ids = resolve_group_ids(&gitlab(&server), 42, false).await.unwrap();
    assert_eq!(ids, vec![42]);
}

#[tokio::test]
async fn only_direct_subgroups_unless_recursive() {
    let server = MockServer::start().await;
    mount_json(&server, "/api/v4/groups/1/subgroups", json!([{ "id": 2 }, { "id": 3 }])).await;
    mount_json(&server, "/api/v4/groups/2/subgroups", json!([{ "id": 4 }])).await;
    mount_json(&server, "/api/v4/groups/3/subgroups", json!([])).await;
    mount_json(&server, "/api/v4/groups/4/subgroups", json!([])).await;

    let client = gitlab(&server);
    assert_eq!(resolve_group_ids(&client, 1, false).await.unwrap(), vec![1, 2, 3]);
    assert_eq!(resolve_group_ids(&client, 1, true).await.unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn project_shared_by_two_groups_is_fetched_twice() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/v4/groups/10/subgroups", json!([{ "id": 11 }])).await;
    mount_json(
        &server,
        "/api/v4/groups/10/projects",
        json!([{ "id": 100, "name": "shared" }]),
    )
    .await;
    mount_json(
        &server,
        "/api/v4/groups/11/projects",
        json!([{ "id": 100, "name": "shared" }]),
    )
    .await;
    mount_json(&server, "/api/v4/projects/100", json!({ "id": 100, "name": "shared" })).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/100/merge_requests"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([merge_request(100, 9, "Bump deps", "Erin")])),
        )
        .expect(2)
        .mount(&server)
        .await;
    mount_approvals(&server, 100, 9, &[]).await;
    mount_webhook(&server, "/hooks/w1", 1).await;

    let client = gitlab(&server);
    let group_ids = resolve_group_ids(&client, 10, false).await.unwrap();
    assert_eq!(collect_project_ids(&client, &group_ids).await.unwrap(), vec![100, 100]);

    let n = notifier(
        &server,
        &format!("groups:\n  - id: 10\n    slackWebhook: {}/hooks/w1\n", server.uri()),
    );
    assert_eq!(n.run_cycle().await.sent, 1);

    let texts = posted_texts(&server, "/hooks/w1").await;
    assert_eq!(texts[0].matches("|Bump deps>").count(), 2);
}

#[tokio::test]
async fn empty_project_does_not_suppress_its_siblings() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/v4/groups/10/subgroups", json!([])).await;
    mount_json(
        &server,
        "/api/v4/groups/10/projects",
        json!([{ "id": 102, "name": "web" }, { "id": 101, "name": "api" }]),
    )
    .await;
    mount_project(&server, 101, "api", json!([])).await;
    mount_project(&server, 102, "web", json!([merge_request(102, 3, "Dark mode", "Frank")])).await;
    mount_approvals(&server, 102, 3, &["Alice", "Bob"]).await;
    mount_webhook(&server, "/hooks/w1", 1).await;

    let n = notifier(
        &server,
        &format!("groups:\n  - id: 10\n    slackWebhook: {}/hooks/w1\n", server.uri()),
    );
    n.run_cycle().await;

    let text = &posted_texts(&server, "/hooks/w1").await[0];
    // Sorted by project id: api (101) before web (102).
    assert!(text.starts_with(":tada: There are no open merge requests for api ! :tada:\n\n"));
    assert!(text.contains(":arrow_forward: web <"));
    assert!(text.contains("*Approved by:* Alice, Bob"));
}

#[tokio::test]
async fn failing_group_does_not_stop_the_cycle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v4/groups/1/subgroups"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_webhook(&server, "/hooks/broken", 0).await;

    mount_project(&server, 200, "infra", json!([])).await;
    mount_webhook(&server, "/hooks/w2", 1).await;

    let uri = server.uri();
    let n = notifier(
        &server,
        &format!(
            "groups:\n  - id: 1\n    slackWebhook: {uri}/hooks/broken\n\
             projects:\n  - id: 200\n    slackWebhook: {uri}/hooks/w2\n"
        ),
    );
    let report = n.run_cycle().await;

    assert_eq!(
        report,
        CycleReport {
            sent: 1,
            fetch_failed: 1,
            ..CycleReport::default()
        }
    );
}

#[tokio::test]
async fn approval_failure_aborts_only_that_target() {
    let server = MockServer::start().await;

    mount_project(
        &server,
        300,
        "mobile",
        json!([merge_request(300, 1, "Crash fix", "Gina")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/300/merge_requests/1/approvals"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_webhook(&server, "/hooks/w3", 0).await;

    let n = notifier(
        &server,
        &format!("projects:\n  - id: 300\n    slackWebhook: {}/hooks/w3\n", server.uri()),
    );
    assert_eq!(n.run_cycle().await.fetch_failed, 1);
}

#[tokio::test]
async fn deleted_project_is_left_out_of_the_digest() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/v4/groups/10/subgroups", json!([])).await;
    mount_json(
        &server,
        "/api/v4/groups/10/projects",
        json!([{ "id": 101, "name": "gone" }, { "id": 102, "name": "web" }]),
    )
    .await;
    mount_json(&server, "/api/v4/projects/101/merge_requests", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/101"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_project(&server, 102, "web", json!([])).await;
    mount_webhook(&server, "/hooks/w1", 1).await;

    let n = notifier(
        &server,
        &format!("groups:\n  - id: 10\n    slackWebhook: {}/hooks/w1\n", server.uri()),
    );
    assert_eq!(n.run_cycle().await.sent, 1);

    assert_eq!(
        posted_texts(&server, "/hooks/w1").await,
        vec![":tada: There are no open merge requests for web ! :tada:".to_string()]
    );
}

#[tokio::test]
async fn unavailable_project_name_aborts_the_group_digest() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/v4/groups/10/subgroups", json!([])).await;
    mount_json(
        &server,
        "/api/v4/groups/10/projects",
        json!([{ "id": 101, "name": "a" }, { "id": 102, "name": "b" }]),
    )
    .await;
    mount_json(
        &server,
        "/api/v4/projects/101/merge_requests",
        json!([merge_request(101, 1, "Important", "Hana")]),
    )
    .await;
    mount_approvals(&server, 101, 1, &[]).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/projects/101"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    mount_project(&server, 102, "b", json!([])).await;
    mount_webhook(&server, "/hooks/w1", 0).await;

    let n = notifier(
        &server,
        &format!("groups:\n  - id: 10\n    slackWebhook: {}/hooks/w1\n", server.uri()),
    );
    let report = n.run_cycle().await;

    assert_eq!(report.fetch_failed, 1);
    assert_eq!(report.sent, 0);
    assert!(posted_texts(&server, "/hooks/w1").await.is_empty());
}

#[tokio::test]
async fn rejected_webhook_is_counted_as_delivery_failure() {
    let server = MockServer::start().await;

    mount_project(&server, 200, "infra", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/hooks/w2"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
        .expect(1)
        .mount(&server)
        .await;

    let n = notifier(
        &server,
        &format!("projects:\n  - id: 200\n    slackWebhook: {}/hooks/w2\n", server.uri()),
    );
    let report = n.run_cycle().await;

    assert_eq!(report.delivery_failed, 1);
    assert_eq!(report.sent, 0);
}

#[tokio::test]
async fn group_without_projects_posts_nothing() {
    let server = MockServer::start().await;

    mount_json(&server, "/api/v4/groups/10/subgroups", json!([])).await;
    mount_json(&server, "/api/v4/groups/10/projects", json!([])).await;
    mount_webhook(&server, "/hooks/w1", 0).await;

    let uri = server.uri();
    let n = notifier(&server, &format!("groups:\n  - id: 10\n    slackWebhook: {uri}/hooks/w1\n"));
    let group = n.config().groups[0].clone();

    assert_eq!(n.notify_group(&group).await.unwrap(), Delivery::NothingToSend);
}

#[tokio::test]
async fn dry_run_never_posts() {
    let server = MockServer::start().await;

    mount_project(&server, 200, "infra", json!([])).await;
    mount_webhook(&server, "/hooks/w2", 0).await;

    let n = notifier(
        &server,
        &format!(
            "projects:\n  - id: 200\n    slackWebhook: {}/hooks/w2\ndigest:\n  dryRun: true\n",
            server.uri()
        ),
    );
    let report = n.run_cycle().await;

    assert_eq!(report.dry_run, 1);
    assert_eq!(report.sent, 0);
}

#[tokio::test]
async fn concurrent_cycle_reports_every_target() {
    let server = MockServer::start().await;

    let mut targets = String::from("projects:\n");
    for id in 1..=5u64 {
        mount_project(&server, id, &format!("svc-{id}"), json!([])).await;
        targets.push_str(&format!(
            "  - id: {id}\n    slackWebhook: {}/hooks/p{id}\n",
            server.uri()
        ));
        mount_webhook(&server, &format!("/hooks/p{id}"), 1).await;
    }
    targets.push_str("digest:\n  concurrency: 3\n");

    let report = notifier(&server, &targets).run_cycle().await;

    assert_eq!(report.sent, 5);
    for id in 1..=5u64 {
        assert_eq!(
            posted_texts(&server, &format!("/hooks/p{id}")).await,
            vec![format!(":tada: There are no open merge requests for svc-{id} ! :tada:")]
        );
    }
}
