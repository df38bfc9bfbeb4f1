
use reqwest::StatusCode;

use harness::{spawn_hub, spawn_mock_oracle, ADMIN_TOKEN};

#[tokio::test]
async fn admin_bearer() {
    let oracle = spawn_mock_oracle().await;
    let hub = spawn_hub(&oracle).await;
    let c = &hub.client;

    // Bearer header with the static token
    let r = c
        .get(hub.url("/api/admin/session"))
        .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
        .send()
        .await
        .unwrap();
    assert!(r.status().is_success());

    // x-admin-token header form
    let r = c
        .get(hub.url("/api/admin/settings"))
        .header("x-admin-token", ADMIN_TOKEN)
        .send()
        .await
        .unwrap();
    assert!(r.status().is_success());

    // wrong token
    let r = c
        .get(hub.url("/api/admin/session"))
        .header("Authorization", "Bearer wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(r.status(), StatusCode::UNAUTHORIZED);

    // install reset needs admin
    let r = c.post(hub.url("/api/install/reset")).send().await.unwrap();
    assert_eq!(r.status(), StatusCode::UNAUTHORIZED);
}
