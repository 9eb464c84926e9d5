mod common;

use common::{body, rice, spawn_app};
use ecoplates::db::models::NotificationType;
use serde_json::{json, Value};

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|d| d["id"].as_str().expect("id").to_string())
        .collect()
}

#[tokio::test]
async fn alice_posts_rice_and_helpers_inc_claims_it() {
    let app = spawn_app().await;
    let alice = app.donor("Alice").await;
    let helpers = app.approved_ngo("Helpers Inc").await;
    let other_ngo = app.approved_ngo("Food Bank").await;

    let resp = app.post("/api/donations", &alice.token, rice()).await;
    assert_eq!(resp.status(), 201);
    let created = body(resp).await;
    let donation = &created["donation"];
    let donation_id = donation["id"].as_str().expect("id").to_string();
    assert_eq!(donation["status"], "available");
    assert!(donation["ngo_id"].is_null());
    assert_eq!(donation["food_type"], "Rice");
    assert_eq!(donation["can_edit"], true);

    let mine = body(app.get("/api/donations", &alice.token).await).await;
    assert_eq!(ids(&mine["donations"]), vec![donation_id.clone()]);
    assert_eq!(mine["donations"][0]["status"], "available");

    let view = body(app.get("/api/ngo/donations", &helpers.token).await).await;
    assert_eq!(view["state"], "approved");
    assert!(ids(&view["available"]).contains(&donation_id));

    let claim_path = format!("/api/ngo/donations/{}/claim", donation_id);
    let resp = app.post(&claim_path, &helpers.token, json!({})).await;
    assert_eq!(resp.status(), 200);
    let claimed = body(resp).await;
    assert_eq!(claimed["donation"]["status"], "requested");
    assert_eq!(claimed["donation"]["ngo_id"], json!(helpers.id));

    let view = body(app.get("/api/ngo/donations", &helpers.token).await).await;
    assert_eq!(ids(&view["requests"]), vec![donation_id.clone()]);
    assert!(!ids(&view["available"]).contains(&donation_id));

    let other_view = body(app.get("/api/ngo/donations", &other_ngo.token).await).await;
    assert!(!ids(&other_view["available"]).contains(&donation_id));
    assert!(ids(&other_view["requests"]).is_empty());

    let mine = body(app.get("/api/donations", &alice.token).await).await;
    assert_eq!(mine["donations"][0]["status"], "requested");
    assert_eq!(mine["donations"][0]["can_edit"], false);
    assert_eq!(mine["donations"][0]["can_delete"], true);
}

#[tokio::test]
async fn second_claim_conflicts_and_first_claimer_stays() {
    let app = spawn_app().await;
    let donor = app.donor("Bob").await;
    let first = app.approved_ngo("First Aid").await;
    let second = app.approved_ngo("Second Helping").await;

    let created = body(app.post("/api/donations", &donor.token, rice()).await).await;
    let path = format!("/api/ngo/donations/{}/claim", created["donation"]["id"].as_str().unwrap());

    assert_eq!(app.post(&path, &first.token, json!({})).await.status(), 200);
    let resp = app.post(&path, &second.token, json!({})).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(body(resp).await["error"], "Donation is no longer available");

    let mine = body(app.get("/api/donations", &donor.token).await).await;
    assert_eq!(mine["donations"][0]["ngo_id"], json!(first.id));
}

#[tokio::test]
async fn concurrent_claims_have_one_winner() {
    let app = spawn_app().await;
    let donor = app.donor("Carol").await;
    let a = app.approved_ngo("Alpha Relief").await;
    let b = app.approved_ngo("Beta Relief").await;

    let created = body(app.post("/api/donations", &donor.token, rice()).await).await;
    let path = format!("/api/ngo/donations/{}/claim", created["donation"]["id"].as_str().unwrap());

    let (ra, rb) = tokio::join!(
        app.post(&path, &a.token, json!({})),
        app.post(&path, &b.token, json!({}))
    );
    let mut statuses = vec![ra.status().as_u16(), rb.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 409]);
}

#[tokio::test]
async fn requested_donation_is_locked_for_edits_but_deletable() {
    let app = spawn_app().await;
    let donor = app.donor("Dana").await;
    let ngo = app.approved_ngo("Helpers Inc").await;

    let created = body(app.post("/api/donations", &donor.token, rice()).await).await;
    let id = created["donation"]["id"].as_str().unwrap().to_string();

    let mut edit = rice();
    edit["food_type"] = json!("Bread");
    let resp = app.put(&format!("/api/donations/{}", id), &donor.token, edit.clone()).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body(resp).await["donation"]["food_type"], "Bread");

    app.post(&format!("/api/ngo/donations/{}/claim", id), &ngo.token, json!({})).await;

    let resp = app.put(&format!("/api/donations/{}", id), &donor.token, rice()).await;
    assert_eq!(resp.status(), 409);

    let resp = app.delete(&format!("/api/donations/{}", id), &donor.token).await;
    assert_eq!(resp.status(), 200);
    let mine = body(app.get("/api/donations", &donor.token).await).await;
    assert!(ids(&mine["donations"]).is_empty());
}

#[tokio::test]
async fn donors_only_touch_their_own_donations() {
    let app = spawn_app().await;
    let owner = app.donor("Erin").await;
    let stranger = app.donor("Frank").await;

    let created = body(app.post("/api/donations", &owner.token, rice()).await).await;
    let path = format!("/api/donations/{}", created["donation"]["id"].as_str().unwrap());

    assert_eq!(app.put(&path, &stranger.token, rice()).await.status(), 404);
    assert_eq!(app.delete(&path, &stranger.token).await.status(), 404);
    assert!(ids(&body(app.get("/api/donations", &stranger.token).await).await["donations"]).is_empty());

    let missing = format!("/api/donations/{}", uuid::Uuid::new_v4());
    assert_eq!(app.put(&missing, &owner.token, rice()).await.status(), 404);
}

#[tokio::test]
async fn blank_fields_are_rejected() {
    let app = spawn_app().await;
    let donor = app.donor("Gina").await;

    let mut blank = rice();
    blank["pickup_location"] = json!("  ");
    let resp = app.post("/api/donations", &donor.token, blank).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(body(resp).await["error"], "Pickup location is required");
}

#[tokio::test]
async fn unapproved_ngo_waits_and_cannot_claim() {
    let app = spawn_app().await;
    let donor = app.donor("Hank").await;
    let ngo = app.pending_ngo("New Shelter").await;

    let created = body(app.post("/api/donations", &donor.token, rice()).await).await;
    let id = created["donation"]["id"].as_str().unwrap().to_string();

    let view = body(app.get("/api/ngo/donations", &ngo.token).await).await;
    assert_eq!(view["state"], "pending_approval");
    assert_eq!(view["can_claim"], false);
    assert!(view.get("available").is_none());

    let resp = app.post(&format!("/api/ngo/donations/{}/claim", id), &ngo.token, json!({})).await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn views_are_gated_by_role() {
    let app = spawn_app().await;
    let donor = app.donor("Ivy").await;
    let ngo = app.approved_ngo("Helpers Inc").await;

    assert_eq!(app.get("/api/donations", &ngo.token).await.status(), 403);
    assert_eq!(app.post("/api/donations", &ngo.token, rice()).await.status(), 403);
    assert_eq!(app.get("/api/ngo/donations", &donor.token).await.status(), 403);
    assert_eq!(app.get("/api/admin/ngos/pending", &donor.token).await.status(), 403);
}

#[tokio::test]
async fn landing_stats_are_public() {
    let app = spawn_app().await;
    let donor = app.donor("Jack").await;
    app.approved_ngo("Helpers Inc").await;
    app.pending_ngo("Waiting Room").await;
    app.post("/api/donations", &donor.token, rice()).await;
    app.post("/api/donations", &donor.token, rice()).await;

    let resp = app
        .request(reqwest::Method::GET, "/api/stats", None)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        body(resp).await,
        json!({ "total_donations": 2, "active_donors": 1, "registered_ngos": 1 })
    );
}

#[tokio::test]
async fn notifications_belong_to_their_owner() {
    let app = spawn_app().await;
    let owner = app.donor("Kim").await;
    let other = app.donor("Lee").await;
    let note = app
        .store
        .insert_notification(owner.id, NotificationType::General, "Welcome", "Thanks for joining")
        .await;

    let listed = body(app.get("/api/notifications", &owner.token).await).await;
    assert_eq!(listed["unread"], 1);
    assert_eq!(listed["notifications"][0]["type"], "general");

    let path = format!("/api/notifications/{}/read", note.id);
    assert_eq!(app.post(&path, &other.token, json!({})).await.status(), 404);
    assert_eq!(app.post(&path, &owner.token, json!({})).await.status(), 200);

    let listed = body(app.get("/api/notifications", &owner.token).await).await;
    assert_eq!(listed["unread"], 0);
    assert_eq!(listed["notifications"][0]["is_read"], true);
}
