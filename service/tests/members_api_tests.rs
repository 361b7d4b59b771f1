//! Member directory endpoints over in-memory storage.

mod common;

use axum::http::{Method, StatusCode};
use common::{member, TestAppBuilder, ADMIN, EDITOR, READER};
use fellowship_api::config::CalendarConfig;
use fellowship_api::members::MemberEvent;
use fw_roster::{LeapDayPolicy, MemberId};
use serde_json::json;

#[tokio::test]
async fn requests_without_account_header_are_rejected() {
    let app = TestAppBuilder::new().build();
    let res = app.request(Method::GET, "/api/v1/members", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.get("/api/v1/members", "acct-nobody").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_is_ordered_by_name_and_filterable() {
    let mut pastor = member("3", "carlos ruiz", None, None);
    pastor.set_membership_type(fw_roster::MembershipType::Pastor);
    let app = TestAppBuilder::new()
        .with_members([
            member("1", "Beatriz Gomez", None, None),
            member("2", "ana perez", None, None),
            pastor,
        ])
        .build();

    let res = app.get("/api/v1/members", READER).await;
    assert_eq!(res.status, StatusCode::OK);
    let names: Vec<&str> = res
        .body
        .as_array()
        .expect("array")
        .iter()
        .map(|m| m["full_name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, ["ana perez", "Beatriz Gomez", "carlos ruiz"]);

    let res = app.get("/api/v1/members?search=GOM", READER).await;
    assert_eq!(res.body.as_array().expect("array").len(), 1);
    assert_eq!(res.body[0]["id"], "1");

    let res = app.get("/api/v1/members?type=pastor", READER).await;
    assert_eq!(res.body.as_array().expect("array").len(), 1);
    assert_eq!(res.body[0]["membership_type"], "pastor");
}

#[tokio::test]
async fn create_requires_editor_and_applies_defaults() {
    let app = TestAppBuilder::new().build();
    let body = json!({"full_name": "  Ana Perez ", "birth_date": "1990-03-05", "email": ""});

    let res = app.post("/api/v1/members", READER, body.clone()).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let mut events = app.service.subscribe();
    let res = app.post("/api/v1/members", EDITOR, body).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["full_name"], "Ana Perez");
    assert_eq!(res.body["membership_type"], "congregant");
    assert_eq!(res.body["status"], "active");
    assert!(res.body["email"].is_null());

    let id = res.body["id"].as_str().expect("id").to_string();
    assert_eq!(
        events.recv().await.expect("event"),
        MemberEvent::Created {
            id: MemberId::new(id)
        }
    );
    assert_eq!(app.members.snapshot().len(), 1);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let app = TestAppBuilder::new().build();
    let cases = [
        json!({"full_name": "   "}),
        json!({"full_name": "Ana", "birth_date": "1990-02-30"}),
        json!({"full_name": "Ana", "birth_date": "05/03/1990"}),
        json!({"full_name": "Ana", "membership_type": "congregant", "status": "graduated"}),
    ];
    for body in cases {
        let res = app.post("/api/v1/members", EDITOR, body.clone()).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "{body}");
        assert!(res.body["error"].is_string());
    }
    assert!(app.members.snapshot().is_empty());
}

#[tokio::test]
async fn changing_type_reconciles_status() {
    let mut house = member("1", "Luis Mora", None, None);
    house.set_membership_type(fw_roster::MembershipType::ManOfHouse);
    house.status = fw_roster::MemberStatus::Graduated;
    let app = TestAppBuilder::new().with_members([house]).build();

    let res = app
        .put(
            "/api/v1/members/1",
            EDITOR,
            json!({"full_name": "Luis Mora", "membership_type": "leader"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["membership_type"], "leader");
    assert_eq!(res.body["status"], "active");

    let res = app
        .put("/api/v1/members/missing", EDITOR, json!({"full_name": "X"}))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_keeps_account_link() {
    let mut linked = member("1", "Ana", None, None);
    linked.linked_account_id = Some(READER.to_string());
    let app = TestAppBuilder::new().with_members([linked]).build();

    let res = app
        .put(
            "/api/v1/members/1",
            EDITOR,
            json!({"full_name": "Ana Perez", "phone_number": "555"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["linked_account_id"], READER);
    assert_eq!(res.body["phone_number"], "555");
}

#[tokio::test]
async fn delete_requires_admin() {
    let app = TestAppBuilder::new()
        .with_members([member("1", "Ana", None, None)])
        .build();

    assert_eq!(
        app.delete("/api/v1/members/1", EDITOR).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.delete("/api/v1/members/1", ADMIN).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.delete("/api/v1/members/1", ADMIN).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get("/api/v1/members/1", READER).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn upcoming_birthdays_are_sorted_windowed_and_limited() {
    let app = TestAppBuilder::new()
        .with_members([
            member("a", "Ana", Some("1990-03-05"), None),
            member("b", "Beto", Some("1985-03-01"), None),
            member("c", "Carla", Some("2000-12-25"), None),
            member("d", "Dario", None, None),
            member("e", "Eva", Some("not-a-date"), None),
        ])
        .build();

    let res = app
        .get(
            "/api/v1/members/birthdays/upcoming?reference=2025-03-01&within=30",
            READER,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let rows = res.body.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["member_id"], "b");
    assert_eq!(rows[0]["days_until_next_occurrence"], 0);
    assert_eq!(rows[0]["next_occurrence_date"], "2025-03-01");
    assert_eq!(rows[1]["member_id"], "a");
    assert_eq!(rows[1]["full_name"], "Ana");
    assert_eq!(rows[1]["days_until_next_occurrence"], 4);

    let res = app
        .get(
            "/api/v1/members/birthdays/upcoming?reference=2025-03-01&within=365&limit=1",
            READER,
        )
        .await;
    assert_eq!(res.body.as_array().expect("array").len(), 1);

    let res = app
        .get("/api/v1/members/birthdays/upcoming?within=-1", READER)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = app
        .get("/api/v1/members/birthdays/upcoming?limit=0", READER)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn leap_day_birthday_follows_configured_policy() {
    let leapling = || member("l", "Lea", Some("2000-02-29"), None);

    let clamp = TestAppBuilder::new().with_members([leapling()]).build();
    let res = clamp
        .get(
            "/api/v1/members/birthdays/upcoming?reference=2025-02-01",
            READER,
        )
        .await;
    assert_eq!(res.body[0]["next_occurrence_date"], "2025-02-28");
    assert_eq!(res.body[0]["days_until_next_occurrence"], 27);

    let roll = TestAppBuilder::new()
        .with_calendar(CalendarConfig {
            leap_day_policy: LeapDayPolicy::RollToMarch1,
            ..CalendarConfig::default()
        })
        .with_members([leapling()])
        .build();
    let res = roll
        .get(
            "/api/v1/members/birthdays/upcoming?reference=2025-02-01",
            READER,
        )
        .await;
    assert_eq!(res.body[0]["next_occurrence_date"], "2025-03-01");
    assert_eq!(res.body[0]["days_until_next_occurrence"], 28);
}

#[tokio::test]
async fn stats_count_month_and_window() {
    let app = TestAppBuilder::new()
        .with_members([
            member("a", "Ana", Some("1990-03-05"), None),
            member("b", "Beto", Some("1985-03-30"), None),
            member("c", "Carla", Some("2000-04-02"), None),
            member("d", "Dario", None, None),
        ])
        .build();

    let res = app
        .get("/api/v1/members/stats?reference=2025-03-10", READER)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["total_members"], 4);
    assert_eq!(res.body["birthdays_this_month"], 2);
    // Beto (20 days) and Carla (23 days); Ana already passed
    assert_eq!(res.body["upcoming_birthdays"], 2);
}

#[tokio::test]
async fn duplicates_group_transitively() {
    let app = TestAppBuilder::new()
        .with_members([
            member("1", "Ana Perez", None, Some("ana@x.com")),
            member("2", "A. Perez", None, Some("ANA@x.com ")),
            member("3", "a. perez", None, None),
            member("4", "Luis", None, Some("luis@x.com")),
        ])
        .build();

    assert_eq!(
        app.get("/api/v1/members/duplicates", EDITOR).await.status,
        StatusCode::FORBIDDEN
    );

    let res = app.get("/api/v1/members/duplicates", ADMIN).await;
    assert_eq!(res.status, StatusCode::OK);
    let groups = res.body.as_array().expect("array");
    assert_eq!(groups.len(), 1);
    let mut ids: Vec<&str> = groups[0]
        .as_array()
        .expect("group")
        .iter()
        .map(|m| m["id"].as_str().expect("id"))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, ["1", "2", "3"]);
}

#[tokio::test]
async fn merge_fills_gaps_and_removes_secondary() {
    let mut primary = member("p", "Ana Perez", None, None);
    primary.notes = Some("choir".into());
    let mut secondary = member("s", "Ana P.", Some("1990-03-05"), Some("ana@x.com"));
    secondary.notes = Some("usher".into());
    secondary.linked_account_id = Some(READER.to_string());
    let app = TestAppBuilder::new()
        .with_members([primary, secondary])
        .build();

    let mut events = app.service.subscribe();
    let res = app
        .post(
            "/api/v1/members/merge",
            ADMIN,
            json!({"primary_id": "p", "secondary_id": "s"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["id"], "p");
    assert_eq!(res.body["full_name"], "Ana Perez");
    assert_eq!(res.body["email"], "ana@x.com");
    assert_eq!(res.body["birth_date"], "1990-03-05");
    assert_eq!(res.body["notes"], "choir | usher");
    assert_eq!(res.body["linked_account_id"], READER);

    let remaining = app.members.snapshot();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, MemberId::from("p"));
    assert_eq!(
        events.recv().await.expect("event"),
        MemberEvent::Merged {
            primary_id: MemberId::from("p"),
            removed_id: MemberId::from("s"),
        }
    );
}

#[tokio::test]
async fn merge_rejects_same_or_missing_ids() {
    let app = TestAppBuilder::new()
        .with_members([member("p", "Ana", None, None)])
        .build();

    let res = app
        .post(
            "/api/v1/members/merge",
            ADMIN,
            json!({"primary_id": "p", "secondary_id": "p"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            "/api/v1/members/merge",
            ADMIN,
            json!({"primary_id": "p", "secondary_id": "gone"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(app.members.snapshot().len(), 1);
}

#[tokio::test]
async fn failed_primary_update_never_deletes_secondary() {
    let app = TestAppBuilder::new()
        .with_members([
            member("p", "Ana", None, None),
            member("s", "Ana", None, Some("ana@x.com")),
        ])
        .build();
    app.members.fail_updates();

    let res = app
        .post(
            "/api/v1/members/merge",
            ADMIN,
            json!({"primary_id": "p", "secondary_id": "s"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["error"], "Internal server error");

    let remaining = app.members.snapshot();
    assert_eq!(remaining.len(), 2);
    let primary = remaining
        .iter()
        .find(|m| m.id == MemberId::from("p"))
        .expect("primary");
    assert!(primary.email.is_none());
}

#[tokio::test]
async fn failed_secondary_delete_leaves_updated_primary() {
    let app = TestAppBuilder::new()
        .with_members([
            member("p", "Ana", None, None),
            member("s", "Ana", None, Some("ana@x.com")),
        ])
        .build();
    app.members.fail_deletes();

    let res = app
        .post(
            "/api/v1/members/merge",
            ADMIN,
            json!({"primary_id": "p", "secondary_id": "s"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

    let remaining = app.members.snapshot();
    assert_eq!(remaining.len(), 2);
    let primary = remaining
        .iter()
        .find(|m| m.id == MemberId::from("p"))
        .expect("primary");
    assert_eq!(primary.email.as_deref(), Some("ana@x.com"));
}

#[tokio::test]
async fn sync_emails_reports_and_honours_dry_run() {
    let mut linked = member("1", "Reader", None, None);
    linked.linked_account_id = Some(READER.to_string());
    let app = TestAppBuilder::new()
        .with_members([
            linked,
            member("2", "Has Email", None, Some("x@x.com")),
            member("3", "Unlinked", None, None),
        ])
        .build();

    let res = app
        .post(
            "/api/v1/members/sync-emails",
            ADMIN,
            json!({"dry_run": true}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body,
        json!({"updated": 1, "already_set": 1, "unlinked": 1, "failed": 0})
    );
    assert!(app
        .members
        .snapshot()
        .iter()
        .all(|m| m.id != MemberId::from("1") || m.email.is_none()));

    let res = app
        .request(
            Method::POST,
            "/api/v1/members/sync-emails",
            Some(ADMIN),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["updated"], 1);
    let synced = app
        .members
        .snapshot()
        .into_iter()
        .find(|m| m.id == MemberId::from("1"))
        .expect("member");
    assert_eq!(synced.email.as_deref(), Some("reader@church.test"));
}
