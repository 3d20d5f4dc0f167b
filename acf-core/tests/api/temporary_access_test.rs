//! Temporary access lifecycle against the in-memory directory

use super::{orders_hosts, TestServices, REALM};
use acf_core::domain::{
    AccessRequestStatus, Application, ObjectCategory, Role, TemporaryAccessInput,
};
use acf_core::error::AppError;
use acf_core::naming::ObjectNames;
use acf_core::repository::ConfigRepository;
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap()
}

fn alice_readonly() -> TemporaryAccessInput {
    TemporaryAccessInput {
        user: "alice".to_string(),
        realm: REALM.to_string(),
        application: "orders".to_string(),
        environment: "DEV".to_string(),
        role: Role::Readonly,
        duration_hours: 4,
        reason: Some("incident review".to_string()),
        requested_by: None,
    }
}

fn temporary_names(id: &uuid::Uuid) -> ObjectNames {
    ObjectNames::temporary("orders", "DEV", Role::Readonly, REALM, id)
}

#[tokio::test]
async fn test_grant_builds_ephemeral_graph() {
    let services = TestServices::with_orders(&orders_hosts()).await;

    let request = services
        .temporary_access
        .grant_at(alice_readonly(), t0())
        .await
        .unwrap();

    assert_eq!(request.status, AccessRequestStatus::Approved);
    assert_eq!(request.expires_at, t0() + Duration::hours(4));

    let names = temporary_names(&request.id);
    let bridge = services.directory.group(&names.bridge_group).await.unwrap();
    assert_eq!(bridge.members, vec!["alice@CORP.EXAMPLE"]);

    let sudo = services.directory.sudo_rule(&names.sudo_rule).await.unwrap();
    assert_eq!(sudo.commands, Role::Readonly.sudo_template().commands.to_vec());
    // Attached to the permanent host group
    assert_eq!(sudo.host_groups, vec!["orders-dev-hosts"]);
}

#[tokio::test]
async fn test_granted_user_passes_hbac() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    services
        .temporary_access
        .grant_at(alice_readonly(), t0())
        .await
        .unwrap();

    let decision = services
        .system
        .test_access(acf_core::domain::AccessTestInput {
            user: "alice".to_string(),
            domain: REALM.to_string(),
            target_host: "orders-dev-01.corp.example".to_string(),
            command: "sudo -l".to_string(),
        })
        .await
        .unwrap()
        .hbac
        .unwrap();
    assert!(decision.granted);
    assert_eq!(decision.matched_rules.len(), 1);
}

#[tokio::test]
async fn test_sweep_expires_and_second_sweep_is_noop() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    let service = &services.temporary_access;
    let request = service.grant_at(alice_readonly(), t0()).await.unwrap();
    let names = temporary_names(&request.id);

    // Not due yet
    let early = service
        .expire_sweep_at(t0() + Duration::hours(3))
        .await
        .unwrap();
    assert!(early.expired.is_empty());

    let summary = service
        .expire_sweep_at(t0() + Duration::hours(5))
        .await
        .unwrap();
    assert_eq!(summary.expired, vec![request.id]);
    assert!(summary.teardown_failures.is_empty());

    let stored = service.get(request.id).await.unwrap();
    assert_eq!(stored.status, AccessRequestStatus::Expired);
    assert_eq!(stored.expired_at, Some(t0() + Duration::hours(5)));
    assert!(services.directory.sudo_rule(&names.sudo_rule).await.is_none());
    assert!(services.directory.group(&names.bridge_group).await.is_none());
    // Permanent objects are untouched
    assert!(services
        .directory
        .sudo_rule("orders-dev-readonly-sudo")
        .await
        .is_some());
    assert!(services.directory.host_group("orders-dev-hosts").await.is_some());

    let again = service
        .expire_sweep_at(t0() + Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(again.due, 0);
    assert!(again.expired.is_empty());
    assert_eq!(
        service.get(request.id).await.unwrap().expired_at,
        Some(t0() + Duration::hours(5))
    );
}

#[tokio::test]
async fn test_teardown_of_missing_objects_is_not_a_failure() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    let service = &services.temporary_access;
    let request = service.grant_at(alice_readonly(), t0()).await.unwrap();

    // An administrator already removed the ephemeral objects
    services.directory.remove_objects_containing("-temp-").await;

    let summary = service
        .expire_sweep_at(t0() + Duration::hours(5))
        .await
        .unwrap();
    assert_eq!(summary.expired, vec![request.id]);
    assert!(summary.teardown_failures.is_empty());

    let stored = service.get(request.id).await.unwrap();
    let teardown = stored.teardown_report.unwrap();
    assert!(!teardown.has_failures());
    assert!(teardown.objects.iter().all(|o| o.outcome.unchanged));
}

#[tokio::test]
async fn test_revoke_terminal_requests_is_rejected() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    let service = &services.temporary_access;

    let expired = service.grant_at(alice_readonly(), t0()).await.unwrap();
    service
        .expire_sweep_at(t0() + Duration::hours(5))
        .await
        .unwrap();
    let result = service.revoke(expired.id, None).await;
    assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));

    let revoked = service.grant_at(alice_readonly(), t0()).await.unwrap();
    service.revoke(revoked.id, None).await.unwrap();
    let result = service.revoke(revoked.id, None).await;
    assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn test_request_approve_revoke_flow() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    let service = &services.temporary_access;

    let mut input = alice_readonly();
    input.requested_by = Some("alice".to_string());
    let pending = service.request_at(input, t0()).await.unwrap();
    let names = temporary_names(&pending.id);
    assert!(services.directory.sudo_rule(&names.sudo_rule).await.is_none());

    let approved = service
        .approve_at(pending.id, Some("bob".to_string()), t0() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(approved.expires_at, t0() + Duration::hours(5));
    assert!(services.directory.sudo_rule(&names.sudo_rule).await.is_some());

    let revoked = service
        .revoke(pending.id, Some("carol".to_string()))
        .await
        .unwrap();
    assert_eq!(revoked.status, AccessRequestStatus::Revoked);
    assert_eq!(revoked.revoked_by.as_deref(), Some("carol"));
    let teardown = revoked.teardown_report.unwrap();
    assert_eq!(
        teardown.objects.iter().map(|o| o.category).collect::<Vec<_>>(),
        vec![
            ObjectCategory::SudoRules,
            ObjectCategory::HbacRules,
            ObjectCategory::PosixGroups,
            ObjectCategory::ExternalGroups,
        ]
    );
    assert!(services.directory.sudo_rule(&names.sudo_rule).await.is_none());

    // Revoked requests are never expired later
    let summary = service
        .expire_sweep_at(t0() + Duration::hours(10))
        .await
        .unwrap();
    assert!(summary.expired.is_empty());
}

#[tokio::test]
async fn test_denied_request_cannot_be_approved() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    let service = &services.temporary_access;

    let pending = service.request_at(alice_readonly(), t0()).await.unwrap();
    let denied = service.deny(pending.id, None).await.unwrap();
    assert_eq!(denied.status, AccessRequestStatus::Denied);

    let result = service.approve(pending.id, None).await;
    assert!(matches!(result, Err(AppError::InvalidStateTransition(_))));
}

#[tokio::test]
async fn test_undeclared_role_is_rejected() {
    let services = TestServices::new(&orders_hosts());
    let mut input = super::orders_input();
    input.environments = vec![acf_core::domain::Environment {
        name: "PRD".to_string(),
        host_pattern: "*{app}*prd*".to_string(),
        roles: vec![Role::Readonly],
    }];
    services
        .repo
        .create_application(&Application::new(input))
        .await
        .unwrap();

    let mut grant = alice_readonly();
    grant.environment = "PRD".to_string();
    grant.role = Role::Full;
    let result = services.temporary_access.grant_at(grant, t0()).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_concurrent_revoke_and_sweep_transition_once() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    let service = services.temporary_access.clone();
    let id = service.grant_at(alice_readonly(), t0()).await.unwrap().id;

    let sweeper = service.clone();
    let revoker = service.clone();
    let (swept, revoked) = tokio::join!(
        async move { sweeper.expire_sweep_at(t0() + Duration::hours(5)).await },
        async move { revoker.revoke_at(id, None, t0() + Duration::hours(5)).await },
    );

    let swept = swept.unwrap();
    let transitions = swept.expired.len() + usize::from(revoked.is_ok());
    assert_eq!(transitions, 1);

    let stored = service.get(id).await.unwrap();
    assert!(stored.status.is_terminal());
}
