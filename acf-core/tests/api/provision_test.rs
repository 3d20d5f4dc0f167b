//! Provisioning against the in-memory directory

use super::{orders_hosts, orders_input, TestServices, REALM};
use acf_core::domain::{Application, ObjectCategory, Role};
use acf_core::repository::ConfigRepository;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_orders_default_environments() {
    let services = TestServices::new(&orders_hosts());
    services
        .repo
        .create_application(&Application::new(orders_input()))
        .await
        .unwrap();

    let report = services.provisioner.apply("orders").await.unwrap();

    assert_eq!(report.host_groups.len(), 3);
    assert_eq!(report.cells.len(), 9);
    assert!(report.cells.iter().all(|c| c.report.objects.len() == 4));
    assert!(!report.has_failures());

    assert_eq!(services.directory.host_group_count().await, 3);
    // 9 bridge groups plus 9 POSIX groups
    assert_eq!(services.directory.group_count().await, 18);
    assert_eq!(services.directory.hbac_rule_count().await, 9);
    assert_eq!(services.directory.sudo_rule_count().await, 9);
}

#[tokio::test]
async fn test_host_groups_follow_patterns() {
    let services = TestServices::with_orders(&orders_hosts()).await;

    assert_eq!(
        services.directory.host_group("orders-dev-hosts").await.unwrap(),
        vec!["orders-dev-01.corp.example", "orders-dev-02.corp.example"]
    );
    assert_eq!(
        services.directory.host_group("orders-prd-hosts").await.unwrap(),
        vec!["orders-prd-01.corp.example"]
    );
}

#[tokio::test]
async fn test_cell_wiring() {
    let services = TestServices::with_orders(&orders_hosts()).await;
    let directory = &services.directory;

    let bridge = directory
        .group("orders-dev-devops-CORP.EXAMPLE")
        .await
        .unwrap();
    assert!(bridge.external);
    assert_eq!(bridge.members, vec!["IdM_orders_dev_devops@CORP.EXAMPLE"]);

    let posix = directory.group("orders-dev-devops").await.unwrap();
    assert!(!posix.external);
    assert_eq!(posix.members, vec!["orders-dev-devops-CORP.EXAMPLE"]);

    let hbac = directory.hbac_rule("orders-dev-devops-access").await.unwrap();
    assert_eq!(hbac.groups, vec!["orders-dev-devops"]);
    assert_eq!(hbac.host_groups, vec!["orders-dev-hosts"]);
    assert_eq!(hbac.services, vec!["sshd"]);

    let sudo = directory.sudo_rule("orders-dev-devops-sudo").await.unwrap();
    assert_eq!(sudo.host_groups, vec!["orders-dev-hosts"]);
    assert_eq!(sudo.commands, Role::Devops.sudo_template().commands.to_vec());
}

#[tokio::test]
async fn test_reapply_is_idempotent() {
    let services = TestServices::with_orders(&orders_hosts()).await;

    let report = services.provisioner.apply("orders").await.unwrap();

    assert!(!report.has_failures());
    assert!(report.host_groups.iter().all(|hg| hg.outcome.unchanged));
    // Existing objects still get their memberships checked
    assert!(report
        .cells
        .iter()
        .flat_map(|c| c.report.objects.iter())
        .all(|o| o.outcome.unchanged && o.steps.iter().all(|s| s.outcome.unchanged)));
    let posix = services.directory.group("orders-dev-full").await.unwrap();
    assert_eq!(posix.members.len(), 1);
    assert_eq!(services.directory.sudo_rule_count().await, 9);
}

#[tokio::test]
async fn test_apply_is_recorded() {
    let services = TestServices::with_orders(&orders_hosts()).await;

    let stored = services
        .repo
        .find_application("orders")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_applied.is_some());
    let results = stored.last_apply_results.unwrap();
    assert_eq!(results.cells.len(), 9);
}

#[tokio::test]
async fn test_partial_failure_keeps_going() {
    let services = TestServices::new(&orders_hosts());
    services
        .repo
        .create_application(&Application::new(orders_input()))
        .await
        .unwrap();
    services
        .directory
        .fail_creation_of("orders-qua-readonly")
        .await;

    let report = services.provisioner.apply("orders").await.unwrap();

    assert!(report.has_failures());
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].category, ObjectCategory::PosixGroups);
    assert_eq!(failures[0].name, "orders-qua-readonly");

    // Later objects of the same cell and every other cell still exist
    assert!(services
        .directory
        .sudo_rule("orders-qua-readonly-sudo")
        .await
        .is_some());
    assert_eq!(services.directory.sudo_rule_count().await, 9);

    // The failure is stored with the application
    let stored = services
        .repo
        .find_application("orders")
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_apply_results.unwrap().has_failures());
}

#[tokio::test]
async fn test_second_realm_doubles_bridge_groups_only() {
    let services = TestServices::new(&orders_hosts());
    let mut input = orders_input();
    input.realms.push("LAB.EXAMPLE".to_string());
    services
        .repo
        .create_application(&Application::new(input))
        .await
        .unwrap();

    let report = services.provisioner.apply("orders").await.unwrap();

    assert_eq!(report.cells.len(), 18);
    assert_eq!(
        report.names(ObjectCategory::ExternalGroups).len(),
        18,
        "one bridge group per realm"
    );
    // POSIX groups and rules are per role, so the second realm finds them present
    assert_eq!(services.directory.sudo_rule_count().await, 9);
    assert!(services
        .directory
        .group(&format!("orders-prd-full-{}", REALM))
        .await
        .is_some());
    assert!(services
        .directory
        .group("orders-prd-full-LAB.EXAMPLE")
        .await
        .is_some());
}
