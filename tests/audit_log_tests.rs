mod common;

use chrono::Duration;
use common::VaultFixture;
use datavault::{AuditAction, AuditQuery, Clock, Role, VaultError, Visibility};

#[test]
fn consent_log_covers_only_the_owners_datasets() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let other = fx.individual("Other");
    let org = fx.org("Acme");
    let mine = fx.upload(&owner, "mine.csv", Visibility::Trusted);
    let theirs = fx.upload(&other, "theirs.csv", Visibility::Public);

    fx.vault.permissions().request_access(mine.id, org.id, Some("please")).unwrap();
    fx.vault
        .datasets()
        .get_dataset_for_download(theirs.id, Some(org.id), "x")
        .unwrap();
    fx.vault.users().record_login_succeeded(owner.id).unwrap();

    let log = fx.vault.audit().consent_log_for_owner(owner.id, None).unwrap();
    assert!(log.iter().all(|e| e.dataset_id == Some(mine.id)));
    let actions: Vec<_> = log.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::PermissionsUpdate,
            AuditAction::RequestAccess,
            AuditAction::Upload,
        ]
    );

    let limited = fx.vault.audit().consent_log_for_owner(owner.id, Some(1)).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn logins_are_not_tied_to_a_dataset() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");

    let user = fx.vault.users().record_login_succeeded(owner.id).unwrap();
    assert_eq!(user.last_login, Some(fx.clock.now()));

    fx.vault.users().record_login_failed(" OWNER@example.com ").unwrap();
    fx.vault.users().record_login_failed("nobody@example.com").unwrap();

    let entries = fx.vault.audit().query(&AuditQuery::default()).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.dataset_id.is_none()));

    assert_eq!(entries[0].action, AuditAction::LoginFailed);
    assert_eq!(entries[0].actor_id, None);
    assert_eq!(entries[0].metadata["email"], "nobody@example.com");
    assert_eq!(entries[1].action, AuditAction::LoginFailed);
    assert_eq!(entries[1].actor_id, Some(owner.id));
    assert_eq!(entries[2].action, AuditAction::LoginSucceeded);
    assert_eq!(entries[2].actor_role, Some(Role::Individual));

    assert!(matches!(
        fx.vault.users().record_login_succeeded(9_999_999),
        Err(VaultError::NotFound(_))
    ));
}

#[test]
fn query_filters_by_actor_and_time() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let org = fx.org("Acme");
    let ds = fx.upload(&owner, "data.csv", Visibility::Trusted);
    let before_request = fx.clock.now();

    fx.clock.advance(Duration::hours(2));
    fx.vault.permissions().request_access(ds.id, org.id, None).unwrap();
    let after_request = fx.clock.now();

    let by_org = fx
        .vault
        .audit()
        .query(&AuditQuery {
            actor_id: Some(org.id),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_org.len(), 2);

    let orgs = fx
        .vault
        .audit()
        .query(&AuditQuery {
            actor_role: Some(Role::Organisation),
            action: Some(AuditAction::RequestAccess),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(orgs.len(), 1);

    let early = fx
        .vault
        .audit()
        .query(&AuditQuery {
            to: Some(before_request),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(early.len(), 1);
    assert_eq!(early[0].action, AuditAction::Upload);

    let late = fx
        .vault
        .audit()
        .query(&AuditQuery {
            from: Some(after_request),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(late.len(), 2);
}

#[test]
fn record_named_validates_before_writing() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let ds = fx.upload(&owner, "data.csv", Visibility::Private);
    let audit = fx.vault.audit();
    let before = audit.len();

    assert!(matches!(
        audit.record_named(Some(ds.id), Some(owner.id), Some("user"), "purge", ""),
        Err(VaultError::Validation(_))
    ));
    assert!(matches!(
        audit.record_named(Some(ds.id), Some(owner.id), Some("guest"), "download", ""),
        Err(VaultError::Validation(_))
    ));
    assert_eq!(audit.len(), before);

    audit
        .record_named(Some(ds.id), Some(owner.id), Some("user"), "view_meta", "")
        .unwrap();
    let entry = &audit.entries_for_dataset(ds.id).unwrap()[0];
    assert_eq!(entry.action, AuditAction::ViewMeta);
    assert_eq!(entry.actor_role, Some(Role::Individual));
    assert!(entry.metadata.as_object().map_or(false, |m| m.is_empty()));
}

#[test]
fn entry_ids_increase_with_every_write() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    fx.upload(&owner, "a.csv", Visibility::Private);
    fx.upload(&owner, "b.csv", Visibility::Private);
    fx.vault.users().record_login_succeeded(owner.id).unwrap();

    let mut entries = fx.vault.audit().query(&AuditQuery::default()).unwrap();
    entries.reverse();
    let ids: Vec<u64> = entries.iter().map(|e| e.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}
