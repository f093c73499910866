mod common;

use common::VaultFixture;
use datavault::{AuditAction, GrantMode, Reason, VaultError, Visibility};

#[test]
fn private_dataset_only_opens_to_owner_and_admin() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let admin = fx.admin("Admin");
    let org = fx.org("Acme");
    let other = fx.individual("Other");
    let ds = fx.upload(&owner, "private.csv", Visibility::Private);

    // even a granted org is refused on a Private dataset
    fx.vault
        .permissions()
        .grant_access(ds.id, owner.id, org.id, None, None)
        .unwrap();

    let by_owner = fx.vault.decide(ds.id, Some(owner.id)).unwrap();
    assert!(by_owner.allowed);
    assert_eq!(by_owner.mode(), Some(GrantMode::Owner));

    let by_admin = fx.vault.decide(ds.id, Some(admin.id)).unwrap();
    assert!(by_admin.allowed);
    assert_eq!(by_admin.mode(), Some(GrantMode::Admin));

    for actor in [Some(org.id), Some(other.id), None] {
        let decision = fx.vault.decide(ds.id, actor).unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Reason::Private);
    }
}

#[test]
fn public_dataset_opens_to_everyone() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let org = fx.unverified_org("Shady");
    let other = fx.individual("Other");
    let ds = fx.upload(&owner, "public.csv", Visibility::Public);

    for actor in [None, Some(org.id), Some(other.id)] {
        let decision = fx.vault.decide(ds.id, actor).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, Reason::Ok);
        assert_eq!(decision.mode(), Some(GrantMode::Public));
    }
}

#[test]
fn unknown_dataset_and_unknown_actor() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let ds = fx.upload(&owner, "public.csv", Visibility::Public);

    assert_eq!(fx.vault.decide(9_999_999, Some(owner.id)).unwrap().reason, Reason::NotFound);
    assert_eq!(fx.vault.decide(ds.id, Some(9_999_999)).unwrap().reason, Reason::Forbidden);
}

#[test]
fn trusted_dataset_follows_grant_state() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let org = fx.org("Acme");
    let individual = fx.individual("Other");
    let unverified = fx.unverified_org("Shady");
    let ds = fx.upload(&owner, "trusted.csv", Visibility::Trusted);

    assert_eq!(fx.vault.decide(ds.id, None).unwrap().reason, Reason::TrustedOnly);
    assert_eq!(
        fx.vault.decide(ds.id, Some(individual.id)).unwrap().reason,
        Reason::TrustedOnly
    );
    assert_eq!(
        fx.vault.decide(ds.id, Some(unverified.id)).unwrap().reason,
        Reason::UnverifiedOrg
    );
    assert_eq!(fx.vault.decide(ds.id, Some(org.id)).unwrap().reason, Reason::NotTrusted);

    fx.vault
        .permissions()
        .grant_access(ds.id, owner.id, org.id, Some("agg-only"), None)
        .unwrap();
    let allowed = fx.vault.decide(ds.id, Some(org.id)).unwrap();
    assert!(allowed.allowed);
    assert_eq!(allowed.mode(), Some(GrantMode::Trusted));
    assert_eq!(allowed.grant.unwrap().scope.as_deref(), Some("agg-only"));

    fx.vault
        .permissions()
        .revoke_access(ds.id, owner.id, org.id)
        .unwrap();
    let revoked = fx.vault.decide(ds.id, Some(org.id)).unwrap();
    assert!(!revoked.allowed);
    assert_eq!(revoked.reason, Reason::NotTrusted);
}

#[test]
fn expiry_is_inclusive_of_today() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let org = fx.org("Acme");
    let ds = fx.upload(&owner, "trusted.csv", Visibility::Trusted);
    let today = fx.today();

    let cases = [
        (today.pred_opt(), false),
        (Some(today), true),
        (today.succ_opt(), true),
        (None, true),
    ];
    for (expiry, allowed) in cases {
        fx.vault
            .permissions()
            .grant_access(ds.id, owner.id, org.id, None, expiry)
            .unwrap();
        let decision = fx.vault.decide(ds.id, Some(org.id)).unwrap();
        assert_eq!(decision.allowed, allowed, "expiry {:?}", expiry);
        if !allowed {
            assert_eq!(decision.reason, Reason::Expired);
        }
    }
}

#[test]
fn grant_expires_as_the_clock_moves() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let org = fx.org("Acme");
    let ds = fx.upload(&owner, "trusted.csv", Visibility::Trusted);

    fx.vault
        .permissions()
        .grant_access(ds.id, owner.id, org.id, None, Some(fx.today()))
        .unwrap();
    assert!(fx.vault.decide(ds.id, Some(org.id)).unwrap().allowed);

    fx.clock.advance_days(1);
    assert_eq!(fx.vault.decide(ds.id, Some(org.id)).unwrap().reason, Reason::Expired);
}

#[test]
fn decide_writes_nothing() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let ds = fx.upload(&owner, "private.csv", Visibility::Private);
    let before = fx.vault.audit().len();

    fx.vault.decide(ds.id, None).unwrap();
    fx.vault.decide(ds.id, Some(owner.id)).unwrap();

    assert_eq!(fx.vault.audit().len(), before);
}

#[test]
fn enforcing_wrapper_logs_exactly_one_row_per_check() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let org = fx.org("Acme");
    let ds = fx.upload(&owner, "trusted.csv", Visibility::Trusted);

    let checks = [
        (Some(owner.id), true),
        (Some(org.id), false),
        (None, false),
        (Some(9_999_999), false),
    ];
    for (actor, expect_allowed) in checks {
        let before_allowed = fx.count_action(AuditAction::DataAccessAllowed);
        let before_denied = fx.count_action(AuditAction::DataAccessDenied);
        let before_total = fx.vault.audit().len();

        let result = fx.vault.assert_can_access(ds.id, actor, "analysis");
        assert_eq!(result.is_ok(), expect_allowed);

        assert_eq!(fx.vault.audit().len(), before_total + 1);
        if expect_allowed {
            assert_eq!(fx.count_action(AuditAction::DataAccessAllowed), before_allowed + 1);
        } else {
            assert_eq!(fx.count_action(AuditAction::DataAccessDenied), before_denied + 1);
        }
    }

    let latest = &fx.vault.audit().entries_for_dataset(ds.id).unwrap()[0];
    assert_eq!(latest.action, AuditAction::DataAccessDenied);
    assert_eq!(latest.metadata["reason"], "forbidden");
    assert_eq!(latest.metadata["purpose"], "analysis");
}

#[test]
fn enforcing_wrapper_returns_reason_and_grant() {
    let fx = VaultFixture::new();
    let owner = fx.individual("Owner");
    let org = fx.org("Acme");
    let ds = fx.upload(&owner, "trusted.csv", Visibility::Trusted);

    let denied = fx.vault.assert_can_access(ds.id, Some(org.id), "analysis");
    assert!(matches!(
        denied,
        Err(VaultError::PolicyDenial { reason: Reason::NotTrusted })
    ));

    fx.vault
        .permissions()
        .grant_access(ds.id, owner.id, org.id, Some("agg-only"), None)
        .unwrap();
    let grant = fx
        .vault
        .assert_can_access(ds.id, Some(org.id), "analysis")
        .unwrap();
    assert_eq!(grant.mode, GrantMode::Trusted);
    assert_eq!(grant.scope.as_deref(), Some("agg-only"));

    let entry = &fx.vault.audit().entries_for_dataset(ds.id).unwrap()[0];
    assert_eq!(entry.action, AuditAction::DataAccessAllowed);
    assert_eq!(entry.actor_id, Some(org.id));
    assert_eq!(entry.metadata["mode"], "trusted");
    assert_eq!(entry.metadata["scope"], "agg-only");
}
