use crate::clock::Clock;
use crate::db_operations::{DbOperations, TxResult, TxnTrees};
use crate::error::{VaultError, VaultResult};
use crate::types::{
    AccessDecision, DatasetId, DatasetMeta, GrantInfo, GrantMode, Permission, Reason, Role, User,
    UserId, Visibility,
};
use chrono::NaiveDate;
use log::debug;
use sled::transaction::ConflictableTransactionError;
use std::sync::Arc;

/// The actor whose access is being decided.
#[derive(Debug, Clone, Copy)]
pub enum Actor<'a> {
    /// No identity was supplied
    Anonymous,
    /// An id was supplied but no user record matches it
    Unknown(UserId),
    Known(&'a User),
}

impl<'a> Actor<'a> {
    pub fn user(&self) -> Option<&'a User> {
        match *self {
            Actor::Known(user) => Some(user),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<UserId> {
        match *self {
            Actor::Anonymous => None,
            Actor::Unknown(id) => Some(id),
            Actor::Known(user) => Some(user.id),
        }
    }
}

/// Decides whether `actor` may read `dataset`.
///
/// This is a pure function of its inputs: the caller supplies the dataset
/// (`None` when the id did not resolve), the actor, the permission row of the
/// actor on the dataset (only consulted for Trusted datasets) and the current
/// day used for expiry.
///
/// The first matching rule wins:
/// 1. Unknown dataset denies with `not_found`; an unknown actor id denies
///    with `forbidden`.
/// 2. The owner is allowed in `owner` mode, an admin in `admin` mode.
/// 3. Public datasets allow anyone, including anonymous actors.
/// 4. Private datasets deny with `private`.
/// 5. Trusted datasets require a verified organisation holding an active,
///    unexpired grant. An expiry equal to `today` still allows.
pub fn decide(
    dataset: Option<&DatasetMeta>,
    actor: Actor<'_>,
    permission: Option<&Permission>,
    today: NaiveDate,
) -> AccessDecision {
    let dataset = match dataset {
        Some(dataset) => dataset,
        None => return AccessDecision::deny(Reason::NotFound),
    };

    let user = match actor {
        Actor::Unknown(_) => return AccessDecision::deny(Reason::Forbidden),
        Actor::Anonymous => None,
        Actor::Known(user) => Some(user),
    };

    if let Some(user) = user {
        if user.id == dataset.owner_id {
            return AccessDecision::allow(GrantInfo::mode(GrantMode::Owner));
        }
        if user.role == Role::Admin {
            return AccessDecision::allow(GrantInfo::mode(GrantMode::Admin));
        }
    }

    match dataset.visibility {
        Visibility::Public => AccessDecision::allow(GrantInfo::mode(GrantMode::Public)),
        Visibility::Private => AccessDecision::deny(Reason::Private),
        Visibility::Trusted => {
            let org = match user {
                Some(user) if user.role == Role::Organisation => user,
                _ => return AccessDecision::deny(Reason::TrustedOnly),
            };
            if !org.verified {
                return AccessDecision::deny(Reason::UnverifiedOrg);
            }
            let permission = match permission {
                Some(p) if p.is_active_grant() => p,
                _ => return AccessDecision::deny(Reason::NotTrusted),
            };
            let grant = GrantInfo {
                mode: GrantMode::Trusted,
                scope: permission.scope.clone(),
                expires_at: permission.expires_at,
            };
            match permission.expires_at {
                Some(expiry) if expiry < today => AccessDecision::deny_with(Reason::Expired, grant),
                _ => AccessDecision::allow(grant),
            }
        }
    }
}

/// Read access the policy needs. Implemented for the live database and for
/// the transactional view, so a decision can be taken inside the same
/// transaction that acts on it.
pub trait PolicyReader {
    type Error;

    fn read_dataset(&self, dataset_id: DatasetId) -> Result<Option<DatasetMeta>, Self::Error>;
    fn read_user(&self, user_id: UserId) -> Result<Option<User>, Self::Error>;
    fn read_permission(
        &self,
        dataset_id: DatasetId,
        org_id: UserId,
    ) -> Result<Option<Permission>, Self::Error>;
}

impl PolicyReader for DbOperations {
    type Error = VaultError;

    fn read_dataset(&self, dataset_id: DatasetId) -> VaultResult<Option<DatasetMeta>> {
        self.get_dataset_meta(dataset_id)
    }

    fn read_user(&self, user_id: UserId) -> VaultResult<Option<User>> {
        self.get_user(user_id)
    }

    fn read_permission(&self, dataset_id: DatasetId, org_id: UserId) -> VaultResult<Option<Permission>> {
        self.get_permission(dataset_id, org_id)
    }
}

impl PolicyReader for TxnTrees<'_> {
    type Error = ConflictableTransactionError<VaultError>;

    fn read_dataset(&self, dataset_id: DatasetId) -> TxResult<Option<DatasetMeta>> {
        self.get_dataset_meta(dataset_id)
    }

    fn read_user(&self, user_id: UserId) -> TxResult<Option<User>> {
        self.get_user(user_id)
    }

    fn read_permission(&self, dataset_id: DatasetId, org_id: UserId) -> TxResult<Option<Permission>> {
        self.get_permission(dataset_id, org_id)
    }
}

/// A decision together with the records it was taken on.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: AccessDecision,
    pub dataset: Option<DatasetMeta>,
    pub actor: Option<User>,
}

/// Loads what [`decide`] needs and applies it using the injected clock.
#[derive(Clone)]
pub struct AccessPolicy {
    clock: Arc<dyn Clock>,
}

impl AccessPolicy {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Evaluates access of `actor_id` (anonymous for `None`) to `dataset_id`.
    ///
    /// An unknown dataset short-circuits before the actor is looked up. The
    /// permission row is only read for organisations on Trusted datasets.
    pub fn evaluate<R: PolicyReader>(
        &self,
        reader: &R,
        dataset_id: DatasetId,
        actor_id: Option<UserId>,
    ) -> Result<Evaluation, R::Error> {
        let dataset = match reader.read_dataset(dataset_id)? {
            Some(dataset) => dataset,
            None => {
                debug!("decision dataset={} actor={:?}: not_found", dataset_id, actor_id);
                return Ok(Evaluation {
                    decision: AccessDecision::deny(Reason::NotFound),
                    dataset: None,
                    actor: None,
                });
            }
        };

        let user = match actor_id {
            Some(id) => reader.read_user(id)?,
            None => None,
        };
        let actor = match (actor_id, user.as_ref()) {
            (None, _) => Actor::Anonymous,
            (Some(id), None) => Actor::Unknown(id),
            (Some(_), Some(user)) => Actor::Known(user),
        };

        let permission = match actor.user() {
            Some(user)
                if dataset.visibility == Visibility::Trusted
                    && user.is_organisation()
                    && user.id != dataset.owner_id =>
            {
                reader.read_permission(dataset.id, user.id)?
            }
            _ => None,
        };

        let decision = decide(Some(&dataset), actor, permission.as_ref(), self.clock.today());
        debug!(
            "decision dataset={} actor={:?}: allowed={} reason={}",
            dataset_id, actor_id, decision.allowed, decision.reason
        );

        Ok(Evaluation {
            decision,
            dataset: Some(dataset),
            actor: user,
        })
    }
}
