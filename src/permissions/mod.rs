// permissions module

pub mod permission_manager;
pub mod permission_wrapper;
pub mod policy;

pub use permission_manager::{
    OrgRequest, PendingRequest, PermissionManager, TrustedOrgEntry, TrustedOrgsDiff,
};
pub use permission_wrapper::PermissionWrapper;
pub use policy::{decide, AccessPolicy, Actor, Evaluation, PolicyReader};
