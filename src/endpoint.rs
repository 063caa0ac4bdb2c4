//! Gateway endpoint table.
//!
//! Every operation maps to one fixed path under `{scheme}://{host}:{port}/{version}/`.

use std::fmt;

/// An etcd JSON gateway endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    // KV
    Put,
    Range,
    DeleteRange,
    Txn,
    Compaction,

    // Lease
    LeaseGrant,
    LeaseRevoke,
    LeaseKeepAlive,
    LeaseTimeToLive,

    // Authentication
    AuthEnable,
    AuthDisable,
    Authenticate,

    // Role
    RoleAdd,
    RoleGet,
    RoleDelete,
    RoleList,
    RoleGrantPermission,
    RoleRevokePermission,

    // User
    UserAdd,
    UserGet,
    UserDelete,
    UserChangePassword,
    UserList,
    UserGrantRole,
    UserRevokeRole,
}

impl Endpoint {
    pub const ALL: [Endpoint; 25] = [
        Endpoint::Put,
        Endpoint::Range,
        Endpoint::DeleteRange,
        Endpoint::Txn,
        Endpoint::Compaction,
        Endpoint::LeaseGrant,
        Endpoint::LeaseRevoke,
        Endpoint::LeaseKeepAlive,
        Endpoint::LeaseTimeToLive,
        Endpoint::AuthEnable,
        Endpoint::AuthDisable,
        Endpoint::Authenticate,
        Endpoint::RoleAdd,
        Endpoint::RoleGet,
        Endpoint::RoleDelete,
        Endpoint::RoleList,
        Endpoint::RoleGrantPermission,
        Endpoint::RoleRevokePermission,
        Endpoint::UserAdd,
        Endpoint::UserGet,
        Endpoint::UserDelete,
        Endpoint::UserChangePassword,
        Endpoint::UserList,
        Endpoint::UserGrantRole,
        Endpoint::UserRevokeRole,
    ];

    /// Path relative to the versioned gateway root.
    ///
    /// Revoke and time-to-live live under `kv/lease/`, unlike grant and
    /// keepalive; that is where the gateway serves them.
    pub const fn path(self) -> &'static str {
        match self {
            Endpoint::Put => "kv/put",
            Endpoint::Range => "kv/range",
            Endpoint::DeleteRange => "kv/deleterange",
            Endpoint::Txn => "kv/txn",
            Endpoint::Compaction => "kv/compaction",
            Endpoint::LeaseGrant => "lease/grant",
            Endpoint::LeaseRevoke => "kv/lease/revoke",
            Endpoint::LeaseKeepAlive => "lease/keepalive",
            Endpoint::LeaseTimeToLive => "kv/lease/timetolive",
            Endpoint::AuthEnable => "auth/enable",
            Endpoint::AuthDisable => "auth/disable",
            Endpoint::Authenticate => "auth/authenticate",
            Endpoint::RoleAdd => "auth/role/add",
            Endpoint::RoleGet => "auth/role/get",
            Endpoint::RoleDelete => "auth/role/delete",
            Endpoint::RoleList => "auth/role/list",
            Endpoint::RoleGrantPermission => "auth/role/grant",
            Endpoint::RoleRevokePermission => "auth/role/revoke",
            Endpoint::UserAdd => "auth/user/add",
            Endpoint::UserGet => "auth/user/get",
            Endpoint::UserDelete => "auth/user/delete",
            Endpoint::UserChangePassword => "auth/user/changepw",
            Endpoint::UserList => "auth/user/list",
            Endpoint::UserGrantRole => "auth/user/grant",
            Endpoint::UserRevokeRole => "auth/user/revoke",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
