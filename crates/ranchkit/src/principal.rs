//! Directory group principal identifiers.
//!
//! Rancher identifies LDAP groups as `openldap_group://<distinguished name>`.
//! Only the group's common name is interesting for display.

use crate::error::{Error, Result};

/// Scheme prefix of OpenLDAP group principals.
pub const GROUP_SCHEME: &str = "openldap_group://";

/// Extract the group name from `openldap_group://cn=<name>,<rest of DN>`.
///
/// The `cn` key is case-sensitive and must be the first DN component. The
/// name is everything after the first `=` of that component.
pub fn parse_group_name(principal_id: &str) -> Result<&str> {
    let invalid = |reason| Error::InvalidPrincipal {
        principal: principal_id.to_string(),
        reason,
    };

    let dn = principal_id
        .strip_prefix(GROUP_SCHEME)
        .ok_or_else(|| invalid("not an openldap_group principal"))?;

    let first = dn
        .split(',')
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| invalid("distinguished name is empty"))?;

    match first.split_once('=') {
        Some(("cn", name)) if !name.is_empty() => Ok(name),
        Some(("cn", _)) => Err(invalid("empty CN value")),
        Some(_) => Err(invalid("first DN component is not CN")),
        None => Err(invalid("invalid CN component")),
    }
}
