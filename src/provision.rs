//! Collection access rules and schema checks against a PocketBase instance.

use futures::future::join_all;

use crate::error::StoreResult;
use crate::store::{collections, CollectionProbe, CollectionRules, PocketBaseClient};

const AUTHENTICATED: &str = "@request.auth.id != ''";
const OWNER: &str = "id = @request.auth.id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone may list and view.
    PublicRead,
    /// Signed-in users only; anonymous visitors may still create.
    PrivatePublicCreate,
    /// Signed-in users only.
    Private,
    /// Each user sees and edits only their own record.
    Owner,
}

/// Every collection the studio uses and who may read it.
pub const ACCESS: &[(&str, Access)] = &[
    (collections::SERVICES, Access::PublicRead),
    (collections::TESTIMONIALS, Access::PublicRead),
    (collections::BLOG_POSTS, Access::PublicRead),
    (collections::MEDIA_GALLERY, Access::PublicRead),
    (collections::SITE_CONTENT, Access::PublicRead),
    (collections::MEDIA_UPLOADS, Access::PublicRead),
    (collections::APPOINTMENTS, Access::PrivatePublicCreate),
    (collections::CONTACT_MESSAGES, Access::PrivatePublicCreate),
    (collections::PAYMENTS, Access::Private),
    (collections::USERS, Access::Owner),
];

fn rule(value: &str) -> Option<String> {
    Some(value.to_string())
}

impl Access {
    pub fn rules(self) -> CollectionRules {
        match self {
            Access::PublicRead => CollectionRules {
                list_rule: rule(""),
                view_rule: rule(""),
                ..CollectionRules::default()
            },
            Access::Owner => CollectionRules {
                list_rule: rule(OWNER),
                view_rule: rule(OWNER),
                update_rule: rule(OWNER),
                ..CollectionRules::default()
            },
            Access::Private | Access::PrivatePublicCreate => CollectionRules {
                list_rule: rule(AUTHENTICATED),
                view_rule: rule(AUTHENTICATED),
                create_rule: if self == Access::PrivatePublicCreate {
                    rule("")
                } else {
                    rule(AUTHENTICATED)
                },
                update_rule: rule(AUTHENTICATED),
                delete_rule: rule(AUTHENTICATED),
            },
        }
    }
}

pub fn access_for(collection: &str) -> Option<Access> {
    ACCESS
        .iter()
        .find(|(name, _)| *name == collection)
        .map(|(_, access)| *access)
}

pub fn rules_for(collection: &str) -> Option<CollectionRules> {
    access_for(collection).map(Access::rules)
}

/// Apply the access table to every collection. One collection failing does
/// not stop the rest; each outcome is reported.
pub async fn fix_rules(client: &PocketBaseClient) -> Vec<(&'static str, StoreResult<()>)> {
    let mut outcomes = Vec::with_capacity(ACCESS.len());
    for (name, access) in ACCESS {
        let result = client
            .update_collection_rules(name, &access.rules())
            .await
            .map(|_| ());
        match &result {
            Ok(()) => log::info!("rules applied to {name}"),
            Err(err) => log::error!("failed to update rules for {name}: {err}"),
        }
        outcomes.push((*name, result));
    }
    outcomes
}

/// Probe each collection anonymously.
pub async fn probe_all<'a>(
    client: &PocketBaseClient,
    names: &[&'a str],
) -> Vec<(&'a str, CollectionProbe)> {
    let probes = join_all(names.iter().map(|name| client.probe_collection(name))).await;
    names.iter().copied().zip(probes).collect()
}

/// Whether a probe result is what the access table expects.
pub fn probe_matches_access(probe: &CollectionProbe, access: Access) -> bool {
    match access {
        Access::PublicRead => matches!(probe, CollectionProbe::Public { .. }),
        _ => matches!(probe, CollectionProbe::Protected),
    }
}

pub fn describe_probe(probe: &CollectionProbe) -> String {
    match probe {
        CollectionProbe::Public { total_items } => format!("ok (public), {total_items} items"),
        CollectionProbe::Protected => "ok (protected), requires auth".to_string(),
        CollectionProbe::Missing => "not found".to_string(),
        CollectionProbe::Failed(status) => format!("error {status}"),
        CollectionProbe::Unreachable(reason) => format!("connection error: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_collections_open_list_and_view_only() {
        let rules = rules_for("blog_posts").unwrap();
        assert_eq!(rules.list_rule.as_deref(), Some(""));
        assert_eq!(rules.view_rule.as_deref(), Some(""));
        assert_eq!(rules.create_rule, None);
        assert_eq!(rules.delete_rule, None);
    }

    #[test]
    fn bookings_and_messages_accept_anonymous_creates() {
        for name in ["appointments", "contact_messages"] {
            let rules = rules_for(name).unwrap();
            assert_eq!(rules.create_rule.as_deref(), Some(""), "{name}");
            assert_eq!(rules.list_rule.as_deref(), Some(AUTHENTICATED), "{name}");
        }
    }

    #[test]
    fn payments_are_fully_private() {
        let rules = rules_for("payments").unwrap();
        assert_eq!(rules.create_rule.as_deref(), Some(AUTHENTICATED));
        assert_eq!(rules.delete_rule.as_deref(), Some(AUTHENTICATED));
    }

    #[test]
    fn users_are_owner_scoped() {
        let rules = rules_for("users").unwrap();
        assert_eq!(rules.view_rule.as_deref(), Some(OWNER));
        assert_eq!(rules.update_rule.as_deref(), Some(OWNER));
        assert_eq!(rules.create_rule, None);
    }

    #[test]
    fn unknown_collection_has_no_rules() {
        assert!(rules_for("invoices").is_none());
    }

    #[test]
    fn rules_serialize_with_pocketbase_names() {
        let json = serde_json::to_value(Access::PublicRead.rules()).unwrap();
        assert_eq!(json, serde_json::json!({ "listRule": "", "viewRule": "" }));
    }

    #[test]
    fn probe_expectations_follow_access() {
        let public = CollectionProbe::Public { total_items: 3 };
        assert!(probe_matches_access(&public, Access::PublicRead));
        assert!(!probe_matches_access(&public, Access::Private));
        assert!(probe_matches_access(&CollectionProbe::Protected, Access::Owner));
        assert!(!probe_matches_access(&CollectionProbe::Missing, Access::PublicRead));
    }
}
