//! "At least one of" field groups.
//!
//! Every `group` declaration names its owning field plus one or more
//! siblings. Declarations that share any member describe the same
//! requirement, so they are merged until no two groups overlap. Each merged
//! group becomes one precondition, checked before any field is looked at.

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::DefinitionError;
use crate::validation::{ErrorCode, ValidationError};

/// One merged group, ready to run against raw input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GroupCheck {
    members: Vec<String>,
}

impl GroupCheck {
    #[cfg(test)]
    pub(crate) fn members(&self) -> &[String] {
        &self.members
    }

    pub(crate) fn check(&self, raw: &Map<String, Value>) -> Result<(), ValidationError> {
        let present = self.members.iter().any(|m| raw.get(m).is_some_and(|v| !v.is_null()));
        if present {
            return Ok(());
        }
        trace!(members = ?self.members, "group requirement not met");
        Err(ValidationError::field(ErrorCode::GroupRequired, &self.members.join(", ")))
    }
}

/// Merges raw declarations into disjoint groups.
///
/// `declarations` holds one `[owner, member, ...]` list per field that set a
/// `group`. `declared` lists every field of the model. Groups keep the order
/// in which their first declaration appeared; members keep first-seen order.
pub(crate) fn resolve(
    model: &str,
    declarations: Vec<Vec<String>>,
    declared: &[&str],
) -> Result<Vec<GroupCheck>, DefinitionError> {
    for decl in &declarations {
        if let Some((owner, members)) = decl.split_first() {
            if members.iter().any(|m| m == owner) {
                return Err(DefinitionError::SelfGroup {
                    model: model.to_owned(),
                    field: owner.clone(),
                });
            }
        }
    }

    let mut groups = declarations;
    'scan: loop {
        for i in 0..groups.len() {
            for j in i + 1..groups.len() {
                if groups[i].iter().any(|m| groups[j].contains(m)) {
                    let absorbed = groups.remove(j);
                    groups[i].extend(absorbed);
                    continue 'scan;
                }
            }
        }
        break;
    }

    groups
        .into_iter()
        .map(|group| {
            let mut members: Vec<String> = Vec::with_capacity(group.len());
            for name in group {
                if !declared.contains(&name.as_str()) {
                    return Err(DefinitionError::UnknownGroupMember {
                        model: model.to_owned(),
                        member: name,
                    });
                }
                if !members.contains(&name) {
                    members.push(name);
                }
            }
            Ok(GroupCheck { members })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decl(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    fn object(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn transitive_chain_merges_into_one() {
        let groups = resolve(
            "M",
            vec![decl(&["a", "b"]), decl(&["b", "c"]), decl(&["c", "d"])],
            &["a", "b", "c", "d"],
        )
        .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn late_bridge_still_merges() {
        let groups = resolve(
            "M",
            vec![decl(&["a", "b"]), decl(&["c", "d"]), decl(&["b", "c"])],
            &["a", "b", "c", "d"],
        )
        .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members().len(), 4);
    }

    #[test]
    fn disjoint_groups_stay_apart() {
        let groups = resolve("M", vec![decl(&["a", "b"]), decl(&["c", "d"])], &["a", "b", "c", "d"])
            .unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn self_reference_is_rejected() {
        let err = resolve("M", vec![decl(&["a", "a"])], &["a"]).unwrap_err();
        assert_eq!(err, DefinitionError::SelfGroup { model: "M".into(), field: "a".into() });
    }

    #[test]
    fn undeclared_member_is_rejected() {
        let err = resolve("M", vec![decl(&["a", "ghost"])], &["a"]).unwrap_err();
        assert_eq!(
            err,
            DefinitionError::UnknownGroupMember { model: "M".into(), member: "ghost".into() }
        );
    }

    #[test]
    fn check_needs_one_non_null_member() {
        let groups = resolve("M", vec![decl(&["phone", "email"])], &["phone", "email"]).unwrap();
        let g = &groups[0];

        let err = g.check(&object(json!({}))).unwrap_err();
        assert_eq!(err.code, ErrorCode::GroupRequired);
        assert_eq!(err.extra, vec!["phone, email".to_owned()]);

        assert!(g.check(&object(json!({"phone": null}))).is_err());
        assert!(g.check(&object(json!({"phone": "x"}))).is_ok());
        assert!(g.check(&object(json!({"email": "x"}))).is_ok());
    }
}
