//! Study member roster and the local user's contribution right.

use studysync_types::{Member, MemberMap, UserId, now_millis};
use tracing::trace;

/// Who's in the study and whether the local user may edit it.
///
/// `my_id` is `None` for anonymous viewers and during practice sessions;
/// such a client can never contribute.
#[derive(Debug, Clone)]
pub struct MemberRegistry {
    members: MemberMap,
    my_id: Option<UserId>,
}

impl MemberRegistry {
    pub fn new(members: MemberMap, my_id: Option<UserId>) -> Self {
        Self { members, my_id }
    }

    /// Replace the roster. Activity stamps survive for members still present.
    pub fn replace(&mut self, mut members: MemberMap) {
        for (id, member) in members.iter_mut() {
            if let Some(old) = self.members.get(id) {
                member.active_at = old.active_at;
            }
        }
        self.members = members;
    }

    pub fn my_member(&self) -> Option<&Member> {
        self.my_id.as_ref().and_then(|id| self.members.get(id))
    }

    pub fn my_id(&self) -> Option<&UserId> {
        self.my_id.as_ref()
    }

    pub fn can_contribute(&self) -> bool {
        self.my_member().is_some_and(Member::can_contribute)
    }

    /// Record that `user_id` just did something.
    pub fn set_active(&mut self, user_id: &UserId) {
        if let Some(member) = self.members.get_mut(user_id) {
            member.active_at = Some(now_millis());
            trace!(user = %user_id, "member active");
        }
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Member> {
        self.members.get(user_id)
    }

    pub fn members(&self) -> &MemberMap {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysync_types::Role;

    fn roster(entries: &[(&str, Role)]) -> MemberMap {
        entries
            .iter()
            .map(|(id, role)| (UserId::from(*id), Member::new(*id, *role)))
            .collect()
    }

    #[test]
    fn test_can_contribute_requires_write_role() {
        let map = roster(&[("ana", Role::Write), ("bo", Role::Read)]);
        assert!(MemberRegistry::new(map.clone(), Some("ana".into())).can_contribute());
        assert!(!MemberRegistry::new(map.clone(), Some("bo".into())).can_contribute());
        assert!(!MemberRegistry::new(map.clone(), Some("cy".into())).can_contribute());
        assert!(!MemberRegistry::new(map, None).can_contribute());
    }

    #[test]
    fn test_set_active_only_touches_members() {
        let mut reg = MemberRegistry::new(roster(&[("ana", Role::Write)]), None);
        reg.set_active(&UserId::from("ana"));
        reg.set_active(&UserId::from("stranger"));
        assert!(reg.get(&UserId::from("ana")).unwrap().active_at.is_some());
        assert!(reg.get(&UserId::from("stranger")).is_none());
    }

    #[test]
    fn test_replace_keeps_activity_and_applies_demotion() {
        let mut reg = MemberRegistry::new(roster(&[("ana", Role::Write)]), Some("ana".into()));
        reg.set_active(&UserId::from("ana"));
        reg.replace(roster(&[("ana", Role::Read), ("bo", Role::Write)]));
        assert!(!reg.can_contribute());
        assert!(reg.get(&UserId::from("ana")).unwrap().active_at.is_some());
        assert!(reg.get(&UserId::from("bo")).unwrap().active_at.is_none());
    }
}
