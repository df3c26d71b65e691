use crate::schema::UserRole;

use super::jwt::SessionData;

use ActionType::*;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,
    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageAllRecipes,
    ManageUsers,
}

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[CreateRecipes, ManageOwnRecipes, ManageOwnFavorites],
    ),
    (
        UserRole::Admin,
        &[
            CreateRecipes,
            ManageOwnRecipes,
            ManageOwnFavorites,
            ManageAllRecipes,
            ManageUsers,
        ],
    ),
];

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find(|(role, _)| *role == session.user_uid)
            .map(|(_, actions)| actions.contains(&self))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(uid: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: String::from("cook"),
            is_admin: uid == UserRole::Admin,
            user_uid: uid,
        }
    }

    #[test]
    fn regular_users_manage_only_their_own() {
        let session = session(UserRole::User);
        assert!(CreateRecipes.authenticate(&session));
        assert!(ManageOwnRecipes.authenticate(&session));
        assert!(ManageOwnFavorites.authenticate(&session));
        assert!(!ManageAllRecipes.authenticate(&session));
        assert!(!ManageUsers.authenticate(&session));
    }

    #[test]
    fn admins_hold_every_capability() {
        let session = session(UserRole::Admin);
        assert!(ManageAllRecipes.authenticate(&session));
        assert!(ManageUsers.authenticate(&session));
    }
}
