//! Static, read-only user directories shared by every request.

use std::sync::OnceLock;

use crate::types::User;

/// Fixed, ordered, immutable sequence of users.
///
/// Lookups never mutate; create/delete operations on the HTTP surface are
/// simulated and leave the directory untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDirectory {
    users: Vec<User>,
}

impl UserDirectory {
    #[must_use]
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// The three-user directory served by `/api/users`.
    #[must_use]
    pub fn api() -> &'static Self {
        static API: OnceLock<UserDirectory> = OnceLock::new();
        API.get_or_init(|| {
            Self::new(vec![
                User::new(1, "Alice", "alice@example.com"),
                User::new(2, "Bob", "bob@example.com"),
                User::new(3, "Charlie", "charlie@example.com"),
            ])
        })
    }

    /// The ten-user export database read by the export pipeline.
    #[must_use]
    pub fn export_database() -> &'static Self {
        static EXPORT: OnceLock<UserDirectory> = OnceLock::new();
        EXPORT.get_or_init(|| {
            let people = [
                ("Alice Johnson", "alice.johnson"),
                ("Bob Smith", "bob.smith"),
                ("Charlie Brown", "charlie.brown"),
                ("Diana Prince", "diana.prince"),
                ("Edward Wilson", "edward.wilson"),
                ("Fiona Davis", "fiona.davis"),
                ("George Miller", "george.miller"),
                ("Helen Taylor", "helen.taylor"),
                ("Ivan Rodriguez", "ivan.rodriguez"),
                ("Julia Anderson", "julia.anderson"),
            ];
            Self::new(
                (1_i64..)
                    .zip(people)
                    .map(|(id, (name, mailbox))| {
                        User::new(id, name, format!("{mailbox}@example.com"))
                    })
                    .collect(),
            )
        })
    }

    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    #[must_use]
    pub fn find(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
