use crate::schema::types::{CollectionSpec, IndexKey, IndexSpec, SchemaPlan};

pub const USERS: &str = "users";
pub const GAMES: &str = "games";
pub const HISTORY: &str = "history";

pub const COMPLETION_MESSAGE: &str = "Collections and indexes successfully initialized!";

impl SchemaPlan {
    /// Collections and indexes backing the tic-tac-toe service.
    pub fn tictactoe() -> Self {
        Self {
            collections: vec![
                CollectionSpec::new(USERS)
                    .with_index(IndexSpec::new(vec![IndexKey::asc("username")]).unique()),
                CollectionSpec::new(GAMES)
                    .with_index(IndexSpec::new(vec![IndexKey::desc("created_at")])),
                CollectionSpec::new(HISTORY).with_index(IndexSpec::new(vec![
                    IndexKey::asc("players"),
                    IndexKey::asc("winner"),
                    IndexKey::desc("date"),
                ])),
            ],
        }
    }
}
