pub mod declarations;
pub mod types;

pub use declarations::{COMPLETION_MESSAGE, GAMES, HISTORY, USERS};
pub use types::{
    default_index_name, CollectionSpec, ExistingIndex, IndexKey, IndexSpec, SchemaError,
    SchemaPlan, SortOrder,
};
