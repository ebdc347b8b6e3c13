//! Favorite marks

use serde::{Deserialize, Serialize};

/// Kinds of entities a user can favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FavoriteType {
    Office,
    Info,
    Ticket,
}

impl FavoriteType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Office => "OFFICE",
            Self::Info => "INFO",
            Self::Ticket => "TICKET",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OFFICE" => Some(Self::Office),
            "INFO" => Some(Self::Info),
            "TICKET" => Some(Self::Ticket),
            _ => None,
        }
    }
}

/// A local favorite, keyed by `(user_id, item_id, item_type)`.
///
/// Stored apart from the entity caches so it survives replace-all refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteMark {
    pub user_id: String,
    pub item_id: i64,
    pub item_type: FavoriteType,
    pub created_at: i64,
}

/// A cached entity joined with the current user's favorite flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Favorited<T> {
    pub item: T,
    pub is_favorite: bool,
}
