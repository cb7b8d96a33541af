//! Embedded-collection catalog.
//!
//! A static table describing which primary collections own which embedded
//! collections and of what arity. The payloads stay dynamic; this table is
//! the only schema knowledge the engine carries.

pub(crate) mod walker;

pub use walker::{apply, map};

/// How many documents an embedded-collection slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// An array of embedded documents.
    Array,
    /// A single optional embedded document.
    Single,
}

/// The embedded collections owned by a collection, in declaration order.
///
/// Collections absent from the catalog own nothing.
#[must_use]
pub fn embedded_collections(collection: &str) -> &'static [(&'static str, Arity)] {
    use Arity::{Array, Single};
    match collection {
        "actors" | "delta" => &[("items", Array), ("effects", Array)],
        "cards" => &[("cards", Array)],
        "combats" => &[("combatants", Array), ("groups", Array)],
        "items" => &[("effects", Array)],
        "journal" => &[("pages", Array), ("categories", Array)],
        "playlists" => &[("sounds", Array)],
        "regions" => &[("behaviors", Array)],
        "tables" => &[("results", Array)],
        "tokens" => &[("delta", Single)],
        "scenes" => &[
            ("drawings", Array),
            ("tokens", Array),
            ("lights", Array),
            ("notes", Array),
            ("regions", Array),
            ("sounds", Array),
            ("templates", Array),
            ("tiles", Array),
            ("walls", Array),
        ],
        _ => &[],
    }
}

/// The pack collection a primary document type is stored in.
#[must_use]
pub fn collection_for_type(document_type: &str) -> Option<&'static str> {
    let collection = match document_type {
        "Actor" => "actors",
        "Adventure" => "adventures",
        "Cards" => "cards",
        "ChatMessage" => "messages",
        "Combat" => "combats",
        "FogExploration" => "fog",
        "Folder" => "folders",
        "Item" => "items",
        "JournalEntry" => "journal",
        "Macro" => "macros",
        "Playlist" => "playlists",
        "RollTable" => "tables",
        "Scene" => "scenes",
        "Setting" => "settings",
        "User" => "users",
        _ => return None,
    };
    Some(collection)
}

/// The primary document type stored in a pack collection.
#[must_use]
pub fn type_for_collection(collection: &str) -> Option<&'static str> {
    let document_type = match collection {
        "actors" => "Actor",
        "adventures" => "Adventure",
        "cards" => "Cards",
        "messages" => "ChatMessage",
        "combats" => "Combat",
        "fog" => "FogExploration",
        "folders" => "Folder",
        "items" => "Item",
        "journal" => "JournalEntry",
        "macros" => "Macro",
        "playlists" => "Playlist",
        "tables" => "RollTable",
        "scenes" => "Scene",
        "settings" => "Setting",
        "users" => "User",
        _ => return None,
    };
    Some(document_type)
}

/// The collections an Adventure document bundles inline.
pub const ADVENTURE_COLLECTIONS: &[&str] = &[
    "actors",
    "cards",
    "combats",
    "folders",
    "items",
    "journal",
    "playlists",
    "scenes",
    "tables",
    "macros",
];
