//! Decoded dump records
//!
//! Each record owns its nested collections outright; collection order is
//! the order the elements appeared in the dump. Optional scalars are `None`
//! when the element was missing and `Some(String::new())` when it was
//! present but empty.

/// Discogs numeric identifier (artist, release, master, label, company)
pub type RecordId = i64;

/// Zero-based position of an element within its parent collection
pub type Ordinal = i32;

/// Reference to another artist by id and display name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtistRef {
    pub id: Option<RecordId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Artist {
    pub id: RecordId,
    pub name: Option<String>,
    pub real_name: Option<String>,
    pub profile: Option<String>,
    pub data_quality: Option<String>,
    pub status: Option<String>,
    pub name_variations: Vec<String>,
    pub aliases: Vec<ArtistRef>,
    pub groups: Vec<ArtistRef>,
    pub members: Vec<ArtistRef>,
    pub urls: Vec<String>,
}

/// Artist credit on a release or track
///
/// `role` is only meaningful for extra-artist credits and `tracks` only for
/// release-level credits; both are carried as decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtistCredit {
    pub id: Option<RecordId>,
    pub name: Option<String>,
    /// Artist name variation used on this credit
    pub anv: Option<String>,
    /// Join phrase to the next credit ("&", "feat.", ...)
    pub join: Option<String>,
    pub role: Option<String>,
    /// Track scope of the credit ("A1 to A3")
    pub tracks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Format {
    pub name: Option<String>,
    pub qty: Option<i32>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Video {
    pub src: Option<String>,
    /// Seconds
    pub duration: Option<i32>,
    pub embed: Option<bool>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Company {
    pub id: Option<RecordId>,
    pub name: Option<String>,
    pub catno: Option<String>,
    pub entity_type: Option<i32>,
    pub entity_type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelCredit {
    pub id: Option<RecordId>,
    pub name: Option<String>,
    pub catno: Option<String>,
}

/// Tracks have no identifier of their own; they are keyed by release id
/// and position in the tracklist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    pub position: Option<String>,
    pub title: Option<String>,
    /// Free-form, usually "m:ss"
    pub duration: Option<String>,
    pub artists: Vec<ArtistCredit>,
    pub extra_artists: Vec<ArtistCredit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Release {
    pub id: RecordId,
    pub status: Option<String>,
    pub title: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
    /// Free-form date, e.g. "1999-03-00"
    pub released: Option<String>,
    pub data_quality: Option<String>,
    pub master_id: Option<RecordId>,
    pub genres: Vec<String>,
    pub styles: Vec<String>,
    pub artists: Vec<ArtistCredit>,
    pub extra_artists: Vec<ArtistCredit>,
    pub formats: Vec<Format>,
    pub videos: Vec<Video>,
    pub companies: Vec<Company>,
    pub labels: Vec<LabelCredit>,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Master {
    pub id: RecordId,
    pub main_release: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelRef {
    pub id: Option<RecordId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label {
    pub id: RecordId,
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub profile: Option<String>,
    pub data_quality: Option<String>,
    pub sub_labels: Vec<LabelRef>,
    pub urls: Vec<String>,
}
