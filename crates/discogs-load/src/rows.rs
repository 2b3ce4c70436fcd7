//! Record flattening
//!
//! Projects a decoded record onto the normalized table layout: one header
//! row for the record itself, followed by one row per element of each child
//! collection carrying the parent id and the element's zero-based ordinal
//! (`ofst`). Track children carry the compound key
//! `(release_id, track_ofst, artist_ofst)` since tracks have no id of their
//! own.
//!
//! Flattening is pure: no I/O, no shared state, identifiers passed through
//! untouched.

use std::fmt;

use crate::dump::{
    Artist, ArtistCredit, ArtistRef, Label, Master, Ordinal, RecordId, Release,
};

/// Target table of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Artists,
    ArtistNameVariations,
    ArtistAliases,
    ArtistGroups,
    ArtistMembers,
    ArtistUrls,
    Releases,
    ReleaseGenres,
    ReleaseStyles,
    ReleaseArtistMaps,
    ReleaseExtraArtistMaps,
    ReleaseFormats,
    ReleaseVideos,
    ReleaseCompanies,
    ReleaseLabels,
    Tracks,
    TrackArtistMaps,
    TrackExtraArtistMaps,
    Masters,
    Labels,
    LabelSublabels,
    LabelUrls,
}

impl Relation {
    pub const ALL: [Relation; 22] = [
        Relation::Artists,
        Relation::ArtistNameVariations,
        Relation::ArtistAliases,
        Relation::ArtistGroups,
        Relation::ArtistMembers,
        Relation::ArtistUrls,
        Relation::Releases,
        Relation::ReleaseGenres,
        Relation::ReleaseStyles,
        Relation::ReleaseArtistMaps,
        Relation::ReleaseExtraArtistMaps,
        Relation::ReleaseFormats,
        Relation::ReleaseVideos,
        Relation::ReleaseCompanies,
        Relation::ReleaseLabels,
        Relation::Tracks,
        Relation::TrackArtistMaps,
        Relation::TrackExtraArtistMaps,
        Relation::Masters,
        Relation::Labels,
        Relation::LabelSublabels,
        Relation::LabelUrls,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Relation::Artists => "artists",
            Relation::ArtistNameVariations => "artist_namevariations",
            Relation::ArtistAliases => "artist_aliases",
            Relation::ArtistGroups => "artist_groups",
            Relation::ArtistMembers => "artist_members",
            Relation::ArtistUrls => "artist_urls",
            Relation::Releases => "releases",
            Relation::ReleaseGenres => "release_genres",
            Relation::ReleaseStyles => "release_styles",
            Relation::ReleaseArtistMaps => "release_artist_maps",
            Relation::ReleaseExtraArtistMaps => "release_extra_artist_maps",
            Relation::ReleaseFormats => "release_formats",
            Relation::ReleaseVideos => "release_videos",
            Relation::ReleaseCompanies => "release_companies",
            Relation::ReleaseLabels => "release_labels",
            Relation::Tracks => "tracks",
            Relation::TrackArtistMaps => "track_artist_maps",
            Relation::TrackExtraArtistMaps => "track_extra_artist_maps",
            Relation::Masters => "masters",
            Relation::Labels => "labels",
            Relation::LabelSublabels => "label_sublabels",
            Relation::LabelUrls => "label_urls",
        }
    }

    /// Column holding the owning record's id; `id` for header tables
    pub fn parent_column(self) -> &'static str {
        match self {
            Relation::Artists | Relation::Releases | Relation::Masters | Relation::Labels => "id",
            Relation::ArtistNameVariations
            | Relation::ArtistAliases
            | Relation::ArtistGroups
            | Relation::ArtistMembers
            | Relation::ArtistUrls => "artist_id",
            Relation::LabelSublabels | Relation::LabelUrls => "label_id",
            _ => "release_id",
        }
    }

    /// Header tables hold one row per record and have no ordinal
    pub fn is_header(self) -> bool {
        self.parent_column() == "id"
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Nullable typed column value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    BigInt(Option<i64>),
    Int(Option<i32>),
    Text(Option<String>),
    Bool(Option<bool>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::BigInt(v) => v.is_none(),
            Value::Int(v) => v.is_none(),
            Value::Text(v) => v.is_none(),
            Value::Bool(v) => v.is_none(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(Some(v))
    }
}

impl From<Option<i64>> for Value {
    fn from(v: Option<i64>) -> Self {
        Value::BigInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(Some(v))
    }
}

impl From<Option<i32>> for Value {
    fn from(v: Option<i32>) -> Self {
        Value::Int(v)
    }
}

impl From<&Option<String>> for Value {
    fn from(v: &Option<String>) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(Some(v.clone()))
    }
}

impl From<Option<bool>> for Value {
    fn from(v: Option<bool>) -> Self {
        Value::Bool(v)
    }
}

/// Identifies a row in logs and error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub relation: Relation,
    /// Owning record's id (the record's own id for header rows)
    pub parent_id: RecordId,
    pub ordinal: Option<Ordinal>,
    /// Credit ordinal within a track; `ordinal` is then the track's
    pub sub_ordinal: Option<Ordinal>,
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}", self.relation, self.parent_id)?;
        if let Some(ordinal) = self.ordinal {
            write!(f, ", {ordinal}")?;
        }
        if let Some(sub) = self.sub_ordinal {
            write!(f, ", {sub}")?;
        }
        f.write_str("]")
    }
}

/// One row to be written: target relation and named column values
///
/// Every row of a given relation lists the same columns in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowInsert {
    pub relation: Relation,
    pub key: RowKey,
    pub columns: Vec<(&'static str, Value)>,
}

impl RowInsert {
    fn header(relation: Relation, id: RecordId) -> Self {
        Self {
            relation,
            key: RowKey {
                relation,
                parent_id: id,
                ordinal: None,
                sub_ordinal: None,
            },
            columns: vec![("id", Value::from(id))],
        }
    }

    fn child(relation: Relation, parent_id: RecordId, ofst: Ordinal) -> Self {
        Self {
            relation,
            key: RowKey {
                relation,
                parent_id,
                ordinal: Some(ofst),
                sub_ordinal: None,
            },
            columns: vec![
                (relation.parent_column(), Value::from(parent_id)),
                ("ofst", Value::from(ofst)),
            ],
        }
    }

    fn track_child(
        relation: Relation,
        release_id: RecordId,
        track_ofst: Ordinal,
        artist_ofst: Ordinal,
    ) -> Self {
        Self {
            relation,
            key: RowKey {
                relation,
                parent_id: release_id,
                ordinal: Some(track_ofst),
                sub_ordinal: Some(artist_ofst),
            },
            columns: vec![
                ("release_id", Value::from(release_id)),
                ("track_ofst", Value::from(track_ofst)),
                ("artist_ofst", Value::from(artist_ofst)),
            ],
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.columns.push((column, value.into()));
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(name, _)| *name)
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }
}

/// Pair each element with its ordinal
///
/// The decoder rejects collections longer than the ordinal range, so the
/// zip never cuts a collection short.
fn positions<T>(items: &[T]) -> impl Iterator<Item = (Ordinal, &T)> {
    (0..=Ordinal::MAX).zip(items)
}

/// A record that projects onto table rows
pub trait Flatten {
    /// Append this record's rows, header first
    fn flatten_into(&self, rows: &mut Vec<RowInsert>);

    fn flatten(&self) -> Vec<RowInsert> {
        let mut rows = Vec::new();
        self.flatten_into(&mut rows);
        rows
    }
}

impl Flatten for Artist {
    fn flatten_into(&self, rows: &mut Vec<RowInsert>) {
        let id = self.id;
        rows.push(
            RowInsert::header(Relation::Artists, id)
                .set("name", &self.name)
                .set("real_name", &self.real_name)
                .set("data_quality", &self.data_quality)
                .set("profile", &self.profile)
                .set("status", &self.status),
        );

        for (ofst, variation) in positions(&self.name_variations) {
            rows.push(
                RowInsert::child(Relation::ArtistNameVariations, id, ofst)
                    .set("namevariation", variation),
            );
        }

        artist_refs(rows, Relation::ArtistAliases, id, &self.aliases);
        artist_refs(rows, Relation::ArtistGroups, id, &self.groups);
        artist_refs(rows, Relation::ArtistMembers, id, &self.members);

        for (ofst, url) in positions(&self.urls) {
            rows.push(RowInsert::child(Relation::ArtistUrls, id, ofst).set("url", url));
        }
    }
}

fn artist_refs(rows: &mut Vec<RowInsert>, relation: Relation, id: RecordId, refs: &[ArtistRef]) {
    for (ofst, other) in positions(refs) {
        rows.push(
            RowInsert::child(relation, id, ofst)
                .set("artist2_id", other.id)
                .set("name", &other.name),
        );
    }
}

impl Flatten for Release {
    fn flatten_into(&self, rows: &mut Vec<RowInsert>) {
        let id = self.id;
        rows.push(
            RowInsert::header(Relation::Releases, id)
                .set("title", &self.title)
                .set("country", &self.country)
                .set("notes", &self.notes)
                .set("released", &self.released)
                .set("status", &self.status)
                .set("data_quality", &self.data_quality)
                .set("master_id", self.master_id),
        );

        for (ofst, genre) in positions(&self.genres) {
            rows.push(RowInsert::child(Relation::ReleaseGenres, id, ofst).set("genre", genre));
        }

        for (ofst, style) in positions(&self.styles) {
            rows.push(RowInsert::child(Relation::ReleaseStyles, id, ofst).set("style", style));
        }

        for (ofst, credit) in positions(&self.artists) {
            rows.push(
                credit_columns(RowInsert::child(Relation::ReleaseArtistMaps, id, ofst), credit)
                    .set("tracks", &credit.tracks),
            );
        }

        for (ofst, credit) in positions(&self.extra_artists) {
            rows.push(
                credit_columns(RowInsert::child(Relation::ReleaseExtraArtistMaps, id, ofst), credit)
                    .set("tracks", &credit.tracks)
                    .set("role", &credit.role),
            );
        }

        for (ofst, format) in positions(&self.formats) {
            rows.push(
                RowInsert::child(Relation::ReleaseFormats, id, ofst)
                    .set("name", &format.name)
                    .set("qty", format.qty)
                    .set("text", &format.text),
            );
        }

        for (ofst, video) in positions(&self.videos) {
            rows.push(
                RowInsert::child(Relation::ReleaseVideos, id, ofst)
                    .set("src", &video.src)
                    .set("duration", video.duration)
                    .set("embed", video.embed)
                    .set("title", &video.title)
                    .set("description", &video.description),
            );
        }

        for (ofst, company) in positions(&self.companies) {
            rows.push(
                RowInsert::child(Relation::ReleaseCompanies, id, ofst)
                    .set("company_id", company.id)
                    .set("name", &company.name)
                    .set("catno", &company.catno)
                    .set("entity_type", company.entity_type)
                    .set("entity_type_name", &company.entity_type_name),
            );
        }

        for (ofst, label) in positions(&self.labels) {
            rows.push(
                RowInsert::child(Relation::ReleaseLabels, id, ofst)
                    .set("label_id", label.id)
                    .set("name", &label.name)
                    .set("catno", &label.catno),
            );
        }

        for (track_ofst, track) in positions(&self.tracks) {
            rows.push(
                RowInsert::child(Relation::Tracks, id, track_ofst)
                    .set("title", &track.title)
                    .set("duration", &track.duration)
                    .set("position", &track.position),
            );

            for (artist_ofst, credit) in positions(&track.artists) {
                let row = RowInsert::track_child(Relation::TrackArtistMaps, id, track_ofst, artist_ofst);
                rows.push(credit_columns(row, credit));
            }

            for (artist_ofst, credit) in positions(&track.extra_artists) {
                let row =
                    RowInsert::track_child(Relation::TrackExtraArtistMaps, id, track_ofst, artist_ofst);
                rows.push(credit_columns(row, credit).set("role", &credit.role));
            }
        }
    }
}

fn credit_columns(row: RowInsert, credit: &ArtistCredit) -> RowInsert {
    row.set("artist_id", credit.id)
        .set("name", &credit.name)
        .set("anv", &credit.anv)
        .set("join_relation", &credit.join)
}

impl Flatten for Master {
    fn flatten_into(&self, rows: &mut Vec<RowInsert>) {
        rows.push(RowInsert::header(Relation::Masters, self.id).set("main_release_id", self.main_release));
    }
}

impl Flatten for Label {
    fn flatten_into(&self, rows: &mut Vec<RowInsert>) {
        let id = self.id;
        rows.push(
            RowInsert::header(Relation::Labels, id)
                .set("name", &self.name)
                .set("contact_info", &self.contact_info)
                .set("profile", &self.profile)
                .set("data_quality", &self.data_quality),
        );

        for (ofst, sub) in positions(&self.sub_labels) {
            rows.push(
                RowInsert::child(Relation::LabelSublabels, id, ofst)
                    .set("label2_id", sub.id)
                    .set("name", &sub.name),
            );
        }

        for (ofst, url) in positions(&self.urls) {
            rows.push(RowInsert::child(Relation::LabelUrls, id, ofst).set("url", url));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dump::{LabelRef, Track};
    use std::collections::HashMap;

    fn ordinals(rows: &[RowInsert], relation: Relation) -> Vec<Ordinal> {
        rows.iter()
            .filter(|r| r.relation == relation)
            .map(|r| r.key.ordinal.unwrap())
            .collect()
    }

    fn credit(id: RecordId) -> ArtistCredit {
        ArtistCredit {
            id: Some(id),
            name: Some(format!("Artist {id}")),
            ..Default::default()
        }
    }

    #[test]
    fn test_ordinal_continuity() {
        for n in [0usize, 1, 5] {
            let artist = Artist {
                id: 1,
                urls: (0..n).map(|i| format!("https://example.com/{i}")).collect(),
                ..Default::default()
            };
            let rows = artist.flatten();
            let expected: Vec<Ordinal> = (0..n as Ordinal).collect();
            assert_eq!(ordinals(&rows, Relation::ArtistUrls), expected);
        }
    }

    #[test]
    fn test_duplicates_get_distinct_ordinals() {
        let artist = Artist {
            id: 3,
            name_variations: vec!["Same".into(), "Same".into()],
            ..Default::default()
        };
        let rows = artist.flatten();
        assert_eq!(ordinals(&rows, Relation::ArtistNameVariations), vec![0, 1]);
    }

    #[test]
    fn test_header_first() {
        let release = Release {
            id: 9,
            genres: vec!["Rock".into()],
            tracks: vec![Track::default()],
            ..Default::default()
        };
        let rows = release.flatten();
        assert_eq!(rows[0].relation, Relation::Releases);
        assert!(rows[1..].iter().all(|r| !r.relation.is_header()));
        assert_eq!(rows[0].value("id"), Some(&Value::BigInt(Some(9))));
    }

    #[test]
    fn test_track_children_carry_compound_keys() {
        let release = Release {
            id: 42,
            tracks: vec![
                Track {
                    artists: vec![credit(1), credit(2)],
                    ..Default::default()
                },
                Track {
                    artists: vec![credit(3)],
                    extra_artists: vec![ArtistCredit {
                        role: Some("Mixed By".into()),
                        ..credit(4)
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let rows = release.flatten();
        let keys: Vec<(Relation, Option<Ordinal>, Option<Ordinal>)> = rows
            .iter()
            .map(|r| (r.relation, r.key.ordinal, r.key.sub_ordinal))
            .collect();

        assert_eq!(
            keys,
            vec![
                (Relation::Releases, None, None),
                (Relation::Tracks, Some(0), None),
                (Relation::TrackArtistMaps, Some(0), Some(0)),
                (Relation::TrackArtistMaps, Some(0), Some(1)),
                (Relation::Tracks, Some(1), None),
                (Relation::TrackArtistMaps, Some(1), Some(0)),
                (Relation::TrackExtraArtistMaps, Some(1), Some(0)),
            ]
        );

        let extra = rows.last().unwrap();
        assert_eq!(extra.value("release_id"), Some(&Value::BigInt(Some(42))));
        assert_eq!(extra.value("track_ofst"), Some(&Value::Int(Some(1))));
        assert_eq!(extra.value("artist_ofst"), Some(&Value::Int(Some(0))));
        assert_eq!(extra.value("role"), Some(&Value::Text(Some("Mixed By".into()))));
        assert!(extra.value("ofst").is_none());
    }

    #[test]
    fn test_rows_of_a_relation_share_columns() {
        let release = Release {
            id: 1,
            artists: vec![credit(1), ArtistCredit::default()],
            videos: vec![Default::default(), Default::default()],
            ..Default::default()
        };
        let rows = release.flatten();

        let mut columns: HashMap<Relation, Vec<&'static str>> = HashMap::new();
        for row in &rows {
            let names: Vec<_> = row.column_names().collect();
            let seen = columns.entry(row.relation).or_insert_with(|| names.clone());
            assert_eq!(*seen, names, "{}", row.relation);
        }
    }

    #[test]
    fn test_absent_fields_become_nulls() {
        let master = Master { id: 7, main_release: None };
        let rows = master.flatten();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].value("main_release_id").unwrap().is_null());

        let artist = Artist {
            id: 1,
            profile: Some(String::new()),
            ..Default::default()
        };
        let header = &artist.flatten()[0];
        assert_eq!(header.value("profile"), Some(&Value::Text(Some(String::new()))));
        assert_eq!(header.value("real_name"), Some(&Value::Text(None)));
    }

    #[test]
    fn test_label_rows() {
        let label = Label {
            id: 5,
            name: Some("Acme".into()),
            sub_labels: vec![
                LabelRef { id: Some(6), name: Some("Acme Jazz".into()) },
                LabelRef { id: Some(7), name: Some("Acme Pop".into()) },
            ],
            urls: vec!["https://acme.example".into()],
            ..Default::default()
        };
        let rows = label.flatten();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].relation, Relation::Labels);
        assert_eq!(ordinals(&rows, Relation::LabelSublabels), vec![0, 1]);
        assert_eq!(ordinals(&rows, Relation::LabelUrls), vec![0]);
        assert_eq!(rows[2].value("label2_id"), Some(&Value::BigInt(Some(7))));
        assert_eq!(rows[3].value("label_id"), Some(&Value::BigInt(Some(5))));
    }

    #[test]
    fn test_ids_pass_through() {
        let artist = Artist {
            id: -1,
            aliases: vec![ArtistRef { id: Some(999_999_999_999), name: None }],
            ..Default::default()
        };
        let rows = artist.flatten();
        assert_eq!(rows[1].value("artist2_id"), Some(&Value::BigInt(Some(999_999_999_999))));
        assert_eq!(rows[1].key.to_string(), "artist_aliases[-1, 0]");
    }

    #[test]
    fn test_relation_names_are_unique() {
        let mut names: Vec<_> = Relation::ALL.iter().map(|r| r.table_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Relation::ALL.len());
    }
}
