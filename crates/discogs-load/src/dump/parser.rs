//! Per-kind record decoders
//!
//! Each decoder is handed the record's opening element and walks its
//! children with the cursor until the record closes. Elements a decoder does
//! not know are skipped whole.

use std::io::BufRead;

use super::cursor::{push_bounded, Element, XmlCursor};
use super::error::{DecodeError, Result};
use super::models::{
    Artist, ArtistCredit, ArtistRef, Company, Format, Label, LabelCredit, LabelRef, Master,
    RecordId, Release, Track, Video,
};
use super::EntityKind;

/// A top-level record type that can be decoded from its dump element
pub trait DumpRecord: Sized {
    const KIND: EntityKind;

    /// Decode one record from its opening `element` through its closing tag
    fn decode<R: BufRead>(cursor: &mut XmlCursor<R>, element: &Element) -> Result<Self>;

    /// Identifier used in log lines and error reports
    fn record_id(&self) -> RecordId;
}

impl DumpRecord for Artist {
    const KIND: EntityKind = EntityKind::Artist;

    fn decode<R: BufRead>(cursor: &mut XmlCursor<R>, element: &Element) -> Result<Self> {
        let mut id = None;
        let mut artist = Artist {
            status: element.attr_string("status"),
            ..Default::default()
        };

        while let Some(child) = cursor.next_child(element)? {
            match child.name.as_str() {
                "id" => id = cursor.number(&child)?,
                "name" => artist.name = Some(cursor.text(&child)?),
                "realname" => artist.real_name = Some(cursor.text(&child)?),
                "profile" => artist.profile = Some(cursor.text(&child)?),
                "data_quality" => artist.data_quality = Some(cursor.text(&child)?),
                "status" => artist.status = Some(cursor.text(&child)?),
                "namevariations" => artist.name_variations = cursor.text_list(&child, "name")?,
                "aliases" => artist.aliases = artist_refs(cursor, &child)?,
                "groups" => artist.groups = artist_refs(cursor, &child)?,
                "members" => artist.members = artist_refs(cursor, &child)?,
                "urls" => artist.urls = cursor.text_list(&child, "url")?,
                _ => cursor.skip(&child)?,
            }
        }

        artist.id = require(id, Self::KIND, element, "id")?;
        Ok(artist)
    }

    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl DumpRecord for Release {
    const KIND: EntityKind = EntityKind::Release;

    fn decode<R: BufRead>(cursor: &mut XmlCursor<R>, element: &Element) -> Result<Self> {
        let mut release = Release {
            id: require(element.attr_number("id")?, Self::KIND, element, "id")?,
            status: element.attr_string("status"),
            ..Default::default()
        };

        while let Some(child) = cursor.next_child(element)? {
            match child.name.as_str() {
                "title" => release.title = Some(cursor.text(&child)?),
                "country" => release.country = Some(cursor.text(&child)?),
                "notes" => release.notes = Some(cursor.text(&child)?),
                "released" => release.released = Some(cursor.text(&child)?),
                "data_quality" => release.data_quality = Some(cursor.text(&child)?),
                "master_id" => release.master_id = cursor.number(&child)?,
                "genres" => release.genres = cursor.text_list(&child, "genre")?,
                "styles" => release.styles = cursor.text_list(&child, "style")?,
                "artists" => release.artists = credits(cursor, &child)?,
                "extraartists" => release.extra_artists = credits(cursor, &child)?,
                "formats" => release.formats = formats(cursor, &child)?,
                "videos" => release.videos = videos(cursor, &child)?,
                "companies" => release.companies = companies(cursor, &child)?,
                "labels" => release.labels = label_credits(cursor, &child)?,
                "tracklist" => release.tracks = tracks(cursor, &child)?,
                _ => cursor.skip(&child)?,
            }
        }

        Ok(release)
    }

    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl DumpRecord for Master {
    const KIND: EntityKind = EntityKind::Master;

    fn decode<R: BufRead>(cursor: &mut XmlCursor<R>, element: &Element) -> Result<Self> {
        let mut master = Master {
            id: require(element.attr_number("id")?, Self::KIND, element, "id")?,
            main_release: None,
        };

        while let Some(child) = cursor.next_child(element)? {
            match child.name.as_str() {
                "main_release" => master.main_release = cursor.number(&child)?,
                _ => cursor.skip(&child)?,
            }
        }

        Ok(master)
    }

    fn record_id(&self) -> RecordId {
        self.id
    }
}

impl DumpRecord for Label {
    const KIND: EntityKind = EntityKind::Label;

    fn decode<R: BufRead>(cursor: &mut XmlCursor<R>, element: &Element) -> Result<Self> {
        let mut id = None;
        let mut label = Label::default();

        while let Some(child) = cursor.next_child(element)? {
            match child.name.as_str() {
                "id" => id = cursor.number(&child)?,
                "name" => label.name = Some(cursor.text(&child)?),
                "contactinfo" => label.contact_info = Some(cursor.text(&child)?),
                "profile" => label.profile = Some(cursor.text(&child)?),
                "data_quality" => label.data_quality = Some(cursor.text(&child)?),
                "urls" => label.urls = cursor.text_list(&child, "url")?,
                "sublabels" => label.sub_labels = label_refs(cursor, &child)?,
                _ => cursor.skip(&child)?,
            }
        }

        label.id = require(id, Self::KIND, element, "id")?;
        Ok(label)
    }

    fn record_id(&self) -> RecordId {
        self.id
    }
}

fn require(
    value: Option<RecordId>,
    kind: EntityKind,
    record: &Element,
    field: &'static str,
) -> Result<RecordId> {
    value.ok_or_else(|| DecodeError::MissingField {
        record: kind.record_element(),
        field,
        offset: record.offset,
    })
}

/// Collect the `<item>` children of `list`, decoding each with `decode`
fn collect<R, T, F>(cursor: &mut XmlCursor<R>, list: &Element, item: &str, mut decode: F) -> Result<Vec<T>>
where
    R: BufRead,
    F: FnMut(&mut XmlCursor<R>, &Element) -> Result<T>,
{
    let mut items = Vec::new();
    while let Some(child) = cursor.next_child(list)? {
        if child.name == item {
            let value = decode(cursor, &child)?;
            push_bounded(&mut items, value, list)?;
        } else {
            cursor.skip(&child)?;
        }
    }
    Ok(items)
}

/// `<name id="...">Display Name</name>` entries (aliases, groups, members)
///
/// Older member lists interleave bare `<id>` siblings; those are skipped
/// since the id is also carried on the `name` element.
fn artist_refs<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<ArtistRef>> {
    collect(cursor, list, "name", |cursor, name| {
        Ok(ArtistRef {
            id: name.attr_number("id")?,
            name: Some(cursor.text(name)?),
        })
    })
}

fn label_refs<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<LabelRef>> {
    collect(cursor, list, "label", |cursor, label| {
        Ok(LabelRef {
            id: label.attr_number("id")?,
            name: Some(cursor.text(label)?),
        })
    })
}

fn credits<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<ArtistCredit>> {
    collect(cursor, list, "artist", |cursor, artist| {
        let mut credit = ArtistCredit::default();
        while let Some(field) = cursor.next_child(artist)? {
            match field.name.as_str() {
                "id" => credit.id = cursor.number(&field)?,
                "name" => credit.name = Some(cursor.text(&field)?),
                "anv" => credit.anv = Some(cursor.text(&field)?),
                "join" => credit.join = Some(cursor.text(&field)?),
                "role" => credit.role = Some(cursor.text(&field)?),
                "tracks" => credit.tracks = Some(cursor.text(&field)?),
                _ => cursor.skip(&field)?,
            }
        }
        Ok(credit)
    })
}

fn formats<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<Format>> {
    collect(cursor, list, "format", |cursor, format| {
        let decoded = Format {
            name: format.attr_string("name"),
            qty: format.attr_number("qty")?,
            text: format.attr_string("text"),
        };
        // <descriptions> are not stored
        cursor.skip(format)?;
        Ok(decoded)
    })
}

fn videos<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<Video>> {
    collect(cursor, list, "video", |cursor, video| {
        let mut decoded = Video {
            src: video.attr_string("src"),
            duration: video.attr_number("duration")?,
            embed: video.attr_bool("embed")?,
            ..Default::default()
        };
        while let Some(field) = cursor.next_child(video)? {
            match field.name.as_str() {
                "title" => decoded.title = Some(cursor.text(&field)?),
                "description" => decoded.description = Some(cursor.text(&field)?),
                _ => cursor.skip(&field)?,
            }
        }
        Ok(decoded)
    })
}

fn companies<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<Company>> {
    collect(cursor, list, "company", |cursor, company| {
        let mut decoded = Company::default();
        while let Some(field) = cursor.next_child(company)? {
            match field.name.as_str() {
                "id" => decoded.id = cursor.number(&field)?,
                "name" => decoded.name = Some(cursor.text(&field)?),
                "catno" => decoded.catno = Some(cursor.text(&field)?),
                "entity_type" => decoded.entity_type = cursor.number(&field)?,
                "entity_type_name" => decoded.entity_type_name = Some(cursor.text(&field)?),
                _ => cursor.skip(&field)?,
            }
        }
        Ok(decoded)
    })
}

fn label_credits<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<LabelCredit>> {
    collect(cursor, list, "label", |cursor, label| {
        let decoded = LabelCredit {
            id: label.attr_number("id")?,
            name: label.attr_string("name"),
            catno: label.attr_string("catno"),
        };
        cursor.skip(label)?;
        Ok(decoded)
    })
}

fn tracks<R: BufRead>(cursor: &mut XmlCursor<R>, list: &Element) -> Result<Vec<Track>> {
    collect(cursor, list, "track", |cursor, track| {
        let mut decoded = Track::default();
        while let Some(field) = cursor.next_child(track)? {
            match field.name.as_str() {
                "position" => decoded.position = Some(cursor.text(&field)?),
                "title" => decoded.title = Some(cursor.text(&field)?),
                "duration" => decoded.duration = Some(cursor.text(&field)?),
                "artists" => decoded.artists = credits(cursor, &field)?,
                "extraartists" => decoded.extra_artists = credits(cursor, &field)?,
                // sub_tracks of index tracks are not part of the tracklist
                _ => cursor.skip(&field)?,
            }
        }
        Ok(decoded)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dump::{read_artists, read_labels, read_masters, read_releases};

    #[test]
    fn test_decode_artist() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<artists>
  <artist>
    <images><image height="600" type="primary" uri="" width="600"/></images>
    <id>1</id>
    <name>The Persuader</name>
    <realname>Jesper Dahlb&#228;ck</realname>
    <profile></profile>
    <data_quality>Needs Vote</data_quality>
    <urls><url>https://example.com/a</url><url>https://example.com/b</url></urls>
    <namevariations><name>Persuader</name><name>The Presuader</name></namevariations>
    <aliases><name id="239">Dick Track</name><name id="16055">Groove Machine</name></aliases>
    <members><id>26</id><name id="26">Alexi Delano</name></members>
  </artist>
</artists>"#;

        let artists: Vec<Artist> = read_artists(xml.as_bytes()).collect::<Result<_>>().unwrap();
        assert_eq!(artists.len(), 1);

        let artist = &artists[0];
        assert_eq!(artist.id, 1);
        assert_eq!(artist.name.as_deref(), Some("The Persuader"));
        assert_eq!(artist.real_name.as_deref(), Some("Jesper Dahlbäck"));
        assert_eq!(artist.profile.as_deref(), Some(""));
        assert_eq!(artist.status, None);
        assert_eq!(artist.name_variations, vec!["Persuader", "The Presuader"]);
        assert_eq!(artist.aliases.len(), 2);
        assert_eq!(artist.aliases[1].id, Some(16055));
        assert_eq!(artist.aliases[1].name.as_deref(), Some("Groove Machine"));
        assert_eq!(artist.members, vec![ArtistRef { id: Some(26), name: Some("Alexi Delano".into()) }]);
        assert!(artist.groups.is_empty());
        assert_eq!(artist.urls.len(), 2);
    }

    #[test]
    fn test_decode_release() {
        let xml = r#"<releases>
<release id="1" status="Accepted">
  <artists><artist><id>1</id><name>The Persuader</name><anv/><join/><role/><tracks/></artist></artists>
  <title>Stockholm</title>
  <labels><label name="Svek" catno="SK032" id="5"/></labels>
  <extraartists><artist><id>239</id><name>Jesper Dahlback</name><anv/><join/><role>Music By [All Tracks By]</role><tracks/></artist></extraartists>
  <formats><format name="Vinyl" qty="2" text=""><descriptions><description>12"</description></descriptions></format></formats>
  <genres><genre>Electronic</genre></genres>
  <styles><style>Deep House</style></styles>
  <country>Sweden</country>
  <released>1999-03-00</released>
  <notes>The song titles are the names of Stockholm's districts.</notes>
  <data_quality>Needs Vote</data_quality>
  <master_id is_main_release="true">5427</master_id>
  <tracklist>
    <track><position>A</position><title>&#214;stermalm</title><duration>4:45</duration></track>
    <track><position>B1</position><title>Vasastaden</title><duration>6:11</duration>
      <artists><artist><id>7</id><name>X</name></artist><artist><id>8</id><name>Y</name></artist></artists>
    </track>
  </tracklist>
  <identifiers><identifier type="Matrix / Runout" value="MPO SK 032 A1"/></identifiers>
  <videos><video src="https://www.youtube.com/watch?v=5rA8CTKKEP4" duration="290" embed="true"><title>The Persuader - Vasastaden</title><description>Vasastaden</description></video></videos>
  <companies><company><id>271046</id><name>The Globe Studios</name><catno/><entity_type>23</entity_type><entity_type_name>Recorded At</entity_type_name><resource_url>https://api.discogs.com/labels/271046</resource_url></company></companies>
</release>
</releases>"#;

        let releases: Vec<Release> = read_releases(xml.as_bytes()).collect::<Result<_>>().unwrap();
        let release = &releases[0];

        assert_eq!(release.id, 1);
        assert_eq!(release.status.as_deref(), Some("Accepted"));
        assert_eq!(release.title.as_deref(), Some("Stockholm"));
        assert_eq!(release.master_id, Some(5427));
        assert_eq!(release.artists[0].anv.as_deref(), Some(""));
        assert_eq!(release.extra_artists[0].role.as_deref(), Some("Music By [All Tracks By]"));
        assert_eq!(
            release.formats,
            vec![Format { name: Some("Vinyl".into()), qty: Some(2), text: Some(String::new()) }]
        );
        assert_eq!(release.labels[0].id, Some(5));
        assert_eq!(release.labels[0].catno.as_deref(), Some("SK032"));
        assert_eq!(release.videos[0].duration, Some(290));
        assert_eq!(release.videos[0].embed, Some(true));
        assert_eq!(release.videos[0].description.as_deref(), Some("Vasastaden"));
        assert_eq!(release.companies[0].entity_type, Some(23));
        assert_eq!(release.companies[0].catno.as_deref(), Some(""));
        assert_eq!(release.tracks.len(), 2);
        assert_eq!(release.tracks[0].title.as_deref(), Some("Östermalm"));
        assert!(release.tracks[0].artists.is_empty());
        assert_eq!(release.tracks[1].artists.len(), 2);
        assert_eq!(release.tracks[1].artists[1].id, Some(8));
    }

    #[test]
    fn test_decode_master_ignores_other_fields() {
        let xml = r#"<masters><master id="18500"><main_release>155102</main_release>
            <images/><artists><artist><id>212070</id><name>Samuel L Session</name></artist></artists>
            <genres><genre>Electronic</genre></genres><title>New Soil</title><year>2001</year>
            </master><master id="18501"></master></masters>"#;

        let masters: Vec<Master> = read_masters(xml.as_bytes()).collect::<Result<_>>().unwrap();
        assert_eq!(
            masters,
            vec![
                Master { id: 18500, main_release: Some(155102) },
                Master { id: 18501, main_release: None },
            ]
        );
    }

    #[test]
    fn test_decode_label() {
        let xml = r#"<labels><label>
            <images/>
            <id>1</id><name>Planet E</name><contactinfo>Planet E Communications</contactinfo>
            <profile>Classic Detroit label</profile><data_quality>Correct</data_quality>
            <parentLabel id="9">Parent</parentLabel>
            <urls><url>http://planet-e.net</url></urls>
            <sublabels><label id="86537">Antidote (4)</label><label id="41841">Community Projects</label></sublabels>
            </label></labels>"#;

        let labels: Vec<Label> = read_labels(xml.as_bytes()).collect::<Result<_>>().unwrap();
        let label = &labels[0];
        assert_eq!(label.id, 1);
        assert_eq!(label.contact_info.as_deref(), Some("Planet E Communications"));
        assert_eq!(label.urls, vec!["http://planet-e.net"]);
        assert_eq!(label.sub_labels.len(), 2);
        assert_eq!(label.sub_labels[0].id, Some(86537));
        assert_eq!(label.sub_labels[1].name.as_deref(), Some("Community Projects"));
    }

    #[test]
    fn test_absent_and_empty_optional_fields_differ() {
        let xml = "<artists>\
            <artist><id>1</id><name>A</name></artist>\
            <artist><id>2</id><name>B</name><realname></realname></artist>\
            </artists>";

        let artists: Vec<Artist> = read_artists(xml.as_bytes()).collect::<Result<_>>().unwrap();
        assert_eq!(artists[0].real_name, None);
        assert_eq!(artists[1].real_name, Some(String::new()));
        assert_ne!(artists[0].real_name, artists[1].real_name);
    }

    #[test]
    fn test_missing_id_is_error() {
        let xml = "<labels><label><name>No Id</name></label></labels>";
        let err = read_labels(xml.as_bytes()).next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField { record: "label", field: "id", .. }
        ));
    }

    #[test]
    fn test_id_overflow_is_error() {
        let xml = r#"<masters><master id="9223372036854775808"/></masters>"#;
        let err = read_masters(xml.as_bytes()).next().unwrap().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidNumber { .. }));
    }

    #[test]
    fn test_video_duration_overflow_is_error() {
        let xml = r#"<releases><release id="3"><videos><video duration="4294967296"/></videos></release></releases>"#;
        let err = read_releases(xml.as_bytes()).next().unwrap().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidNumber { ref field, .. } if field == "video@duration"));
    }
}
