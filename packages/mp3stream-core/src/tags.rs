use id3::{frame::Comment, TagLike, Version};

use crate::errors::Mp3WriteError;

/// * Size of an ID3v1 tag, always
pub const ID3V1_SIZE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Title,
    Artist,
    Album,
    Date,
    Comment,
    Genre,
    TrackNumber,
}

/// * The metadata written as an ID3v2 header at the start of the stream and as an ID3v1 trailer at the end of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub date: Option<String>,
    pub comment: Option<String>,
    pub genre: Option<String>,
    pub track: Option<String>,
}

impl StreamTags {
    pub fn set(&mut self, kind: TagKind, value: &str) {
        let value = Some(value.to_owned());
        match kind {
            TagKind::Title => self.title = value,
            TagKind::Artist => self.artist = value,
            TagKind::Album => self.album = value,
            TagKind::Date => self.date = value,
            TagKind::Comment => self.comment = value,
            TagKind::Genre => self.genre = value,
            TagKind::TrackNumber => self.track = value,
        }
    }

    pub fn get(&self, kind: TagKind) -> Option<&str> {
        match kind {
            TagKind::Title => self.title.as_deref(),
            TagKind::Artist => self.artist.as_deref(),
            TagKind::Album => self.album.as_deref(),
            TagKind::Date => self.date.as_deref(),
            TagKind::Comment => self.comment.as_deref(),
            TagKind::Genre => self.genre.as_deref(),
            TagKind::TrackNumber => self.track.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.date.is_none()
            && self.comment.is_none()
            && self.genre.is_none()
            && self.track.is_none()
    }

    /// * "3/12" and "3" are both track 3
    fn track_number(&self) -> Option<u32> {
        self.track
            .as_deref()
            .and_then(|track| track.split('/').next())
            .and_then(|track| track.trim().parse::<u32>().ok())
    }

    /// * Serializes the ID3v2.4 stream header, `None` if there are no tags at all.
    pub fn to_id3v2(&self) -> Result<Option<Vec<u8>>, Mp3WriteError> {
        if self.is_empty() {
            return Ok(None);
        }
        let mut tag = id3::Tag::new();
        if let Some(title) = &self.title {tag.set_title(title.as_str());}
        if let Some(artist) = &self.artist {tag.set_artist(artist.as_str());}
        if let Some(album) = &self.album {tag.set_album(album.as_str());}
        if let Some(genre) = &self.genre {tag.set_genre(genre.as_str());}
        if let Some(date) = &self.date {
            match date.trim().parse::<i32>() {
                Ok(year) => tag.set_year(year),
                Err(_) => tag.set_text("TDRC", date.as_str()),
            }
        }
        if let Some(track) = self.track_number() {
            tag.set_track(track);
        }
        if let Some(comment) = &self.comment {
            tag.add_frame(Comment {
                lang: "eng".to_owned(),
                description: String::new(),
                text: comment.clone(),
            });
        }
        let mut buffer = Vec::<u8>::new();
        tag.write_to(&mut buffer, Version::Id3v24)?;
        Ok(Some(buffer))
    }

    /// * Packs the 128-byte ID3v1.1 trailer, `None` if there are no tags at all.
    pub fn to_id3v1(&self) -> Option<[u8; ID3V1_SIZE]> {
        if self.is_empty() {
            return None;
        }
        let mut tag = [0u8; ID3V1_SIZE];
        tag[0..3].copy_from_slice(b"TAG");
        put_latin1(&mut tag[3..33], self.title.as_deref());
        put_latin1(&mut tag[33..63], self.artist.as_deref());
        put_latin1(&mut tag[63..93], self.album.as_deref());
        put_latin1(&mut tag[93..97], self.date.as_deref());
        put_latin1(&mut tag[97..125], self.comment.as_deref());
        tag[125] = 0;
        tag[126] = match self.track_number() {
            Some(track @ 1..=255) => track as u8,
            _ => 0,
        };
        tag[127] = self
            .genre
            .as_deref()
            .and_then(|genre| genre.trim().parse::<u8>().ok())
            .unwrap_or(255);
        Some(tag)
    }
}

fn put_latin1(field: &mut [u8], text: Option<&str>) {
    if let Some(text) = text {
        for (dst, ch) in field.iter_mut().zip(text.chars()) {
            *dst = match ch as u32 {
                c @ 1..=0xFF => c as u8,
                _ => b'?',
            };
        }
    }
}
