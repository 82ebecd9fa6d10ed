use crate::core::error::PlaylistError;
use crate::core::types::Rendition;

// ---------------------------------------------------------------------------
// HLS playlist generation
// ---------------------------------------------------------------------------

/// Protocol version written into every playlist.
pub const HLS_VERSION: u32 = 3;

/// Nominal segment duration. A placeholder policy, segments are never probed.
pub const NOMINAL_SEGMENT_SECS: u32 = 10;

/// Codec string advertised for the retained rendition (H.264 baseline + AAC-LC).
pub const CODECS: &str = "avc1.42001e,mp4a.40.2";

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";

/// Generate a master playlist that offers exactly one rendition.
///
/// Format:
/// ```m3u8
/// #EXTM3U
/// #EXT-X-VERSION:3
/// #EXT-X-STREAM-INF:BANDWIDTH=600000,RESOLUTION=640x360,CODECS="avc1.42001e,mp4a.40.2"
/// 360p.m3u8
/// ```
pub fn synthesize_master(rendition: Rendition) -> String {
    let spec = rendition.spec();
    format!(
        "#EXTM3U\n#EXT-X-VERSION:{}\n{}BANDWIDTH={},RESOLUTION={}x{},CODECS=\"{}\"\n{}.m3u8\n",
        HLS_VERSION, STREAM_INF_TAG, spec.bandwidth, spec.width, spec.height, CODECS, rendition,
    )
}

/// Generate a VOD rendition playlist.
///
/// Segments are written in the order given, each as `<path_prefix><segment>`
/// with the nominal duration. Ordering is the caller's job; see
/// `segments::sort_numerically`.
pub fn synthesize_rendition<S: AsRef<str>>(segments: &[S], path_prefix: &str) -> String {
    let mut playlist = String::with_capacity(128 + segments.len() * 32);

    playlist.push_str("#EXTM3U\n");
    playlist.push_str(&format!("#EXT-X-VERSION:{}\n", HLS_VERSION));
    playlist.push_str(&format!("#EXT-X-TARGETDURATION:{}\n", NOMINAL_SEGMENT_SECS));
    playlist.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
    playlist.push_str("#EXT-X-PLAYLIST-TYPE:VOD\n");

    for segment in segments {
        playlist.push_str(&format!("#EXTINF:{}.0,\n", NOMINAL_SEGMENT_SECS));
        playlist.push_str(path_prefix);
        playlist.push_str(segment.as_ref());
        playlist.push('\n');
    }

    playlist.push_str("#EXT-X-ENDLIST\n");
    playlist
}

// ---------------------------------------------------------------------------
// Master playlist inspection
// ---------------------------------------------------------------------------

/// Renditions a master playlist points at, in file order.
///
/// Only `<rendition>.m3u8` URIs following a stream-info tag are recognised.
pub fn referenced_renditions(master: &str) -> Result<Vec<Rendition>, PlaylistError> {
    let mut lines = master.lines().map(str::trim).filter(|l| !l.is_empty());

    if lines.next() != Some("#EXTM3U") {
        return Err(PlaylistError::Malformed {
            reason: "missing #EXTM3U header".to_string(),
        });
    }

    let mut renditions = Vec::new();
    while let Some(line) = lines.next() {
        if !line.starts_with(STREAM_INF_TAG) {
            continue;
        }
        let uri = lines.next().ok_or_else(|| PlaylistError::Malformed {
            reason: "stream-info tag without a URI".to_string(),
        })?;
        let name = uri
            .strip_suffix(".m3u8")
            .ok_or_else(|| PlaylistError::Malformed {
                reason: format!("unexpected stream URI: {}", uri),
            })?;
        renditions.push(name.parse()?);
    }

    Ok(renditions)
}

/// The single rendition of a master playlist written by `synthesize_master`.
pub fn parse_master_rendition(master: &str) -> Result<Rendition, PlaylistError> {
    match referenced_renditions(master)?.as_slice() {
        [only] => Ok(*only),
        [] => Err(PlaylistError::Malformed {
            reason: "no stream-info entries".to_string(),
        }),
        many => Err(PlaylistError::Malformed {
            reason: format!("expected one stream-info entry, found {}", many.len()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_is_bit_exact() {
        assert_eq!(
            synthesize_master(Rendition::P360),
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=600000,RESOLUTION=640x360,CODECS=\"avc1.42001e,mp4a.40.2\"\n\
             360p.m3u8\n"
        );
    }

    #[test]
    fn test_master_table() {
        let cases = [
            (Rendition::P360, "BANDWIDTH=600000,RESOLUTION=640x360"),
            (Rendition::P480, "BANDWIDTH=800000,RESOLUTION=854x480"),
            (Rendition::P720, "BANDWIDTH=1200000,RESOLUTION=1280x720"),
            (Rendition::P1080, "BANDWIDTH=2000000,RESOLUTION=1920x1080"),
        ];
        for (rendition, attrs) in cases {
            let master = synthesize_master(rendition);
            assert!(master.contains(attrs), "{}: {}", rendition, master);
            assert_eq!(master.matches(STREAM_INF_TAG).count(), 1);
            assert!(master.ends_with(&format!("\n{}.m3u8\n", rendition)));
        }
    }

    #[test]
    fn test_master_parses_back_to_same_rendition() {
        for rendition in Rendition::ALL {
            let master = synthesize_master(rendition);
            assert_eq!(parse_master_rendition(&master).unwrap(), rendition);
        }
    }

    #[test]
    fn test_rendition_playlist_orders_segments_as_given() {
        let playlist = synthesize_rendition(&["0.ts", "1.ts", "2.ts"], "1080p/");
        assert_eq!(
            playlist,
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:10\n\
             #EXT-X-MEDIA-SEQUENCE:0\n\
             #EXT-X-PLAYLIST-TYPE:VOD\n\
             #EXTINF:10.0,\n1080p/0.ts\n\
             #EXTINF:10.0,\n1080p/1.ts\n\
             #EXTINF:10.0,\n1080p/2.ts\n\
             #EXT-X-ENDLIST\n"
        );
    }

    #[test]
    fn test_rendition_playlist_does_not_sort() {
        let playlist = synthesize_rendition(&["10.ts", "2.ts"], "");
        let ten = playlist.find("\n10.ts").unwrap();
        let two = playlist.find("\n2.ts").unwrap();
        assert!(ten < two);
    }

    #[test]
    fn test_empty_rendition_playlist() {
        let playlist = synthesize_rendition::<&str>(&[], "360p/");
        assert!(!playlist.contains("#EXTINF"));
        assert!(playlist.ends_with("#EXT-X-PLAYLIST-TYPE:VOD\n#EXT-X-ENDLIST\n"));
    }

    #[test]
    fn test_referenced_renditions_multi_entry_master() {
        let master = "#EXTM3U\n#EXT-X-VERSION:3\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1920x1080,CODECS=\"avc1.42001f,mp4a.40.2\"\n1080p.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=600000,RESOLUTION=640x360,CODECS=\"avc1.42001e,mp4a.40.2\"\n360p.m3u8\n";
        assert_eq!(
            referenced_renditions(master).unwrap(),
            vec![Rendition::P1080, Rendition::P360]
        );
        assert!(parse_master_rendition(master).is_err());
    }

    #[test]
    fn test_malformed_masters() {
        assert!(referenced_renditions("").is_err());
        assert!(referenced_renditions("#EXT-X-VERSION:3\n").is_err());
        assert!(
            referenced_renditions("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n").is_err()
        );
        assert!(matches!(
            referenced_renditions("#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n240p.m3u8\n"),
            Err(PlaylistError::UnknownRendition { .. })
        ));
    }
}
