//! Best-effort parsing of release names into candidates.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::source::RawListing;

use super::types::{Candidate, Codec, EpisodeInfo, QualityTier};

/// Lowercase, turn everything but letters and digits into spaces, collapse
/// whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().collect::<String>()
            } else {
                " ".to_string()
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stable title id, e.g. `the-matrix-1999`.
pub fn slugify(title: &str, year: Option<u32>) -> String {
    let mut slug = normalize_title(title).replace(' ', "-");
    if slug.is_empty() {
        slug.push_str("untitled");
    }
    if let Some(year) = year {
        slug.push_str(&format!("-{}", year));
    }
    slug
}

// Season + episode, most specific first.
static EPISODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bS(\d{1,2}) ?E(\d{1,3})\b",
        r"(?i)\b(\d{1,2})x(\d{2,3})\b",
        r"(?i)\bSeason\s*(\d{1,2})\s*Episode\s*(\d{1,3})\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

// Whole-season releases.
static SEASON_PACK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bS(\d{1,2})\s*Complete\b",
        r"(?i)\bComplete\s*S(\d{1,2})\b",
        r"(?i)\bSeason\s*(\d{1,2})\b",
        r"(?i)\bS(\d{1,2})\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static YEAR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[(\[]?\b((?:19|20)\d{2})\b[)\]]?").ok());

// First release-tag token; the title never extends past it.
static RELEASE_TAG: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(2160p|1080p|720p|480p|uhd|hdtv|blu-?ray|brrip|bdrip|web-?dl|webrip|web|dvdrip|hdrip|x264|x265|h 26[45]|hevc|xvid|remux|proper|repack)\b",
    )
    .ok()
});

static LEADING_GROUP: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\s*\[[^\]]*\]").ok());

const QUALITY_TABLE: [(&str, QualityTier); 6] = [
    ("2160p", QualityTier::P2160),
    ("uhd", QualityTier::P2160),
    ("1080p", QualityTier::P1080),
    ("720p", QualityTier::P720),
    ("480p", QualityTier::P480),
    ("hdtv", QualityTier::Hdtv),
];

const CODEC_TABLE: [(&str, Codec); 9] = [
    ("x265", Codec::X265),
    ("hevc", Codec::X265),
    ("h265", Codec::X265),
    ("h.265", Codec::X265),
    ("x264", Codec::X264),
    ("h264", Codec::X264),
    ("h.264", Codec::X264),
    ("xvid", Codec::Xvid),
    ("divx", Codec::Xvid),
];

fn match_quality(text: &str) -> QualityTier {
    let lower = text.to_lowercase();
    QUALITY_TABLE
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, tier)| *tier)
        .unwrap_or(QualityTier::Unknown)
}

/// Quality from the source's tag when it names one, else from the name.
pub fn detect_quality(tag: Option<&str>, name: &str) -> QualityTier {
    match tag.map(match_quality) {
        Some(tier) if tier != QualityTier::Unknown => tier,
        _ => match_quality(name),
    }
}

pub fn detect_codec(name: &str) -> Codec {
    let lower = name.to_lowercase();
    CODEC_TABLE
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, codec)| *codec)
        .unwrap_or(Codec::Unknown)
}

/// Title, year and episode parsed from a release name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<u32>,
    pub episode: Option<EpisodeInfo>,
}

fn capture_u32(caps: &regex_lite::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

fn find_episode(text: &str) -> Option<(usize, EpisodeInfo)> {
    for re in EPISODE_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let start = caps.get(0).map(|m| m.start())?;
            let season = capture_u32(&caps, 1)?;
            let episode = capture_u32(&caps, 2)?;
            return Some((
                start,
                EpisodeInfo {
                    season,
                    episode: Some(episode),
                },
            ));
        }
    }
    for re in SEASON_PACK_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let start = caps.get(0).map(|m| m.start())?;
            let season = capture_u32(&caps, 1)?;
            return Some((
                start,
                EpisodeInfo {
                    season,
                    episode: None,
                },
            ));
        }
    }
    None
}

fn clean_title(raw: &str) -> String {
    let without_group = match LEADING_GROUP.as_ref() {
        Some(re) => re.replace(raw, "").into_owned(),
        None => raw.to_string(),
    };
    without_group
        .chars()
        .map(|c| if "[](){}".contains(c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c == ' ' || c == ':')
        .to_string()
}

/// Parse a release name. Returns `None` when neither a year nor an episode
/// marker could be found, or nothing title-like precedes them.
pub fn parse_title(display_name: &str) -> Option<ParsedTitle> {
    let text: String = display_name
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();

    let mut cut = text.len();
    let episode = find_episode(&text).map(|(start, info)| {
        cut = start;
        info
    });
    if let Some(m) = RELEASE_TAG.as_ref().and_then(|re| re.find(&text)) {
        cut = cut.min(m.start());
    }

    // The last year with title text before it, so "1917 2019" is titled 1917.
    let head = &text[..cut];
    let year_match = YEAR.as_ref().and_then(|re| {
        re.captures_iter(head)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let year = capture_u32(&caps, 1)?;
                (!clean_title(&head[..whole.start()]).is_empty()).then_some((whole.start(), year))
            })
            .last()
    });

    let (title_end, year) = match year_match {
        Some((start, year)) => (start, Some(year)),
        None => (cut, None),
    };

    if year.is_none() && episode.is_none() {
        return None;
    }

    let title = clean_title(&text[..title_end]);
    if title.is_empty() {
        return None;
    }

    Some(ParsedTitle {
        title,
        year,
        episode,
    })
}

/// Derive a candidate from a raw listing. Unparseable names are kept and
/// flagged, with the display name standing in as the title.
pub fn parse_listing(raw: RawListing) -> Candidate {
    let parsed = parse_title(&raw.display_name);
    let quality = detect_quality(raw.quality_tag.as_deref(), &raw.display_name);
    let codec = detect_codec(&raw.display_name);

    let (canonical_title, year, episode, title_parsed) = match parsed {
        Some(p) => (p.title, p.year, p.episode, true),
        None => (raw.display_name.trim().to_string(), None, None, false),
    };

    Candidate {
        canonical_title,
        year,
        quality,
        codec,
        episode,
        source_id: raw.source_id,
        link: raw.link,
        display_name: raw.display_name,
        size_bytes: raw.size_bytes,
        seeders: raw.seeders,
        leechers: raw.leechers,
        uploaded_at: raw.uploaded_at,
        title_parsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str) -> RawListing {
        RawListing {
            source_id: "test".to_string(),
            link: "magnet:?xt=urn:btih:abc".to_string(),
            display_name: name.to_string(),
            size_bytes: 0,
            seeders: 1,
            leechers: 0,
            uploaded_at: None,
            quality_tag: None,
            info_hash: None,
        }
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("The  Matrix!"), "the matrix");
        assert_eq!(normalize_title("  Spider-Man: No Way Home "), "spider man no way home");
        assert_eq!(normalize_title("Amélie"), "amélie");
        assert_eq!(normalize_title("!!!"), "");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Matrix", Some(1999)), "the-matrix-1999");
        assert_eq!(slugify("Severance", None), "severance");
        assert_eq!(slugify("???", Some(2000)), "untitled-2000");
    }

    #[test]
    fn test_parse_scene_movie_name() {
        let parsed = parse_title("The.Matrix.1999.1080p.BluRay.x264-GROUP").unwrap();
        assert_eq!(parsed.title, "The Matrix");
        assert_eq!(parsed.year, Some(1999));
        assert!(parsed.episode.is_none());
    }

    #[test]
    fn test_parse_yts_style_name() {
        let parsed = parse_title("The Matrix (1999) [1080p] [bluray] [x264]").unwrap();
        assert_eq!(parsed.title, "The Matrix");
        assert_eq!(parsed.year, Some(1999));
    }

    #[test]
    fn test_parse_numeric_titles() {
        let parsed = parse_title("1917.2019.1080p.WEB-DL").unwrap();
        assert_eq!(parsed.title, "1917");
        assert_eq!(parsed.year, Some(2019));

        let parsed = parse_title("Blade.Runner.2049.2017.2160p.UHD").unwrap();
        assert_eq!(parsed.title, "Blade Runner 2049");
        assert_eq!(parsed.year, Some(2017));

        let parsed = parse_title("2001.A.Space.Odyssey.1968.720p").unwrap();
        assert_eq!(parsed.title, "2001 A Space Odyssey");
        assert_eq!(parsed.year, Some(1968));
    }

    #[test]
    fn test_parse_episodes() {
        let parsed = parse_title("Severance.S01E03.1080p.WEB.H264-GLHF").unwrap();
        assert_eq!(parsed.title, "Severance");
        assert_eq!(
            parsed.episode,
            Some(EpisodeInfo {
                season: 1,
                episode: Some(3)
            })
        );

        let parsed = parse_title("The Office 2x05 HDTV").unwrap();
        assert_eq!(parsed.title, "The Office");
        assert_eq!(parsed.episode.unwrap().episode, Some(5));

        let parsed = parse_title("Dark Season 2 Episode 4 720p").unwrap();
        assert_eq!(parsed.title, "Dark");
        assert_eq!(parsed.episode.unwrap().season, 2);
    }

    #[test]
    fn test_parse_season_packs() {
        for name in [
            "Severance Season 1 Complete 720p",
            "Severance S01 Complete 1080p",
            "Severance Complete S01 x265",
            "Severance.S01.1080p.WEB",
        ] {
            let parsed = parse_title(name).unwrap();
            assert_eq!(parsed.title, "Severance", "{}", name);
            assert_eq!(
                parsed.episode,
                Some(EpisodeInfo {
                    season: 1,
                    episode: None
                }),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_parse_strips_leading_group_tag() {
        let parsed = parse_title("[YTS.MX] Alien 1979 1080p").unwrap();
        assert_eq!(parsed.title, "Alien");
        assert_eq!(parsed.year, Some(1979));
    }

    #[test]
    fn test_parse_failure() {
        assert!(parse_title("Some Random Upload 1080p").is_none());
        assert!(parse_title("1999").is_none());
        assert!(parse_title("").is_none());
    }

    #[test]
    fn test_detect_quality() {
        assert_eq!(detect_quality(Some("2160p"), "x"), QualityTier::P2160);
        assert_eq!(detect_quality(Some("3D"), "Movie 720p"), QualityTier::P720);
        assert_eq!(detect_quality(None, "Show S01E01 HDTV XviD"), QualityTier::Hdtv);
        assert_eq!(detect_quality(None, "Movie 4K UHD"), QualityTier::P2160);
        assert_eq!(detect_quality(None, "Movie DVDRip"), QualityTier::Unknown);
    }

    #[test]
    fn test_detect_codec() {
        assert_eq!(detect_codec("Movie.2020.1080p.x265"), Codec::X265);
        assert_eq!(detect_codec("Movie 2020 HEVC"), Codec::X265);
        assert_eq!(detect_codec("Movie.2020.H.264"), Codec::X264);
        assert_eq!(detect_codec("Movie XviD"), Codec::Xvid);
        assert_eq!(detect_codec("Movie"), Codec::Unknown);
    }

    #[test]
    fn test_parse_listing_flags_unparsed_titles() {
        let candidate = parse_listing(raw("Some Random Upload 1080p"));
        assert!(!candidate.title_parsed);
        assert_eq!(candidate.canonical_title, "Some Random Upload 1080p");
        assert_eq!(candidate.quality, QualityTier::P1080);

        let candidate = parse_listing(raw("Alien.1979.720p.BluRay.x264"));
        assert!(candidate.title_parsed);
        assert_eq!(candidate.canonical_title, "Alien");
        assert_eq!(candidate.year, Some(1979));
        assert_eq!(candidate.quality, QualityTier::P720);
        assert_eq!(candidate.codec, Codec::X264);
        assert_eq!(candidate.source_id, "test");
    }
}
