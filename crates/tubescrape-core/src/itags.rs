//! Known itag profiles
//!
//! Format records do not always carry resolution or audio bitrate, so the
//! well-known itags are mapped to their encoding profile here.

/// Static description of an itag's encoding profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItagProfile {
    pub resolution: Option<&'static str>,
    pub abr: Option<&'static str>,
    pub fps: Option<u32>,
    pub is_3d: bool,
    pub is_hdr: bool,
    pub is_live: bool,
}

// (itag, resolution, abr)
const PROGRESSIVE_VIDEO: &[(u32, Option<&str>, Option<&str>)] = &[
    (5, Some("240p"), Some("64kbps")),
    (6, Some("270p"), Some("64kbps")),
    (13, Some("144p"), None),
    (17, Some("144p"), Some("24kbps")),
    (18, Some("360p"), Some("96kbps")),
    (22, Some("720p"), Some("192kbps")),
    (34, Some("360p"), Some("128kbps")),
    (35, Some("480p"), Some("128kbps")),
    (36, Some("240p"), None),
    (37, Some("1080p"), Some("192kbps")),
    (38, Some("3072p"), Some("192kbps")),
    (43, Some("360p"), Some("128kbps")),
    (44, Some("480p"), Some("128kbps")),
    (45, Some("720p"), Some("192kbps")),
    (46, Some("1080p"), Some("192kbps")),
    (59, Some("480p"), Some("128kbps")),
    (78, Some("480p"), Some("128kbps")),
    (82, Some("360p"), Some("128kbps")),
    (83, Some("480p"), Some("128kbps")),
    (84, Some("720p"), Some("192kbps")),
    (85, Some("1080p"), Some("192kbps")),
    (91, Some("144p"), Some("48kbps")),
    (92, Some("240p"), Some("48kbps")),
    (93, Some("360p"), Some("128kbps")),
    (94, Some("480p"), Some("128kbps")),
    (95, Some("720p"), Some("256kbps")),
    (96, Some("1080p"), Some("256kbps")),
    (100, Some("360p"), Some("128kbps")),
    (101, Some("480p"), Some("192kbps")),
    (102, Some("720p"), Some("192kbps")),
    (132, Some("240p"), Some("48kbps")),
    (151, Some("720p"), Some("24kbps")),
];

const DASH_VIDEO: &[(u32, &str)] = &[
    (133, "240p"),
    (134, "360p"),
    (135, "480p"),
    (136, "720p"),
    (137, "1080p"),
    (138, "2160p"),
    (160, "144p"),
    (167, "360p"),
    (168, "480p"),
    (169, "720p"),
    (170, "1080p"),
    (212, "480p"),
    (218, "480p"),
    (219, "480p"),
    (242, "240p"),
    (243, "360p"),
    (244, "480p"),
    (245, "480p"),
    (246, "480p"),
    (247, "720p"),
    (248, "1080p"),
    (264, "1440p"),
    (266, "2160p"),
    (271, "1440p"),
    (272, "2160p"),
    (278, "144p"),
    (298, "720p"),
    (299, "1080p"),
    (302, "720p"),
    (303, "1080p"),
    (308, "1440p"),
    (313, "2160p"),
    (315, "2160p"),
    (330, "144p"),
    (331, "240p"),
    (332, "360p"),
    (333, "480p"),
    (334, "720p"),
    (335, "1080p"),
    (336, "1440p"),
    (337, "2160p"),
    (394, "144p"),
    (395, "240p"),
    (396, "360p"),
    (397, "480p"),
    (398, "720p"),
    (399, "1080p"),
];

const DASH_AUDIO: &[(u32, &str)] = &[
    (139, "48kbps"),
    (140, "128kbps"),
    (141, "256kbps"),
    (171, "128kbps"),
    (172, "256kbps"),
    (249, "50kbps"),
    (250, "70kbps"),
    (251, "160kbps"),
    (256, "192kbps"),
    (258, "384kbps"),
    (325, "384kbps"),
    (328, "384kbps"),
];

const HIGH_FPS: &[u32] = &[298, 299, 302, 303, 308, 315, 334, 335, 336, 337, 398, 399];
const THREE_D: &[u32] = &[82, 83, 84, 85, 100, 101, 102];
const LIVE: &[u32] = &[91, 92, 93, 94, 95, 96, 127, 128, 132, 151];
const HDR: &[u32] = &[330, 331, 332, 333, 334, 335, 336, 337];

/// Looks up the profile for an itag; unknown itags get an empty profile
///
/// # Example
/// ```
/// use tubescrape_core::itags::format_profile;
/// let profile = format_profile(22);
/// assert_eq!(profile.resolution, Some("720p"));
/// assert_eq!(profile.abr, Some("192kbps"));
/// ```
pub fn format_profile(itag: u32) -> ItagProfile {
    let mut profile = if let Some(&(_, res, abr)) =
        PROGRESSIVE_VIDEO.iter().find(|(tag, _, _)| *tag == itag)
    {
        ItagProfile {
            resolution: res,
            abr,
            ..ItagProfile::default()
        }
    } else if let Some(&(_, res)) = DASH_VIDEO.iter().find(|(tag, _)| *tag == itag) {
        ItagProfile {
            resolution: Some(res),
            ..ItagProfile::default()
        }
    } else if let Some(&(_, abr)) = DASH_AUDIO.iter().find(|(tag, _)| *tag == itag) {
        ItagProfile {
            abr: Some(abr),
            ..ItagProfile::default()
        }
    } else {
        ItagProfile::default()
    };

    if profile.resolution.is_some() {
        profile.fps = Some(if HIGH_FPS.contains(&itag) { 60 } else { 30 });
    }
    profile.is_3d = THREE_D.contains(&itag);
    profile.is_live = LIVE.contains(&itag);
    profile.is_hdr = HDR.contains(&itag);
    profile
}
