use crate::assets::locate::ResourceLocation;
use crate::foundation::core::Affine;
use crate::foundation::error::{CompositorError, CompositorResult};

/// Stream-level facts about a media file, as reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaProbe {
    /// Coded video width (before any display rotation).
    pub width: u32,
    /// Coded video height.
    pub height: u32,
    /// Clockwise display rotation in degrees, normalized to `0..360`.
    pub rotation_deg: u32,
    /// Source frame-rate numerator.
    pub fps_num: u32,
    /// Source frame-rate denominator.
    pub fps_den: u32,
    /// Container duration in seconds.
    pub duration_sec: f64,
    /// A video stream is present.
    pub has_video: bool,
    /// A video stream with a decodable codec is present.
    pub video_readable: bool,
    /// An audio stream is present.
    pub has_audio: bool,
}

impl MediaProbe {
    /// Track-level transform that displays coded frames upright.
    pub fn preferred_transform(&self) -> Affine {
        rotation_transform(self.rotation_deg, self.width, self.height)
    }
}

/// Map a clockwise display rotation to the preferred track transform for a `w`×`h` frame.
///
/// Angles other than 90, 180 and 270 yield the identity.
pub fn rotation_transform(rotation_deg: u32, w: u32, h: u32) -> Affine {
    let (w, h) = (f64::from(w), f64::from(h));
    match rotation_deg % 360 {
        90 => Affine::new([0.0, 1.0, -1.0, 0.0, h, 0.0]),
        180 => Affine::new([-1.0, 0.0, 0.0, -1.0, w, h]),
        270 => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, w]),
        _ => Affine::IDENTITY,
    }
}

/// Probe duration, streams, coded size and display rotation with `ffprobe`.
#[cfg(feature = "media-ffmpeg")]
pub fn probe_media(input: &ResourceLocation) -> CompositorResult<MediaProbe> {
    #[derive(serde::Deserialize)]
    struct ProbeTags {
        rotate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeSideData {
        rotation: Option<f64>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        tags: Option<ProbeTags>,
        #[serde(default)]
        side_data_list: Vec<ProbeSideData>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(input.as_media_input())
        .output()
        .map_err(|e| CompositorError::resource_unavailable(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(CompositorError::resource_unavailable(format!(
            "ffprobe failed for '{input}': {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout).map_err(|e| {
        CompositorError::resource_unavailable(format!("ffprobe json parse failed: {e}"))
    })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut probe = MediaProbe {
        width: 0,
        height: 0,
        rotation_deg: 0,
        fps_num: 0,
        fps_den: 1,
        duration_sec,
        has_video: video.is_some(),
        video_readable: false,
        has_audio,
    };

    if let Some(v) = video {
        probe.width = v.width.unwrap_or(0);
        probe.height = v.height.unwrap_or(0);
        if let Some((n, d)) = parse_ff_ratio(v.r_frame_rate.as_deref().unwrap_or("0/1")) {
            probe.fps_num = n;
            probe.fps_den = d;
        }
        probe.video_readable = probe.width > 0
            && probe.height > 0
            && v.codec_name.as_deref().is_some_and(|c| c != "none");

        // Legacy `rotate` tag is clockwise; the display-matrix side data is counter-clockwise.
        let tagged = v
            .tags
            .as_ref()
            .and_then(|t| t.rotate.as_deref())
            .and_then(|r| r.trim().parse::<f64>().ok());
        let side = v.side_data_list.iter().find_map(|s| s.rotation).map(|r| -r);
        probe.rotation_deg = tagged.or(side).map(normalize_degrees).unwrap_or(0);
    }

    Ok(probe)
}

/// Probe duration, streams, coded size and display rotation with `ffprobe`.
#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_media(_input: &ResourceLocation) -> CompositorResult<MediaProbe> {
    Err(CompositorError::resource_unavailable(
        "media probing requires the 'media-ffmpeg' feature",
    ))
}

/// Decode the coded (unrotated) frame shown at `time_sec` as packed premultiplied BGRA.
///
/// Autorotation is disabled so that orientation stays with the track transform.
#[cfg(feature = "media-ffmpeg")]
pub fn decode_video_frame_bgra(
    input: &ResourceLocation,
    width: u32,
    height: u32,
    time_sec: f64,
) -> CompositorResult<Vec<u8>> {
    let expected_len = width as usize * height as usize * 4;
    if expected_len == 0 {
        return Err(CompositorError::resource_unavailable(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }

    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-noautorotate"])
        .args(["-ss", &format!("{:.9}", time_sec.max(0.0))])
        .arg("-i")
        .arg(input.as_media_input())
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgra",
            "pipe:1",
        ])
        .output()
        .map_err(|e| {
            CompositorError::resource_unavailable(format!(
                "failed to run ffmpeg for video decode: {e}"
            ))
        })?;

    if !out.status.success() {
        return Err(CompositorError::resource_unavailable(format!(
            "ffmpeg video decode failed for '{input}': {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    if out.stdout.len() < expected_len {
        return Err(CompositorError::resource_unavailable(format!(
            "decoded video frame has invalid size: got {} bytes, expected {expected_len}",
            out.stdout.len()
        )));
    }

    let mut frame = out.stdout;
    frame.truncate(expected_len);
    // Decoded video is opaque, so straight BGRA is already premultiplied.
    Ok(frame)
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_video_frame_bgra(
    _input: &ResourceLocation,
    _width: u32,
    _height: u32,
    _time_sec: f64,
) -> CompositorResult<Vec<u8>> {
    Err(CompositorError::resource_unavailable(
        "video decode requires the 'media-ffmpeg' feature",
    ))
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn normalize_degrees(d: f64) -> u32 {
    let r = (d.round() as i64).rem_euclid(360);
    r as u32
}

#[cfg_attr(not(feature = "media-ffmpeg"), allow(dead_code))]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}
