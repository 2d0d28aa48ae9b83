use super::encode::resize_and_encode;
use super::plan::sample_timestamps;
use super::{FrameSampler, SamplingSettings};
use crate::common::{EncodedFrame, FrameOrigin, FrameSet, LocatedMedia};
use crate::error::ItemError;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub nb_frames: Option<String>,
    #[serde(default)]
    pub r_frame_rate: Option<String>,
}

fn parse_rate(rate: &str) -> Option<(u64, u64)> {
    let (num, den) = rate.split_once('/')?;
    let num = num.trim().parse::<u64>().ok()?;
    let den = den.trim().parse::<u64>().ok()?;
    (num > 0 && den > 0).then_some((num, den))
}

/// Stream duration in seconds, falling back to frame count over frame rate
pub fn resolve_duration(stream: &ProbeStream) -> Option<f64> {
    let declared = stream
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);
    if declared.is_some() {
        return declared;
    }

    let frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)?;
    let (num, den) = parse_rate(stream.r_frame_rate.as_deref().unwrap_or("30/1"))?;
    Some(frames as f64 * den as f64 / num as f64)
}

/// Samples time-based sources by seeking with ffmpeg at evenly spaced timestamps
#[derive(Debug, Clone)]
pub struct VideoSampler {
    ffmpeg: String,
    ffprobe: String,
    decode_timeout: Duration,
}

impl VideoSampler {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, decode_timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            decode_timeout,
        }
    }

    async fn run(&self, mut command: Command, program: &str) -> Result<Output, ItemError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tokio::time::timeout(self.decode_timeout, command.output())
            .await
            .map_err(|_| ItemError::DecodeTimeout(self.decode_timeout))?
            .map_err(|e| ItemError::FrameExtraction(format!("Failed to execute {}: {}", program, e)))
    }

    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>, ItemError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(path);
        let output = self.run(command, &self.ffprobe).await?;

        if !output.status.success() {
            return Err(ItemError::FrameExtraction(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ItemError::FrameExtraction(format!("Unreadable ffprobe output: {}", e)))?;
        let stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| ItemError::FrameExtraction("No video stream found".to_string()))?;

        Ok(resolve_duration(stream))
    }

    async fn decode_at(
        &self,
        source: &Path,
        timestamp: f64,
        scratch: &Path,
        position: usize,
        max_dimension: u32,
    ) -> Result<Option<EncodedFrame>, ItemError> {
        let out_path = scratch.join(format!("frame_{}.png", position));
        let seek = format!("{:.3}", timestamp);
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-v", "quiet", "-y", "-ss", seek.as_str(), "-i"])
            .arg(source)
            .args(["-frames:v", "1"])
            .arg(&out_path);
        let output = self.run(command, &self.ffmpeg).await?;

        if !output.status.success() {
            debug!("ffmpeg exited with {} at {:.3}s", output.status, timestamp);
        }

        let data = match tokio::fs::read(&out_path).await {
            Ok(data) => data,
            Err(_) => {
                debug!("No frame decoded at {:.3}s, dropping it", timestamp);
                return Ok(None);
            }
        };

        let frame = tokio::task::spawn_blocking(move || {
            let image = image::load_from_memory(&data)
                .map_err(|e| ItemError::FrameExtraction(format!("Unreadable decoded frame: {}", e)))?;
            resize_and_encode(image, max_dimension, FrameOrigin::Timestamp(timestamp))
        })
        .await
        .map_err(|e| ItemError::Aborted(format!("Frame encoding task failed: {}", e)))??;

        Ok(Some(frame))
    }

    async fn sample_path(&self, path: &Path, settings: SamplingSettings) -> Result<FrameSet, ItemError> {
        let timestamps = match self.probe_duration(path).await? {
            Some(duration) => sample_timestamps(duration, settings.frame_count),
            None => {
                warn!("Duration unavailable for {}, taking a single frame", path.display());
                vec![0.0]
            }
        };

        let scratch = TempDir::new()
            .map_err(|e| ItemError::FrameExtraction(format!("Failed to create scratch dir: {}", e)))?;

        let mut frames = Vec::with_capacity(timestamps.len());
        for (position, timestamp) in timestamps.into_iter().enumerate() {
            if let Some(frame) = self
                .decode_at(path, timestamp, scratch.path(), position, settings.max_dimension)
                .await?
            {
                frames.push(frame);
            }
        }

        if frames.is_empty() {
            return Err(ItemError::FrameExtraction("ffmpeg extracted no frames".to_string()));
        }
        Ok(FrameSet::new(frames))
    }
}

impl Default for VideoSampler {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe", Duration::from_secs(60))
    }
}

/// Spill in-memory media to disk, since ffmpeg seeks need a file
async fn spill_to_disk(data: &[u8], url: &str) -> Result<(NamedTempFile, PathBuf), ItemError> {
    let suffix = Path::new(url.split(['?', '#']).next().unwrap_or(url))
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let file = tempfile::Builder::new()
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| ItemError::FrameExtraction(format!("Failed to create temp file: {}", e)))?;
    let path = file.path().to_path_buf();
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ItemError::FrameExtraction(format!("Failed to write temp file: {}", e)))?;
    Ok((file, path))
}

#[async_trait]
impl FrameSampler for VideoSampler {
    async fn sample(
        &self,
        media: &LocatedMedia,
        settings: SamplingSettings,
    ) -> Result<FrameSet, ItemError> {
        match media {
            LocatedMedia::File(path) => self.sample_path(path, settings).await,
            LocatedMedia::Bytes { data, url } => {
                let (_guard, path) = spill_to_disk(data, url).await?;
                self.sample_path(&path, settings).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "video"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(duration: Option<&str>, nb_frames: Option<&str>, rate: Option<&str>) -> ProbeStream {
        ProbeStream {
            codec_type: Some("video".to_string()),
            duration: duration.map(str::to_string),
            nb_frames: nb_frames.map(str::to_string),
            r_frame_rate: rate.map(str::to_string),
        }
    }

    #[test]
    fn declared_duration_wins() {
        assert_eq!(resolve_duration(&stream(Some("2.500000"), Some("10"), Some("30/1"))), Some(2.5));
    }

    #[test]
    fn duration_derived_from_frame_count_and_rate() {
        assert_eq!(resolve_duration(&stream(None, Some("60"), Some("30/1"))), Some(2.0));
        assert_eq!(resolve_duration(&stream(Some("0"), Some("90"), None)), Some(3.0));
    }

    #[test]
    fn unresolvable_duration_is_none() {
        assert_eq!(resolve_duration(&stream(None, None, Some("30/1"))), None);
        assert_eq!(resolve_duration(&stream(Some("N/A"), Some("12"), Some("0/0"))), None);
    }

    #[test]
    fn probe_output_parses_stream_list() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{"streams":[{"codec_type":"audio"},{"codec_type":"video","duration":"1.2","r_frame_rate":"25/1"}]}"#,
        )
        .unwrap();
        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .unwrap();
        assert_eq!(resolve_duration(video), Some(1.2));
    }

    fn settings(frame_count: usize) -> SamplingSettings {
        SamplingSettings {
            frame_count,
            max_dimension: 512,
        }
    }

    /// Executable shell script standing in for ffmpeg or ffprobe
    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    /// ffmpeg stand-in copying a fixed PNG to its output, failing at `fail_at`
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, fail_at: &str) -> String {
        let png = dir.join("still.png");
        image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 10, 10, 255]))
            .save(&png)
            .unwrap();
        // args: -v quiet -y -ss <seek> -i <source> -frames:v 1 <out>
        let body = format!(
            "if [ \"$5\" = \"{}\" ]; then exit 1; fi\ncp '{}' \"${{10}}\"",
            fail_at,
            png.display()
        );
        fake_tool(dir, "ffmpeg", &body)
    }

    fn timestamps(frames: &FrameSet) -> Vec<f64> {
        frames
            .iter()
            .map(|frame| match frame.origin() {
                FrameOrigin::Timestamp(t) => t,
                other => panic!("unexpected origin {:?}", other),
            })
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_ffprobe_hits_the_decode_timeout() {
        let tools = tempfile::tempdir().unwrap();
        let ffprobe = fake_tool(tools.path(), "ffprobe", "exec sleep 5");
        let ffmpeg = fake_ffmpeg(tools.path(), "none");
        let source = NamedTempFile::new().unwrap();

        let timeout = Duration::from_millis(200);
        let started = std::time::Instant::now();
        let result = VideoSampler::new(ffmpeg, ffprobe, timeout)
            .sample(&LocatedMedia::File(source.path().to_path_buf()), settings(5))
            .await;

        assert!(matches!(result, Err(ItemError::DecodeTimeout(d)) if d == timeout));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timestamps_without_a_frame_are_dropped() {
        let tools = tempfile::tempdir().unwrap();
        let ffprobe = fake_tool(
            tools.path(),
            "ffprobe",
            r#"echo '{"streams":[{"codec_type":"video","duration":"2.000000"}]}'"#,
        );
        let ffmpeg = fake_ffmpeg(tools.path(), "1.000");
        let source = NamedTempFile::new().unwrap();

        let frames = VideoSampler::new(ffmpeg, ffprobe, Duration::from_secs(10))
            .sample(&LocatedMedia::File(source.path().to_path_buf()), settings(3))
            .await
            .unwrap();

        let taken = timestamps(&frames);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0], 0.0);
        assert!((taken[1] - 1.99).abs() < 1e-9, "last frame at {}", taken[1]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unknown_duration_takes_one_frame_at_start() {
        let tools = tempfile::tempdir().unwrap();
        let ffprobe = fake_tool(
            tools.path(),
            "ffprobe",
            r#"echo '{"streams":[{"codec_type":"video"}]}'"#,
        );
        let ffmpeg = fake_ffmpeg(tools.path(), "none");
        let source = NamedTempFile::new().unwrap();

        let frames = VideoSampler::new(ffmpeg, ffprobe, Duration::from_secs(10))
            .sample(&LocatedMedia::File(source.path().to_path_buf()), settings(5))
            .await
            .unwrap();

        assert_eq!(timestamps(&frames), vec![0.0]);
    }

    #[tokio::test]
    async fn missing_decoder_binary_fails_the_item() {
        let file = NamedTempFile::new().unwrap();
        let sampler = VideoSampler::new(
            "gif-describer-no-such-ffmpeg",
            "gif-describer-no-such-ffprobe",
            Duration::from_secs(5),
        );
        let result = sampler
            .sample(&LocatedMedia::File(file.path().to_path_buf()), settings(5))
            .await;
        assert!(matches!(result, Err(ItemError::FrameExtraction(_))));
    }
}
