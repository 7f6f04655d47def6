use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::infrastructure::storage::s3::StorageService;
use crate::modules::render::model::{JobStatus, RenderJob, Segment, StatusUpdate};
use crate::modules::render::service::RenderQueue;
use crate::workers::source_info::{inspect_source, SourceInfo};
use crate::workers::renderer::Renderer;

// Keeps the last part of ffmpeg's stderr for error messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// Renders jobs with the ffmpeg CLI and uploads the result to storage.
pub struct FfmpegRenderer {
    ffmpeg_path: String,
    ffprobe_path: String,
    work_dir: PathBuf,
    storage: StorageService,
}

impl FfmpegRenderer {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        ffprobe_path: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        storage: StorageService,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
            work_dir: work_dir.into(),
            storage,
        }
    }

    /// Falls back to "unknown length, has audio" when ffprobe cannot read the
    /// source; ffmpeg then reports the real problem.
    async fn inspect(&self, job: &RenderJob) -> SourceInfo {
        match inspect_source(&self.ffprobe_path, &job.source_url).await {
            Ok(info) => {
                debug!(job_id = %job.id, duration = ?info.duration, has_audio = info.has_audio, "Inspected source");
                info
            }
            Err(e) => {
                warn!(job_id = %job.id, "Could not inspect source: {:#}", e);
                SourceInfo {
                    duration: None,
                    has_audio: true,
                }
            }
        }
    }

    async fn run(&self, job: &RenderJob, queue: &RenderQueue) -> Result<String> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("Failed to create work dir {}", self.work_dir.display()))?;

        let output = self.work_dir.join(format!("{}.mp4", job.id));
        let output_str = output.to_string_lossy().into_owned();
        let source = self.inspect(job).await;
        let args = build_args(&job.source_url, &job.segments, source.has_audio, &output_str);

        info!(job_id = %job.id, segments = job.segments.len(), "Starting ffmpeg");

        let tracker = ProgressTracker::new(expected_duration(job.segments_duration(), &source));
        let result = self.transcode(job, queue, &args, tracker).await;
        let uploaded = match result {
            Ok(()) => {
                let key = format!("renders/{}.mp4", job.id);
                self.storage.put_file(&key, &output, "video/mp4").await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = tokio::fs::remove_file(&output).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id = %job.id, "Failed to remove {}: {}", output.display(), e);
            }
        }

        uploaded
    }

    async fn transcode(
        &self,
        job: &RenderJob,
        queue: &RenderQueue,
        args: &[String],
        mut tracker: ProgressTracker,
    ) -> Result<()> {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.ffmpeg_path))?;

        let stdout = child.stdout.take().ok_or_else(|| anyhow!("ffmpeg stdout unavailable"))?;
        let mut stderr = child.stderr.take().ok_or_else(|| anyhow!("ffmpeg stderr unavailable"))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            let start = buf.len().saturating_sub(STDERR_TAIL_BYTES);
            String::from_utf8_lossy(&buf[start..]).into_owned()
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(percent) = tracker.observe(&line) {
                queue
                    .update_status(&job.id, JobStatus::Processing, StatusUpdate::progress(percent))
                    .await?;
            }
        }

        let status = child.wait().await.context("Failed to wait for ffmpeg")?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let tail = stderr_tail.trim();
            return Err(match tail.lines().last() {
                Some(last) => anyhow!("ffmpeg exited with {}: {}", status, last),
                None => anyhow!("ffmpeg exited with {}", status),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, job: RenderJob, queue: RenderQueue) -> Result<()> {
        match self.run(&job, &queue).await {
            Ok(result_url) => {
                info!(job_id = %job.id, result_url = %result_url, "Render completed");
                queue
                    .update_status(&job.id, JobStatus::Completed, StatusUpdate::completed(result_url))
                    .await?;
            }
            Err(e) => {
                error!(job_id = %job.id, "Render failed: {:#}", e);
                queue
                    .update_status(&job.id, JobStatus::Error, StatusUpdate::failed(format!("{:#}", e)))
                    .await?;
            }
        }
        Ok(())
    }
}

/// Seconds of output a render should produce: the selected segments, or the
/// whole source.
fn expected_duration(segments: Option<f64>, source: &SourceInfo) -> Option<f64> {
    segments.or(source.duration)
}

/// ffmpeg arguments for rendering `segments` of `input` into an H.264/AAC MP4.
/// Sources without an audio stream get a video-only concat graph.
pub fn build_args(input: &str, segments: &[Segment], has_audio: bool, output: &str) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-hide_banner", "-nostats", "-loglevel", "error", "-progress", "pipe:1"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    match segments {
        [] => {
            args.extend(["-i".to_string(), input.to_string()]);
        }
        [only] => {
            args.extend(["-ss".to_string(), format!("{:.3}", only.start)]);
            args.extend(["-to".to_string(), format!("{:.3}", only.end)]);
            args.extend(["-i".to_string(), input.to_string()]);
        }
        many => {
            args.extend(["-i".to_string(), input.to_string()]);
            args.extend(["-filter_complex".to_string(), concat_filter(many, has_audio)]);
            args.extend(["-map".to_string(), "[outv]".to_string()]);
            if has_audio {
                args.extend(["-map".to_string(), "[outa]".to_string()]);
            }
        }
    }

    args.extend(
        ["-c:v", "libx264", "-preset", "fast", "-c:a", "aac", "-movflags", "+faststart"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(output.to_string());
    args
}

fn concat_filter(segments: &[Segment], has_audio: bool) -> String {
    let mut graph = String::new();
    let mut inputs = String::new();

    for (i, seg) in segments.iter().enumerate() {
        graph.push_str(&format!(
            "[0:v]trim=start={s:.3}:end={e:.3},setpts=PTS-STARTPTS[v{i}];",
            s = seg.start,
            e = seg.end,
            i = i
        ));
        inputs.push_str(&format!("[v{i}]", i = i));

        if has_audio {
            graph.push_str(&format!(
                "[0:a]atrim=start={s:.3}:end={e:.3},asetpts=PTS-STARTPTS[a{i}];",
                s = seg.start,
                e = seg.end,
                i = i
            ));
            inputs.push_str(&format!("[a{i}]", i = i));
        }
    }

    if has_audio {
        graph.push_str(&format!("{}concat=n={}:v=1:a=1[outv][outa]", inputs, segments.len()));
    } else {
        graph.push_str(&format!("{}concat=n={}:v=1:a=0[outv]", inputs, segments.len()));
    }
    graph
}

/// Turns `-progress` key/value output into whole percentages.
#[derive(Debug)]
pub struct ProgressTracker {
    total_us: Option<f64>,
    last: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total_secs: Option<f64>) -> Self {
        Self {
            total_us: total_secs.filter(|t| *t > 0.0).map(|t| t * 1_000_000.0),
            last: None,
        }
    }

    /// Returns a new percentage when `line` moves the render forward. Stays
    /// below 100 until the output has been uploaded.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        let (key, value) = line.trim().split_once('=')?;
        let total = self.total_us?;

        // ffmpeg reports `out_time_ms` in microseconds as well.
        let elapsed = match key {
            "out_time_us" | "out_time_ms" => value.trim().parse::<f64>().ok()?,
            "progress" if value.trim() == "end" => total,
            _ => return None,
        };

        let percent = ((elapsed / total) * 100.0).clamp(0.0, 99.0) as u8;
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_file_render() {
        let args = build_args("https://cdn/x.mp4", &[], true, "/tmp/job_1.mp4");
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "https://cdn/x.mp4");
        assert!(!args.contains(&"-ss".to_string()));
        assert!(!args.contains(&"-filter_complex".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/job_1.mp4");
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:1"]));
    }

    #[test]
    fn single_segment_seeks_before_input() {
        let args = build_args("in.mp4", &[Segment { start: 1.5, end: 10.0 }], true, "out.mp4");
        let joined = args.join(" ");
        assert!(joined.contains("-ss 1.500 -to 10.000 -i in.mp4"));
    }

    #[test]
    fn multiple_segments_are_concatenated() {
        let segments = [Segment { start: 0.0, end: 2.0 }, Segment { start: 5.0, end: 7.5 }];
        let args = build_args("in.mp4", &segments, true, "out.mp4");

        let i = args.iter().position(|a| a == "-filter_complex").unwrap();
        let graph = &args[i + 1];
        assert!(graph.contains("[0:v]trim=start=0.000:end=2.000,setpts=PTS-STARTPTS[v0];"));
        assert!(graph.contains("[0:a]atrim=start=5.000:end=7.500,asetpts=PTS-STARTPTS[a1];"));
        assert!(graph.ends_with("[v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"));
        assert!(args.windows(2).any(|w| w == ["-map", "[outv]"]));
        assert!(args.windows(2).any(|w| w == ["-map", "[outa]"]));
    }

    #[test]
    fn silent_sources_get_a_video_only_concat() {
        let segments = [Segment { start: 0.0, end: 2.0 }, Segment { start: 5.0, end: 7.5 }];
        let args = build_args("silent.mp4", &segments, false, "out.mp4");

        let i = args.iter().position(|a| a == "-filter_complex").unwrap();
        let graph = &args[i + 1];
        assert!(!graph.contains("[0:a]"));
        assert!(graph.ends_with("[v0][v1]concat=n=2:v=1:a=0[outv]"));
        assert!(args.windows(2).any(|w| w == ["-map", "[outv]"]));
        assert!(!args.contains(&"[outa]".to_string()));
    }

    #[test]
    fn whole_file_progress_uses_the_source_duration() {
        let source = SourceInfo {
            duration: Some(40.0),
            has_audio: true,
        };
        let mut tracker = ProgressTracker::new(expected_duration(None, &source));
        assert_eq!(tracker.observe("out_time_us=10000000"), Some(25));

        let mut tracker = ProgressTracker::new(expected_duration(Some(20.0), &source));
        assert_eq!(tracker.observe("out_time_us=10000000"), Some(50));
    }

    #[test]
    fn progress_is_reported_against_segment_duration() {
        let mut tracker = ProgressTracker::new(Some(20.0));

        assert_eq!(tracker.observe("frame=100"), None);
        assert_eq!(tracker.observe("out_time_us=5000000"), Some(25));
        assert_eq!(tracker.observe("out_time_ms=5000000"), None);
        assert_eq!(tracker.observe("out_time_us=N/A"), None);
        assert_eq!(tracker.observe("out_time_us=10000000"), Some(50));
        assert_eq!(tracker.observe("progress=continue"), None);
        assert_eq!(tracker.observe("progress=end"), Some(99));
    }

    #[test]
    fn unknown_duration_reports_nothing() {
        let mut tracker = ProgressTracker::new(None);
        assert_eq!(tracker.observe("out_time_us=5000000"), None);
        assert_eq!(tracker.observe("progress=end"), None);
    }
}
