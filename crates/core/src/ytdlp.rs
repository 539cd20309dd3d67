// crates/core/src/ytdlp.rs
//! yt-dlp worker: spawns `yt-dlp` and reports where the file landed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use clipper_types::ClipRange;
use tokio::process::Command;

use crate::config::WorkerConfig;
use crate::worker::{Worker, WorkerError, WorkerOutput, WorkerRequest};

const FULL_FORMAT: &str = "bv[height=1080][vcodec^=avc1]+ba[ext=m4a]/bv[height=1080][vcodec^=avc1]";
const FULL_SORT: &str = "+vbr,+abr";
const RANGE_FORMAT: &str =
    "bv*[height<=1080][vcodec~=avc1]+ba*[ext=m4a]/bv*[height<=1080]+ba*[ext=m4a]/bv*+ba*/best[height<=1080]/best";
const RANGE_SORT: &str = "res:1080,+codec:avc1,+br";

/// Longest stderr excerpt carried into a failure message.
const STDERR_TAIL_BYTES: usize = 500;

pub struct YtDlpWorker {
    program: PathBuf,
    output_dir: PathBuf,
}

impl YtDlpWorker {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            program: config.ytdlp_path.clone(),
            output_dir: config.output_dir.clone(),
        }
    }

    /// Full command line (without the program) for one request.
    pub fn build_args(&self, request: &WorkerRequest) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match request.range {
            None => {
                for arg in ["-f", FULL_FORMAT, "-S", FULL_SORT, "-o"] {
                    args.push(arg.to_string());
                }
                args.push(output_template(&self.output_dir, "%(title)s (1080p, h264).%(ext)s"));
            }
            Some(ClipRange { start_secs, end_secs }) => {
                for arg in ["--no-playlist", "-f", RANGE_FORMAT, "-S", RANGE_SORT, "--download-sections"] {
                    args.push(arg.to_string());
                }
                args.push(format!("*{start_secs}-{end_secs}"));
                args.push("-o".to_string());
                args.push(output_template(
                    &self.output_dir,
                    &format!(
                        "%(title)s ({}-{},%(height)sp, h264).%(ext)s",
                        format_hms(start_secs),
                        format_hms(end_secs)
                    ),
                ));
            }
        }
        args.push(request.url.clone());
        args
    }
}

fn output_template(dir: &Path, file: &str) -> String {
    dir.join(file).to_string_lossy().into_owned()
}

/// `3725` -> `"01h02m05s"`.
pub fn format_hms(secs: u64) -> String {
    format!("{:02}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Find the produced file in yt-dlp's combined output. A merge line wins over
/// a plain destination line; `None` means the file was already present.
pub fn parse_output_location(output: &str) -> Option<String> {
    const MERGER: &str = "[Merger] Merging formats into \"";
    const DESTINATION: &str = "[download] Destination: ";

    let merged = output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix(MERGER)?;
        let end = rest.rfind('"')?;
        Some(rest[..end].to_string())
    });
    merged.or_else(|| {
        output.lines().find_map(|line| {
            line.trim()
                .strip_prefix(DESTINATION)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
        })
    })
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

#[async_trait]
impl Worker for YtDlpWorker {
    async fn invoke(&self, request: &WorkerRequest) -> Result<WorkerOutput, WorkerError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let args = self.build_args(request);
        let t0 = Instant::now();
        tracing::info!(
            job_id = %request.job_id,
            program = %self.program.display(),
            range = ?request.range,
            "yt-dlp: spawning"
        );

        let output = Command::new(&self.program)
            .args(&args)
            // Null stdin so the child never blocks waiting for input
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                tracing::error!(job_id = %request.job_id, error = %e, "yt-dlp: failed to spawn process");
                WorkerError::Spawn(e.to_string())
            })?;

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let tail = stderr_tail(&stderr);
            tracing::error!(
                job_id = %request.job_id,
                elapsed_ms,
                exit_code = ?output.status.code(),
                stderr = %tail,
                "yt-dlp: non-zero exit"
            );
            let message = if tail.is_empty() {
                format!("yt-dlp exited with {}", output.status)
            } else {
                tail.to_string()
            };
            return Err(WorkerError::Failed(message));
        }

        // yt-dlp may print progress to either stream.
        let combined = format!("{stdout}\n{stderr}");
        let output_location = parse_output_location(&combined);
        match &output_location {
            Some(path) => tracing::info!(job_id = %request.job_id, elapsed_ms, output = %path, "yt-dlp: finished"),
            None => tracing::info!(job_id = %request.job_id, elapsed_ms, "yt-dlp: finished, file already present"),
        }

        Ok(WorkerOutput { output_location })
    }

    fn name(&self) -> &str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn worker() -> YtDlpWorker {
        YtDlpWorker::new(&WorkerConfig {
            ytdlp_path: PathBuf::from("yt-dlp"),
            output_dir: PathBuf::from("videos"),
        })
    }

    fn request(range: Option<ClipRange>) -> WorkerRequest {
        WorkerRequest {
            job_id: "job-1".into(),
            url: "https://example.com/v".into(),
            range,
        }
    }

    #[test]
    fn test_full_retrieval_args() {
        let args = worker().build_args(&request(None));
        assert_eq!(
            args,
            vec![
                "-f",
                FULL_FORMAT,
                "-S",
                "+vbr,+abr",
                "-o",
                "videos/%(title)s (1080p, h264).%(ext)s",
                "https://example.com/v",
            ]
        );
    }

    #[test]
    fn test_range_retrieval_args() {
        let args = worker().build_args(&request(Some(ClipRange {
            start_secs: 30,
            end_secs: 3725,
        })));
        assert_eq!(args[0], "--no-playlist");
        let sections = args.iter().position(|a| a == "--download-sections").unwrap();
        assert_eq!(args[sections + 1], "*30-3725");
        let out = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(
            args[out + 1],
            "videos/%(title)s (00h00m30s-01h02m05s,%(height)sp, h264).%(ext)s"
        );
        assert_eq!(args.last().unwrap(), "https://example.com/v");
    }

    #[test]
    fn test_parse_prefers_merger_line() {
        let output = "\
[download] Destination: videos/Clip.f137.mp4
[download] 100% of 10.00MiB
[Merger] Merging formats into \"videos/Clip (1080p, h264).mp4\"
Deleting original file videos/Clip.f137.mp4";
        assert_eq!(
            parse_output_location(output).as_deref(),
            Some("videos/Clip (1080p, h264).mp4")
        );
    }

    #[test]
    fn test_parse_falls_back_to_destination() {
        let output = "[info] x: Downloading 1 format(s)\n[download] Destination: videos/Clip (00h00m00s-00h00m30s,1080p, h264).mp4\n";
        assert_eq!(
            parse_output_location(output).as_deref(),
            Some("videos/Clip (00h00m00s-00h00m30s,1080p, h264).mp4")
        );
    }

    #[test]
    fn test_parse_already_downloaded() {
        let output = "[download] videos/Clip.mp4 has already been downloaded\n";
        assert_eq!(parse_output_location(output), None);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00h00m00s");
        assert_eq!(format_hms(59), "00h00m59s");
        assert_eq!(format_hms(3600), "01h00m00s");
    }

    #[test]
    fn test_stderr_tail_limits_length() {
        let long = "x".repeat(2000);
        assert_eq!(stderr_tail(&long).len(), STDERR_TAIL_BYTES);
        assert_eq!(stderr_tail("  ERROR: bad url \n"), "ERROR: bad url");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let worker = YtDlpWorker::new(&WorkerConfig {
            ytdlp_path: PathBuf::from("/nonexistent/definitely-not-yt-dlp"),
            output_dir: dir.path().join("videos"),
        });
        let err = worker.invoke(&request(None)).await.unwrap_err();
        assert!(matches!(err, WorkerError::Spawn(_)));
        assert!(dir.path().join("videos").is_dir());
    }
}
