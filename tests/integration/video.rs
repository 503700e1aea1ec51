use crate::*;

use std::sync::atomic::{AtomicUsize, Ordering};

use framecast_services::{load_frames, prepare_bytes, FrameExtractor};

/// Writes one frame file per scheduled capture, the way a frame grabber
/// sampling a recording at a fixed rate would. An empty entry is a frame
/// with no readable code.
struct ScriptedExtractor {
    frames: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    fn new(frames: Vec<String>) -> Self {
        Self {
            frames,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FrameExtractor for ScriptedExtractor {
    fn extract(&self, video: &Path, frames_dir: &Path) -> Result<()> {
        anyhow::ensure!(video.extension().is_some(), "not a video file");
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (i, text) in self.frames.iter().enumerate() {
            std::fs::write(frames_dir.join(format!("frame-{:03}.png", i + 1)), text)?;
        }
        Ok(())
    }
}

/// Each code is on screen for about two frames, with blank frames between.
fn capture_schedule(chunks: &[String]) -> Vec<String> {
    chunks
        .iter()
        .flat_map(|c| [c.clone(), c.clone(), String::new()])
        .collect()
}

#[tokio::test]
async fn test_video_round_trip() {
    init_test_tracing();
    let dir = scratch_dir("video");
    let data = sample_bytes(5_000, 99);
    let prepared = prepare_bytes("clip-source.bin", &data, &Zstd::default(), 400).unwrap();

    let extractor = Arc::new(ScriptedExtractor::new(capture_schedule(&prepared.chunks)));
    let receiver = text_receiver(&dir, 5);
    let report = receiver
        .receive_video(extractor.clone(), Path::new("/uploads/holiday clip.mp4"))
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    // No name travels with a recording; the configured default is used.
    let path = report.path.unwrap();
    assert_eq!(path, dir.join("received").join("reconstructed_file"));
    assert_eq!(std::fs::read(&path).unwrap(), data);

    // Frames land in a per-video directory named after the sanitized stem.
    let frames = load_frames(&dir.join("frames").join("holiday_clip"))
        .await
        .unwrap();
    assert_eq!(frames.len(), prepared.chunk_count() * 3);
    assert_eq!(frames[0].label, "frame-001.png");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_rerun_clears_previous_frames() {
    init_test_tracing();
    let dir = scratch_dir("video-rerun");
    let data = sample_bytes(2_000, 5);
    let prepared = prepare_bytes("rerun.bin", &data, &Zstd::default(), 300).unwrap();
    let receiver = text_receiver(&dir, 3);

    // First pass misses the last code entirely.
    let (last, rest) = prepared.chunks.split_last().unwrap();
    let partial = receiver
        .receive_video(
            Arc::new(ScriptedExtractor::new(capture_schedule(rest))),
            Path::new("rerun.mov"),
        )
        .await
        .unwrap();
    assert!(!partial.success);
    assert_eq!(partial.missing_chunks, vec![prepared.chunk_count() as u32 - 1]);

    // A second recording holding only the last code does not see the old frames.
    let retry = receiver
        .receive_video(
            Arc::new(ScriptedExtractor::new(vec![last.clone()])),
            Path::new("rerun.mov"),
        )
        .await
        .unwrap();
    assert!(!retry.success);
    assert_eq!(
        retry.missing_chunks,
        (0..prepared.chunk_count() as u32 - 1).collect::<Vec<_>>()
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_extractor_failure_is_an_error() {
    init_test_tracing();
    let dir = scratch_dir("video-fail");
    let err = text_receiver(&dir, 2)
        .receive_video(Arc::new(ScriptedExtractor::new(Vec::new())), Path::new("no-extension"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("not a video file"));

    let _ = std::fs::remove_dir_all(&dir);
}
