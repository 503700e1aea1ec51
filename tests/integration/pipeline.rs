use crate::*;

use bytes::Bytes;
use framecast_core::config::FramecastConfig;
use framecast_core::digest;
use framecast_services::{prepare_bytes, prepare_file, prepare_folder, PreparedFile};

fn prepare(name: &str, data: &[u8], chunk_size: usize) -> PreparedFile {
    prepare_bytes(name, data, &Zstd::default(), chunk_size).unwrap()
}

/// File on disk → chunks → shuffled, duplicated frames → file on disk.
#[tokio::test]
async fn test_file_round_trip_out_of_order() {
    init_test_tracing();
    let dir = scratch_dir("round-trip");

    let source = dir.join("payload.bin");
    let data = sample_bytes(20_000, 7);
    std::fs::write(&source, &data).unwrap();

    let config = FramecastConfig::default();
    let prepared =
        prepare_file(&source, &config.sender.codec(), config.sender.chunk_size).unwrap();
    assert!(prepared.chunk_count() > 10);

    // The camera catches every code at least once, some of them twice.
    let mut frames = prepared.render(&TextFrames).unwrap();
    let repeats: Vec<OpticalUnit> = frames.iter().step_by(4).cloned().collect();
    frames.extend(repeats);
    shuffle(&mut frames, 0x5eed);

    let receiver = text_receiver(&dir, 5);
    let report = receiver
        .receive_units(Some(prepared.file_name.as_str()), frames)
        .await;

    assert!(report.success, "report: {report:?}");
    assert!(report.missing_chunks.is_empty());
    let written = std::fs::read(report.path.unwrap()).unwrap();
    assert_eq!(digest::hash(&written), prepared.digest);
    assert_eq!(written, data);

    let status = receiver.status().await;
    assert_eq!(status.total_chunks as usize, prepared.chunk_count());
    assert!(status.missing_chunks.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

/// Chunk sizes that are not a multiple of 3 still reassemble.
#[tokio::test]
async fn test_odd_chunk_sizes() {
    init_test_tracing();
    let dir = scratch_dir("odd-sizes");
    let data = sample_bytes(3_000, 11);

    for chunk_size in [1usize, 7, 100, 601] {
        let prepared = prepare("odd.bin", &data, chunk_size);
        let report = text_receiver(&dir, 3)
            .receive_units(Some("odd.bin"), prepared.render(&TextFrames).unwrap())
            .await;
        assert!(report.success, "chunk_size {chunk_size}: {report:?}");
        assert_eq!(std::fs::read(report.path.unwrap()).unwrap(), data);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

/// Lost frames produce a completeness report naming exactly what is missing.
#[tokio::test]
async fn test_lost_frames_are_reported() {
    init_test_tracing();
    let dir = scratch_dir("lost");
    let prepared = prepare("lost.bin", &sample_bytes(8_000, 3), 300);
    assert!(prepared.chunk_count() > 6);

    let frames: Vec<OpticalUnit> = prepared
        .render(&TextFrames)
        .unwrap()
        .into_iter()
        .enumerate()
        .filter(|(i, _)| *i != 1 && *i != 4)
        .map(|(_, unit)| unit)
        // blurred frames: the scanner finds nothing
        .chain([
            OpticalUnit::new("blur-1", Bytes::new()),
            OpticalUnit::new("blur-2", Bytes::new()),
        ])
        .collect();

    let report = text_receiver(&dir, 4).receive_units(None, frames).await;
    assert!(!report.success);
    assert_eq!(report.missing_chunks, vec![1, 4]);
    assert_eq!(report.error.as_deref(), Some("missing chunks: 1, 4"));
    assert!(report.path.is_none());

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["missingChunks"], serde_json::json!([1, 4]));
    assert!(json.get("path").is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

/// Codes that scan as text but are not chunks are ignored, not fatal.
#[tokio::test]
async fn test_noise_codes_are_ignored() {
    init_test_tracing();
    let dir = scratch_dir("noise");
    let data = b"signal among noise ".repeat(200);
    let prepared = prepare("signal.txt", &data, 64);

    let mut frames = prepared.render(&TextFrames).unwrap();
    frames.push(OpticalUnit::new("poster", "https://example.org/menu"));
    frames.push(OpticalUnit::new("half", "3||"));
    frames.push(OpticalUnit::new("negative", "-1||5||QUJD"));
    shuffle(&mut frames, 42);

    let report = text_receiver(&dir, 2)
        .receive_units(Some("signal.txt"), frames)
        .await;
    assert!(report.success, "{report:?}");
    assert_eq!(std::fs::read(report.path.unwrap()).unwrap(), data);

    let _ = std::fs::remove_dir_all(&dir);
}

/// A complete set whose payload is not valid transport text fails cleanly.
#[tokio::test]
async fn test_corrupt_payload_fails_without_output() {
    init_test_tracing();
    let dir = scratch_dir("corrupt");
    let frames = vec![
        OpticalUnit::new("a", "0||2||QUJD"),
        OpticalUnit::new("b", "1||2||Q#JD"),
    ];

    let report = text_receiver(&dir, 2).receive_units(None, frames).await;
    assert!(!report.success);
    assert!(report.missing_chunks.is_empty());
    assert!(report.error.unwrap().contains("chunk 1"));
    assert!(!dir.join("received").join("reconstructed_file").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

/// Every file of a folder travels as its own transfer.
#[tokio::test]
async fn test_folder_transfer() {
    init_test_tracing();
    let dir = scratch_dir("folder");
    let folder = dir.join("outbox");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("b.log"), sample_bytes(2_500, 2)).unwrap();
    std::fs::write(folder.join("a.txt"), b"first file in the folder").unwrap();

    let prepared = prepare_folder(&folder, &Zstd::default(), 200).unwrap();
    let names: Vec<&str> = prepared.iter().map(|p| p.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.log"]);

    let receiver = text_receiver(&dir, 3);
    for file in &prepared {
        let report = receiver
            .receive_units(Some(file.file_name.as_str()), file.render(&TextFrames).unwrap())
            .await;
        assert!(report.success, "{}: {report:?}", file.file_name);
        let path = report.path.unwrap();
        assert_eq!(path, dir.join("received").join(&file.file_name));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            std::fs::read(folder.join(&file.file_name)).unwrap()
        );
    }

    let _ = std::fs::remove_dir_all(&dir);
}
