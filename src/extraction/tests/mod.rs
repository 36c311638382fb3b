use crate::config::Config;
use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use crate::types::{ArchiveType, ExtractProgress};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a ZIP archive that also carries explicit directory entries
fn create_zip_with_dirs(archive_path: &Path) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    writer.add_directory("disc1/", options).unwrap();
    writer.add_directory("disc2/", options).unwrap();
    writer.start_file("disc1/track01.bin", options).unwrap();
    std::io::Write::write_all(&mut writer, b"one").unwrap();
    writer.start_file("disc2/track01.bin", options).unwrap();
    std::io::Write::write_all(&mut writer, b"two").unwrap();
    writer.finish().unwrap();
}

/// Create a valid 7z archive from a source directory using sevenz_rust
fn create_7z_archive(archive_path: &Path, source_dir: &Path) {
    sevenz_rust::compress_to_path(source_dir, archive_path).unwrap();
}

/// Progress sink that records every report
fn recorder() -> (Arc<ProgressFn>, Arc<Mutex<Vec<ExtractProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress: Arc<ProgressFn> =
        Arc::new(move |p: ExtractProgress| sink.lock().unwrap().push(p));
    (progress, seen)
}

fn native_extractor() -> Extractor {
    Extractor::new(&Config::default())
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[test]
fn test_detect_archive_type_zip_by_magic() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("no_extension");
    create_zip_archive(&path, &[("a.txt", b"a")]);
    assert_eq!(detect_archive_type(&path), Some(ArchiveType::Zip));
}

#[test]
fn test_detect_archive_type_7z_by_magic() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    std::fs::create_dir(&src).unwrap();
    std::fs::write(src.join("rom.bin"), b"rom").unwrap();
    let path = temp_dir.path().join("game.dat");
    create_7z_archive(&path, &src);
    assert_eq!(detect_archive_type(&path), Some(ArchiveType::SevenZip));
}

#[test]
fn test_detect_archive_type_rar_signatures() {
    let temp_dir = TempDir::new().unwrap();
    let rar4 = temp_dir.path().join("v4.rar");
    std::fs::write(&rar4, b"Rar!\x1A\x07\x00rest").unwrap();
    let rar5 = temp_dir.path().join("v5.bin");
    std::fs::write(&rar5, b"Rar!\x1A\x07\x01\x00rest").unwrap();

    assert_eq!(detect_archive_type(&rar4), Some(ArchiveType::Rar));
    assert_eq!(detect_archive_type(&rar5), Some(ArchiveType::Rar));
}

#[test]
fn test_detect_archive_type_ignores_extension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fake.zip");
    std::fs::write(&path, b"this is not a zip at all").unwrap();
    assert_eq!(detect_archive_type(&path), None);
}

#[test]
fn test_detect_archive_type_short_or_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let short = temp_dir.path().join("short");
    std::fs::write(&short, b"PK").unwrap();
    assert_eq!(detect_archive_type(&short), None);
    assert_eq!(detect_archive_type(&temp_dir.path().join("missing")), None);
}

#[test]
fn test_is_archive_never_true_for_iso() {
    let temp_dir = TempDir::new().unwrap();
    // A zip renamed to .iso is still treated as a disc image
    let path = temp_dir.path().join("game.ISO");
    create_zip_archive(&path, &[("a.txt", b"a")]);
    assert!(!is_archive(&path));

    let real = temp_dir.path().join("game.zip");
    create_zip_archive(&real, &[("a.txt", b"a")]);
    assert!(is_archive(&real));
}

// ---------------------------------------------------------------------------
// Single-archive extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_extract_zip_writes_every_entry_and_reports_progress() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("bundle.zip");
    create_zip_archive(
        &archive,
        &[
            ("Game (Disc 1).cue", b"cue1"),
            ("Game (Disc 1).bin", b"bin1"),
            ("Game.m3u", b"Game (Disc 1).cue\n"),
        ],
    );
    let dest = temp_dir.path().join("install");

    let (progress, seen) = recorder();
    let files = native_extractor()
        .extract(&archive, &dest, &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert_eq!(files.len(), 3);
    assert_eq!(std::fs::read(dest.join("Game (Disc 1).bin")).unwrap(), b"bin1");
    assert!(dest.join("Game.m3u").exists());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&ExtractProgress { done: 0, total: 3 }));
    assert_eq!(seen.last(), Some(&ExtractProgress { done: 3, total: 3 }));
    let dones: Vec<usize> = seen.iter().map(|p| p.done).collect();
    assert_eq!(dones, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_extract_zip_skips_directory_entries_in_count() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("dirs.zip");
    create_zip_with_dirs(&archive);
    let dest = temp_dir.path().join("out");

    let (progress, seen) = recorder();
    let files = native_extractor()
        .extract(&archive, &dest, &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(std::fs::read(dest.join("disc2/track01.bin")).unwrap(), b"two");
    assert_eq!(seen.lock().unwrap().last().unwrap().total, 2);
}

#[tokio::test]
async fn test_extract_zip_overwrites_existing_files() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("a.zip");
    create_zip_archive(&archive, &[("rom.sfc", b"new")]);
    let dest = temp_dir.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("rom.sfc"), b"old contents").unwrap();

    let (progress, _) = recorder();
    native_extractor()
        .extract(&archive, &dest, &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert_eq!(std::fs::read(dest.join("rom.sfc")).unwrap(), b"new");
}

#[tokio::test]
async fn test_extract_zip_rejects_traversal_entries() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("evil.zip");
    create_zip_archive(&archive, &[("ok.txt", b"y"), ("../escape.txt", b"x")]);
    let dest = temp_dir.path().join("out");

    let (progress, _) = recorder();
    let result = native_extractor()
        .extract(&archive, &dest, &CancellationToken::new(), progress)
        .await;

    match result {
        Err(Error::Extraction(ExtractionError::PathTraversal { archive: a, entry })) => {
            assert_eq!(a, archive);
            assert_eq!(entry, Path::new("../escape.txt"));
        }
        other => panic!("expected PathTraversal, got {:?}", other),
    }
    assert!(!temp_dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_extract_zip_rejects_absolute_entries() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("abs.zip");
    create_zip_archive(&archive, &[("/tmp/romm-dl-absolute.txt", b"x")]);
    let dest = temp_dir.path().join("out");

    let (progress, _) = recorder();
    let result = native_extractor()
        .extract(&archive, &dest, &CancellationToken::new(), progress)
        .await;

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::PathTraversal { .. }))
    ));
}

#[tokio::test]
async fn test_extract_empty_zip_reports_complete() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("empty.zip");
    create_zip_archive(&archive, &[]);
    let dest = temp_dir.path().join("out");

    let (progress, seen) = recorder();
    let files = native_extractor()
        .extract(&archive, &dest, &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert!(files.is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].percent(), 100.0);
}

#[tokio::test]
async fn test_extract_honors_cancellation_before_first_entry() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("a.zip");
    create_zip_archive(&archive, &[("one.bin", b"1"), ("two.bin", b"2")]);
    let dest = temp_dir.path().join("out");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (progress, _) = recorder();
    let result = native_extractor()
        .extract(&archive, &dest, &cancel, progress)
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(!dest.join("one.bin").exists());
}

#[tokio::test]
async fn test_extract_cancellation_between_entries() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("a.zip");
    create_zip_archive(
        &archive,
        &[("one.bin", b"1"), ("two.bin", b"2"), ("three.bin", b"3")],
    );
    let dest = temp_dir.path().join("out");

    // Cancel as soon as the first entry has been written
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let progress: Arc<ProgressFn> = Arc::new(move |p: ExtractProgress| {
        if p.done == 1 {
            trigger.cancel();
        }
    });

    let result = native_extractor()
        .extract(&archive, &dest, &cancel, progress)
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(dest.join("one.bin").exists());
    assert!(!dest.join("three.bin").exists());
}

#[tokio::test]
async fn test_extract_7z_archive() {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    std::fs::create_dir_all(src.join("sub")).unwrap();
    std::fs::write(src.join("rom.nds"), b"nds").unwrap();
    std::fs::write(src.join("sub").join("save.sav"), b"sav").unwrap();
    let archive = temp_dir.path().join("game.7z");
    create_7z_archive(&archive, &src);
    let dest = temp_dir.path().join("out");

    let (progress, seen) = recorder();
    let files = native_extractor()
        .extract(&archive, &dest, &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(std::fs::read(dest.join("rom.nds")).unwrap(), b"nds");
    assert_eq!(std::fs::read(dest.join("sub").join("save.sav")).unwrap(), b"sav");
    let last = *seen.lock().unwrap().last().unwrap();
    assert_eq!(last, ExtractProgress { done: 2, total: 2 });
}

#[tokio::test]
async fn test_extract_unsupported_format() {
    let temp_dir = TempDir::new().unwrap();
    let not_archive = temp_dir.path().join("rom.sfc");
    std::fs::write(&not_archive, b"plain rom bytes").unwrap();

    let (progress, _) = recorder();
    let result = native_extractor()
        .extract(&not_archive, temp_dir.path(), &CancellationToken::new(), progress)
        .await;

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::UnsupportedFormat { .. }))
    ));
}

#[tokio::test]
async fn test_extract_corrupt_zip_fails() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("broken.zip");
    // Valid local header magic followed by garbage
    std::fs::write(&archive, b"PK\x03\x04garbage garbage garbage").unwrap();

    let (progress, _) = recorder();
    let result = native_extractor()
        .extract(&archive, &temp_dir.path().join("out"), &CancellationToken::new(), progress)
        .await;

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::Failed { .. }))
    ));
}

// ---------------------------------------------------------------------------
// Nested extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_extract_nested_unpacks_into_same_directory() {
    let temp_dir = TempDir::new().unwrap();
    let install = temp_dir.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    // Build inner archive, then an outer bundle that contains it
    let inner = temp_dir.path().join("inner.zip");
    create_zip_archive(&inner, &[("disc1.bin", b"d1"), ("disc2.bin", b"d2")]);
    let inner_bytes = std::fs::read(&inner).unwrap();
    let outer = install.join("bundle.zip");
    create_zip_archive(&outer, &[("inner.zip", &inner_bytes), ("readme.txt", b"hi")]);

    let extractor = native_extractor();
    let cancel = CancellationToken::new();
    let (progress, _) = recorder();
    extractor
        .extract(&outer, &install, &cancel, progress.clone())
        .await
        .unwrap();
    let unpacked = extractor
        .extract_nested(&install, &outer, &cancel, progress)
        .await
        .unwrap();

    assert_eq!(unpacked, vec![install.join("inner.zip")]);
    assert!(!install.join("inner.zip").exists(), "nested archive is deleted");
    assert!(install.join("disc1.bin").exists());
    assert!(install.join("disc2.bin").exists());
    assert!(outer.exists(), "excluded top-level archive is untouched");
}

#[tokio::test]
async fn test_extract_nested_handles_multiple_levels() {
    let temp_dir = TempDir::new().unwrap();
    let install = temp_dir.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    let level2 = temp_dir.path().join("level2.zip");
    create_zip_archive(&level2, &[("deep.bin", b"deep")]);
    let level1 = install.join("level1.zip");
    create_zip_archive(&level1, &[("level2.zip", &std::fs::read(&level2).unwrap())]);

    let (progress, _) = recorder();
    let unpacked = native_extractor()
        .extract_nested(&install, &install.join("none.zip"), &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert_eq!(unpacked.len(), 2);
    assert!(install.join("deep.bin").exists());
    assert!(!install.join("level1.zip").exists());
    assert!(!install.join("level2.zip").exists());
}

#[tokio::test]
async fn test_extract_nested_respects_max_depth() {
    let temp_dir = TempDir::new().unwrap();
    let install = temp_dir.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    let level2 = temp_dir.path().join("level2.zip");
    create_zip_archive(&level2, &[("deep.bin", b"deep")]);
    let level1 = install.join("level1.zip");
    create_zip_archive(&level1, &[("level2.zip", &std::fs::read(&level2).unwrap())]);

    let mut config = Config::default();
    config.extraction.max_recursion_depth = Some(1);
    let (progress, _) = recorder();
    let unpacked = Extractor::new(&config)
        .extract_nested(&install, &install.join("none.zip"), &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert_eq!(unpacked, vec![install.join("level1.zip")]);
    assert!(install.join("level2.zip").exists(), "second level left alone");
    assert!(!install.join("deep.bin").exists());
}

#[tokio::test]
async fn test_extract_nested_leaves_iso_images() {
    let temp_dir = TempDir::new().unwrap();
    let install = temp_dir.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    let iso = install.join("game.iso");
    create_zip_archive(&iso, &[("x.bin", b"x")]);

    let (progress, _) = recorder();
    let unpacked = native_extractor()
        .extract_nested(&install, &install.join("none.zip"), &CancellationToken::new(), progress)
        .await
        .unwrap();

    assert!(unpacked.is_empty());
    assert!(iso.exists());
    assert!(!install.join("x.bin").exists());
}

#[tokio::test]
async fn test_extract_nested_broken_archive_fails() {
    let temp_dir = TempDir::new().unwrap();
    let install = temp_dir.path().join("install");
    std::fs::create_dir_all(&install).unwrap();

    let broken = install.join("broken.zip");
    std::fs::write(&broken, b"PK\x03\x04not really").unwrap();

    let (progress, _) = recorder();
    let result = native_extractor()
        .extract_nested(&install, &install.join("none.zip"), &CancellationToken::new(), progress)
        .await;

    match result {
        Err(Error::Extraction(ExtractionError::Failed { archive, .. })) => {
            assert_eq!(archive, broken);
        }
        other => panic!("expected extraction failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_extract_nested_cancelled() {
    let temp_dir = TempDir::new().unwrap();
    let install = temp_dir.path().join("install");
    std::fs::create_dir_all(&install).unwrap();
    create_zip_archive(&install.join("inner.zip"), &[("a.bin", b"a")]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (progress, _) = recorder();
    let result = native_extractor()
        .extract_nested(&install, &install.join("none.zip"), &cancel, progress)
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(install.join("inner.zip").exists());
}

// ---------------------------------------------------------------------------
// External tool
// ---------------------------------------------------------------------------

#[test]
fn test_external_from_config_prefers_explicit_path() {
    let mut config = Config::default();
    config.tools.sevenzip_path = Some("/opt/7zip/7zz".into());
    let tool = ExternalExtractor::from_config(&config.tools).unwrap();
    assert_eq!(tool.binary_path(), Path::new("/opt/7zip/7zz"));
}

#[test]
fn test_external_from_config_without_search() {
    let mut config = Config::default();
    config.tools.search_path = false;
    assert!(ExternalExtractor::from_config(&config.tools).is_none());
}

#[tokio::test]
async fn test_external_missing_binary_is_tool_error() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("a.zip");
    create_zip_archive(&archive, &[("a.bin", b"a")]);

    let tool = ExternalExtractor::new(temp_dir.path().join("no-such-7z"));
    let (progress, _) = recorder();
    let result = tool
        .extract(
            &archive,
            &temp_dir.path().join("out"),
            &CancellationToken::new(),
            progress.as_ref(),
        )
        .await;

    assert!(matches!(result, Err(Error::ExternalTool(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_external_nonzero_exit_maps_to_tool_failed() {
    // `false` ignores its arguments and exits with status 1
    let Ok(binary) = which::which("false") else {
        return;
    };
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("a.7z");
    std::fs::write(&archive, b"7z\xBC\xAF\x27\x1C").unwrap();

    let tool = ExternalExtractor::new(binary);
    let (progress, _) = recorder();
    let result = tool
        .extract(
            &archive,
            &temp_dir.path().join("out"),
            &CancellationToken::new(),
            progress.as_ref(),
        )
        .await;

    match result {
        Err(Error::Extraction(ExtractionError::ToolFailed { code, .. })) => {
            assert_eq!(code, Some(1))
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_external_killed_on_cancel() {
    // `sleep x -y -o... archive` fails to parse, so use a shell wrapper that ignores args
    let temp_dir = TempDir::new().unwrap();
    let script = temp_dir.path().join("slow7z.sh");
    std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    let archive = temp_dir.path().join("a.7z");
    std::fs::write(&archive, b"7z\xBC\xAF\x27\x1C").unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let tool = ExternalExtractor::new(script);
    let (progress, _) = recorder();
    let started = std::time::Instant::now();
    let result = tool
        .extract(&archive, &temp_dir.path().join("out"), &cancel, progress.as_ref())
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
