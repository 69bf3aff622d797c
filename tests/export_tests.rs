mod common;

use camino::Utf8PathBuf;
use cartridge_loader::codec::{ImageDecoder, PngDecoder};
use cartridge_loader::export::{ExportError, ImageExporter};
use cartridge_loader::{
    FileFlags, LoadService, LoaderSettings, MemoryEngine, MountedFileSystem, ScreenshotService,
};
use common::{BLUE, RED, WHITE, png};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, root)
}

#[test]
fn test_screenshot_of_a_loaded_cartridge() {
    let (_project_dir, project) = temp_root();
    let (_tmp_dir, tmp) = temp_root();
    fs::write(project.join("data.json"), common::DATA_JSON).unwrap();
    fs::write(
        project.join("colors.png"),
        png(3, 1, |x, _| [RED, BLUE, WHITE][x as usize]),
    )
    .unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let files = MountedFileSystem::new()
        .mount("/Game/", &project)
        .mount("/Tmp/", &tmp);
    let service = LoadService::new(
        Arc::new(files.clone()),
        LoaderSettings::default(),
        runtime.handle().clone(),
    );

    let mut engine = MemoryEngine::new();
    let listing = service.list_files().unwrap();
    service
        .load_synchronously(&listing, &mut engine, FileFlags::SYSTEM | FileFlags::COLORS)
        .unwrap();
    assert_eq!(engine.display_size, (64, 48));

    engine.set_frame_pixel(0, 0, 1);
    engine.set_frame_pixel(1, 0, 2);

    let screenshots = ScreenshotService::new(Arc::new(files), service.settings());
    let path = screenshots.take_screenshot(&engine).unwrap();
    assert_eq!(path, "/Tmp/Screenshots/screenshot.png");

    let saved = fs::read(tmp.join("Screenshots/screenshot.png")).unwrap();
    let image = PngDecoder.decode(&saved).unwrap();
    assert_eq!((image.width, image.height), (64, 48));
    assert_eq!(image.pixel(0, 0), [0, 0, 255, 255]);
    assert_eq!(image.pixel(1, 0), [255, 255, 255, 255]);
    // Empty pixels take the background color (index 0)
    assert_eq!(image.pixel(5, 5), [255, 0, 0, 255]);
}

#[test]
fn test_exporter_reports_dimension_mismatch() {
    let err = ImageExporter::new(8, 8, vec![0; 10], vec![[0, 0, 0]])
        .export()
        .unwrap_err();
    assert!(matches!(err, ExportError::Dimensions { .. }));
}

#[test]
fn test_screenshot_without_mount_fails_with_io_error() {
    let engine = MemoryEngine::new();
    let service = ScreenshotService::new(
        Arc::new(MountedFileSystem::new()),
        &LoaderSettings::default(),
    );
    let err = service.take_screenshot(&engine).unwrap_err();
    assert!(matches!(err, ExportError::Io { .. }));
}
