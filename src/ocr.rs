use std::{
    io,
    path::PathBuf,
    process::{Command, ExitStatus},
    time::Instant,
};

use image::{DynamicImage, GrayImage, ImageFormat};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::OcrConfig;

/// Luminance at or below this value becomes black, anything above white.
pub const BINARY_THRESHOLD: u8 = 128;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine {command:?} is unavailable: {source}")]
    EngineUnavailable {
        command: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("OCR engine exited with {status}: {stderr}")]
    EngineFailed { status: ExitStatus, stderr: String },
    #[error("failed to hand the bitmap to the OCR engine: {0}")]
    Bitmap(#[from] image::ImageError),
    #[error("failed to stage the bitmap for the OCR engine: {0}")]
    Staging(#[from] io::Error),
}

/// Grayscale plus a fixed binarization at [`BINARY_THRESHOLD`].
pub fn preprocess(image: &DynamicImage) -> GrayImage {
    let mut gray = image.to_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > BINARY_THRESHOLD { 255 } else { 0 };
    }
    gray
}

/// Preprocesses `image` and runs it through the configured OCR executable.
pub fn recognize(image: &DynamicImage, config: &OcrConfig) -> Result<String, OcrError> {
    let start_time = Instant::now();
    let bitmap = preprocess(image);

    // Removed when `staged` drops, whichever way this returns.
    let staged = tempfile::Builder::new()
        .prefix("ocr-")
        .suffix(".png")
        .tempfile()?;
    bitmap.save_with_format(staged.path(), ImageFormat::Png)?;

    debug!(
        command = %config.command.display(),
        width = bitmap.width(),
        height = bitmap.height(),
        "Running OCR engine"
    );

    let output = Command::new(&config.command)
        .arg(staged.path())
        .arg("stdout")
        .args(["-l", config.language.as_str()])
        .args(["--oem", config.engine_mode.to_string().as_str()])
        .args(["--psm", config.page_segmentation.to_string().as_str()])
        .output()
        .map_err(|source| OcrError::EngineUnavailable {
            command: config.command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(OcrError::EngineFailed {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    info!(
        processing_time_ms = start_time.elapsed().as_millis() as u64,
        text_length = text.len(),
        "OCR completed"
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn gray(values: &[u8]) -> DynamicImage {
        let image = GrayImage::from_raw(values.len() as u32, 1, values.to_vec()).unwrap();
        DynamicImage::ImageLuma8(image)
    }

    fn engine(command: &str) -> OcrConfig {
        OcrConfig {
            command: PathBuf::from(command),
            ..OcrConfig::default()
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let out = preprocess(&gray(&[0, 127, 128, 129, 255]));
        assert_eq!(out.into_raw(), vec![0, 0, 0, 255, 255]);
    }

    #[test]
    fn test_preprocess_keeps_dimensions_and_is_single_channel() {
        let mut rgb = RgbImage::new(7, 3);
        rgb.put_pixel(2, 1, Rgb([250, 250, 250]));
        let out = preprocess(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(out.dimensions(), (7, 3));
        assert_eq!(*out.get_pixel(2, 1), Luma([255]));
        assert_eq!(*out.get_pixel(0, 0), Luma([0]));
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let source = gray(&[3, 90, 128, 129, 200, 255, 64, 130]);
        let once = preprocess(&source);
        let twice = preprocess(&DynamicImage::ImageLuma8(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_engine_is_reported_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-tesseract");
        let config = engine(missing.to_str().unwrap());

        match recognize(&gray(&[255; 4]), &config) {
            Err(OcrError::EngineUnavailable { command, .. }) => assert_eq!(command, missing),
            other => panic!("expected EngineUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_engine_receives_fixed_arguments() {
        // `echo` prints its arguments, which stands in for recognized text.
        let text = recognize(&gray(&[255; 4]), &engine("echo")).unwrap();
        assert!(text.contains(".png stdout -l eng --oem 1 --psm 6"), "{text}");
    }

    #[test]
    fn test_engine_failure_is_an_error() {
        let result = recognize(&gray(&[255; 4]), &engine("false"));
        assert!(matches!(result, Err(OcrError::EngineFailed { .. })));
    }
}
