//! Simulated camera driver.
//!
//! Renders a colour test pattern instead of reading a sensor, but otherwise
//! behaves like the Raspberry Pi camera module: it enforces the same value
//! ranges in `configure` and `capture`, blocks for a configurable exposure
//! time, and produces real JPEG / PNG / BMP / raw output via the `image`
//! crate.
//!
//! Used by the binary when no hardware driver is linked, and by tests.

use std::io::Cursor;
use std::thread;
use std::time::Duration;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use tracing::debug;

use picam_core::camera::{CameraSettings, CaptureSpec, ImageFormat, DEFAULT_JPEG_QUALITY};
use picam_core::{CameraDriver, CameraError, CameraHandle, ImageBytes};

/// Largest still resolution of the sensor (OV5647).
pub const MAX_RESOLUTION: [u32; 2] = [2592, 1944];

/// Resolution used until a client sets one.
pub const DEFAULT_RESOLUTION: [u32; 2] = [1280, 720];

const AWB_MODES: &[&str] = &[
    "off",
    "auto",
    "sunlight",
    "cloudy",
    "shade",
    "tungsten",
    "fluorescent",
    "incandescent",
    "flash",
    "horizon",
];

const EXPOSURE_MODES: &[&str] = &[
    "off",
    "auto",
    "night",
    "nightpreview",
    "backlight",
    "spotlight",
    "sports",
    "snow",
    "beach",
    "verylong",
    "fixedfps",
    "antishake",
    "fireworks",
];

const METER_MODES: &[&str] = &["average", "spot", "backlit", "matrix"];

/// Simulated camera driver.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCamera {
    exposure: Duration,
}

impl SimulatedCamera {
    /// A camera that captures instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera whose every capture blocks for `exposure`.
    pub fn with_exposure(exposure: Duration) -> Self {
        Self { exposure }
    }
}

impl CameraDriver for SimulatedCamera {
    fn open(&mut self) -> Result<Box<dyn CameraHandle>, CameraError> {
        debug!("simulated camera opened");
        Ok(Box::new(SimulatedHandle {
            exposure: self.exposure,
            sensor: SensorState::default(),
        }))
    }
}

/// Settings that affect the rendered frame.
#[derive(Debug, Clone, Copy)]
struct SensorState {
    resolution: [u32; 2],
    brightness: i32,
    hflip: bool,
    vflip: bool,
    rotation: u32,
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            brightness: 50,
            hflip: false,
            vflip: false,
            rotation: 0,
        }
    }
}

struct SimulatedHandle {
    exposure: Duration,
    sensor: SensorState,
}

impl CameraHandle for SimulatedHandle {
    fn configure(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        let mut next = self.sensor;

        if let Some(resolution) = settings.resolution {
            next.resolution = check_dimensions("resolution", resolution)?;
        }
        if let Some(iso) = settings.iso {
            if iso != 0 && !(100..=800).contains(&iso) {
                return Err(invalid(format!("ISO {iso} is not 0 or 100..=800")));
            }
        }
        if let Some(mode) = &settings.awb_mode {
            check_mode("awb_mode", mode, AWB_MODES)?;
        }
        if let Some(brightness) = settings.brightness {
            next.brightness = check_range("brightness", brightness, 0, 100)?;
        }
        if let Some(contrast) = settings.contrast {
            check_range("contrast", contrast, -100, 100)?;
        }
        if let Some(crop) = settings.crop {
            if crop.iter().any(|v| !(0.0..=1.0).contains(v)) {
                return Err(invalid(format!("crop {crop:?} must be within 0.0..=1.0")));
            }
        }
        if let Some((name, _)) = settings.exif_tags.iter().find(|(name, _)| name.is_empty()) {
            return Err(invalid(format!("empty EXIF tag name {name:?}")));
        }
        if let Some(ev) = settings.exposure_compensation {
            check_range("exposure_compensation", ev, -25, 25)?;
        }
        if let Some(mode) = &settings.exposure_mode {
            check_mode("exposure_mode", mode, EXPOSURE_MODES)?;
        }
        if let Some(mode) = &settings.meter_mode {
            check_mode("meter_mode", mode, METER_MODES)?;
        }
        if let Some(rotation) = settings.rotation {
            if !matches!(rotation, 0 | 90 | 180 | 270) {
                return Err(invalid(format!("rotation {rotation} is not 0/90/180/270")));
            }
            next.rotation = rotation;
        }
        if let Some(saturation) = settings.saturation {
            check_range("saturation", saturation, -100, 100)?;
        }
        if let Some(sharpness) = settings.sharpness {
            check_range("sharpness", sharpness, -100, 100)?;
        }
        next.hflip = settings.hflip.unwrap_or(next.hflip);
        next.vflip = settings.vflip.unwrap_or(next.vflip);

        self.sensor = next;
        debug!(sensor = ?self.sensor, "simulated camera configured");
        Ok(())
    }

    fn capture(&mut self, spec: &CaptureSpec) -> Result<ImageBytes, CameraError> {
        let quality = match &spec.jpeg {
            Some(jpeg) => {
                let quality = check_range("quality", jpeg.quality, 0, 100)?;
                if let Some(thumb) = jpeg.thumbnail {
                    check_dimensions("thumbnail", [thumb.width, thumb.height])?;
                    check_range("thumbnail quality", thumb.quality, 0, 100)?;
                }
                // The encoder's scale starts at 1.
                quality.max(1) as u8
            }
            None => DEFAULT_JPEG_QUALITY as u8,
        };
        if let Some(resize) = spec.resize {
            check_dimensions("resize", resize)?;
        }

        if !self.exposure.is_zero() {
            thread::sleep(self.exposure);
        }

        let mut frame = render(&self.sensor);
        if let Some([w, h]) = spec.resize {
            frame = imageops::resize(&frame, w, h, FilterType::Triangle);
        }

        encode(&frame, spec.format, quality).map(ImageBytes::new)
    }

    fn close(&mut self) {
        debug!("simulated camera closed");
    }
}

fn invalid(msg: String) -> CameraError {
    CameraError::InvalidArgument(msg)
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<T, CameraError> {
    if value < min || value > max {
        return Err(invalid(format!("{name} {value} is outside {min}..={max}")));
    }
    Ok(value)
}

/// Frame sizes must be non-zero and fit within the sensor.
fn check_dimensions(name: &str, [w, h]: [u32; 2]) -> Result<[u32; 2], CameraError> {
    if w == 0 || h == 0 || w > MAX_RESOLUTION[0] || h > MAX_RESOLUTION[1] {
        return Err(invalid(format!(
            "{name} {w}x{h} is outside 1x1..={}x{}",
            MAX_RESOLUTION[0], MAX_RESOLUTION[1]
        )));
    }
    Ok([w, h])
}

fn check_mode(name: &str, value: &str, allowed: &[&str]) -> Result<(), CameraError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("unknown {name} {value:?}")))
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Draws SMPTE-style colour bars over a vertical gradient.
fn render(sensor: &SensorState) -> RgbImage {
    const BARS: [[u8; 3]; 7] = [
        [192, 192, 192],
        [192, 192, 0],
        [0, 192, 192],
        [0, 192, 0],
        [192, 0, 192],
        [192, 0, 0],
        [0, 0, 192],
    ];
    let [width, height] = sensor.resolution;
    // 50 is neutral; each step moves the level by ~2%.
    let gain = 0.5 + sensor.brightness as f32 / 100.0;

    let frame = RgbImage::from_fn(width, height, |x, y| {
        let bar = BARS[(x as usize * BARS.len()) / width as usize];
        let shade = 0.5 + 0.5 * (y as f32 / height as f32);
        Rgb(bar.map(|c| (c as f32 * shade * gain).clamp(0.0, 255.0) as u8))
    });

    let frame = match sensor.rotation {
        90 => imageops::rotate90(&frame),
        180 => imageops::rotate180(&frame),
        270 => imageops::rotate270(&frame),
        _ => frame,
    };
    let frame = if sensor.hflip {
        imageops::flip_horizontal(&frame)
    } else {
        frame
    };
    if sensor.vflip {
        imageops::flip_vertical(&frame)
    } else {
        frame
    }
}

fn encode(frame: &RgbImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, CameraError> {
    let (width, height) = frame.dimensions();
    let mut output = Vec::new();

    let result = match format {
        ImageFormat::Jpeg => JpegEncoder::new_with_quality(Cursor::new(&mut output), quality)
            .write_image(frame.as_raw(), width, height, ExtendedColorType::Rgb8),
        ImageFormat::Png => PngEncoder::new(Cursor::new(&mut output)).write_image(
            frame.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        ),
        ImageFormat::Bmp => BmpEncoder::new(&mut Cursor::new(&mut output)).write_image(
            frame.as_raw(),
            width,
            height,
            ExtendedColorType::Rgb8,
        ),
        ImageFormat::Rgb => return Ok(frame.as_raw().clone()),
        ImageFormat::Bgr => return Ok(swizzle(frame, false)),
        ImageFormat::Rgba => return Ok(with_alpha(frame, false)),
        ImageFormat::Bgra => return Ok(with_alpha(frame, true)),
    };

    result.map_err(|e| CameraError::HardwareFailure(format!("{format} encoding failed: {e}")))?;
    Ok(output)
}

fn swizzle(frame: &RgbImage, alpha: bool) -> Vec<u8> {
    let stride = if alpha { 4 } else { 3 };
    let mut out = Vec::with_capacity(frame.pixels().len() * stride);
    for Rgb([r, g, b]) in frame.pixels() {
        out.extend_from_slice(&[*b, *g, *r]);
        if alpha {
            out.push(u8::MAX);
        }
    }
    out
}

fn with_alpha(frame: &RgbImage, bgr: bool) -> Vec<u8> {
    if bgr {
        return swizzle(frame, true);
    }
    let mut out = Vec::with_capacity(frame.pixels().len() * 4);
    for Rgb([r, g, b]) in frame.pixels() {
        out.extend_from_slice(&[*r, *g, *b, u8::MAX]);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
