//! Typed `IMAGE` command options.
//!
//! The `args` object of an `IMAGE` request is split in two:
//!
//! - [`CameraSettings`] – sensor settings applied by `configure` before the
//!   capture (`resolution`, `ISO`, `brightness`, flips, ...).
//! - [`CaptureSpec`] – how the frame is captured and encoded (`format`,
//!   `resize`, and for JPEG `quality` / `thumbnail`).
//!
//! Only the *shape* of each recognised value is checked here (a resolution must
//! be two non-negative integers, a flag must be a boolean, ...).  Whether a
//! well-shaped value is acceptable (is 99999×99999 a valid resolution?) is the
//! camera driver's call.  Unrecognised keys are ignored.
//!
//! ```json
//! {"resolution":[1024,768],"ISO":400,"hflip":true,"format":"jpeg","quality":90}
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// JPEG quality used when the request does not specify one.
pub const DEFAULT_JPEG_QUALITY: u32 = 85;

/// Errors found while reading `IMAGE` arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    /// `args` is not a JSON object.
    #[error("camera options must be a JSON object")]
    NotAnObject,

    /// A recognised option has a value of the wrong shape.
    #[error("invalid camera option: {0}")]
    InvalidValue(String),

    /// `format` names an encoding the camera cannot produce.
    #[error("unsupported image format: {0:?}")]
    UnsupportedFormat(String),
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Sensor settings.  `None` means "leave the camera default".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CameraSettings {
    /// Sensor resolution as `[width, height]`.
    #[serde(default)]
    pub resolution: Option<[u32; 2]>,
    /// Sensor sensitivity; `0` means automatic.
    #[serde(default, rename = "ISO")]
    pub iso: Option<u32>,
    /// Auto white balance mode, e.g. `"auto"`, `"sunlight"`.
    #[serde(default)]
    pub awb_mode: Option<String>,
    /// Brightness, nominally `0..=100`.
    #[serde(default)]
    pub brightness: Option<i32>,
    /// Fixed chroma as `[u, v]`.
    #[serde(default)]
    pub color_effects: Option<[u8; 2]>,
    /// Contrast, nominally `-100..=100`.
    #[serde(default)]
    pub contrast: Option<i32>,
    /// Region of interest as normalised `[x, y, w, h]`.
    #[serde(default)]
    pub crop: Option<[f64; 4]>,
    /// EXIF tags to embed, as an object or a list of `[name, value]` pairs.
    #[serde(default, deserialize_with = "deserialize_exif_tags")]
    pub exif_tags: Vec<(String, String)>,
    /// Exposure compensation, nominally `-25..=25`.
    #[serde(default)]
    pub exposure_compensation: Option<i32>,
    /// Exposure mode, e.g. `"auto"`, `"night"`.
    #[serde(default)]
    pub exposure_mode: Option<String>,
    /// Mirror horizontally.
    #[serde(default)]
    pub hflip: Option<bool>,
    /// Camera LED on/off.
    #[serde(default)]
    pub led: Option<bool>,
    /// Metering mode, e.g. `"average"`, `"spot"`.
    #[serde(default)]
    pub meter_mode: Option<String>,
    /// Image rotation in degrees.
    #[serde(default)]
    pub rotation: Option<u32>,
    /// Saturation, nominally `-100..=100`.
    #[serde(default)]
    pub saturation: Option<i32>,
    /// Sharpness, nominally `-100..=100`.
    #[serde(default)]
    pub sharpness: Option<i32>,
    /// Shutter speed in microseconds; `0` means automatic.
    #[serde(default)]
    pub shutter_speed: Option<u64>,
    /// Mirror vertically.
    #[serde(default)]
    pub vflip: Option<bool>,
}

fn deserialize_exif_tags<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        Map(BTreeMap<String, String>),
        Pairs(Vec<(String, String)>),
    }

    Ok(match Option::<RawTags>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(RawTags::Map(map)) => map.into_iter().collect(),
        Some(RawTags::Pairs(pairs)) => pairs,
    })
}

// ── Capture spec ──────────────────────────────────────────────────────────────

/// Output encodings a capture may be asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// JPEG (the default).
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
    /// Uncompressed Windows bitmap.
    Bmp,
    /// Raw packed RGB, 3 bytes per pixel.
    Rgb,
    /// Raw packed RGBA, 4 bytes per pixel.
    Rgba,
    /// Raw packed BGR, 3 bytes per pixel.
    Bgr,
    /// Raw packed BGRA, 4 bytes per pixel.
    Bgra,
}

impl ImageFormat {
    /// The lower-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Rgb => "rgb",
            Self::Rgba => "rgba",
            Self::Bgr => "bgr",
            Self::Bgra => "bgra",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "bmp" => Ok(Self::Bmp),
            "rgb" => Ok(Self::Rgb),
            "rgba" => Ok(Self::Rgba),
            "bgr" => Ok(Self::Bgr),
            "bgra" => Ok(Self::Bgra),
            _ => Err(OptionsError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// EXIF thumbnail embedded in a JPEG, given on the wire as `[w, h, quality]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub quality: u32,
}

/// JPEG-only encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegOptions {
    /// Encoder quality, nominally `0..=100`.
    pub quality: u32,
    /// Optional EXIF thumbnail; `None` disables it.
    pub thumbnail: Option<Thumbnail>,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            thumbnail: None,
        }
    }
}

/// How to capture and encode the frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSpec {
    /// Output encoding; defaults to JPEG.
    pub format: ImageFormat,
    /// Scale the captured frame to `[width, height]`.
    pub resize: Option<[u32; 2]>,
    /// Present if and only if `format` is JPEG.
    pub jpeg: Option<JpegOptions>,
}

/// The capture-related keys, read loosely so that `quality` and `thumbnail`
/// are only interpreted for JPEG captures.
#[derive(Deserialize)]
struct RawCapture {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    resize: Option<[u32; 2]>,
    #[serde(default)]
    quality: Option<Value>,
    #[serde(default)]
    thumbnail: Option<Value>,
}

// ── Combined options ──────────────────────────────────────────────────────────

/// Everything the camera gate needs for one `IMAGE` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraOptions {
    pub settings: CameraSettings,
    pub capture: CaptureSpec,
}

impl CameraOptions {
    /// Reads options from the `args` of an `IMAGE` request.
    ///
    /// A missing `format` defaults to JPEG with quality
    /// [`DEFAULT_JPEG_QUALITY`] and no thumbnail.
    ///
    /// # Errors
    ///
    /// - [`OptionsError::NotAnObject`] if `args` is not an object.
    /// - [`OptionsError::InvalidValue`] if a recognised key has the wrong shape.
    /// - [`OptionsError::UnsupportedFormat`] for an unknown `format`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use picam_core::camera::{CameraOptions, ImageFormat};
    /// use serde_json::json;
    ///
    /// let options = CameraOptions::from_args(&json!({"resolution": [640, 480]})).unwrap();
    /// assert_eq!(options.settings.resolution, Some([640, 480]));
    /// assert_eq!(options.capture.format, ImageFormat::Jpeg);
    /// assert_eq!(options.capture.jpeg.unwrap().quality, 85);
    /// ```
    pub fn from_args(args: &Value) -> Result<Self, OptionsError> {
        if !args.is_object() {
            return Err(OptionsError::NotAnObject);
        }

        let settings = CameraSettings::deserialize(args)
            .map_err(|e| OptionsError::InvalidValue(e.to_string()))?;
        let raw = RawCapture::deserialize(args)
            .map_err(|e| OptionsError::InvalidValue(e.to_string()))?;

        let format = match raw.format.as_deref() {
            Some(name) => name.parse()?,
            None => ImageFormat::default(),
        };

        let jpeg = if format == ImageFormat::Jpeg {
            Some(jpeg_options(raw.quality, raw.thumbnail)?)
        } else {
            None
        };

        Ok(Self {
            settings,
            capture: CaptureSpec {
                format,
                resize: raw.resize,
                jpeg,
            },
        })
    }
}

fn jpeg_options(quality: Option<Value>, thumbnail: Option<Value>) -> Result<JpegOptions, OptionsError> {
    let quality = match quality {
        None | Some(Value::Null) => DEFAULT_JPEG_QUALITY,
        Some(value) => u32::deserialize(&value)
            .map_err(|e| OptionsError::InvalidValue(format!("quality: {e}")))?,
    };

    let thumbnail = match thumbnail {
        None | Some(Value::Null) => None,
        Some(value) => {
            let [width, height, quality] = <[u32; 3]>::deserialize(&value)
                .map_err(|e| OptionsError::InvalidValue(format!("thumbnail: {e}")))?;
            Some(Thumbnail {
                width,
                height,
                quality,
            })
        }
    };

    Ok(JpegOptions { quality, thumbnail })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_args_default_to_jpeg() {
        // Arrange / Act
        let options = CameraOptions::from_args(&json!({})).unwrap();

        // Assert
        assert_eq!(options.settings, CameraSettings::default());
        assert_eq!(options.capture.format, ImageFormat::Jpeg);
        assert_eq!(options.capture.jpeg, Some(JpegOptions::default()));
        assert_eq!(options.capture.resize, None);
    }

    #[test]
    fn test_recognised_settings_are_parsed() {
        let options = CameraOptions::from_args(&json!({
            "resolution": [1024, 768],
            "ISO": 400,
            "brightness": 60,
            "hflip": true,
            "vflip": false,
            "rotation": 180,
            "awb_mode": "sunlight",
            "shutter_speed": 10000,
        }))
        .unwrap();

        let s = options.settings;
        assert_eq!(s.resolution, Some([1024, 768]));
        assert_eq!(s.iso, Some(400));
        assert_eq!(s.brightness, Some(60));
        assert_eq!(s.hflip, Some(true));
        assert_eq!(s.vflip, Some(false));
        assert_eq!(s.rotation, Some(180));
        assert_eq!(s.awb_mode.as_deref(), Some("sunlight"));
        assert_eq!(s.shutter_speed, Some(10000));
    }

    #[test]
    fn test_unrecognised_keys_are_ignored() {
        let options = CameraOptions::from_args(&json!({"zoom": 3, "led": false})).unwrap();
        assert_eq!(options.settings.led, Some(false));
    }

    #[test]
    fn test_huge_resolution_is_shape_valid() {
        // Range checks belong to the camera driver.
        let options = CameraOptions::from_args(&json!({"resolution": [99999, 99999]})).unwrap();
        assert_eq!(options.settings.resolution, Some([99999, 99999]));
    }

    #[test]
    fn test_mis_shaped_resolution_is_invalid_value() {
        let result = CameraOptions::from_args(&json!({"resolution": "big"}));
        assert!(matches!(result, Err(OptionsError::InvalidValue(_))));

        let result = CameraOptions::from_args(&json!({"resolution": [-1, 480]}));
        assert!(matches!(result, Err(OptionsError::InvalidValue(_))));
    }

    #[test]
    fn test_non_object_args_are_rejected() {
        assert_eq!(
            CameraOptions::from_args(&json!([1, 2])),
            Err(OptionsError::NotAnObject)
        );
    }

    #[test]
    fn test_jpeg_quality_and_thumbnail_are_read() {
        let options = CameraOptions::from_args(&json!({
            "format": "jpeg",
            "quality": 90,
            "thumbnail": [64, 48, 35],
        }))
        .unwrap();

        assert_eq!(
            options.capture.jpeg,
            Some(JpegOptions {
                quality: 90,
                thumbnail: Some(Thumbnail {
                    width: 64,
                    height: 48,
                    quality: 35
                }),
            })
        );
    }

    #[test]
    fn test_quality_is_ignored_for_png() {
        // Even a mis-shaped quality is irrelevant when it will not be used.
        let options =
            CameraOptions::from_args(&json!({"format": "png", "quality": "high"})).unwrap();
        assert_eq!(options.capture.format, ImageFormat::Png);
        assert_eq!(options.capture.jpeg, None);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert_eq!(
            CameraOptions::from_args(&json!({"format": "tiff"})),
            Err(OptionsError::UnsupportedFormat("tiff".to_string()))
        );
    }

    #[test]
    fn test_format_names_are_case_insensitive() {
        assert_eq!("PNG".parse::<ImageFormat>(), Ok(ImageFormat::Png));
        assert_eq!("jpg".parse::<ImageFormat>(), Ok(ImageFormat::Jpeg));
    }

    #[test]
    fn test_exif_tags_accept_object_and_pairs() {
        let from_object =
            CameraOptions::from_args(&json!({"exif_tags": {"IFD0.Artist": "me"}})).unwrap();
        let from_pairs =
            CameraOptions::from_args(&json!({"exif_tags": [["IFD0.Artist", "me"]]})).unwrap();

        let expected = vec![("IFD0.Artist".to_string(), "me".to_string())];
        assert_eq!(from_object.settings.exif_tags, expected);
        assert_eq!(from_pairs.settings.exif_tags, expected);
    }

    #[test]
    fn test_null_values_mean_unset() {
        let options =
            CameraOptions::from_args(&json!({"resolution": null, "thumbnail": null})).unwrap();
        assert_eq!(options.settings.resolution, None);
        assert_eq!(options.capture.jpeg.unwrap().thumbnail, None);
    }
}
