//! Filename grammar for tiled images and standalone JPEG2000 images
//!
//! Tiled image files use a fixed-width layout:
//!   `YYYY_MM_DD_HHMMSS_OBSV_INS_DET_MEA[_ZZ[_XXX_YYY]]`
//! JPEG2000 images use the delimited layout:
//!   `YYYY_MM_DD__HH_MM_SS_FF__OBS_INS_DET_MEAS.jp2`
//! Both are parsed into the same `FilenameDescriptor`.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::ParseError;

/// Instrument whose tiles are rendered as PNG instead of JPEG
pub const PNG_INSTRUMENT: &str = "LAS";

/// Length of a tiled image stem without zoom level
pub const IMAGE_STEM_LEN: usize = 34;
/// Length of a metadata stem (image stem + `_ZZ`)
pub const METADATA_STEM_LEN: usize = 37;
/// Length of a tile stem (metadata stem + `_XXX_YYY`)
pub const TILE_STEM_LEN: usize = 45;

static JP2_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<year>\d{4})_(?P<month>\d{2})_(?P<day>\d{2})__",
        r"(?P<hour>\d{2})_(?P<min>\d{2})_(?P<sec>\d{2})_",
        r"(?P<microsec>\d{2,3})__",
        r"(?P<obs>[a-zA-Z0-9]{3})_(?P<inst>[a-zA-Z0-9]{3})_",
        r"(?P<det>[a-zA-Z0-9]{3})_(?P<meas>[a-zA-Z0-9]{2,11})(?:\.jp2)?$",
    ))
    .expect("JPEG2000 filename pattern must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Digits,
    Alphanumeric,
}

impl Charset {
    fn accepts(self, value: &str) -> bool {
        match self {
            Charset::Digits => value.bytes().all(|b| b.is_ascii_digit()),
            Charset::Alphanumeric => value.bytes().all(|b| b.is_ascii_alphanumeric()),
        }
    }
}

/// One fixed-width field of the tiled layout
#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    start: usize,
    end: usize,
    charset: Charset,
}

const fn field(name: &'static str, start: usize, end: usize, charset: Charset) -> Field {
    Field { name, start, end, charset }
}

const YEAR: Field = field("year", 0, 4, Charset::Digits);
const MONTH: Field = field("month", 5, 7, Charset::Digits);
const DAY: Field = field("day", 8, 10, Charset::Digits);
const HOUR: Field = field("hour", 11, 13, Charset::Digits);
const MINUTE: Field = field("minute", 13, 15, Charset::Digits);
const SECOND: Field = field("second", 15, 17, Charset::Digits);
const OBSERVATORY: Field = field("observatory", 18, 22, Charset::Alphanumeric);
const INSTRUMENT: Field = field("instrument", 23, 26, Charset::Alphanumeric);
const DETECTOR: Field = field("detector", 27, 30, Charset::Alphanumeric);
const MEASUREMENT: Field = field("measurement", 31, 34, Charset::Alphanumeric);
const ZOOM: Field = field("zoom level", 35, 37, Charset::Digits);
const TILE_X: Field = field("tile x", 38, 41, Charset::Digits);
const TILE_Y: Field = field("tile y", 42, 45, Charset::Digits);

/// Offsets that must hold `_`, in ascending order
const SEPARATORS: [usize; 10] = [4, 7, 10, 17, 22, 26, 30, 34, 37, 41];

/// Structured fields decoded from an image or tile filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameDescriptor {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Fractional seconds scaled to microseconds (`13` and `130` both read as 130000)
    pub microsecond: Option<u32>,
    pub observatory: String,
    pub instrument: String,
    pub detector: String,
    pub measurement: String,
    pub zoom_level: Option<u32>,
    pub tile_x: Option<u32>,
    pub tile_y: Option<u32>,
    /// Observation time, already validated against the calendar
    pub timestamp: NaiveDateTime,
}

impl FilenameDescriptor {
    /// Key into the measurement table: detector followed by measurement
    pub fn measurement_key(&self) -> String {
        format!("{}{}", self.detector, self.measurement)
    }

    /// Extension used for this image's tiles
    pub fn tile_extension(&self) -> &'static str {
        if self.instrument == PNG_INSTRUMENT {
            "png"
        } else {
            "jpg"
        }
    }
}

/// Fractional-second digits are decimal places, so pad them to six before reading
fn fraction_micros(name: &str, fraction: &str) -> Result<u32, ParseError> {
    format!("{:0<6}", fraction)
        .parse::<u32>()
        .map_err(|_| ParseError::Field {
            name: name.to_string(),
            field: "microsec",
        })
}

/// Parse a standalone JPEG2000 filename (with or without the `.jp2` suffix)
pub fn parse_jp2(name: &str) -> Result<FilenameDescriptor, ParseError> {
    let caps = JP2_PATTERN
        .captures(name)
        .ok_or_else(|| ParseError::Jp2Pattern { name: name.to_string() })?;

    let digits = |group: &'static str| -> Result<u32, ParseError> {
        caps[group].parse::<u32>().map_err(|_| ParseError::Field {
            name: name.to_string(),
            field: group,
        })
    };

    let year = digits("year")? as i32;
    let month = digits("month")?;
    let day = digits("day")?;
    let hour = digits("hour")?;
    let minute = digits("min")?;
    let second = digits("sec")?;
    let microsecond = fraction_micros(name, &caps["microsec"])?;

    let timestamp = calendar_timestamp(name, year, month, day, hour, minute, second, microsecond)?;

    Ok(FilenameDescriptor {
        year,
        month,
        day,
        hour,
        minute,
        second,
        microsecond: Some(microsecond),
        observatory: caps["obs"].to_string(),
        instrument: caps["inst"].to_string(),
        detector: caps["det"].to_string(),
        measurement: caps["meas"].to_string(),
        zoom_level: None,
        tile_x: None,
        tile_y: None,
        timestamp,
    })
}

/// Parse a tiled image, metadata or tile name.
///
/// Any extension is ignored. The stem decides which optional fields are present:
/// 34 characters is a bare image, 37 adds the zoom level, 45 adds tile x/y.
pub fn parse_tiled(name: &str) -> Result<FilenameDescriptor, ParseError> {
    let stem = name.split_once('.').map_or(name, |(stem, _)| stem);

    if !matches!(stem.len(), IMAGE_STEM_LEN | METADATA_STEM_LEN | TILE_STEM_LEN) {
        return Err(ParseError::Length {
            name: name.to_string(),
            len: stem.len(),
        });
    }

    let bytes = stem.as_bytes();
    if let Some(&offset) = SEPARATORS
        .iter()
        .take_while(|&&offset| offset < stem.len())
        .find(|&&offset| bytes[offset] != b'_')
    {
        return Err(ParseError::Separator {
            name: name.to_string(),
            offset,
        });
    }

    let year = number(name, stem, YEAR)? as i32;
    let month = number(name, stem, MONTH)?;
    let day = number(name, stem, DAY)?;
    let hour = number(name, stem, HOUR)?;
    let minute = number(name, stem, MINUTE)?;
    let second = number(name, stem, SECOND)?;
    let timestamp = calendar_timestamp(name, year, month, day, hour, minute, second, 0)?;

    let zoom_level = if stem.len() >= METADATA_STEM_LEN {
        Some(number(name, stem, ZOOM)?)
    } else {
        None
    };
    let (tile_x, tile_y) = if stem.len() == TILE_STEM_LEN {
        (Some(number(name, stem, TILE_X)?), Some(number(name, stem, TILE_Y)?))
    } else {
        (None, None)
    };

    Ok(FilenameDescriptor {
        year,
        month,
        day,
        hour,
        minute,
        second,
        microsecond: None,
        observatory: slice(name, stem, OBSERVATORY)?.to_string(),
        instrument: slice(name, stem, INSTRUMENT)?.to_string(),
        detector: slice(name, stem, DETECTOR)?.to_string(),
        measurement: slice(name, stem, MEASUREMENT)?.to_string(),
        zoom_level,
        tile_x,
        tile_y,
        timestamp,
    })
}

/// File name of `path` as UTF-8, or a parse error naming the path
pub fn file_name_str(path: &Path) -> Result<&str, ParseError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ParseError::NotUtf8(path.to_path_buf()))
}

fn slice<'a>(name: &str, stem: &'a str, field: Field) -> Result<&'a str, ParseError> {
    stem.get(field.start..field.end)
        .filter(|value| field.charset.accepts(value))
        .ok_or_else(|| ParseError::Field {
            name: name.to_string(),
            field: field.name,
        })
}

fn number(name: &str, stem: &str, field: Field) -> Result<u32, ParseError> {
    slice(name, stem, field)?
        .parse::<u32>()
        .map_err(|_| ParseError::Field {
            name: name.to_string(),
            field: field.name,
        })
}

#[allow(clippy::too_many_arguments)]
fn calendar_timestamp(
    name: &str,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    microsecond: u32,
) -> Result<NaiveDateTime, ParseError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_micro_opt(hour, minute, second, microsecond))
        .ok_or_else(|| ParseError::Timestamp { name: name.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: &str = "2003_01_17_000205_SOHO_EIT_EIT_195_10_512_256";

    #[test]
    fn test_tiled_fields_match_offsets() {
        let desc = parse_tiled(TILE).unwrap();

        assert_eq!(desc.year.to_string(), &TILE[0..4]);
        assert_eq!(format!("{:02}", desc.month), &TILE[5..7]);
        assert_eq!(format!("{:02}", desc.day), &TILE[8..10]);
        assert_eq!(format!("{:02}", desc.hour), &TILE[11..13]);
        assert_eq!(format!("{:02}", desc.minute), &TILE[13..15]);
        assert_eq!(format!("{:02}", desc.second), &TILE[15..17]);
        assert_eq!(desc.observatory, &TILE[18..22]);
        assert_eq!(desc.instrument, &TILE[23..26]);
        assert_eq!(desc.detector, &TILE[27..30]);
        assert_eq!(desc.measurement, &TILE[31..34]);
        assert_eq!(format!("{:02}", desc.zoom_level.unwrap()), &TILE[35..37]);
        assert_eq!(format!("{:03}", desc.tile_x.unwrap()), &TILE[38..41]);
        assert_eq!(format!("{:03}", desc.tile_y.unwrap()), &TILE[42..45]);
    }

    #[test]
    fn test_tiled_optional_fields_follow_length() {
        let image = parse_tiled(&TILE[..IMAGE_STEM_LEN]).unwrap();
        assert_eq!(image.zoom_level, None);
        assert_eq!(image.tile_x, None);

        let meta = parse_tiled(&TILE[..METADATA_STEM_LEN]).unwrap();
        assert_eq!(meta.zoom_level, Some(10));
        assert_eq!(meta.tile_y, None);

        let with_ext = parse_tiled(&format!("{}.jpg", TILE)).unwrap();
        assert_eq!(with_ext.tile_y, Some(256));
    }

    #[test]
    fn test_short_names_are_rejected() {
        for len in 0..IMAGE_STEM_LEN {
            let err = parse_tiled(&TILE[..len]).unwrap_err();
            assert!(matches!(err, ParseError::Length { .. }), "len {}: {:?}", len, err);
        }
        assert!(parse_tiled(&TILE[..40]).is_err());
    }

    #[test]
    fn test_non_alphanumeric_detector_is_rejected() {
        let bad = "2003_01_17_000205_SOHO_EIT_E-T_195_10";
        assert_eq!(
            parse_tiled(bad),
            Err(ParseError::Field {
                name: bad.to_string(),
                field: "detector"
            })
        );

        let bad_jp2 = "2003_01_17__00_02_05_123__SOH_EIT_E#T_195.jp2";
        assert!(parse_jp2(bad_jp2).is_err());
    }

    #[test]
    fn test_misplaced_separator_is_rejected() {
        let bad = "2003-01_17_000205_SOHO_EIT_EIT_195";
        assert_eq!(
            parse_tiled(bad),
            Err(ParseError::Separator {
                name: bad.to_string(),
                offset: 4
            })
        );
    }

    #[test]
    fn test_invalid_calendar_date_is_rejected() {
        let bad = "2003_02_30_000205_SOHO_EIT_EIT_195";
        assert!(matches!(parse_tiled(bad), Err(ParseError::Timestamp { .. })));
    }

    #[test]
    fn test_non_ascii_does_not_panic() {
        let odd = "2003_01_17_000205_SOHÖ_EIT_EIT_19";
        assert!(parse_tiled(odd).is_err());
    }

    #[test]
    fn test_jp2_fields() {
        let desc = parse_jp2("2011_11_17__08_13_08_13__SDO_AIA_AIA_304.jp2").unwrap();
        assert_eq!(desc.year, 2011);
        assert_eq!(desc.month, 11);
        assert_eq!(desc.day, 17);
        assert_eq!(desc.hour, 8);
        assert_eq!(desc.minute, 13);
        assert_eq!(desc.second, 8);
        assert_eq!(desc.microsecond, Some(130_000));
        assert_eq!(desc.observatory, "SDO");
        assert_eq!(desc.instrument, "AIA");
        assert_eq!(desc.detector, "AIA");
        assert_eq!(desc.measurement, "304");
        assert_eq!(desc.measurement_key(), "AIA304");

        let long = parse_jp2("2011_11_17__08_13_08_130__SDO_HMI_HMI_continuum").unwrap();
        assert_eq!(long.measurement, "continuum");
        assert_eq!(long.microsecond, Some(130_000));
        assert_eq!(long.timestamp, desc.timestamp);

        assert!(parse_jp2("2011_11_17__08_13_08_13__SDO_AIA_AIA_304.jpg").is_err());
        assert!(parse_jp2("2011_11_17__08_13_08_13__SDO_AIA_AIA_3.jp2").is_err());
    }

    #[test]
    fn test_jp2_fraction_is_scaled_by_width() {
        let short = parse_jp2("2011_11_17__08_13_08_05__SDO_AIA_AIA_304").unwrap();
        let long = parse_jp2("2011_11_17__08_13_08_005__SDO_AIA_AIA_304").unwrap();
        assert_eq!(short.microsecond, Some(50_000));
        assert_eq!(long.microsecond, Some(5_000));
        assert!(long.timestamp < short.timestamp);
        assert_eq!(
            short.timestamp.format("%H:%M:%S%.3f").to_string(),
            "08:13:08.050"
        );
    }

    #[test]
    fn test_jp2_and_tiled_agree_on_shared_fields() {
        let jp2 = parse_jp2("2003_01_17__00_02_05_123__SOH_EIT_EIT_195.jp2").unwrap();
        let tiled = parse_tiled("2003_01_17_000205_SOHO_EIT_EIT_195").unwrap();

        assert_eq!(jp2.year, tiled.year);
        assert_eq!(jp2.month, tiled.month);
        assert_eq!(jp2.day, tiled.day);
        assert_eq!(jp2.hour, tiled.hour);
        assert_eq!(jp2.minute, tiled.minute);
        assert_eq!(jp2.second, tiled.second);
        assert_eq!(jp2.instrument, tiled.instrument);
        assert_eq!(jp2.detector, tiled.detector);
        assert_eq!(jp2.measurement, tiled.measurement);
        assert_eq!(jp2.measurement_key(), tiled.measurement_key());
    }

    #[test]
    fn test_tile_extension() {
        let las = parse_tiled("2003_01_17_000205_SOHO_LAS_0C2_0WL").unwrap();
        assert_eq!(las.tile_extension(), "png");
        let eit = parse_tiled("2003_01_17_000205_SOHO_EIT_EIT_195").unwrap();
        assert_eq!(eit.tile_extension(), "jpg");
    }
}
