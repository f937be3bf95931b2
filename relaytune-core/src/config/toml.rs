//! Simple TOML parser for tuning configuration
//!
//! This is a minimal TOML parser that handles only the subset needed for
//! autotune configuration. It does NOT support the full TOML spec.
//!
//! Supported features:
//! - Key = value pairs (string, integer, float)
//! - `[autotune]` root section
//! - `[autotune.<loop>]` per-loop sections
//! - Comments (# ...)
//!
//! Per-loop sections only override the keys they set; everything else is
//! taken from `[autotune]`, wherever it appears in the file.
//!
//! ```toml
//! [autotune]
//! output_step = 30.0
//! noise_band = 0.5
//! control = "pi"
//! lookback_s = 10
//!
//! [autotune.left]
//! control = "pid"
//! ```

use heapless::{String, Vec};

use super::types::{
    ControlType, Lookback, LoopTuning, TunerConfig, TuningSettings, MAX_LABEL_LEN, MAX_LOOPS,
};

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Invalid or unknown section header
    InvalidSection,
    /// Invalid value type
    InvalidValue,
    /// Too many items (exceeded heapless capacity)
    TooManyItems,
    /// Controller type is neither "pi" nor "pid"
    UnknownControl,
}

/// Current parsing context
#[derive(Debug, Clone, PartialEq)]
enum Section {
    Root,
    Autotune,
    Loop(usize),
}

/// Keys set explicitly in one section
#[derive(Debug, Clone, Default)]
struct Overrides {
    output_step: Option<f32>,
    noise_band: Option<f32>,
    control: Option<ControlType>,
    lookback_s: Option<i32>,
}

impl Overrides {
    fn apply(&self, base: TunerConfig) -> TunerConfig {
        let mut config = base;
        if let Some(step) = self.output_step {
            config.output_step = step;
        }
        if let Some(band) = self.noise_band {
            config.noise_band = band;
        }
        if let Some(control) = self.control {
            config.control_type = control;
        }
        if let Some(seconds) = self.lookback_s {
            config.lookback = Lookback::from_seconds(seconds);
        }
        config
    }
}

/// Parse TOML text into tuning settings
pub fn parse_tuning(input: &str) -> Result<TuningSettings, ParseError> {
    let mut section = Section::Root;
    let mut root = Overrides::default();
    let mut loops: Vec<(String<MAX_LABEL_LEN>, Overrides), MAX_LOOPS> = Vec::new();

    for line in input.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = open_section(&line[1..line.len() - 1], &mut loops)?;
            continue;
        }

        if let Some((key, value)) = parse_key_value(line) {
            match section {
                // Keys outside any section are not ours
                Section::Root => {}
                Section::Autotune => apply_value(key, value, &mut root)?,
                Section::Loop(index) => {
                    let (_, overrides) = loops.get_mut(index).ok_or(ParseError::InvalidSection)?;
                    apply_value(key, value, overrides)?;
                }
            }
        }
    }

    let defaults = root.apply(TunerConfig::default());
    let mut settings = TuningSettings {
        defaults,
        loops: Vec::new(),
    };
    for (name, overrides) in loops {
        settings
            .loops
            .push(LoopTuning {
                name,
                config: overrides.apply(defaults),
            })
            .map_err(|_| ParseError::TooManyItems)?;
    }

    Ok(settings)
}

/// Parse a section header like "autotune" or "autotune.left"
///
/// Reopening an existing loop section continues filling it.
fn open_section(
    header: &str,
    loops: &mut Vec<(String<MAX_LABEL_LEN>, Overrides), MAX_LOOPS>,
) -> Result<Section, ParseError> {
    let header = header.trim();

    if header == "autotune" {
        return Ok(Section::Autotune);
    }

    let name = header
        .strip_prefix("autotune.")
        .map(str::trim)
        .filter(|n| !n.is_empty() && !n.contains('.'))
        .ok_or(ParseError::InvalidSection)?;

    if let Some(index) = loops.iter().position(|(n, _)| n.as_str() == name) {
        return Ok(Section::Loop(index));
    }

    let mut label = String::new();
    label
        .push_str(name)
        .map_err(|_| ParseError::TooManyItems)?;
    loops
        .push((label, Overrides::default()))
        .map_err(|_| ParseError::TooManyItems)?;

    Ok(Section::Loop(loops.len() - 1))
}

/// Parse a key = value line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    // Remove inline comments
    let value = if let Some(hash_pos) = value.find('#') {
        // Make sure # is not inside a string
        let quote_count = value[..hash_pos].matches('"').count();
        if quote_count % 2 == 0 {
            value[..hash_pos].trim()
        } else {
            value
        }
    } else {
        value
    };

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

fn apply_value(key: &str, value: &str, overrides: &mut Overrides) -> Result<(), ParseError> {
    match key {
        "output_step" => overrides.output_step = Some(parse_float(value)?),
        "noise_band" => overrides.noise_band = Some(parse_float(value)?),
        "control" => overrides.control = Some(parse_control(value)?),
        "lookback_s" => overrides.lookback_s = Some(parse_int(value)?),
        _ => {} // Ignore unknown keys
    }
    Ok(())
}

fn parse_string(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        // Allow unquoted strings for simple values
        value
    }
}

fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue)
}

fn parse_float(value: &str) -> Result<f32, ParseError> {
    let v: f32 = value.parse().map_err(|_| ParseError::InvalidValue)?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(ParseError::InvalidValue)
    }
}

fn parse_control(value: &str) -> Result<ControlType, ParseError> {
    let s = parse_string(value);
    if s.eq_ignore_ascii_case("pi") {
        Ok(ControlType::Pi)
    } else if s.eq_ignore_ascii_case("pid") {
        Ok(ControlType::Pid)
    } else {
        Err(ParseError::UnknownControl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value_strips_comments() {
        assert_eq!(
            parse_key_value("noise_band = 0.25 # counts"),
            Some(("noise_band", "0.25"))
        );
        assert_eq!(
            parse_key_value(r#"control = "p#d""#),
            Some(("control", r#""p#d""#))
        );
        assert_eq!(parse_key_value("novalue ="), None);
    }

    #[test]
    fn test_parse_empty_gives_defaults() {
        let settings = parse_tuning("").unwrap();
        assert_eq!(settings.defaults, TunerConfig::default());
        assert!(settings.loops.is_empty());
    }

    #[test]
    fn test_parse_root_section() {
        let settings = parse_tuning(
            r#"
# Motor velocity loops
[autotune]
output_step = 40
noise_band = 1.5
control = "PID"
lookback_s = 30
"#,
        )
        .unwrap();

        let d = settings.defaults;
        assert_eq!(d.output_step, 40.0);
        assert_eq!(d.noise_band, 1.5);
        assert_eq!(d.control_type, ControlType::Pid);
        assert_eq!(d.lookback.samples, 100);
        assert_eq!(d.lookback.sample_time_ms, 300);
    }

    #[test]
    fn test_loop_sections_inherit_root_values() {
        let settings = parse_tuning(
            r#"
[autotune.left]
control = "pid"

[autotune]
output_step = 20.0

[autotune.right]
noise_band = 2.0
lookback_s = 5
"#,
        )
        .unwrap();

        assert_eq!(settings.loops.len(), 2);

        let left = settings.for_loop("left");
        assert_eq!(left.control_type, ControlType::Pid);
        // Root section appeared later but still applies
        assert_eq!(left.output_step, 20.0);

        let right = settings.for_loop("right");
        assert_eq!(right.control_type, ControlType::Pi);
        assert_eq!(right.noise_band, 2.0);
        assert_eq!(right.lookback.samples, 20);
    }

    #[test]
    fn test_reopened_loop_section_merges() {
        let settings = parse_tuning(
            "[autotune.arm]\noutput_step = 5\n[autotune]\n[autotune.arm]\nnoise_band = 0.1\n",
        )
        .unwrap();

        assert_eq!(settings.loops.len(), 1);
        let arm = settings.for_loop("arm");
        assert_eq!(arm.output_step, 5.0);
        assert_eq!(arm.noise_band, 0.1);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let settings = parse_tuning("[autotune]\nsettle_time = 3\n").unwrap();
        assert_eq!(settings.defaults, TunerConfig::default());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_tuning("[heater]\n").unwrap_err(),
            ParseError::InvalidSection
        );
        assert_eq!(
            parse_tuning("[autotune.a.b]\n").unwrap_err(),
            ParseError::InvalidSection
        );
        assert_eq!(
            parse_tuning("[autotune]\nnoise_band = wide\n").unwrap_err(),
            ParseError::InvalidValue
        );
        assert_eq!(
            parse_tuning("[autotune]\noutput_step = nan\n").unwrap_err(),
            ParseError::InvalidValue
        );
        assert_eq!(
            parse_tuning("[autotune]\ncontrol = \"pd\"\n").unwrap_err(),
            ParseError::UnknownControl
        );
        assert_eq!(
            parse_tuning("[autotune.a]\n[autotune.b]\n[autotune.c]\n[autotune.d]\n[autotune.e]\n")
                .unwrap_err(),
            ParseError::TooManyItems
        );
        assert_eq!(
            parse_tuning("[autotune.a_name_well_past_sixteen]\n").unwrap_err(),
            ParseError::TooManyItems
        );
    }
}
