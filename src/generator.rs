//! Course step generation.
//!
//! Each course becomes two clicks: one on the course entry in the list, one on
//! the play button, followed by a wait long enough for the video to finish.

use std::fmt;

use crate::action::{check_wait, parse_or_zero, Action};
use crate::error::{AutomatorError, Result};

/// Time given to a course page to load after it is selected.
pub const SELECT_WAIT_SECS: f64 = 2.0;

/// Largest course list a single generate accepts.
pub const MAX_COURSES: i32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub start_x: i32,
    pub start_y: i32,
    pub play_x: i32,
    pub play_y: i32,
    pub interval_x: i32,
    pub interval_y: i32,
    pub course_count: i32,
    pub video_duration_secs: f64,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.course_count <= 0 {
            return Err(AutomatorError::invalid(format!("course count must be greater than 0, got {}", self.course_count)));
        }
        if self.course_count > MAX_COURSES {
            return Err(AutomatorError::invalid(format!(
                "course count must be at most {MAX_COURSES}, got {}",
                self.course_count
            )));
        }
        check_wait("video duration", self.video_duration_secs)
    }

    /// Position of the course entry for the zero-based course `i`.
    pub fn course_position(&self, i: i32) -> Result<(i32, i32)> {
        let offset = |start: i32, step: i32| step.checked_mul(i).and_then(|d| start.checked_add(d));
        match (offset(self.start_x, self.interval_x), offset(self.start_y, self.interval_y)) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(AutomatorError::invalid(format!("position of course {} is off the coordinate range", i + 1))),
        }
    }

    /// Estimated wall-clock time of one pass over the generated script.
    pub fn estimated_secs(&self) -> f64 {
        f64::from(self.course_count) * (self.video_duration_secs + SELECT_WAIT_SECS)
    }
}

/// Builds the select/play pair for every course. Does not touch any existing script.
pub fn generate(settings: &Settings) -> Result<Vec<Action>> {
    settings.validate()?;
    let mut actions = Vec::with_capacity(settings.course_count as usize * 2);
    for i in 0..settings.course_count {
        let (x, y) = settings.course_position(i)?;
        actions.push(Action::click(x, y, SELECT_WAIT_SECS, format!("select course {}", i + 1))?);
        actions.push(Action::click(
            settings.play_x,
            settings.play_y,
            settings.video_duration_secs,
            format!("play course {}", i + 1),
        )?);
    }
    Ok(actions)
}

// -------------- Preview --------------
#[derive(Clone, Debug)]
pub struct Preview {
    pub settings: Settings,
    pub actions: Vec<Action>,
    pub total_secs: f64,
}

impl Preview {
    pub fn new(settings: &Settings) -> Result<Self> {
        let actions = generate(settings)?;
        Ok(Self { settings: *settings, actions, total_secs: settings.estimated_secs() })
    }

    pub fn total_minutes(&self) -> f64 { self.total_secs / 60.0 }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(50);
        writeln!(f, "Step preview ({} courses):", self.settings.course_count)?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;
        writeln!(f, "Play button: ({}, {})", self.settings.play_x, self.settings.play_y)?;
        writeln!(f, "Video duration: {}s", self.settings.video_duration_secs)?;
        writeln!(f)?;
        for (n, action) in self.actions.iter().enumerate() {
            writeln!(f, "step {}: {}", n + 1, action.description)?;
            writeln!(f, "   position: ({}, {})", action.x, action.y)?;
            writeln!(f, "   wait: {}s", action.wait_seconds)?;
            writeln!(f)?;
        }
        writeln!(f, "{rule}")?;
        writeln!(f, "Total steps: {}", self.actions.len())?;
        write!(f, "Estimated time: {:.1} minutes", self.total_minutes())
    }
}

// -------------- Settings form --------------
/// The generator fields as typed by the user or stored in a script file.
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsForm {
    pub start_x: String,
    pub start_y: String,
    pub play_x: String,
    pub play_y: String,
    pub interval_x: String,
    pub interval_y: String,
    pub course_count: String,
    pub video_duration: String,
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self {
            start_x: String::new(),
            start_y: String::new(),
            play_x: String::new(),
            play_y: String::new(),
            interval_x: String::new(),
            interval_y: String::new(),
            course_count: "5".to_owned(),
            video_duration: "300".to_owned(),
        }
    }
}

/// Stored key names, in file order.
pub const SETTING_KEYS: [&str; 8] =
    ["start_x", "start_y", "play_x", "play_y", "interval_x", "interval_y", "course_count", "video_duration"];

impl SettingsForm {
    pub fn parse(&self) -> Result<Settings> {
        Ok(Settings {
            start_x: parse_required("start X", &self.start_x)?,
            start_y: parse_required("start Y", &self.start_y)?,
            play_x: parse_required("play X", &self.play_x)?,
            play_y: parse_required("play Y", &self.play_y)?,
            interval_x: parse_or_zero("X interval", &self.interval_x)?,
            interval_y: parse_or_zero("Y interval", &self.interval_y)?,
            course_count: parse_required("course count", &self.course_count)?,
            video_duration_secs: parse_required("video duration", &self.video_duration)?,
        })
    }

    /// Maps a stored key onto its field. Returns `Ok(false)` for keys this form
    /// does not know. Non-empty values must parse as the field's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        let value = value.trim();
        let (slot, check): (&mut String, fn(&str, &str) -> Result<()>) = match key {
            "start_x" | "startX" => (&mut self.start_x, check_int),
            "start_y" | "startY" => (&mut self.start_y, check_int),
            "play_x" | "playX" => (&mut self.play_x, check_int),
            "play_y" | "playY" => (&mut self.play_y, check_int),
            "interval_x" | "intervalX" => (&mut self.interval_x, check_int),
            "interval_y" | "intervalY" => (&mut self.interval_y, check_int),
            "course_count" | "courseCount" => (&mut self.course_count, check_int),
            "video_duration" | "videoDuration" | "videoDurationSeconds" => (&mut self.video_duration, check_float),
            _ => return Ok(false),
        };
        if !value.is_empty() {
            check(key, value)?;
        }
        *slot = value.to_owned();
        Ok(true)
    }

    /// Fails on the first non-empty field that [`set`](Self::set) would refuse.
    pub fn check(&self) -> Result<()> {
        let mut scratch = Self::default();
        for key in SETTING_KEYS {
            scratch.set(key, self.get(key).unwrap_or_default())?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "start_x" => &self.start_x,
            "start_y" => &self.start_y,
            "play_x" => &self.play_x,
            "play_y" => &self.play_y,
            "interval_x" => &self.interval_x,
            "interval_y" => &self.interval_y,
            "course_count" => &self.course_count,
            "video_duration" => &self.video_duration,
            _ => return None,
        };
        Some(value)
    }
}

impl From<&Settings> for SettingsForm {
    fn from(s: &Settings) -> Self {
        Self {
            start_x: s.start_x.to_string(),
            start_y: s.start_y.to_string(),
            play_x: s.play_x.to_string(),
            play_y: s.play_y.to_string(),
            interval_x: s.interval_x.to_string(),
            interval_y: s.interval_y.to_string(),
            course_count: s.course_count.to_string(),
            video_duration: s.video_duration_secs.to_string(),
        }
    }
}

fn parse_required<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AutomatorError::invalid(format!("{field} is required")));
    }
    raw.parse().map_err(|_| AutomatorError::invalid(format!("{field}: '{raw}' is not a valid number")))
}

fn check_int(key: &str, value: &str) -> Result<()> {
    value.parse::<i32>().map(drop).map_err(|_| AutomatorError::invalid(format!("setting {key}: '{value}' is not an integer")))
}

fn check_float(key: &str, value: &str) -> Result<()> {
    value.parse::<f64>().map(drop).map_err(|_| AutomatorError::invalid(format!("setting {key}: '{value}' is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    fn settings(course_count: i32) -> Settings {
        Settings {
            start_x: 100,
            start_y: 100,
            play_x: 500,
            play_y: 500,
            interval_x: 0,
            interval_y: 50,
            course_count,
            video_duration_secs: 300.0,
        }
    }

    #[test]
    fn test_three_courses() {
        let actions = generate(&settings(3)).unwrap();
        assert_eq!(actions.len(), 6);
        let positions: Vec<_> = actions.iter().map(Action::position).collect();
        assert_eq!(positions, [(100, 100), (500, 500), (100, 150), (500, 500), (100, 200), (500, 500)]);
        assert_eq!(actions[0].description, "select course 1");
        assert_eq!(actions[5].description, "play course 3");
        assert!(actions.iter().all(|a| a.kind == ActionKind::Click));
    }

    #[test]
    fn test_alternating_layout() {
        for count in 1..=12 {
            let mut s = settings(count);
            s.interval_x = -7;
            s.interval_y = 13;
            let actions = generate(&s).unwrap();
            assert_eq!(actions.len(), 2 * count as usize);
            for (i, pair) in actions.chunks(2).enumerate() {
                let i = i as i32;
                assert_eq!(pair[0].position(), (100 - 7 * i, 100 + 13 * i));
                assert_eq!(pair[0].wait_seconds, SELECT_WAIT_SECS);
                assert_eq!(pair[1].position(), (500, 500));
                assert_eq!(pair[1].wait_seconds, 300.0);
            }
        }
    }

    #[test]
    fn test_zero_courses_rejected() {
        assert!(matches!(generate(&settings(0)), Err(AutomatorError::InvalidInput(_))));
        assert!(matches!(generate(&settings(-2)), Err(AutomatorError::InvalidInput(_))));
    }

    #[test]
    fn test_course_count_capped() {
        assert!(generate(&settings(MAX_COURSES)).is_ok());
        assert!(matches!(generate(&settings(2_000_000_000)), Err(AutomatorError::InvalidInput(_))));
        assert!(Preview::new(&settings(MAX_COURSES + 1)).is_err());
    }

    #[test]
    fn test_form_check() {
        let mut form = SettingsForm { start_x: "100".into(), interval_x: "".into(), ..Default::default() };
        assert!(form.check().is_ok());
        form.start_x = "10px".into();
        assert!(matches!(form.check(), Err(AutomatorError::InvalidInput(_))));
        form.start_x = "10".into();
        form.course_count = "3.5".into();
        assert!(form.check().is_err());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let mut s = settings(2);
        s.video_duration_secs = -1.0;
        assert!(generate(&s).is_err());
    }

    #[test]
    fn test_coordinate_overflow_rejected() {
        let mut s = settings(3);
        s.start_x = i32::MAX - 1;
        s.interval_x = 1;
        assert!(matches!(generate(&s), Err(AutomatorError::InvalidInput(_))));
    }

    #[test]
    fn test_preview_total() {
        let preview = Preview::new(&settings(5)).unwrap();
        assert_eq!(preview.total_secs, 1510.0);
        assert_eq!(preview.actions.len(), 10);
        let text = preview.to_string();
        assert!(text.contains("step 10: play course 5"));
        assert!(text.contains("Total steps: 10"));
        assert!(text.ends_with("Estimated time: 25.2 minutes"));
    }

    #[test]
    fn test_form_parse() {
        let form = SettingsForm {
            start_x: "100".into(),
            start_y: "100".into(),
            play_x: "500".into(),
            play_y: " 500 ".into(),
            interval_y: "50".into(),
            course_count: "3".into(),
            ..Default::default()
        };
        let parsed = form.parse().unwrap();
        assert_eq!(parsed, Settings { video_duration_secs: 300.0, ..settings(3) });
        assert_eq!(parsed.interval_x, 0);
    }

    #[test]
    fn test_form_non_numeric() {
        let form = SettingsForm { start_x: "ten".into(), start_y: "1".into(), play_x: "1".into(), play_y: "1".into(), ..Default::default() };
        assert!(matches!(form.parse(), Err(AutomatorError::InvalidInput(_))));
        let missing = SettingsForm::default();
        assert!(missing.parse().is_err());
    }

    #[test]
    fn test_form_set_mapping() {
        let mut form = SettingsForm::default();
        assert!(form.set("startX", "42").unwrap());
        assert!(form.set("video_duration", "12.5").unwrap());
        assert!(form.set("interval_y", "").unwrap());
        assert!(!form.set("window_title", "whatever").unwrap());
        assert!(form.set("course_count", "lots").is_err());
        assert_eq!(form.get("start_x"), Some("42"));
        assert_eq!(form.get("video_duration"), Some("12.5"));
        assert_eq!(form.course_count, "5");
        assert_eq!(form.get("nope"), None);
    }

    #[test]
    fn test_form_from_settings() {
        let form = SettingsForm::from(&settings(4));
        assert_eq!(form.parse().unwrap(), settings(4));
    }
}
