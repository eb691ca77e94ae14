use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AutomatorError, Result};

// -------------- Actions --------------
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Click,
    Wait,
    Move,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Click, ActionKind::Wait, ActionKind::Move];

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Wait => "wait",
            ActionKind::Move => "move",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

/// Any letter case of `click`/`wait`/`move`, plus the localized labels older files use.
impl FromStr for ActionKind {
    type Err = AutomatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "click" | "点击" => Ok(ActionKind::Click),
            "wait" | "等待" => Ok(ActionKind::Wait),
            "move" | "移动" => Ok(ActionKind::Move),
            other => Err(AutomatorError::invalid(format!("unknown step type '{other}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One step of a script. `Wait` actions keep their coordinates but inject nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub x: i32,
    pub y: i32,
    #[serde(rename = "wait")]
    pub wait_seconds: f64,
    #[serde(rename = "desc", default)]
    pub description: String,
}

impl Action {
    pub fn new(kind: ActionKind, x: i32, y: i32, wait_seconds: f64, description: impl Into<String>) -> Result<Self> {
        check_wait("wait", wait_seconds)?;
        Ok(Self { kind, x, y, wait_seconds, description: description.into() })
    }

    pub fn click(x: i32, y: i32, wait_seconds: f64, description: impl Into<String>) -> Result<Self> {
        Self::new(ActionKind::Click, x, y, wait_seconds, description)
    }

    pub fn position(&self) -> (i32, i32) { (self.x, self.y) }
}

pub(crate) fn check_wait(field: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(AutomatorError::invalid(format!("{field} must be a non-negative number of seconds, got {secs}")));
    }
    Ok(())
}

// -------------- Script --------------
/// Ordered list of actions; position is playback order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Script {
    actions: Vec<Action>,
}

impl Script {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.actions.len() }
    pub fn is_empty(&self) -> bool { self.actions.is_empty() }
    pub fn iter(&self) -> std::slice::Iter<'_, Action> { self.actions.iter() }
    pub fn actions(&self) -> &[Action] { &self.actions }

    pub fn get(&self, index: usize) -> Result<&Action> {
        self.actions.get(index).ok_or(AutomatorError::IndexOutOfRange { index, len: self.actions.len() })
    }

    pub fn push(&mut self, action: Action) { self.actions.push(action); }

    pub fn extend(&mut self, actions: impl IntoIterator<Item = Action>) { self.actions.extend(actions); }

    pub fn replace(&mut self, index: usize, action: Action) -> Result<Action> {
        let len = self.actions.len();
        let slot = self.actions.get_mut(index).ok_or(AutomatorError::IndexOutOfRange { index, len })?;
        Ok(std::mem::replace(slot, action))
    }

    pub fn remove(&mut self, index: usize) -> Result<Action> {
        if index >= self.actions.len() {
            return Err(AutomatorError::IndexOutOfRange { index, len: self.actions.len() });
        }
        Ok(self.actions.remove(index))
    }

    pub fn clear(&mut self) { self.actions.clear(); }

    /// Sum of all per-action waits, in seconds.
    pub fn total_wait_secs(&self) -> f64 { self.actions.iter().map(|a| a.wait_seconds).sum() }
}

impl From<Vec<Action>> for Script {
    fn from(actions: Vec<Action>) -> Self { Self { actions } }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;
    fn into_iter(self) -> Self::IntoIter { self.actions.iter() }
}

// -------------- Step editor form --------------
/// Raw text of the add-step editor. Empty coordinates and wait default to 0.
#[derive(Clone, Debug, PartialEq)]
pub struct StepForm {
    pub kind: ActionKind,
    pub x: String,
    pub y: String,
    pub wait: String,
    pub description: String,
}

impl Default for StepForm {
    fn default() -> Self {
        Self {
            kind: ActionKind::Click,
            x: String::new(),
            y: String::new(),
            wait: "5".to_owned(),
            description: String::new(),
        }
    }
}

impl StepForm {
    pub fn parse(&self) -> Result<Action> {
        let x = parse_or_zero::<i32>("x", &self.x)?;
        let y = parse_or_zero::<i32>("y", &self.y)?;
        let wait = parse_or_zero::<f64>("wait", &self.wait)?;
        Action::new(self.kind, x, y, wait, self.description.trim())
    }

    /// Clears everything but the kind, restoring the default wait.
    pub fn reset(&mut self) {
        *self = Self { kind: self.kind, ..Self::default() };
    }
}

pub(crate) fn parse_or_zero<T>(field: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + Default,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(T::default());
    }
    raw.parse().map_err(|_| AutomatorError::invalid(format!("{field}: '{raw}' is not a valid number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Script {
        Script::from(vec![
            Action::click(10, 20, 2.0, "first").unwrap(),
            Action::new(ActionKind::Wait, 0, 0, 1.5, "pause").unwrap(),
            Action::new(ActionKind::Move, 30, 40, 0.0, "hover").unwrap(),
        ])
    }

    #[test]
    fn test_kind_ignores_letter_case() {
        for raw in ["click", "Click", "CLICK", "cLick", " click "] {
            assert_eq!(raw.parse::<ActionKind>().unwrap(), ActionKind::Click);
        }
        assert_eq!("等待".parse::<ActionKind>().unwrap(), ActionKind::Wait);
        assert!("tap".parse::<ActionKind>().is_err());

        let step: Action = serde_json::from_str(r#"{ "type": "mOvE", "x": 1, "y": 2, "wait": 0 }"#).unwrap();
        assert_eq!(step.kind, ActionKind::Move);
        assert!(serde_json::from_str::<Action>(r#"{ "type": "drag", "x": 1, "y": 2, "wait": 0 }"#).is_err());
    }

    #[test]
    fn test_negative_wait_rejected() {
        assert!(matches!(Action::click(0, 0, -1.0, "x"), Err(AutomatorError::InvalidInput(_))));
        assert!(matches!(Action::click(0, 0, f64::NAN, "x"), Err(AutomatorError::InvalidInput(_))));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut script = sample();
        let removed = script.remove(1).unwrap();
        assert_eq!(removed.description, "pause");
        let names: Vec<_> = script.iter().map(|a| a.description.as_str()).collect();
        assert_eq!(names, ["first", "hover"]);
    }

    #[test]
    fn test_stale_index_is_reported() {
        let mut script = sample();
        assert!(matches!(script.remove(3), Err(AutomatorError::IndexOutOfRange { index: 3, len: 3 })));
        assert!(matches!(script.get(7), Err(AutomatorError::IndexOutOfRange { index: 7, len: 3 })));
        let replacement = Action::click(1, 1, 0.0, "r").unwrap();
        assert!(script.replace(3, replacement).is_err());
        assert_eq!(script.len(), 3);
    }

    #[test]
    fn test_replace_returns_old_action() {
        let mut script = sample();
        let old = script.replace(0, Action::click(5, 5, 1.0, "new").unwrap()).unwrap();
        assert_eq!(old.position(), (10, 20));
        assert_eq!(script.get(0).unwrap().description, "new");
        assert_eq!(script.total_wait_secs(), 2.5);
    }

    #[test]
    fn test_step_form_defaults() {
        let mut form = StepForm { x: " 120 ".into(), y: String::new(), description: "go".into(), ..Default::default() };
        let action = form.parse().unwrap();
        assert_eq!(action.position(), (120, 0));
        assert_eq!(action.wait_seconds, 5.0);

        form.kind = ActionKind::Move;
        form.reset();
        assert_eq!(form.kind, ActionKind::Move);
        assert_eq!(form.wait, "5");
        assert!(form.x.is_empty());
    }

    #[test]
    fn test_step_form_rejects_text() {
        let form = StepForm { x: "abc".into(), ..Default::default() };
        assert!(matches!(form.parse(), Err(AutomatorError::InvalidInput(_))));
    }

    #[test]
    fn test_kind_accepts_localized_labels() {
        let kinds: Vec<ActionKind> = serde_json::from_str(r#"["点击", "等待", "移动", "click", "Move"]"#).unwrap();
        assert_eq!(kinds, [ActionKind::Click, ActionKind::Wait, ActionKind::Move, ActionKind::Click, ActionKind::Move]);
        assert_eq!(serde_json::to_string(&ActionKind::Wait).unwrap(), "\"wait\"");
    }
}
