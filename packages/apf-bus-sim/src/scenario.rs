//! ── Night Scenarios ────────────────────────────────────────────────────────
//!
//! A scenario is a fixed timeline of keyword writes, replayed onto a
//! `TestGateway` at whatever speed the operator asks for.

use apf_types::KeywordName;

/// One scripted keyword write, fired `offset_secs` after the scenario starts.
#[derive(Debug, Clone)]
pub struct Event {
    pub offset_secs: f64,
    pub key: KeywordName,
    pub value: EventValue,
}

/// A small owned union mirroring `KeywordValue`'s variants, since scenarios
/// are written as plain data rather than against the gateway directly.
#[derive(Debug, Clone)]
pub enum EventValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl From<EventValue> for apf_types::KeywordValue {
    fn from(v: EventValue) -> Self {
        match v {
            EventValue::Float(f) => apf_types::KeywordValue::Float(f),
            EventValue::Int(i) => apf_types::KeywordValue::Int(i),
            EventValue::Bool(b) => apf_types::KeywordValue::Bool(b),
            EventValue::Text(s) => apf_types::KeywordValue::Text(s),
        }
    }
}

fn ev(offset_secs: f64, key: KeywordName, value: impl Into<EventValue>) -> Event {
    Event { offset_secs, key, value: value.into() }
}

impl From<f64> for EventValue {
    fn from(v: f64) -> Self {
        EventValue::Float(v)
    }
}
impl From<i64> for EventValue {
    fn from(v: i64) -> Self {
        EventValue::Int(v)
    }
}
impl From<bool> for EventValue {
    fn from(v: bool) -> Self {
        EventValue::Bool(v)
    }
}
impl From<&str> for EventValue {
    fn from(v: &str) -> Self {
        EventValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub events: Vec<Event>,
}

/// A calm evening: permissions granted, wind and sun both settle into the
/// sunset window, then the sky keeps darkening past the post-sunset
/// threshold. Exercises the watcher's sunset-open and night-open rules back
/// to back.
pub fn clear_night() -> Scenario {
    Scenario {
        name: "clear-night",
        description: "permissions granted, sun sets cleanly, no weather interruptions",
        events: vec![
            ev(0.0, KeywordName::OpenPermission, true),
            ev(0.0, KeywordName::MovePermission, true),
            ev(0.0, KeywordName::DewStatus, false),
            ev(0.0, KeywordName::AvgWindSpeed, 6.0),
            ev(0.0, KeywordName::AvgWindDirection, 270.0),
            ev(0.0, KeywordName::WhatsOpen, ""),
            ev(0.0, KeywordName::ScriptobsPid, 0i64),
            ev(0.0, KeywordName::DeadmanSeconds, 300.0),
            ev(0.0, KeywordName::SunElevation, -5.0),
            ev(30.0, KeywordName::SunElevation, -9.5),
            ev(30.0, KeywordName::WhatsOpen, "DomeShutter,MirrorCover"),
            ev(60.0, KeywordName::SunElevation, -20.0),
        ],
    }
}

/// The dome is open and observing when wind climbs over the 40 mph limit,
/// forcing an unplanned close; once the storm passes, permissions return
/// and the watcher reopens. Exercises rule 1 (weather close) and the
/// 1800s cooldown embargo on rule 3/4.
pub fn weather_closure() -> Scenario {
    Scenario {
        name: "weather-closure",
        description: "wind spikes over the safety limit mid-night, forcing an unplanned close",
        events: vec![
            ev(0.0, KeywordName::OpenPermission, true),
            ev(0.0, KeywordName::MovePermission, true),
            ev(0.0, KeywordName::DewStatus, false),
            ev(0.0, KeywordName::AvgWindSpeed, 8.0),
            ev(0.0, KeywordName::WhatsOpen, "DomeShutter"),
            ev(0.0, KeywordName::ScriptobsPid, 0i64),
            ev(0.0, KeywordName::SunElevation, -25.0),
            ev(0.0, KeywordName::DeadmanSeconds, 60.0),
            ev(20.0, KeywordName::AvgWindSpeed, 48.0),
            ev(20.0, KeywordName::OpenPermission, false),
            ev(90.0, KeywordName::AvgWindSpeed, 9.0),
            ev(90.0, KeywordName::OpenPermission, true),
        ],
    }
}

/// Dawn approaches: the sun climbs back through the rising threshold while
/// the robot has already finished its last exposure. Exercises rule 2
/// (sunrise handoff).
pub fn sunrise() -> Scenario {
    Scenario {
        name: "sunrise",
        description: "sun climbs back above the rising threshold at the end of the night",
        events: vec![
            ev(0.0, KeywordName::OpenPermission, true),
            ev(0.0, KeywordName::MovePermission, true),
            ev(0.0, KeywordName::DewStatus, false),
            ev(0.0, KeywordName::AvgWindSpeed, 5.0),
            ev(0.0, KeywordName::WhatsOpen, "DomeShutter"),
            ev(0.0, KeywordName::ScriptobsPid, 0i64),
            ev(0.0, KeywordName::SunElevation, -9.5),
            ev(0.0, KeywordName::DeadmanSeconds, 300.0),
            ev(15.0, KeywordName::SunElevation, -8.0),
        ],
    }
}

pub fn presets() -> Vec<Scenario> {
    vec![clear_night(), weather_closure(), sunrise()]
}

pub fn by_name(name: &str) -> Option<Scenario> {
    presets().into_iter().find(|s| s.name == name)
}
