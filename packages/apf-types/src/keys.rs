//! ── Keyword Names ──────────────────────────────────────────────────────────
//!
//! Telescope-bus keywords referenced by the Gateway, Aggregator and Executor.
//! Kept as a closed enum rather than raw `&str` so a typo in a key name is a
//! compile error, not a silent no-op subscription.

use std::fmt;

/// One telemetry or command keyword on the distributed control bus.
///
/// Semantics only — the wire protocol that actually carries these values is
/// out of scope; this enum exists purely so callers of `KeywordGateway`
/// can't misspell a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordName {
    SunElevation,
    TelescopeAzimuth,
    TelescopeElevation,
    SecondaryFocus,
    DomeFrontShutter,
    DomeRearShutter,
    OpenPermission,
    MovePermission,
    CheckClose,
    DeadmanSeconds,
    WeatherSummary,
    AvgWindSpeed,
    AvgWindDirection,
    WhatsOpen,
    DewStatus,
    InstrumentReleased,
    GuideCountRate,
    GuideCounts,
    ExposureThreshold,
    FwhmPixels,
    DeckerName,
    ScriptobsVmag,
    ScriptobsStatus,
    ScriptobsPid,
    ScriptobsLinesDone,
    ScriptobsAutofoc,
    ScriptobsWindshield,
    ScriptobsControl,
    CameraEventString,
    CameraObserver,
    CameraObsnum,
    CameraOutdir,
    CameraOutfile,
    TeqMode,
    Robostate,
    Status,
}

impl KeywordName {
    /// The bus-side name this keyword is published/subscribed under.
    /// Opaque outside this crate — callers never format it themselves.
    pub fn bus_name(self) -> &'static str {
        match self {
            KeywordName::SunElevation => "SUNEL",
            KeywordName::TelescopeAzimuth => "AAZ",
            KeywordName::TelescopeElevation => "AEL",
            KeywordName::SecondaryFocus => "AAFOCUS",
            KeywordName::DomeFrontShutter => "FSCURPOS",
            KeywordName::DomeRearShutter => "RSCURPOS",
            KeywordName::OpenPermission => "OPEN_OK",
            KeywordName::MovePermission => "MOVE_PERM",
            KeywordName::CheckClose => "CHK_CLOSE",
            KeywordName::DeadmanSeconds => "DMTIME",
            KeywordName::WeatherSummary => "WX_BYSTN",
            KeywordName::AvgWindSpeed => "AVGWSPEED",
            KeywordName::AvgWindDirection => "AVGWDIR",
            KeywordName::WhatsOpen => "WHATSOPN",
            KeywordName::DewStatus => "DEWPT",
            KeywordName::InstrumentReleased => "INSTRELE",
            KeywordName::GuideCountRate => "COUNTRATE",
            KeywordName::GuideCounts => "COUNTS",
            KeywordName::ExposureThreshold => "XPOSE_THRESH",
            KeywordName::FwhmPixels => "FWHM",
            KeywordName::DeckerName => "DECKERNAM",
            KeywordName::ScriptobsVmag => "SCRIPTOBS_VMAG",
            KeywordName::ScriptobsStatus => "SCRIPTOBS_STATUS",
            KeywordName::ScriptobsPid => "SCRIPTOBS_PID",
            KeywordName::ScriptobsLinesDone => "SCRIPTOBS_LINES_DONE",
            KeywordName::ScriptobsAutofoc => "SCRIPTOBS_AUTOFOC",
            KeywordName::ScriptobsWindshield => "SCRIPTOBS_WINDSHIELD",
            KeywordName::ScriptobsControl => "SCRIPTOBS_CONTROL",
            KeywordName::CameraEventString => "EVENT_STR",
            KeywordName::CameraObserver => "OBSERVER",
            KeywordName::CameraObsnum => "OBSNUM",
            KeywordName::CameraOutdir => "OUTDIR",
            KeywordName::CameraOutfile => "OUTFILE",
            KeywordName::TeqMode => "MODE",
            KeywordName::Robostate => "ROBOSTATE",
            KeywordName::Status => "STATUS",
        }
    }
}

impl fmt::Display for KeywordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bus_name())
    }
}
