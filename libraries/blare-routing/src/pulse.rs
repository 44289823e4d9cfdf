//! PulseAudio routing backend
//!
//! Drives `pactl`. The virtual sink is a `module-null-sink`; capture
//! redirection moves source-outputs onto the sink monitor, passthrough
//! moves sink-inputs into the sink. Original positions are remembered so
//! everything moves back.

use crate::app::{PlaybackApp, RecordingApp};
use crate::backend::{run_tool, run_tool_ok, Result, RoutingBackend, RoutingError, SINK_NAME};
use blare_core::BackendKind;
use tracing::{debug, warn};

const PACTL: &str = "pactl";

/// A source-output recording from some source
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PulseRecordingApp {
    pub name: String,
    pub application: String,
    pub pid: Option<u32>,
    /// source-output index
    pub index: u32,
    /// name of the source it currently records from
    pub source: String,
}

impl RecordingApp for PulseRecordingApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn application(&self) -> &str {
        &self.application
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn handle(&self) -> u32 {
        self.index
    }
}

/// A sink-input playing into some sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PulsePlaybackApp {
    pub name: String,
    pub application: String,
    pub pid: Option<u32>,
    /// sink-input index
    pub index: u32,
    /// name of the sink it currently plays into
    pub sink: String,
}

impl PlaybackApp for PulsePlaybackApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn application(&self) -> &str {
        &self.application
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn handle(&self) -> u32 {
        self.index
    }
}

struct MovedRecording {
    index: u32,
    original_source: String,
}

struct Passthrough {
    name: String,
    index: u32,
    original_sink: String,
}

pub struct PulseBackend {
    /// Module id of the loaded null sink
    sink_module: Option<String>,
    moved: Vec<MovedRecording>,
    passthrough: Vec<Passthrough>,
    previous_default_source: Option<String>,
    destroyed: bool,
}

impl PulseBackend {
    /// Load the null sink and verify `pactl` is reachable
    pub fn new() -> Result<Self> {
        let module = run_tool(
            PACTL,
            &[
                "load-module",
                "module-null-sink",
                &format!("sink_name={SINK_NAME}"),
                "rate=44100",
                &format!("sink_properties=device.description={SINK_NAME}"),
            ],
        )?;
        let sink_module = module.trim().to_string();
        if sink_module.is_empty() || sink_module.parse::<u32>().is_err() {
            return Err(RoutingError::ParseFailed("pactl load-module".into()));
        }
        debug!(module = %sink_module, "null sink loaded");
        Ok(Self {
            sink_module: Some(sink_module),
            moved: Vec::new(),
            passthrough: Vec::new(),
            previous_default_source: None,
            destroyed: false,
        })
    }

    fn list_recording(&self) -> Vec<PulseRecordingApp> {
        let text = match run_tool(PACTL, &["list", "source-outputs"]) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "listing source-outputs failed");
                return Vec::new();
            }
        };
        parse_source_outputs(&text)
    }

    fn list_playback(&self) -> Vec<PulsePlaybackApp> {
        let text = match run_tool(PACTL, &["list", "sink-inputs"]) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "listing sink-inputs failed");
                return Vec::new();
            }
        };
        parse_sink_inputs(&text)
    }
}

impl RoutingBackend for PulseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PulseAudio
    }

    fn sink_name(&self) -> &str {
        SINK_NAME
    }

    fn recording_apps(&self) -> Vec<Box<dyn RecordingApp>> {
        self.list_recording()
            .into_iter()
            .map(|a| Box::new(a) as Box<dyn RecordingApp>)
            .collect()
    }

    fn playback_apps(&self) -> Vec<Box<dyn PlaybackApp>> {
        self.list_playback()
            .into_iter()
            .map(|a| Box::new(a) as Box<dyn PlaybackApp>)
            .collect()
    }

    fn recording_app(&self, name: &str) -> Option<Box<dyn RecordingApp>> {
        self.list_recording()
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| Box::new(a) as Box<dyn RecordingApp>)
    }

    fn playback_app(&self, name: &str) -> Option<Box<dyn PlaybackApp>> {
        self.list_playback()
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| Box::new(a) as Box<dyn PlaybackApp>)
    }

    fn input_sound_to(&mut self, app: &dyn RecordingApp) -> bool {
        let index = app.handle();
        // The app must still exist to learn where it records from
        let Some(current) = self.list_recording().into_iter().find(|a| a.index == index) else {
            warn!(app = app.name(), "source-output vanished before move");
            return false;
        };

        let monitor = format!("{SINK_NAME}.monitor");
        if !run_tool_ok(PACTL, &["move-source-output", &index.to_string(), &monitor]) {
            return false;
        }
        self.moved.push(MovedRecording {
            index,
            original_source: current.source,
        });
        true
    }

    fn stop_sound_input(&mut self) -> bool {
        let mut ok = true;
        for moved in self.moved.drain(..) {
            ok &= run_tool_ok(
                PACTL,
                &[
                    "move-source-output",
                    &moved.index.to_string(),
                    &moved.original_source,
                ],
            );
        }
        ok
    }

    fn passthrough_from(&mut self, app: &dyn PlaybackApp) -> bool {
        let index = app.handle();
        let Some(current) = self.list_playback().into_iter().find(|a| a.index == index) else {
            warn!(app = app.name(), "sink-input vanished before move");
            return false;
        };

        if !run_tool_ok(PACTL, &["move-sink-input", &index.to_string(), SINK_NAME]) {
            return false;
        }
        self.passthrough.push(Passthrough {
            name: app.name().to_string(),
            index,
            original_sink: current.sink,
        });
        true
    }

    fn stop_passthrough(&mut self, name: &str) -> bool {
        let Some(pos) = self.passthrough.iter().position(|p| p.name == name) else {
            return true;
        };
        let entry = self.passthrough.remove(pos);
        run_tool_ok(
            PACTL,
            &[
                "move-sink-input",
                &entry.index.to_string(),
                &entry.original_sink,
            ],
        )
    }

    fn stop_all_passthrough(&mut self) -> bool {
        let mut ok = true;
        for entry in self.passthrough.drain(..) {
            ok &= run_tool_ok(
                PACTL,
                &[
                    "move-sink-input",
                    &entry.index.to_string(),
                    &entry.original_sink,
                ],
            );
        }
        ok
    }

    fn currently_passed_through(&self) -> Vec<String> {
        self.passthrough.iter().map(|p| p.name.clone()).collect()
    }

    fn mute_input(&mut self, mute: bool) -> bool {
        let flag = if mute { "1" } else { "0" };
        run_tool_ok(PACTL, &["set-source-mute", "@DEFAULT_SOURCE@", flag])
    }

    fn use_as_default(&mut self) -> bool {
        if self.previous_default_source.is_none() {
            match run_tool(PACTL, &["get-default-source"]) {
                Ok(name) => self.previous_default_source = Some(name.trim().to_string()),
                Err(err) => {
                    warn!(%err, "could not read current default source");
                    return false;
                }
            }
        }
        let monitor = format!("{SINK_NAME}.monitor");
        run_tool_ok(PACTL, &["set-default-source", &monitor])
    }

    fn revert_default(&mut self) -> bool {
        match self.previous_default_source.take() {
            Some(previous) => run_tool_ok(PACTL, &["set-default-source", &previous]),
            None => true,
        }
    }

    fn destroy(&mut self) -> bool {
        if self.destroyed {
            return true;
        }
        self.destroyed = true;

        let mut ok = self.stop_sound_input();
        ok &= self.stop_all_passthrough();
        ok &= self.revert_default();
        if let Some(module) = self.sink_module.take() {
            ok &= run_tool_ok(PACTL, &["unload-module", &module]);
        }
        ok
    }
}

impl Drop for PulseBackend {
    fn drop(&mut self) {
        if !self.destroyed {
            self.destroy();
        }
    }
}

fn property<'a>(block: &'a str, key: &str) -> Option<&'a str> {
    for line in block.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(key) {
            let rest = rest.trim_start_matches([' ', ':', '=']).trim();
            return Some(rest.trim_matches('"'));
        }
    }
    None
}

fn blocks<'a>(text: &'a str, header: &str) -> Vec<(u32, &'a str)> {
    let mut out = Vec::new();
    let mut current: Option<(u32, usize)> = None;
    for (offset, line) in text.lines().map(|l| (line_offset(text, l), l)) {
        if let Some(rest) = line.strip_prefix(header) {
            if let Some((index, start)) = current.take() {
                out.push((index, &text[start..offset]));
            }
            if let Ok(index) = rest.trim_start_matches('#').trim().parse() {
                current = Some((index, offset));
            }
        }
    }
    if let Some((index, start)) = current {
        out.push((index, &text[start..]));
    }
    out
}

fn line_offset(text: &str, line: &str) -> usize {
    // Lines borrowed from `text`, so pointer arithmetic is exact
    line.as_ptr() as usize - text.as_ptr() as usize
}

fn parse_common(block: &str) -> (String, String, Option<u32>) {
    let application = property(block, "application.process.binary")
        .unwrap_or_default()
        .to_string();
    let name = property(block, "application.name")
        .map(str::to_string)
        .unwrap_or_else(|| application.clone());
    let pid = property(block, "application.process.id").and_then(|p| p.parse().ok());
    (name, application, pid)
}

pub(crate) fn parse_source_outputs(text: &str) -> Vec<PulseRecordingApp> {
    blocks(text, "Source Output ")
        .into_iter()
        .map(|(index, block)| {
            let (name, application, pid) = parse_common(block);
            PulseRecordingApp {
                name,
                application,
                pid,
                index,
                source: property(block, "Source:").unwrap_or_default().to_string(),
            }
        })
        .collect()
}

pub(crate) fn parse_sink_inputs(text: &str) -> Vec<PulsePlaybackApp> {
    blocks(text, "Sink Input ")
        .into_iter()
        .map(|(index, block)| {
            let (name, application, pid) = parse_common(block);
            PulsePlaybackApp {
                name,
                application,
                pid,
                index,
                sink: property(block, "Sink:").unwrap_or_default().to_string(),
            }
        })
        .collect()
}
