//! PipeWire routing backend
//!
//! Node discovery parses `pw-dump` JSON. The virtual sink is a
//! `support.null-audio-sink` adapter created through `pw-cli`; capture
//! redirection and passthrough are port links made with `pw-link` between
//! node names, torn down with `pw-link -d`. Default-source override goes
//! through `pw-metadata`, capture mute through `wpctl`.

use crate::app::{PlaybackApp, RecordingApp};
use crate::backend::{run_tool, run_tool_ok, Result, RoutingBackend, RoutingError, SINK_NAME};
use blare_core::BackendKind;
use serde::Deserialize;
use tracing::{debug, warn};

const PW_DUMP: &str = "pw-dump";
const PW_CLI: &str = "pw-cli";
const PW_LINK: &str = "pw-link";
const PW_METADATA: &str = "pw-metadata";
const WPCTL: &str = "wpctl";

const DEFAULT_SOURCE_KEY: &str = "default.configured.audio.source";

/// A stream node in the PipeWire graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PipeWireApp {
    pub name: String,
    pub application: String,
    /// Not every node carries a process id (e.g. module-created streams)
    pub pid: Option<u32>,
    pub node_id: u32,
    /// `node.name`, the stable handle `pw-link` accepts
    pub node_name: String,
}

impl RecordingApp for PipeWireApp {
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
        self.node_id
    }
}

impl PlaybackApp for PipeWireApp {
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
        self.node_id
    }
}

/// One `pw-link` connection we created, by node name pair
struct Link {
    output_node: String,
    input_node: String,
}

pub struct PipeWireBackend {
    sink_node_id: Option<u32>,
    /// sink monitor -> recording app links
    moved: Vec<Link>,
    /// playback app -> sink links, keyed by display name
    passthrough: Vec<(String, Link)>,
    previous_default_source: Option<String>,
    destroyed: bool,
}

impl PipeWireBackend {
    /// Create the null sink node and verify the graph is reachable
    pub fn new() -> Result<Self> {
        let props = format!(
            "{{ factory.name=support.null-audio-sink node.name={SINK_NAME} \
             node.description={SINK_NAME} media.class=Audio/Sink \
             object.linger=true audio.position=[FL,FR] }}"
        );
        run_tool(PW_CLI, &["create-node", "adapter", &props])?;

        // pw-cli output is not stable; resolve our node id from the graph
        let dump = run_tool(PW_DUMP, &[])?;
        let sink_node_id = nodes_from_dump(&dump)?
            .into_iter()
            .find(|n| n.node_name == SINK_NAME)
            .map(|n| n.node_id)
            .ok_or_else(|| RoutingError::ParseFailed("pw-dump (sink node missing)".into()))?;

        debug!(node = sink_node_id, "null sink node created");
        Ok(Self {
            sink_node_id: Some(sink_node_id),
            moved: Vec::new(),
            passthrough: Vec::new(),
            previous_default_source: None,
            destroyed: false,
        })
    }

    fn streams(&self, media_class: &str) -> Vec<PipeWireApp> {
        let dump = match run_tool(PW_DUMP, &[]) {
            Ok(dump) => dump,
            Err(err) => {
                warn!(%err, "pw-dump failed");
                return Vec::new();
            }
        };
        match streams_from_dump(&dump, media_class) {
            Ok(apps) => apps,
            Err(err) => {
                warn!(%err, "pw-dump parse failed");
                Vec::new()
            }
        }
    }

    fn unlink(link: &Link) -> bool {
        run_tool_ok(PW_LINK, &["-d", &link.output_node, &link.input_node])
    }
}

impl RoutingBackend for PipeWireBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PipeWire
    }

    fn sink_name(&self) -> &str {
        SINK_NAME
    }

    fn recording_apps(&self) -> Vec<Box<dyn RecordingApp>> {
        self.streams("Stream/Input/Audio")
            .into_iter()
            .map(|a| Box::new(a) as Box<dyn RecordingApp>)
            .collect()
    }

    fn playback_apps(&self) -> Vec<Box<dyn PlaybackApp>> {
        self.streams("Stream/Output/Audio")
            .into_iter()
            .map(|a| Box::new(a) as Box<dyn PlaybackApp>)
            .collect()
    }

    fn recording_app(&self, name: &str) -> Option<Box<dyn RecordingApp>> {
        self.streams("Stream/Input/Audio")
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| Box::new(a) as Box<dyn RecordingApp>)
    }

    fn playback_app(&self, name: &str) -> Option<Box<dyn PlaybackApp>> {
        self.streams("Stream/Output/Audio")
            .into_iter()
            .find(|a| a.name == name)
            .map(|a| Box::new(a) as Box<dyn PlaybackApp>)
    }

    fn input_sound_to(&mut self, app: &dyn RecordingApp) -> bool {
        let Some(target) = self
            .streams("Stream/Input/Audio")
            .into_iter()
            .find(|a| a.node_id == app.handle())
        else {
            warn!(app = app.name(), "capture node vanished before link");
            return false;
        };

        // Node names make pw-link connect all matching port pairs
        if !run_tool_ok(PW_LINK, &[SINK_NAME, &target.node_name]) {
            return false;
        }
        self.moved.push(Link {
            output_node: SINK_NAME.to_string(),
            input_node: target.node_name,
        });
        true
    }

    fn stop_sound_input(&mut self) -> bool {
        let mut ok = true;
        for link in self.moved.drain(..) {
            ok &= Self::unlink(&link);
        }
        ok
    }

    fn passthrough_from(&mut self, app: &dyn PlaybackApp) -> bool {
        let Some(source) = self
            .streams("Stream/Output/Audio")
            .into_iter()
            .find(|a| a.node_id == app.handle())
        else {
            warn!(app = app.name(), "playback node vanished before link");
            return false;
        };

        if !run_tool_ok(PW_LINK, &[&source.node_name, SINK_NAME]) {
            return false;
        }
        self.passthrough.push((
            app.name().to_string(),
            Link {
                output_node: source.node_name,
                input_node: SINK_NAME.to_string(),
            },
        ));
        true
    }

    fn stop_passthrough(&mut self, name: &str) -> bool {
        let Some(pos) = self.passthrough.iter().position(|(n, _)| n == name) else {
            return true;
        };
        let (_, link) = self.passthrough.remove(pos);
        Self::unlink(&link)
    }

    fn stop_all_passthrough(&mut self) -> bool {
        let mut ok = true;
        for (_, link) in self.passthrough.drain(..) {
            ok &= Self::unlink(&link);
        }
        ok
    }

    fn currently_passed_through(&self) -> Vec<String> {
        self.passthrough.iter().map(|(n, _)| n.clone()).collect()
    }

    fn mute_input(&mut self, mute: bool) -> bool {
        let flag = if mute { "1" } else { "0" };
        run_tool_ok(WPCTL, &["set-mute", "@DEFAULT_AUDIO_SOURCE@", flag])
    }

    fn use_as_default(&mut self) -> bool {
        if self.previous_default_source.is_none() {
            match run_tool(PW_METADATA, &["0", DEFAULT_SOURCE_KEY]) {
                Ok(output) => self.previous_default_source = parse_metadata_name(&output),
                Err(err) => debug!(%err, "no previous default source recorded"),
            }
        }
        let value = format!("{{\"name\":\"{SINK_NAME}\"}}");
        run_tool_ok(
            PW_METADATA,
            &["0", DEFAULT_SOURCE_KEY, &value, "Spa:String:JSON"],
        )
    }

    fn revert_default(&mut self) -> bool {
        match self.previous_default_source.take() {
            Some(previous) => {
                let value = format!("{{\"name\":\"{previous}\"}}");
                run_tool_ok(
                    PW_METADATA,
                    &["0", DEFAULT_SOURCE_KEY, &value, "Spa:String:JSON"],
                )
            }
            None => run_tool_ok(PW_METADATA, &["-d", "0", DEFAULT_SOURCE_KEY]),
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
        if let Some(id) = self.sink_node_id.take() {
            ok &= run_tool_ok(PW_CLI, &["destroy", &id.to_string()]);
        }
        ok
    }
}

impl Drop for PipeWireBackend {
    fn drop(&mut self) {
        if !self.destroyed {
            self.destroy();
        }
    }
}

#[derive(Deserialize)]
struct PwObject {
    id: u32,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    info: Option<PwInfo>,
}

#[derive(Deserialize)]
struct PwInfo {
    #[serde(default)]
    props: Option<serde_json::Map<String, serde_json::Value>>,
}

fn nodes_from_dump(dump: &str) -> Result<Vec<PipeWireApp>> {
    let objects: Vec<PwObject> = serde_json::from_str(dump)
        .map_err(|_| RoutingError::ParseFailed("pw-dump".into()))?;

    let mut nodes = Vec::new();
    for object in objects {
        if object.kind != "PipeWire:Interface:Node" {
            continue;
        }
        let Some(props) = object.info.and_then(|i| i.props) else {
            continue;
        };
        let str_prop = |key: &str| props.get(key).and_then(|v| v.as_str()).map(str::to_string);

        let node_name = str_prop("node.name").unwrap_or_default();
        let application = str_prop("application.process.binary")
            .or_else(|| str_prop("application.name"))
            .unwrap_or_else(|| node_name.clone());
        let name = str_prop("application.name").unwrap_or_else(|| application.clone());
        let pid = props
            .get("application.process.id")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .and_then(|p| u32::try_from(p).ok());

        nodes.push(PipeWireApp {
            name,
            application,
            pid,
            node_id: object.id,
            node_name,
        });
    }
    Ok(nodes)
}

fn streams_from_dump(dump: &str, media_class: &str) -> Result<Vec<PipeWireApp>> {
    let objects: Vec<PwObject> = serde_json::from_str(dump)
        .map_err(|_| RoutingError::ParseFailed("pw-dump".into()))?;
    let wanted: Vec<u32> = objects
        .iter()
        .filter(|o| {
            o.kind == "PipeWire:Interface:Node"
                && o.info
                    .as_ref()
                    .and_then(|i| i.props.as_ref())
                    .and_then(|p| p.get("media.class"))
                    .and_then(|v| v.as_str())
                    == Some(media_class)
        })
        .map(|o| o.id)
        .collect();

    Ok(nodes_from_dump(dump)?
        .into_iter()
        .filter(|n| wanted.contains(&n.node_id))
        .collect())
}

/// Extract the configured name from `pw-metadata` output, e.g.
/// `update: id:0 key:'default.configured.audio.source' value:'{"name":"mic"}' type:'Spa:String:JSON'`
fn parse_metadata_name(output: &str) -> Option<String> {
    let start = output.find("value:'")? + "value:'".len();
    let rest = &output[start..];
    let end = rest.find('\'')?;
    let value: serde_json::Value = serde_json::from_str(&rest[..end]).ok()?;
    value.get("name")?.as_str().map(str::to_string)
}
