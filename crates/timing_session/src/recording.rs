//! Directory-backed recordings.
//!
//! Layout:
//! ```text
//! manifest.json          service manifest, "version": 1
//! 01556442000.json       keyframe: full state at that epoch second
//! 01556442010i.json      intra-frame: diff against the previous frame
//! ```
//!
//! The state at `t` seconds into the recording is the most recent keyframe
//! at or before `startTime + t` (or the first keyframe), with every later
//! intra-frame up to that timecode applied in order.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{
    DeliveryCallback, Service, ServiceId, ServiceList, SubscriptionId, TimingError,
    TimingSession,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SessionError};
use crate::patch::apply_diff;
use crate::requested_service;

/// Messages kept when intra-frames are applied
pub const MAX_MESSAGES: usize = 100;

const MANIFEST_FILE: &str = "manifest.json";
const SUPPORTED_VERSION: i64 = 1;

/// Intra-frame as written by the recorder
#[derive(Debug, Default, Deserialize)]
struct IntraFrame {
    #[serde(default)]
    cars: Vec<Value>,
    #[serde(default)]
    session: Vec<Value>,
    /// New messages only, newest first
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    highlight: Vec<Value>,
}

/// One recording on disk
#[derive(Debug, Clone)]
pub struct DirectoryRecording {
    directory: PathBuf,
    manifest: Value,
    keyframes: Vec<u64>,
    iframes: Vec<u64>,
    start_time: u64,
    duration: u64,
}

impl DirectoryRecording {
    /// Scan a recording directory
    #[instrument(name = "recording_open", skip_all, fields(path = %directory.as_ref().display()))]
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        let manifest_path = directory.join(MANIFEST_FILE);
        let raw = match fs::read_to_string(&manifest_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::MissingManifest { path: directory })
            }
            Err(e) => return Err(e.into()),
        };
        let mut manifest: Value = serde_json::from_str(&raw)?;

        match manifest.get("version").map(Value::as_i64) {
            None => return Err(SessionError::MissingVersion),
            Some(Some(SUPPORTED_VERSION)) => {}
            Some(version) => return Err(SessionError::UnsupportedVersion(version.unwrap_or(-1))),
        }

        let mut keyframes = Vec::new();
        let mut iframes = Vec::new();
        for entry in fs::read_dir(&directory)? {
            let name = entry?.file_name();
            match name.to_str().and_then(parse_frame_name) {
                Some((timestamp, false)) => keyframes.push(timestamp),
                Some((timestamp, true)) => iframes.push(timestamp),
                None => {}
            }
        }
        keyframes.sort_unstable();
        iframes.sort_unstable();

        let (Some(&first_key), Some(&last_key)) = (keyframes.first(), keyframes.last()) else {
            return Err(SessionError::NoKeyframes { path: directory });
        };
        let start_time = iframes.first().map_or(first_key, |&i| i.min(first_key));
        let end_time = iframes.last().map_or(last_key, |&i| i.max(last_key));
        let duration = end_time - start_time;

        if let Some(fields) = manifest.as_object_mut() {
            fields.insert("startTime".into(), Value::from(start_time));
            fields.insert("duration".into(), Value::from(duration));
        }

        info!(
            keyframes = keyframes.len(),
            iframes = iframes.len(),
            start_time,
            duration,
            "Loaded recording"
        );

        Ok(Self {
            directory,
            manifest,
            keyframes,
            iframes,
            start_time,
            duration,
        })
    }

    /// Manifest with `startTime` and `duration` filled in from the frames
    pub fn manifest(&self) -> &Value {
        &self.manifest
    }

    /// The recording as a recorded service record
    pub fn service(&self) -> Result<Service> {
        Ok(serde_json::from_value(self.manifest.clone())?)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    pub fn iframe_count(&self) -> usize {
        self.iframes.len()
    }

    pub fn frame_count(&self) -> usize {
        self.keyframes.len() + self.iframes.len()
    }

    /// State `interval` seconds into the recording
    pub fn state_at(&self, interval: f64) -> Result<Value> {
        self.state_at_timestamp(self.start_time as f64 + interval)
    }

    /// State at an absolute epoch second
    pub fn state_at_timestamp(&self, timecode: f64) -> Result<Value> {
        let first = self.keyframes.first().copied().ok_or_else(|| SessionError::NoKeyframes {
            path: self.directory.clone(),
        })?;
        let keyframe = self
            .keyframes
            .iter()
            .copied()
            .filter(|&k| k as f64 <= timecode)
            .max()
            .unwrap_or(first);

        let mut state = self.read_frame(keyframe, false)?;
        let pending = self
            .iframes
            .iter()
            .copied()
            .filter(|&i| i > keyframe && i as f64 <= timecode);

        for iframe in pending {
            let applied = self
                .read_frame(iframe, true)
                .and_then(|raw| Ok(serde_json::from_value::<IntraFrame>(raw)?))
                .and_then(|frame| apply_intra_frame(&state, frame));
            match applied {
                Ok(next) => state = next,
                Err(e) => warn!(iframe, error = %e, "skipping unreadable intra-frame"),
            }
        }

        debug!(timecode, keyframe, "state reconstructed");
        Ok(state)
    }

    fn read_frame(&self, timestamp: u64, intra: bool) -> Result<Value> {
        let path = self.directory.join(frame_file_name(timestamp, intra));
        let raw = fs::read_to_string(&path).map_err(|e| SessionError::frame(timestamp, e))?;
        serde_json::from_str(&raw).map_err(|e| SessionError::frame(timestamp, e))
    }
}

/// `01556442000.json` / `01556442000i.json`
pub fn frame_file_name(timestamp: u64, intra: bool) -> String {
    if intra {
        format!("{timestamp:011}i.json")
    } else {
        format!("{timestamp:011}.json")
    }
}

/// Parse a frame file name into its timestamp and whether it is an intra-frame
fn parse_frame_name(name: &str) -> Option<(u64, bool)> {
    let stem = name.strip_suffix(".json")?;
    let (digits, intra) = match stem.strip_suffix('i') {
        Some(digits) => (digits, true),
        None => (stem, false),
    };
    if !(5..=11).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|timestamp| (timestamp, intra))
}

fn apply_intra_frame(state: &Value, frame: IntraFrame) -> Result<Value> {
    let mut cars = state.get("cars").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
    apply_diff(&mut cars, &frame.cars)?;

    let mut session = state
        .get("session")
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    apply_diff(&mut session, &frame.session)?;

    let previous = state
        .get("messages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let messages: Vec<Value> = frame
        .messages
        .into_iter()
        .chain(previous.iter().cloned())
        .take(MAX_MESSAGES)
        .collect();

    let mut next = Map::new();
    next.insert("cars".into(), cars);
    next.insert("session".into(), session);
    next.insert("messages".into(), Value::Array(messages));
    next.insert("highlight".into(), Value::Array(frame.highlight));
    Ok(Value::Object(next))
}

/// Serves `requestState` for a set of recordings
///
/// Recordings have no live feed, so subscribing is rejected.
pub struct RecordingSession {
    namespace: String,
    recordings: HashMap<ServiceId, Arc<DirectoryRecording>>,
}

impl RecordingSession {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            recordings: HashMap::new(),
        }
    }

    /// Open a recording directory and serve it under its manifest uuid
    pub fn add_directory(&mut self, directory: impl AsRef<Path>) -> Result<Service> {
        let recording = DirectoryRecording::open(directory)?;
        let service = recording.service()?;
        self.recordings.insert(service.id.clone(), Arc::new(recording));
        Ok(service)
    }

    /// Recorded services in the order of their start time
    pub fn services(&self) -> ServiceList {
        let mut services: Vec<(u64, Service)> = self
            .recordings
            .values()
            .filter_map(|r| r.service().ok().map(|s| (r.start_time(), s)))
            .collect();
        services.sort_by_key(|(start, _)| *start);
        services.into_iter().map(|(_, s)| s).collect()
    }

    pub fn recording(&self, id: &str) -> Option<&DirectoryRecording> {
        self.recordings.get(id).map(Arc::as_ref)
    }
}

impl TimingSession for RecordingSession {
    async fn call(
        &self,
        procedure: &str,
        args: Vec<Value>,
    ) -> std::result::Result<Value, TimingError> {
        let recording = requested_service(&self.namespace, procedure)
            .ok_or_else(|| SessionError::UnknownProcedure(procedure.to_string()))
            .and_then(|id| {
                self.recordings
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SessionError::UnknownService(id.to_string()))
            })
            .map_err(|e| TimingError::request(procedure, e.to_string()))?;
        let interval = args.first().and_then(Value::as_f64).unwrap_or(0.0);

        let state = tokio::task::spawn_blocking(move || recording.state_at(interval))
            .await
            .map_err(|e| TimingError::request(procedure, e.to_string()))?;
        state.map_err(|e| TimingError::request(procedure, e.to_string()))
    }

    async fn subscribe(
        &self,
        topic: &str,
        _handler: DeliveryCallback,
    ) -> std::result::Result<SubscriptionId, TimingError> {
        Err(TimingError::subscription(
            ServiceId::from(topic),
            "recordings have no live feed",
        ))
    }

    async fn unsubscribe(
        &self,
        _subscription: SubscriptionId,
    ) -> std::result::Result<(), TimingError> {
        Ok(())
    }
}
