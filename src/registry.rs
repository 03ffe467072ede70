use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::RwLock;
use tokio::time;

use crate::camera;
use crate::common::{Camera, RecordId};
use crate::config::VideoConfig;
use crate::error::VideoError;
use crate::recording::{RecordSummary, Recording};



// Process-wide map of tracked recordings, shared by the request handlers,
// the stuck-record sweeper and the shutdown drain.
//
// The outer RwLock guards the map only; it is never held across subprocess
// I/O. Each recording serializes its own state transitions internally.
pub struct RecordingRegistry {
	records: RwLock<HashMap<RecordId, Arc<Recording>>>,
	video_config: VideoConfig,
}

impl RecordingRegistry {
	pub fn new(video_config: VideoConfig) -> RecordingRegistry {
		RecordingRegistry {
			records: RwLock::new(HashMap::new()),
			video_config,
		}
	}

	// Probe the camera, start a fresh recording of its stream and register
	// it. Registration happens only after the transcoder is confirmed
	// spawned, so every id handed out refers to a running recording.
	pub async fn start_recording(&self, camera: &Camera) -> Result<RecordId, VideoError> {
		if !camera::probe(camera).await {
			return Err(VideoError::CameraUnreachable(camera.to_string()));
		}

		let recording = Recording::new(
			camera.rtsp_stream_link.clone(),
			&self.video_config.output_directory,
		);
		recording.start(&self.video_config.transcoder).await?;

		let record_id = recording.record_id().to_string();
		self.records
			.write()
			.await
			.insert(record_id.clone(), Arc::new(recording));
		Ok(record_id)
	}

	// Returns the filename of the stopped recording.
	pub async fn stop_recording(&self, record_id: &str) -> Result<String, VideoError> {
		let recording = self
			.records
			.read()
			.await
			.get(record_id)
			.cloned()
			.ok_or_else(|| VideoError::RecordNotFound(record_id.to_string()))?;

		recording.stop().await?;
		Ok(recording.filename())
	}

	// Snapshot of all tracked recordings, split into (ongoing, ended).
	pub async fn list(&self) -> (Vec<RecordSummary>, Vec<RecordSummary>) {
		let handles: Vec<Arc<Recording>> = self.records.read().await.values().cloned().collect();

		let mut ongoing = Vec::new();
		let mut ended = Vec::new();
		for recording in handles {
			let summary = recording.summary().await;
			if recording.is_ongoing().await {
				ongoing.push(summary);
			} else {
				ended.push(summary);
			}
		}
		(ongoing, ended)
	}

	// One sweep pass: force-stop every ongoing recording that exceeded the
	// configured maximum duration. A failing stop is logged and the sweep
	// moves on to the rest.
	pub async fn sweep_stuck(&self) {
		let max_duration = self.video_config.max_record_duration_sec as i64;
		let snapshot: Vec<(RecordId, Arc<Recording>)> = self
			.records
			.read()
			.await
			.iter()
			.map(|(id, rec)| (id.clone(), rec.clone()))
			.collect();

		for (record_id, recording) in snapshot {
			if recording.is_ongoing().await && recording.duration_sec().await >= max_duration {
				match self.stop_recording(&record_id).await {
					Ok(_) => warn!(
						"Recording {} exceeded {} s. and was stopped.",
						record_id, max_duration
					),
					Err(err) => error!(
						"Failed to stop stuck recording {}: {}",
						record_id, err
					),
				}
			}
		}
	}

	// Stop every still-ongoing recording so no transcoder outlives the
	// server. Failures are logged; the drain keeps going.
	pub async fn drain(&self) {
		let snapshot: Vec<(RecordId, Arc<Recording>)> = self
			.records
			.read()
			.await
			.iter()
			.map(|(id, rec)| (id.clone(), rec.clone()))
			.collect();

		for (record_id, recording) in snapshot {
			if !recording.is_ongoing().await {
				continue;
			}
			match recording.stop().await {
				Ok(_) => warn!(
					"Recording {} was stopped due to server shutdown.",
					record_id
				),
				// lost the race against a concurrent stop, nothing to do
				Err(VideoError::NotOngoing(_)) => {},
				Err(err) => error!(
					"Failed to stop recording {} during shutdown: {}",
					record_id, err
				),
			}
		}
	}
}

// Background daemon that watches for stuck or forgotten recordings. Runs
// until the shutdown future resolves.
pub async fn end_stuck_records(
	registry: Arc<RecordingRegistry>,
	interval: Duration,
	shutdown: impl Future<Output = ()>,
) {
	info!(
		"A daemon was started to monitor stuck records. Update interval is {:?}.",
		interval
	);

	tokio::pin!(shutdown);
	loop {
		tokio::select! {
			_ = &mut shutdown => break,
			_ = time::sleep(interval) => {},
		}
		registry.sweep_stuck().await;
	}
}
