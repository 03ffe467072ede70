use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock};
use tokio::time;

use crate::common::RecordId;
use crate::error::VideoError;



// Stopping earlier than this leaves the transcoder no time to write a
// usable file, so stop() waits out the remainder.
pub const MINIMAL_RECORD_DURATION_SEC: i64 = 3;

// How long stop() waits for the transcoder to react to the quit byte
// before falling back to a forced kill.
const GRACEFUL_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Default)]
struct RecordingState {
	start_time: Option<DateTime<Utc>>,
	end_time: Option<DateTime<Utc>>,
}

// Read-only projection of a recording for listings; the process handle
// stays out-of-band.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct RecordSummary {
	pub filename: String,
	pub record_id: RecordId,
	pub start_time: Option<DateTime<Utc>>,
	pub end_time: Option<DateTime<Utc>>,
}

// One tracked instance of capturing a camera's stream to a file via an
// external transcoder process. The stream link is copied from the camera at
// creation time, so later registry changes cannot affect it.
//
// The process mutex is held for the whole of stop(), which makes the
// ongoing -> ended transition atomic with respect to concurrent stoppers.
pub struct Recording {
	record_id: RecordId,
	rtsp_stream: String,
	filename: PathBuf,
	state: RwLock<RecordingState>,
	process: Mutex<Option<tokio::process::Child>>,
}

impl Recording {
	pub fn new(rtsp_stream: String, output_directory: &Path) -> Recording {
		let record_id = format!("{:032x}", rand::random::<u128>());
		let filename = output_directory.join(format!("{}.mp4", record_id));

		Recording {
			record_id,
			rtsp_stream,
			filename,
			state: RwLock::new(RecordingState::default()),
			process: Mutex::new(None),
		}
	}

	pub fn record_id(&self) -> &str {
		&self.record_id
	}

	pub fn filename(&self) -> String {
		self.filename.to_string_lossy().into_owned()
	}

	pub async fn is_ongoing(&self) -> bool {
		let state = self.state.read().await;
		state.start_time.is_some() && state.end_time.is_none()
	}

	// Duration in whole seconds: (end or now) - start, zero if never started.
	pub async fn duration_sec(&self) -> i64 {
		let state = self.state.read().await;
		match state.start_time {
			Some(start) => (state.end_time.unwrap_or_else(Utc::now) - start).num_seconds(),
			None => 0,
		}
	}

	pub async fn summary(&self) -> RecordSummary {
		let state = self.state.read().await;
		RecordSummary {
			filename: self.filename(),
			record_id: self.record_id.clone(),
			start_time: state.start_time,
			end_time: state.end_time,
		}
	}

	// Spawn the transcoder and stamp the start time. Single-use: each
	// Recording is constructed fresh per request and started exactly once,
	// before it becomes visible to any other task.
	pub async fn start(&self, transcoder: &str) -> Result<(), VideoError> {
		if let Some(dir) = self.filename.parent() {
			fs::create_dir_all(dir).await.map_err(|err| {
				VideoError::Subprocess(format!(
					"Failed to create output directory {}: {}",
					dir.display(),
					err
				))
			})?;
		}

		// <transcoder> -rtsp_transport tcp -i <stream> -r 25 -c copy -map 0 <file>
		// remuxes the stream at a fixed frame rate without re-encoding.
		let child = Command::new(transcoder)
			.args(["-rtsp_transport", "tcp", "-i"])
			.arg(&self.rtsp_stream)
			.args(["-r", "25", "-c", "copy", "-map", "0"])
			.arg(&self.filename)
			.stdin(Stdio::piped())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true)
			.spawn()
			.map_err(|err| {
				VideoError::Subprocess(format!("Failed to spawn {}: {}", transcoder, err))
			})?;

		info!(
			"Started recording video '{}' using {}, pid {:?}",
			self.filename.display(),
			transcoder,
			child.id()
		);

		*self.process.lock().await = Some(child);
		self.state.write().await.start_time = Some(Utc::now());
		Ok(())
	}

	pub async fn stop(&self) -> Result<(), VideoError> {
		self.stop_with_grace(GRACEFUL_STOP_TIMEOUT).await
	}

	pub(crate) async fn stop_with_grace(&self, grace: Duration) -> Result<(), VideoError> {
		// Held until the end time is stamped; a concurrent stop blocks here
		// and then finds the handle already taken.
		let mut guard = self.process.lock().await;
		let mut child = guard
			.take()
			.ok_or_else(|| VideoError::NotOngoing(self.record_id.clone()))?;

		let duration = self.duration_sec().await;
		if duration < MINIMAL_RECORD_DURATION_SEC {
			warn!(
				"Recording {} duration is below the allowed minimum of {} s. Waiting for it to reach it before stopping.",
				self.record_id, MINIMAL_RECORD_DURATION_SEC
			);
			time::sleep(Duration::from_secs(
				(MINIMAL_RECORD_DURATION_SEC - duration) as u64,
			))
			.await;
		}

		info!(
			"Trying to stop record {} process pid {:?}",
			self.record_id,
			child.id()
		);

		if let Some(mut stdin) = child.stdin.take() {
			// quit byte on the control channel; closing the pipe signals EOF
			let _ = stdin.write_all(b"q").await;
			let _ = stdin.shutdown().await;
		}

		let force_kill = match time::timeout(grace, child.wait()).await {
			Ok(Ok(status)) => {
				if !status.success() {
					warn!(
						"Transcoder for record {} exited with {}",
						self.record_id, status
					);
				}
				false
			},
			Ok(Err(err)) => {
				error!(
					"Failed to wait for transcoder of record {}: {}",
					self.record_id, err
				);
				true
			},
			Err(_) => {
				warn!(
					"Transcoder for record {} ignored the quit signal; killing it",
					self.record_id
				);
				true
			},
		};

		if force_kill {
			if let Err(err) = child.kill().await {
				error!(
					"Failed to kill transcoder for record {}: {}",
					self.record_id, err
				);
				self.state.write().await.end_time = Some(Utc::now());
				return Err(VideoError::Subprocess(format!(
					"Failed to kill transcoder: {}",
					err
				)));
			}
		}

		self.state.write().await.end_time = Some(Utc::now());
		info!("Finished recording video for record {}", self.record_id);
		Ok(())
	}
}
