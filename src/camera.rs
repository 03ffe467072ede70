use std::collections::HashMap;
use std::time::Duration;

use anyhow::bail;
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::time;

use crate::common::{Camera, CameraNumber};
use crate::config::CameraConfigSection;



const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

// Built once from configuration at startup; read-only afterwards, so it is
// shared without locking.
pub struct CameraRegistry {
	cameras: HashMap<CameraNumber, Camera>,
}

impl CameraRegistry {
	pub fn new(sections: &[CameraConfigSection]) -> anyhow::Result<CameraRegistry> {
		let mut cameras = HashMap::new();

		for section in sections {
			let camera = Camera {
				number: section.number,
				ip: section.ip.clone(),
				port: section.port,
				rtsp_stream_link: section.rtsp_stream_link.clone(),
			};
			if cameras.insert(section.number, camera).is_some() {
				bail!("Duplicate camera number in config: {}", section.number);
			}
		}

		info!("Initialized {} cameras", cameras.len());
		Ok(CameraRegistry { cameras })
	}

	pub fn get(&self, number: CameraNumber) -> Option<&Camera> {
		self.cameras.get(&number)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Camera> {
		self.cameras.values()
	}
}

// Check whether the camera is reachable on its host and port. Connection
// failure is an expected outcome, never an error.
pub async fn probe(camera: &Camera) -> bool {
	let connect = TcpStream::connect((camera.ip.as_str(), camera.port));

	match time::timeout(PROBE_TIMEOUT, connect).await {
		Ok(Ok(_)) => {
			debug!("{} is up", camera);
			true
		},
		Ok(Err(err)) => {
			warn!("{} is unreachable: {}", camera, err);
			false
		},
		Err(_) => {
			warn!("{} is unreachable: probe timed out", camera);
			false
		},
	}
}
