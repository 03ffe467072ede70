use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use rocket::fairing::AdHoc;
use rocket::serde::json::{json, Json, Value};
use rocket::State;

use crate::camera::{self, CameraRegistry};
use crate::common::CameraNumber;
use crate::config::{Employee, GatewayConfig};
use crate::error::VideoError;
use crate::recording::RecordSummary;
use crate::registry::{self, RecordingRegistry};



#[derive(Serialize, Deserialize)]
pub struct StartRecordResponse {
	pub status: u16,
	pub details: String,
	pub record_id: String,
}

#[derive(Serialize, Deserialize)]
pub struct StopRecordResponse {
	pub status: u16,
	pub details: String,
	pub filename: String,
}

#[derive(Serialize, Deserialize)]
pub struct CameraModel {
	pub number: CameraNumber,
	pub host: String,
	pub is_up: bool,
}

#[derive(Serialize, Deserialize)]
pub struct CameraList {
	pub status: u16,
	pub details: String,
	pub cameras: Vec<CameraModel>,
}

#[derive(Serialize, Deserialize)]
pub struct RecordList {
	pub status: u16,
	pub details: String,
	pub ongoing_records: Vec<RecordSummary>,
	pub ended_records: Vec<RecordSummary>,
}


#[post("/camera/<camera_number>/start")]
async fn start_recording(
	camera_number: CameraNumber,
	_employee: Employee,
	cameras: &State<CameraRegistry>,
	records: &State<Arc<RecordingRegistry>>,
) -> Result<Json<StartRecordResponse>, VideoError> {
	let camera = cameras
		.get(camera_number)
		.ok_or(VideoError::CameraNotFound(camera_number))?;

	match records.start_recording(camera).await {
		Ok(record_id) => {
			let message = format!("Started recording video for recording {}", record_id);
			info!("{}", message);
			Ok(Json(StartRecordResponse {
				status: 200,
				details: message,
				record_id,
			}))
		},
		Err(err) => {
			error!(
				"Failed to start recording video for camera {}: {}",
				camera_number, err
			);
			Err(err)
		},
	}
}

#[post("/record/<record_id>/stop")]
async fn stop_recording(
	record_id: &str,
	_employee: Employee,
	records: &State<Arc<RecordingRegistry>>,
) -> Result<Json<StopRecordResponse>, VideoError> {
	match records.stop_recording(record_id).await {
		Ok(filename) => {
			let message = format!("Stopped recording video for recording {}", record_id);
			info!("{}", message);
			Ok(Json(StopRecordResponse {
				status: 200,
				details: message,
				filename,
			}))
		},
		Err(err) => {
			error!(
				"Failed to stop recording video for recording {}: {}",
				record_id, err
			);
			Err(err)
		},
	}
}

#[get("/cameras")]
async fn get_cameras(cameras: &State<CameraRegistry>) -> Json<CameraList> {
	let mut cameras_data = Vec::new();
	for camera in cameras.iter() {
		cameras_data.push(CameraModel {
			number: camera.number,
			host: camera.host(),
			is_up: camera::probe(camera).await,
		});
	}

	let message = format!("Collected {} cameras", cameras_data.len());
	info!("{}", message);

	Json(CameraList {
		status: 200,
		details: message,
		cameras: cameras_data,
	})
}

#[get("/records")]
async fn get_records(records: &State<Arc<RecordingRegistry>>) -> Json<RecordList> {
	let (ongoing_records, ended_records) = records.list().await;

	let message = format!(
		"Collected {} ongoing and {} ended records",
		ongoing_records.len(),
		ended_records.len()
	);
	info!("{}", message);

	Json(RecordList {
		status: 200,
		details: message,
		ongoing_records,
		ended_records,
	})
}


#[catch(404)]
fn not_found() -> Value {
	json!({
		"status": 404,
		"details": "Resource was not found."
	})
}

#[catch(401)]
fn unauthorized() -> Value {
	json!({
		"status": 401,
		"details": "Authentication failed."
	})
}


pub fn stage(
	config: GatewayConfig,
	cameras: CameraRegistry,
	records: Arc<RecordingRegistry>,
) -> AdHoc {
	AdHoc::on_ignite("Video gateway", move |rocket| async move {
		let sweeper_records = records.clone();
		let drain_records = records.clone();
		let sweep_interval = Duration::from_secs(config.video.sweep_interval_sec);

		rocket
			.manage(config)
			.manage(cameras)
			.manage(records)
			.register("/", catchers![not_found, unauthorized])
			.mount(
				"/video",
				routes![start_recording, stop_recording, get_cameras, get_records],
			)
			.attach(AdHoc::on_liftoff("Stuck record sweeper", move |rocket| {
				let shutdown = rocket.shutdown();
				Box::pin(async move {
					tokio::spawn(registry::end_stuck_records(
						sweeper_records,
						sweep_interval,
						shutdown,
					));
				})
			}))
			.attach(AdHoc::on_shutdown("Drain ongoing recordings", move |_rocket| {
				Box::pin(async move {
					drain_records.drain().await;
				})
			}))
	})
}


#[cfg(test)]
mod tests {
	use super::*;

	use std::path::Path;

	use rocket::http::{Header, Status};
	use rocket::local::asynchronous::Client;

	use crate::auth;
	use crate::config::{ApiServerConfig, AuthConfig, CameraConfigSection, VideoConfig};
	use crate::recording::tests::{fake_transcoder, GRACEFUL_STUB};

	const TEST_CARD_ID: &str = "0008368511";

	// Camera 1 points at a local listener passed in by the test; camera 2
	// points at a port nothing listens on.
	fn test_config(dir: &Path, camera_port: u16) -> GatewayConfig {
		GatewayConfig {
			api_server: ApiServerConfig {
				production_environment: false,
			},
			auth: AuthConfig {
				employees: vec![Employee {
					rfid_card_id: TEST_CARD_ID.to_string(),
					name: "Test Operator".to_string(),
					position: "Technician".to_string(),
				}],
			},
			video: VideoConfig {
				output_directory: dir.to_path_buf(),
				transcoder: fake_transcoder(dir, GRACEFUL_STUB),
				max_record_duration_sec: 3600,
				sweep_interval_sec: 60,
			},
			cameras: vec![
				CameraConfigSection {
					number: 1,
					ip: "127.0.0.1".to_string(),
					port: camera_port,
					rtsp_stream_link: format!("rtsp://127.0.0.1:{}/stream", camera_port),
				},
				CameraConfigSection {
					number: 2,
					ip: "127.0.0.1".to_string(),
					port: 1,
					rtsp_stream_link: "rtsp://127.0.0.1:1/stream".to_string(),
				},
			],
		}
	}

	async fn test_client(config: GatewayConfig) -> Client {
		let cameras = CameraRegistry::new(&config.cameras).unwrap();
		let records = Arc::new(RecordingRegistry::new(config.video.clone()));
		let rocket = rocket::build().attach(stage(config, cameras, records));
		Client::tracked(rocket).await.unwrap()
	}

	fn auth_header() -> Header<'static> {
		Header::new(auth::RFID_CARD_HEADER, TEST_CARD_ID)
	}

	#[rocket::async_test]
	async fn start_requires_authentication() {
		let dir = tempfile::tempdir().unwrap();
		let client = test_client(test_config(dir.path(), 1)).await;

		let response = client.post("/video/camera/1/start").dispatch().await;
		assert_eq!(response.status(), Status::Unauthorized);

		let body = response.into_json::<serde_json::Value>().await.unwrap();
		assert_eq!(body["status"], 401);
	}

	#[rocket::async_test]
	async fn unknown_card_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let client = test_client(test_config(dir.path(), 1)).await;

		let response = client
			.post("/video/camera/1/start")
			.header(Header::new(auth::RFID_CARD_HEADER, "0000000000"))
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::Unauthorized);
	}

	#[rocket::async_test]
	async fn unknown_camera_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let client = test_client(test_config(dir.path(), 1)).await;

		let response = client
			.post("/video/camera/99/start")
			.header(auth_header())
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::NotFound);
	}

	#[rocket::async_test]
	async fn unreachable_camera_reports_error_in_body() {
		let dir = tempfile::tempdir().unwrap();
		let client = test_client(test_config(dir.path(), 1)).await;

		let response = client
			.post("/video/camera/2/start")
			.header(auth_header())
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::Ok);

		let body = response.into_json::<serde_json::Value>().await.unwrap();
		assert_eq!(body["status"], 500);
		assert!(body.get("record_id").is_none());
	}

	#[rocket::async_test]
	async fn stop_of_unknown_record_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let client = test_client(test_config(dir.path(), 1)).await;

		let response = client
			.post("/video/record/0123456789abcdef/stop")
			.header(auth_header())
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::NotFound);
	}

	#[rocket::async_test]
	async fn record_lifecycle_over_http() {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let dir = tempfile::tempdir().unwrap();
		let client = test_client(test_config(dir.path(), port)).await;

		let response = client
			.post("/video/camera/1/start")
			.header(auth_header())
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::Ok);
		let body = response.into_json::<serde_json::Value>().await.unwrap();
		assert_eq!(body["status"], 200);
		let record_id = body["record_id"].as_str().unwrap().to_string();

		let listing = client.get("/video/records").dispatch().await;
		let listing = listing.into_json::<serde_json::Value>().await.unwrap();
		assert_eq!(listing["ongoing_records"].as_array().unwrap().len(), 1);
		assert!(listing["ended_records"].as_array().unwrap().is_empty());
		assert_eq!(
			listing["ongoing_records"][0]["record_id"].as_str(),
			Some(record_id.as_str())
		);

		let response = client
			.post(format!("/video/record/{}/stop", record_id))
			.header(auth_header())
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::Ok);
		let body = response.into_json::<serde_json::Value>().await.unwrap();
		assert_eq!(body["status"], 200);
		assert!(body["filename"].as_str().unwrap().contains(&record_id));

		// stopping a second time must not succeed again
		let response = client
			.post(format!("/video/record/{}/stop", record_id))
			.header(auth_header())
			.dispatch()
			.await;
		assert_eq!(response.status(), Status::Conflict);

		let listing = client.get("/video/records").dispatch().await;
		let listing = listing.into_json::<serde_json::Value>().await.unwrap();
		assert!(listing["ongoing_records"].as_array().unwrap().is_empty());
		assert_eq!(listing["ended_records"].as_array().unwrap().len(), 1);
	}

	#[rocket::async_test]
	async fn cameras_listing_reflects_reachability() {
		let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();

		let dir = tempfile::tempdir().unwrap();
		let client = test_client(test_config(dir.path(), port)).await;

		let response = client.get("/video/cameras").dispatch().await;
		assert_eq!(response.status(), Status::Ok);
		let body = response.into_json::<serde_json::Value>().await.unwrap();

		let cameras = body["cameras"].as_array().unwrap();
		assert_eq!(cameras.len(), 2);
		for camera in cameras {
			match camera["number"].as_u64().unwrap() {
				1 => assert_eq!(camera["is_up"], true),
				2 => assert_eq!(camera["is_up"], false),
				number => panic!("unexpected camera {}", number),
			}
		}
	}
}
