#[macro_use] extern crate rocket;
#[macro_use] extern crate serde_derive;

use std::path::Path;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use rocket::{Request, Response};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;

mod auth;
mod camera;
mod common;
mod config;
mod error;
mod recording;
mod registry;
mod rest_api;



// Since the UI is served by another server, we may need to setup CORS to allow the UI to make requests to this server.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
	fn info(&self) -> Info {
		Info {
			name: "Add CORS headers to responses",
			kind: Kind::Response
		}
	}

	async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
		response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
		response.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, OPTIONS"));
		response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
		response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
	}
}


#[rocket::main]
async fn main() -> anyhow::Result<()> {
	let matches = Command::new("rtsp-record-mgr")
		.version("0.1.0")
		.about("Authenticated gateway managing RTSP camera video recordings.")
		.arg(
			Arg::new("config")
				.action(ArgAction::Append)	// Allow argument to be specified multiple times; the last one wins
				.short('c')
				.long("config")
				.help("TOML file with gateway config")
		)
		.get_matches();

	let config_path = matches
		.get_many::<String>("config")
		.and_then(|mut paths| paths.next_back())
		.map(String::as_str)
		.unwrap_or(config::DEFAULT_CONFIG_PATH);

	// Malformed configuration is fatal: the server must not start with it.
	let gateway_config = config::read_config(Path::new(config_path))?;
	let camera_registry = camera::CameraRegistry::new(&gateway_config.cameras)?;
	let recording_registry = Arc::new(registry::RecordingRegistry::new(gateway_config.video.clone()));

	rocket::build()
		.attach(rest_api::stage(gateway_config, camera_registry, recording_registry))
		.attach(CORS)
		.launch()
		.await?;

	anyhow::Ok(())
}
