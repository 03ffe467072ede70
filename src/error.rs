use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;

use thiserror::Error;

use crate::common::{CameraNumber, GenericResponse};



#[derive(Debug, Error)]
pub enum VideoError {
	#[error("No such camera: {0}")]
	CameraNotFound(CameraNumber),
	#[error("No such recording: {0}")]
	RecordNotFound(String),
	#[error("{0} is unreachable")]
	CameraUnreachable(String),
	#[error("Recording {0} is not currently ongoing thus cannot be stopped")]
	NotOngoing(String),
	#[error("Transcoder failure: {0}")]
	Subprocess(String),
}

impl VideoError {
	// HTTP status of the response and the status code embedded in its body.
	// Unreachable cameras and transcoder failures keep the generic-response
	// pattern: a 200 envelope carrying an error status inside.
	fn statuses(&self) -> (Status, u16) {
		match self {
			VideoError::CameraNotFound(_) => (Status::NotFound, 404),
			VideoError::RecordNotFound(_) => (Status::NotFound, 404),
			VideoError::CameraUnreachable(_) => (Status::Ok, 500),
			VideoError::NotOngoing(_) => (Status::Conflict, 409),
			VideoError::Subprocess(_) => (Status::Ok, 500),
		}
	}
}

impl<'r> Responder<'r, 'static> for VideoError {
	fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
		let (http_status, body_status) = self.statuses();
		let body = GenericResponse {
			status: body_status,
			details: self.to_string(),
		};

		let mut response = Json(body).respond_to(request)?;
		response.set_status(http_status);
		Ok(response)
	}
}
