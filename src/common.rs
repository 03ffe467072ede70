use std::fmt;



pub type CameraNumber = u32;
pub type RecordId = String;

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct Camera {
	pub number: CameraNumber,
	pub ip: String,
	pub port: u16,
	pub rtsp_stream_link: String,
}

impl Camera {
	pub fn host(&self) -> String {
		format!("{}:{}", self.ip, self.port)
	}
}

impl fmt::Display for Camera {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Camera no.{} host at {}:{}", self.number, self.ip, self.port)
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Serialize, Deserialize)]
pub struct GenericResponse {
	pub status: u16,
	pub details: String,
}
