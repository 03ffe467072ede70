use log::warn;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

use crate::config::{Employee, GatewayConfig};



pub const RFID_CARD_HEADER: &str = "rfid-card-id";

// Well-known development card id, rejected in production.
const DEV_CARD_ID: &str = "1111111111";

// Request guard for the mutating video endpoints: the rfid-card-id header
// must identify a known employee. Listing endpoints skip the guard.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for Employee {
	type Error = ();

	async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
		let Some(config) = request.rocket().state::<GatewayConfig>() else {
			return Outcome::Error((Status::InternalServerError, ()));
		};

		let Some(card_id) = request.headers().get_one(RFID_CARD_HEADER) else {
			warn!("Authentication failed: no {} header", RFID_CARD_HEADER);
			return Outcome::Error((Status::Unauthorized, ()));
		};

		if config.api_server.production_environment && card_id == DEV_CARD_ID {
			warn!("Authentication failed: development credentials are not allowed in production");
			return Outcome::Error((Status::Unauthorized, ()));
		}

		match config
			.auth
			.employees
			.iter()
			.find(|employee| employee.rfid_card_id == card_id)
		{
			Some(employee) => Outcome::Success(employee.clone()),
			None => {
				warn!("Authentication failed: unknown card id");
				Outcome::Error((Status::Unauthorized, ()))
			},
		}
	}
}
