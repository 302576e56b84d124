use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, IndexModel};
use std::error::Error;

use crate::booking::model::Appointment;
use crate::otp::model::OtpChallenge;
use crate::user::model::User;

pub const DB_NAME: &str = "coolcuts";

pub struct Database {
    pub client: Client,
}

impl Database {
    pub async fn init() -> Result<Self, Box<dyn Error>> {
        let mongodb_uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mut client_options = ClientOptions::parse(&mongodb_uri).await?;
        client_options.app_name = Some("coolcuts_backend".to_string());

        let client = Client::with_options(client_options)?;

        // Ping the server to see if we can reach the cluster
        client.database("admin").run_command(doc! {"ping": 1}).await?;

        println!("Connected successfully to MongoDB");

        Ok(Self { client })
    }

    /// Create the unique indexes the services rely on as correctness backstops:
    /// one account per normalized email, one pending OTP challenge per email,
    /// and at most one appointment per (date, time) slot across all users.
    pub async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let db = self.client.database(DB_NAME);

        db.collection::<User>("users")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("unique_user_email".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await?;

        db.collection::<OtpChallenge>("otp_challenges")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("unique_otp_email".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await?;

        db.collection::<Appointment>("appointments")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "appointment_date": 1, "appointment_time": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("unique_appointment_slot".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await?;

        Ok(())
    }
}

/// Duplicate-key (code 11000) is the one storage error the services expect and
/// translate; anything else is surfaced as an internal error.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::error::{CommandError, WriteError};

    // The driver's error structs are non-exhaustive, so tests build them the
    // way the driver itself does: by deserializing a server-shaped reply.
    fn write_error(code: i32) -> mongodb::error::Error {
        let write_error: WriteError = mongodb::bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: coolcuts.appointments",
            "message": "E11000 duplicate key error collection: coolcuts.appointments",
        })
        .unwrap();
        ErrorKind::Write(WriteFailure::WriteError(write_error)).into()
    }

    fn command_error(code: i32) -> mongodb::error::Error {
        let command_error: CommandError = mongodb::bson::from_document(doc! {
            "code": code,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: coolcuts.users",
            "message": "E11000 duplicate key error collection: coolcuts.users",
        })
        .unwrap();
        ErrorKind::Command(command_error).into()
    }

    #[test]
    fn duplicate_key_recognized_on_write_and_command_paths() {
        assert!(is_duplicate_key(&write_error(11000)));
        assert!(is_duplicate_key(&command_error(11000)));
    }

    #[test]
    fn other_storage_errors_are_not_duplicate_key() {
        // 121 is a document validation failure, 50 is MaxTimeMSExpired
        assert!(!is_duplicate_key(&write_error(121)));
        assert!(!is_duplicate_key(&command_error(50)));
    }
}

/// Convenience wrapper: connect, create indexes, hand back the client
pub async fn connect_to_mongo() -> Result<Client, Box<dyn Error>> {
    let database = Database::init().await.map_err(|e| {
        eprintln!("Failed to initialize database: {:?}", e);
        e
    })?;
    database.ensure_indexes().await?;
    Ok(database.client)
}
