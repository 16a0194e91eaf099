use mongodb::{bson::doc, Database};
use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::retry;

pub fn routes() -> Vec<Route> {
    routes![health]
}

/// Service liveness plus a database probe.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[get("/health")]
async fn health(db: &State<Database>) -> Json<HealthReport> {
    let probe = retry::execute(|| {
        let db = (*db).clone();
        async move { db.run_command(doc! { "buildInfo": 1 }, None).await }
    })
    .await;

    let database = match probe {
        Ok(info) => DatabaseHealth {
            connected: true,
            version: info.get_str("version").ok().map(String::from),
            error: None,
        },
        Err(err) => {
            error!("Database health check failed: {err}");
            DatabaseHealth {
                connected: false,
                version: None,
                error: Some(err.to_string()),
            }
        }
    };

    Json(HealthReport {
        status: "ok",
        database,
    })
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;
    use rocket::local::asynchronous::Client;
    use rocket::serde::json::serde_json;

    use super::*;

    /// The response type with an owned `status`, for deserialisation.
    #[derive(Debug, Deserialize)]
    struct Report {
        status: String,
        database: DatabaseHealth,
    }

    #[backend_test]
    async fn healthy(client: Client) {
        let response = client.get(uri!("/api", health())).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let report: Report =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(report.status, "ok");
        assert!(report.database.connected);
        assert!(report.database.version.is_some());
        assert!(report.database.error.is_none());
    }
}
