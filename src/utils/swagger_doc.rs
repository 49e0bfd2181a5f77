use crate::utils::error::AppError;
use okapi::openapi3::SchemaObject;
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::RefOr;
use rocket_okapi::okapi::openapi3::{MediaType, Response, Responses};
use rocket_okapi::response::OpenApiResponderInner;
use serde_json::json;

impl<'r> OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();

        // One documented example per status code the API can produce
        let error_responses = [
            (AppError::ValidationError("Invalid request body".to_string()), "Bad Request"),
            (AppError::AuthError("Invalid credentials".to_string()), "Unauthorized"),
            (AppError::Forbidden("Admin role required".to_string()), "Forbidden"),
            (AppError::NotFound("Flight not found".to_string()), "Not Found"),
            (AppError::SeatConflict("Seats already taken: 12".to_string()), "Conflict"),
            (AppError::DatabaseError("Internal server error".to_string()), "Internal Server Error"),
            (AppError::Unavailable("Storage operation timed out".to_string()), "Service Unavailable"),
        ];

        for (error, description) in error_responses {
            responses.responses.insert(
                error.status().code.to_string(),
                RefOr::Object(Response {
                    description: description.to_string(),
                    content: {
                        let mut content = okapi::Map::new();
                        content.insert(
                            "application/json".to_string(),
                            MediaType {
                                schema: Some(SchemaObject::default()),
                                example: Some(json!({
                                    "error": error.to_string()
                                })),
                                ..Default::default()
                            },
                        );
                        content
                    },
                    ..Default::default()
                }),
            );
        }

        Ok(responses)
    }
}
