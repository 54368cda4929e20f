//! Wire-level request and response shapes exchanged with the grocery server
//!
//! Response types decode leniently (unknown fields are ignored) but every
//! required field must be present. Request types validate their input on
//! construction so an invalid body never reaches the network.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClientError;

/// A grocery category as stored on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub title: String,
    pub color: String,
}

/// Body of a "save category" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRequest {
    pub title: String,
    pub color: String,
}

impl CategoryRequest {
    /// Build a request, trimming the title.
    ///
    /// Fails when the trimmed title is empty or the color is not a 6 (RGB)
    /// or 8 (ARGB) digit hex string with an optional leading `#`.
    pub fn new(title: &str, color: &str) -> Result<Self, ClientError> {
        let title = non_empty_title(title)?;
        if !is_hex_color(color) {
            return Err(ClientError::InvalidRequest {
                message: format!("color '{}' is not a 6 or 8 digit hex value", color),
            });
        }

        Ok(Self {
            title,
            color: color.to_string(),
        })
    }
}

/// A grocery item as stored on the server. Items always belong to exactly one
/// category, which is expressed by the URL they are fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub quantity: i64,
}

/// Body of a "save item" request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub title: String,
    pub price: f64,
    pub quantity: i64,
}

impl ItemRequest {
    /// Build a request, trimming the title. Price and quantity must be positive.
    pub fn new(title: &str, price: f64, quantity: i64) -> Result<Self, ClientError> {
        let title = non_empty_title(title)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ClientError::InvalidRequest {
                message: format!("price must be greater than zero, got {}", price),
            });
        }
        if quantity <= 0 {
            return Err(ClientError::InvalidRequest {
                message: format!("quantity must be greater than zero, got {}", quantity),
            });
        }

        Ok(Self {
            title,
            price,
            quantity,
        })
    }
}

/// Username and password posted to the register and sign-in endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Surrounding whitespace is stripped from both fields.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            password: password.trim().to_string(),
        }
    }
}

/// Reply to a sign-in attempt.
///
/// `error == true` is a domain-level rejection with a human-readable `reason`.
/// `error == false` must carry both `token` and `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInResponse {
    pub error: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(rename = "userID", default)]
    pub user_id: Option<Uuid>,
}

impl SignInResponse {
    /// The session an accepted sign-in carries.
    ///
    /// A rejection becomes `Application`; an acceptance missing the token or
    /// the user id becomes `ContractViolation`.
    pub fn session(&self) -> Result<Session, ClientError> {
        if self.error {
            return Err(ClientError::Application {
                reason: self.reason.clone(),
            });
        }
        match (&self.token, self.user_id) {
            (Some(token), Some(user_id)) => Ok(Session {
                token: token.clone(),
                user_id,
            }),
            (token, user_id) => Err(ClientError::ContractViolation {
                message: format!(
                    "sign-in succeeded without {}",
                    match (token, user_id) {
                        (None, None) => "a token or user id",
                        (None, Some(_)) => "a token",
                        _ => "a user id",
                    }
                ),
            }),
        }
    }
}

/// Reply to a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub error: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl RegisterResponse {
    /// `Application` when the server rejected the registration.
    pub fn into_result(self) -> Result<(), ClientError> {
        if self.error {
            Err(ClientError::Application {
                reason: self.reason,
            })
        } else {
            Ok(())
        }
    }
}

/// An authenticated session: a bearer token and the user it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
}

fn non_empty_title(title: &str) -> Result<String, ClientError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidRequest {
            message: "title must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn is_hex_color(color: &str) -> bool {
    let digits = color.strip_prefix('#').unwrap_or(color);
    matches!(digits.len(), 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_category_list() {
        let json = r##"[{"id":"6f1c2a8e-3d4b-4a9f-8c2e-1b7d5e9f0a12","title":"Seafood","color":"#FF3498DB"}]"##;
        let categories: Vec<CategoryResponse> = serde_json::from_str(json).unwrap();

        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].title, "Seafood");
        assert_eq!(categories[0].color, "#FF3498DB");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = r#"{"id":"6f1c2a8e-3d4b-4a9f-8c2e-1b7d5e9f0a12","title":"Milk","price":1.5,"quantity":2,"user":"x"}"#;
        let item: ItemResponse = serde_json::from_str(json).unwrap();
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let json = r#"{"id":"6f1c2a8e-3d4b-4a9f-8c2e-1b7d5e9f0a12","title":"Milk"}"#;
        assert!(serde_json::from_str::<ItemResponse>(json).is_err());
    }

    #[test]
    fn test_category_request_echo_preserves_fields() {
        let request = CategoryRequest::new("Dairy", "#FFFFFFFF").unwrap();
        let encoded = serde_json::to_value(&request).unwrap();

        // The server echoes the body back with an assigned id
        let mut echoed = encoded.clone();
        echoed["id"] = serde_json::json!(Uuid::new_v4());
        let response: CategoryResponse = serde_json::from_value(echoed).unwrap();

        assert_eq!(response.title, "Dairy");
        assert_eq!(response.color, "#FFFFFFFF");
    }

    #[test]
    fn test_category_request_trims_and_validates() {
        let request = CategoryRequest::new("  Produce \n", "34C759").unwrap();
        assert_eq!(request.title, "Produce");

        assert!(matches!(
            CategoryRequest::new("   ", "#FFFFFFFF"),
            Err(ClientError::InvalidRequest { .. })
        ));
        assert!(CategoryRequest::new("Produce", "#FFF").is_err());
        assert!(CategoryRequest::new("Produce", "#GGGGGGGG").is_err());
    }

    #[test]
    fn test_item_request_validation() {
        assert!(ItemRequest::new("Eggs", 3.25, 12).is_ok());
        assert!(ItemRequest::new("", 3.25, 12).is_err());
        assert!(ItemRequest::new("Eggs", 0.0, 12).is_err());
        assert!(ItemRequest::new("Eggs", f64::NAN, 12).is_err());
        assert!(ItemRequest::new("Eggs", 3.25, 0).is_err());
    }

    #[test]
    fn test_sign_in_response_wire_names() {
        let json = r#"{"error":false,"token":"abc","userID":"6f1c2a8e-3d4b-4a9f-8c2e-1b7d5e9f0a12"}"#;
        let response: SignInResponse = serde_json::from_str(json).unwrap();
        assert!(!response.error);
        assert_eq!(response.token.as_deref(), Some("abc"));
        assert!(response.user_id.is_some());
        assert!(response.reason.is_none());
    }

    #[test]
    fn test_sign_in_session_requires_both_fields() {
        let user_id = Uuid::new_v4();
        let accepted = SignInResponse {
            error: false,
            reason: None,
            token: Some("abc".to_string()),
            user_id: Some(user_id),
        };
        assert_eq!(
            accepted.session().unwrap(),
            Session {
                token: "abc".to_string(),
                user_id
            }
        );

        let missing_user = SignInResponse {
            user_id: None,
            ..accepted.clone()
        };
        assert!(matches!(
            missing_user.session(),
            Err(ClientError::ContractViolation { .. })
        ));

        let rejected = SignInResponse {
            error: true,
            reason: Some("Invalid username or password.".to_string()),
            token: None,
            user_id: None,
        };
        assert_eq!(
            rejected.session(),
            Err(ClientError::Application {
                reason: Some("Invalid username or password.".to_string())
            })
        );
    }

    #[test]
    fn test_register_rejection_into_result() {
        let rejected: RegisterResponse =
            serde_json::from_str(r#"{"error":true,"reason":"Username is already taken."}"#)
                .unwrap();
        assert!(matches!(
            rejected.into_result(),
            Err(ClientError::Application { reason: Some(_) })
        ));
    }
}
