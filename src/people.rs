// SPDX-License-Identifier: MPL-2.0

//! Site membership: list users, change roles, remove users, and check
//! usernames before sending invites.

use crate::api::{Person, RemoteClient};
use crate::error::ActionError;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    UserNotFound,
    AlreadyMember,
    InvalidEmail,
    UserFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameValidation {
    pub username: String,
    pub result: ValidationResult,
}

pub struct PeopleClient {
    remote: Arc<dyn RemoteClient>,
}

impl PeopleClient {
    pub fn new(remote: Arc<dyn RemoteClient>) -> Self {
        Self { remote }
    }

    pub async fn fetch_users(&self, blog_id: &str, local_blog_id: i64) -> Result<Vec<Person>, ActionError> {
        let path = format!("sites/{}/users", blog_id);
        let response = self.remote.get(&path, &[]).await.inspect_err(|e| {
            warn!(%path, error = %e, "fetching users failed");
        })?;

        let users = response
            .get("users")
            .and_then(Value::as_array)
            .ok_or_else(|| ActionError::MalformedResponse(format!("{} has no users list", path)))?;

        Ok(users
            .iter()
            .filter_map(|json| Person::from_json(json, blog_id, local_blog_id))
            .collect())
    }

    pub async fn update_role(
        &self,
        blog_id: &str,
        person_id: i64,
        new_role: &str,
        local_blog_id: i64,
    ) -> Result<Person, ActionError> {
        let path = format!("sites/{}/users/{}", blog_id, person_id);
        let params = vec![("roles".to_string(), new_role.to_lowercase())];
        let response = self.remote.post(&path, &params).await?;

        Person::from_json(&response, blog_id, local_blog_id).ok_or_else(|| {
            warn!(%path, "role update response does not describe a person");
            ActionError::MalformedResponse(format!("{} returned no person", path))
        })
    }

    /// Returns the removed person's id and local blog id
    pub async fn remove_person(
        &self,
        blog_id: &str,
        person_id: i64,
        local_blog_id: i64,
    ) -> Result<(i64, i64), ActionError> {
        let path = format!("sites/{}/users/{}/delete", blog_id, person_id);
        let response = self.remote.post(&path, &[]).await?;

        if response.get("success").and_then(Value::as_bool) == Some(true) {
            Ok((person_id, local_blog_id))
        } else {
            Err(ActionError::Rejected)
        }
    }

    /// Check which usernames can be invited to the site.
    ///
    /// Results come back in the order the server reports them: errors in
    /// input order, then successes. If the server's answers don't add up to
    /// the number of usernames asked about, the results gathered so far are
    /// returned inside [`ActionError::PartialValidation`].
    pub async fn validate_usernames(
        &self,
        usernames: &[String],
        blog_id: &str,
    ) -> Result<Vec<UsernameValidation>, ActionError> {
        let path = format!("sites/{}/invites/validate", blog_id);
        let mut params: Vec<(String, String)> = usernames
            .iter()
            // Array keys keep each invitee a distinct form field
            .map(|u| (format!("invitees[{}]", u), u.clone()))
            .collect();
        // Any valid role works; only the usernames are being checked
        params.push(("role".to_string(), "follower".to_string()));

        let response = self.remote.post(&path, &params).await?;
        let results = parse_validation(usernames, &response)?;
        debug!(checked = usernames.len(), "usernames validated");
        Ok(results)
    }
}

fn parse_validation(usernames: &[String], response: &Value) -> Result<Vec<UsernameValidation>, ActionError> {
    let mut results = Vec::new();

    if let Some(errors) = response.get("errors").and_then(Value::as_object) {
        for username in usernames {
            let Some(error) = errors.get(username) else {
                continue;
            };
            let code = error.get("code").and_then(Value::as_str).unwrap_or_default();
            let message = error.get("message").and_then(Value::as_str).unwrap_or_default();

            let result = match (code, message) {
                ("invalid_input", "User not found") => ValidationResult::UserNotFound,
                ("invalid_input", "Invalid email") => ValidationResult::InvalidEmail,
                ("invalid_input_has_role", _) => ValidationResult::AlreadyMember,
                _ => {
                    return Err(ActionError::UnrecognizedValidation {
                        username: username.clone(),
                        code: code.to_string(),
                        results,
                    });
                }
            };
            results.push(UsernameValidation {
                username: username.clone(),
                result,
            });
        }
    }
    let errored = results.len();

    let succeeded = response
        .get("success")
        .and_then(Value::as_array)
        .ok_or_else(|| ActionError::MalformedResponse("validation has no success list".into()))?;

    for username in succeeded.iter().filter_map(Value::as_str) {
        if usernames.iter().any(|u| u == username) {
            results.push(UsernameValidation {
                username: username.to_string(),
                result: ValidationResult::UserFound,
            });
        }
    }

    if results.len() != usernames.len() {
        warn!(
            errored,
            succeeded = results.len() - errored,
            expected = usernames.len(),
            "username validation incomplete"
        );
        return Err(ActionError::PartialValidation {
            results,
            expected: usernames.len(),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRemote;
    use serde_json::json;

    fn setup() -> (Arc<MockRemote>, PeopleClient) {
        let remote = Arc::new(MockRemote::new());
        let people = PeopleClient::new(remote.clone());
        (remote, people)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn count(results: &[UsernameValidation], kind: ValidationResult) -> usize {
        results.iter().filter(|r| r.result == kind).count()
    }

    #[tokio::test]
    async fn test_validation_counts_reconcile() {
        let (remote, people) = setup();
        remote.reply_ok(json!({
            "errors": { "carol": { "code": "invalid_input_has_role", "message": "Already a member" } },
            "success": ["alice", "bob"]
        }));

        let results = people
            .validate_usernames(&names(&["alice", "bob", "carol"]), "123")
            .await
            .unwrap();

        assert_eq!(count(&results, ValidationResult::AlreadyMember), 1);
        assert_eq!(count(&results, ValidationResult::UserFound), 2);

        let call = &remote.calls()[0];
        assert_eq!(call.path, "sites/123/invites/validate");
        assert_eq!(call.param("invitees[carol]"), Some("carol"));
        assert_eq!(call.param("role"), Some("follower"));
    }

    #[tokio::test]
    async fn test_validation_error_messages() {
        let (remote, people) = setup();
        remote.reply_ok(json!({
            "errors": {
                "ghost": { "code": "invalid_input", "message": "User not found" },
                "bad@": { "code": "invalid_input", "message": "Invalid email" }
            },
            "success": []
        }));

        let results = people
            .validate_usernames(&names(&["ghost", "bad@"]), "123")
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                UsernameValidation {
                    username: "ghost".into(),
                    result: ValidationResult::UserNotFound
                },
                UsernameValidation {
                    username: "bad@".into(),
                    result: ValidationResult::InvalidEmail
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_error_code_stops_validation() {
        let (remote, people) = setup();
        remote.reply_ok(json!({
            "errors": {
                "alice": { "code": "invalid_input_has_role" },
                "bob": { "code": "rate_limited" }
            },
            "success": ["carol"]
        }));

        let err = people
            .validate_usernames(&names(&["alice", "bob", "carol"]), "123")
            .await
            .unwrap_err();

        match err {
            ActionError::UnrecognizedValidation { username, code, results } => {
                assert_eq!(username, "bob");
                assert_eq!(code, "rate_limited");
                assert_eq!(results.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_counts_that_dont_add_up() {
        let (remote, people) = setup();
        remote.reply_ok(json!({ "success": ["alice", "mallory"] }));

        let err = people
            .validate_usernames(&names(&["alice", "bob"]), "123")
            .await
            .unwrap_err();

        match err {
            ActionError::PartialValidation { results, expected } => {
                assert_eq!(expected, 2);
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].username, "alice");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_success_list() {
        let (remote, people) = setup();
        remote.reply_ok(json!({ "errors": {} }));

        let err = people
            .validate_usernames(&names(&["alice"]), "123")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_users_skips_unmappable_entries() {
        let (remote, people) = setup();
        remote.reply_ok(json!({
            "users": [
                { "ID": 1, "login": "alice", "name": "Alice", "roles": ["administrator"] },
                { "login": "no-id" },
                { "ID": 2, "login": "bob" }
            ]
        }));

        let users = people.fetch_users("123", 7).await.unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].role.as_deref(), Some("administrator"));
        assert_eq!(users[1].blog_id, "123");
        assert_eq!(remote.calls()[0].path, "sites/123/users");
    }

    #[tokio::test]
    async fn test_fetch_users_failures() {
        let (remote, people) = setup();
        remote.reply_ok(json!({ "found": 0 }));
        remote.reply_err();

        assert!(matches!(
            people.fetch_users("123", 7).await,
            Err(ActionError::MalformedResponse(_))
        ));
        assert!(matches!(
            people.fetch_users("123", 7).await,
            Err(ActionError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_update_role_lowercases() {
        let (remote, people) = setup();
        remote.reply_ok(json!({ "ID": 4, "login": "dave", "roles": ["editor"] }));

        let person = people.update_role("123", 4, "Editor", 7).await.unwrap();

        assert_eq!(person.role.as_deref(), Some("editor"));
        let call = &remote.calls()[0];
        assert_eq!(call.path, "sites/123/users/4");
        assert_eq!(call.param("roles"), Some("editor"));
    }

    #[tokio::test]
    async fn test_remove_person() {
        let (remote, people) = setup();
        remote.reply_ok(json!({ "success": true }));
        remote.reply_ok(json!({ "success": false }));

        assert_eq!(people.remove_person("123", 4, 7).await.unwrap(), (4, 7));
        assert!(matches!(
            people.remove_person("123", 4, 7).await,
            Err(ActionError::Rejected)
        ));
        assert_eq!(remote.calls()[0].path, "sites/123/users/4/delete");
    }
}
