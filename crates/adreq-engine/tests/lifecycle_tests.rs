//! End-to-end lifecycle tests over the in-memory store with recording
//! channel fakes.

use std::sync::Arc;

use adreq_core::model::MAX_USERNAME_LEN;
use adreq_core::{
    AgentNotice, EmailMessage, EmailSender, ErrorKind, GroupDirectory, NotificationSender,
    RequestError, RequestId, RequestTypeUpdate, UserDomain,
};
use adreq_engine::{
    AdminDistributionResolver, Channel, NotificationDispatcher, RequestLifecycleManager,
};
use adreq_store::MemoryStore;
use async_trait::async_trait;
use parking_lot::Mutex;

// -- Fakes --------------------------------------------------------------------

#[derive(Default)]
struct RecordingEmail {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<bool>,
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, message: &EmailMessage) -> Result<(), RequestError> {
        if *self.failing.lock() {
            return Err(RequestError::upstream("email", "503 Service Unavailable"));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingAgent {
    sent: Mutex<Vec<AgentNotice>>,
}

#[async_trait]
impl NotificationSender for RecordingAgent {
    async fn send_message(&self, notice: &AgentNotice) -> Result<(), RequestError> {
        self.sent.lock().push(notice.clone());
        Ok(())
    }
}

struct StaticGroup {
    members: Option<Vec<String>>,
}

#[async_trait]
impl GroupDirectory for StaticGroup {
    async fn members(&self, _group: &str) -> Result<Vec<String>, RequestError> {
        self.members
            .clone()
            .ok_or_else(|| RequestError::upstream("group directory", "connection refused"))
    }
}

struct Harness {
    manager: RequestLifecycleManager,
    email: Arc<RecordingEmail>,
    agent: Arc<RecordingAgent>,
}

impl Harness {
    fn emails_to(&self, to: &str) -> Vec<EmailMessage> {
        self.email
            .sent
            .lock()
            .iter()
            .filter(|m| m.to == to)
            .cloned()
            .collect()
    }

    fn notices_to(&self, user: &str) -> Vec<AgentNotice> {
        self.agent
            .sent
            .lock()
            .iter()
            .filter(|n| n.user == user)
            .cloned()
            .collect()
    }

    fn clear(&self) {
        self.email.sent.lock().clear();
        self.agent.sent.lock().clear();
    }
}

fn harness_with(admins: Option<Vec<&str>>, admin_email: Option<&str>) -> Harness {
    let email = Arc::new(RecordingEmail::default());
    let agent = Arc::new(RecordingAgent::default());
    let group = Arc::new(StaticGroup {
        members: admins.map(|a| a.into_iter().map(String::from).collect()),
    });

    let mut dispatcher = NotificationDispatcher::new(
        email.clone(),
        agent.clone(),
        AdminDistributionResolver::new(group, "de-admins"),
        UserDomain::new("iplantcollaborative.org"),
    );
    if let Some(address) = admin_email {
        dispatcher = dispatcher.with_admin_email(address);
    }

    let manager = RequestLifecycleManager::new(
        Arc::new(MemoryStore::with_default_status_codes()),
        dispatcher,
    );
    Harness {
        manager,
        email,
        agent,
    }
}

fn harness() -> Harness {
    harness_with(Some(vec!["admin1", "admin2"]), None)
}

// -- Scenarios ----------------------------------------------------------------

#[tokio::test]
async fn account_removal_end_to_end() {
    let h = harness();
    h.manager
        .register_request_type("account-removal")
        .await
        .unwrap();

    let submitted = h
        .manager
        .submit_request(
            "alice",
            "account-removal",
            serde_json::json!({"reason": "leaving the lab"}),
        )
        .await
        .unwrap();
    assert!(submitted.dispatch.is_clean());
    assert!(submitted.warnings().is_empty());
    let request = submitted.value;
    assert_eq!(request.current().unwrap().status.name, "submitted");

    let alice_mail = h.emails_to("alice@iplantcollaborative.org");
    assert_eq!(alice_mail.len(), 1);
    assert_eq!(alice_mail[0].template, "request_submitted");
    assert_eq!(h.notices_to("alice").len(), 1);
    assert_eq!(h.notices_to("admin1").len(), 1);
    assert_eq!(h.notices_to("admin2").len(), 1);
    assert_eq!(h.emails_to("admin1@iplantcollaborative.org").len(), 1);
    h.clear();

    let approved = h
        .manager
        .update_status(request.id, "approved", "admin1", Some("looks good"))
        .await
        .unwrap();
    assert!(approved.dispatch.is_clean());
    assert_eq!(approved.value.sequence, 2);

    let history = h.manager.get_request(request.id).await.unwrap();
    let names: Vec<_> = history
        .updates
        .iter()
        .map(|u| u.status.name.as_str())
        .collect();
    assert_eq!(names, vec!["submitted", "approved"]);

    let alice_notices = h.notices_to("alice");
    assert_eq!(alice_notices.len(), 1);
    let notice = &alice_notices[0];
    assert_eq!(notice.payload.request_id, request.id);
    assert_eq!(notice.payload.status, "approved");
    assert_eq!(notice.payload.message.as_deref(), Some("looks good"));
    assert_eq!(notice.payload.updating_user, "admin1");
    assert_eq!(
        h.emails_to("alice@iplantcollaborative.org")[0].template,
        "request_complete"
    );
    assert_eq!(h.notices_to("admin2")[0].payload.status, "approved");
}

#[tokio::test]
async fn email_failure_does_not_roll_back_the_update() {
    let h = harness();
    h.manager.register_request_type("vice").await.unwrap();
    let request = h
        .manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap()
        .into_inner();

    *h.email.failing.lock() = true;
    let result = h
        .manager
        .update_status(request.id, "in-progress", "admin1", None)
        .await
        .unwrap();

    assert!(!result.dispatch.email_ok);
    assert!(result.dispatch.agent_ok);
    assert!(result
        .dispatch
        .failures
        .iter()
        .all(|f| f.channel == Channel::Email));
    assert!(!result.warnings().is_empty());

    let reloaded = h.manager.get_request(request.id).await.unwrap();
    assert_eq!(reloaded.updates.len(), 2);
    assert_eq!(reloaded.current().unwrap().status.name, "in-progress");
}

#[tokio::test]
async fn unknown_status_leaves_history_untouched() {
    let h = harness();
    h.manager.register_request_type("vice").await.unwrap();
    let request = h
        .manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap()
        .into_inner();
    h.clear();

    let err = h
        .manager
        .update_status(request.id, "closed", "admin1", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let reloaded = h.manager.get_request(request.id).await.unwrap();
    assert_eq!(reloaded.updates.len(), 1);
    assert!(h.agent.sent.lock().is_empty());
}

#[tokio::test]
async fn update_of_unknown_request_is_not_found() {
    let h = harness();
    let err = h
        .manager
        .update_status(RequestId::new(), "approved", "admin1", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn submission_validation() {
    let h = harness();
    h.manager.register_request_type("vice").await.unwrap();

    let blank_user = h
        .manager
        .submit_request("  ", "vice", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(blank_user.kind(), ErrorKind::ValidationFailed);

    let not_object = h
        .manager
        .submit_request("alice", "vice", serde_json::json!(["a", "b"]))
        .await
        .unwrap_err();
    assert_eq!(not_object.kind(), ErrorKind::ValidationFailed);

    let unknown_type = h
        .manager
        .submit_request("alice", "Vice", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(unknown_type.kind(), ErrorKind::NotFound);

    assert!(h.agent.sent.lock().is_empty());
}

#[tokio::test]
async fn overlong_usernames_are_rejected_before_any_write() {
    let h = harness();
    h.manager.register_request_type("vice").await.unwrap();
    let too_long = "u".repeat(MAX_USERNAME_LEN + 1);

    let err = h
        .manager
        .submit_request(&too_long, "vice", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(h
        .manager
        .list_requests(&Default::default())
        .await
        .unwrap()
        .is_empty());

    let request = h
        .manager
        .submit_request(&"u".repeat(MAX_USERNAME_LEN), "vice", serde_json::json!({}))
        .await
        .unwrap()
        .into_inner();
    h.clear();

    let err = h
        .manager
        .update_status(request.id, "approved", &too_long, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(h.manager.get_request(request.id).await.unwrap().updates.len(), 1);
    assert!(h.agent.sent.lock().is_empty());
}

#[tokio::test]
async fn admin_resolution_failure_still_notifies_requester() {
    let h = harness_with(None, None);
    h.manager.register_request_type("vice").await.unwrap();

    let result = h
        .manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap();

    assert!(!result.dispatch.admin_resolution_ok);
    assert!(result.dispatch.email_ok);
    assert!(result.dispatch.agent_ok);
    assert_eq!(result.dispatch.failures.len(), 1);
    assert_eq!(result.dispatch.failures[0].channel, Channel::AdminResolution);
    assert_eq!(h.notices_to("alice").len(), 1);
    assert_eq!(h.emails_to("alice@iplantcollaborative.org").len(), 1);
}

#[tokio::test]
async fn admin_email_goes_to_distribution_address_when_configured() {
    let h = harness_with(Some(vec!["admin1", "admin2"]), Some("requests@cyverse.org"));
    h.manager.register_request_type("vice").await.unwrap();
    h.manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(h.emails_to("requests@cyverse.org").len(), 1);
    assert!(h.emails_to("admin1@iplantcollaborative.org").is_empty());
    // Agent notices still go to each administrator.
    assert_eq!(h.notices_to("admin1").len(), 1);
    assert_eq!(h.notices_to("admin2").len(), 1);
}

#[tokio::test]
async fn concurrent_limit_counts_only_open_requests() {
    let h = harness();
    h.manager.register_request_type("vice").await.unwrap();
    h.manager
        .update_request_type(
            "vice",
            RequestTypeUpdate {
                maximum_concurrent_requests_per_user: Some(Some(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let first = h
        .manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap()
        .into_inner();

    let err = h
        .manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);

    // Other users are unaffected.
    h.manager
        .submit_request("bob", "vice", serde_json::json!({}))
        .await
        .unwrap();

    h.manager
        .update_status(first.id, "rejected", "admin1", None)
        .await
        .unwrap();
    h.manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap();
}

#[tokio::test]
async fn total_limit_counts_completed_requests() {
    let h = harness();
    h.manager.register_request_type("data-quota").await.unwrap();
    h.manager
        .update_request_type(
            "data-quota",
            RequestTypeUpdate {
                maximum_requests_per_user: Some(Some(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let first = h
        .manager
        .submit_request("alice", "data-quota", serde_json::json!({}))
        .await
        .unwrap()
        .into_inner();
    h.manager
        .update_status(first.id, "approved", "admin1", None)
        .await
        .unwrap();

    let err = h
        .manager
        .submit_request("alice", "data-quota", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RequestError::LimitExceeded { scope: "total", limit: 1, .. }
    ));
}

#[tokio::test]
async fn configured_initial_status_is_used() {
    let h = harness();
    assert_eq!(h.manager.initial_status(), "submitted");
    let manager = h.manager.clone().with_initial_status("in-progress");
    assert_eq!(manager.initial_status(), "in-progress");
    manager.register_request_type("vice").await.unwrap();

    let request = manager
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(request.updates[0].status.name, "in-progress");
    assert_eq!(request.updates[0].updating_user, "alice");

    let missing = h.manager.clone().with_initial_status("queued");
    let err = missing
        .submit_request("alice", "vice", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
